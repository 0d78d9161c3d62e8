//! # meera-client
//!
//! The conversational engine behind the Meera client: optimistic message
//! ledger, submission coordination, history reconciliation, directed jumps,
//! and the star set, driven by the service adapters in `meera-net` and
//! `meera-store`. The rendering layer consumes the engine through its
//! [`UiEvent`] channel and the [`Viewport`] hook.

pub mod config;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod locate;
pub mod reconcile;
pub mod state;
pub mod stars;
pub mod submission;
pub mod viewport;

mod error;

#[cfg(test)]
pub(crate) mod testkit;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::ClientConfig;
pub use engine::Engine;
pub use error::EngineError;
pub use events::{ToastKind, UiEvent};
pub use ledger::MessageLedger;
pub use locate::{JumpOutcome, JumpTarget};
pub use reconcile::HistoryLoad;
pub use stars::StarSet;
pub use submission::{PreviewHandle, SendOutcome, StagedAttachment};
pub use viewport::{NullViewport, Viewport};

/// Install the default tracing subscriber for a Meera process.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("meera_client=debug,meera_net=debug,meera_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    tracing::info!("Meera engine logging initialised");
}
