use thiserror::Error;

use meera_net::NetError;
use meera_store::StoreError;

/// Errors surfaced by the engine.
///
/// These never cross the rendering boundary as errors: the coordinator
/// converts them into ledger flags and toast events. The taxonomy exists so
/// callers inside the engine can distinguish retryable from terminal cases.
#[derive(Error, Debug)]
pub enum EngineError {
    /// An attachment upload failed before any optimistic state was shown.
    #[error("Attachment upload failed: {0}")]
    Upload(String),

    /// The chat stream failed or was aborted.
    #[error("Stream failed: {0}")]
    Stream(NetError),

    /// The session is no longer valid. Distinguished so callers do not offer
    /// a generic "retry" that implies a transient failure.
    #[error("Session expired")]
    SessionExpired,

    /// A store read/write failed.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<NetError> for EngineError {
    fn from(e: NetError) -> Self {
        match e {
            NetError::Status { status: 401, .. } | NetError::Status { status: 403, .. } => {
                Self::SessionExpired
            }
            other => Self::Stream(other),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SessionExpired => Self::SessionExpired,
            other => Self::Store(other),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
