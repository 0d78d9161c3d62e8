//! Engine session state shared across operations.
//!
//! The [`SessionState`] struct is wrapped in a `Mutex` by the engine; every
//! lock is scoped and released before the next await point.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::watch;

use meera_shared::types::MessageId;
use meera_store::Session;

/// Central mutable state of one engine instance.
pub struct SessionState {
    /// The authenticated session, when signed in.
    pub session: Option<Session>,

    /// Single-flight guard: true while a submission is anywhere between
    /// attachment upload and reconciliation.
    pub is_sending: bool,

    /// Whether the assistant placeholder is visibly "typing".
    pub is_assistant_typing: bool,

    /// Single-flight guard for directed jumps.
    pub is_jumping: bool,

    /// Passive auto-pagination stays suppressed until this instant.
    pub auto_load_suppressed_until: Option<Instant>,

    /// Pairing of each optimistic user message to its assistant placeholder.
    pub pending_assistant: HashMap<MessageId, MessageId>,

    /// Abort signal for the in-flight stream, if any.
    pub stream_abort: Option<watch::Sender<bool>>,

    /// Concatenation of every delta decoded for the in-flight stream, kept
    /// for reconciliation in case the persisted row lacks content.
    pub stream_accumulator: String,

    /// Draft input text, cleared when a submission is accepted.
    pub input_draft: String,

    /// Highest history page index merged so far.
    pub loaded_pages: u32,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            session: None,
            is_sending: false,
            is_assistant_typing: false,
            is_jumping: false,
            auto_load_suppressed_until: None,
            pending_assistant: HashMap::new(),
            stream_abort: None,
            stream_accumulator: String::new(),
            input_draft: String::new(),
            loaded_pages: 0,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
