use serde::Serialize;
use tokio::sync::mpsc;

use meera_shared::types::MessageId;

/// Events emitted to the rendering layer.
#[derive(Debug, Clone, Serialize)]
pub enum UiEvent {
    /// A submission was accepted and its optimistic entries inserted.
    MessageSent { user_message_id: MessageId },
    /// The assistant placeholder started or stopped producing output.
    AssistantTyping { active: bool },
    /// Transient user-facing notice.
    Toast { kind: ToastKind, text: String },
    /// Scroll the transcript to a message.
    ScrollTo { message_id: MessageId },
    /// Briefly highlight a located message.
    Highlight { message_id: MessageId },
    /// A directed jump started or finished locating its target.
    Locating { active: bool },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Error,
    /// The session is gone; a plain retry will not help.
    SessionExpired,
}

pub fn emit_event(tx: &mpsc::UnboundedSender<UiEvent>, event: UiEvent) {
    if tx.send(event).is_err() {
        tracing::debug!("UI event receiver dropped");
    }
}
