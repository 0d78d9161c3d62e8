//! Domain models shared between the service adapters and the engine.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be read
//! straight out of the hosted store's JSON rows and handed to the UI layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AttachmentKind, ConversationId, MessageId, Role};

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single conversation message.
///
/// Content is mutable while a reply streams in; every other field is set at
/// creation or during an authoritative merge. Fields after `attachments` are
/// client-side bookkeeping that persisted rows do not carry, so they default
/// when deserializing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Unique message identifier (locally generated until persisted).
    pub id: MessageId,
    /// The conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Author role.
    pub role: Role,
    /// Textual content. Grows monotonically while streaming.
    pub content: String,
    /// Creation timestamp; a total order consistent with send order.
    pub created_at: DateTime<Utc>,
    /// Uploaded attachments, in selection order.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Set when a send attempt failed; the entry stays in place for retry.
    #[serde(default)]
    pub failed: bool,
    /// Human-readable failure note shown on the assistant entry.
    #[serde(default)]
    pub failure_note: Option<String>,
    /// How many times this message has been (re)submitted.
    #[serde(default)]
    pub try_number: u32,
    /// Upstream finish reason, when the stream reported one.
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Internal "thought" text; never rendered in the transcript.
    #[serde(default)]
    pub thoughts: Option<String>,
}

impl Message {
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Attachment
// ---------------------------------------------------------------------------

/// Metadata for an uploaded file attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    /// Original file name.
    pub name: String,
    /// Classification derived from the MIME type.
    pub kind: AttachmentKind,
    /// Full MIME type as reported at selection time.
    pub mime: String,
    /// File size in bytes.
    pub size: u64,
    /// Durable object path in the hosted blob store.
    pub storage_path: String,
    /// Resolvable public URL.
    pub url: String,
}

// ---------------------------------------------------------------------------
// Star (bookmark)
// ---------------------------------------------------------------------------

/// A user-flagged message with a denormalized content snapshot, captured at
/// star time so the bookmark stays meaningful after the original scrolls out
/// of the loaded window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StarRecord {
    /// Identifier of the starred message.
    pub message_id: MessageId,
    /// Content snapshot at star time.
    pub content: String,
    /// Role of the starred message.
    pub role: Role,
    /// Timestamp of the starred message.
    pub message_created_at: DateTime<Utc>,
    /// Short derived summary for list views.
    pub summary: String,
    /// Surrounding user context: the nearest preceding user message.
    #[serde(default)]
    pub user_context: Option<String>,
    /// When the star itself was created.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_row_without_client_fields_deserializes() {
        let row = serde_json::json!({
            "id": "a3c1f3e8-0000-4000-8000-000000000001",
            "conversation_id": "a3c1f3e8-0000-4000-8000-000000000002",
            "role": "assistant",
            "content": "hello",
            "created_at": "2024-05-01T12:00:00Z"
        });

        let msg: Message = serde_json::from_value(row).unwrap();
        assert!(!msg.failed);
        assert_eq!(msg.try_number, 0);
        assert!(msg.attachments.is_empty());
    }
}
