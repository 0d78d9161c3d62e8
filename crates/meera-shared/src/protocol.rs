use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::models::{Message, StarRecord};
use crate::types::{ConversationId, MessageId, Role};

// ---------------------------------------------------------------------------
// Chat function
// ---------------------------------------------------------------------------

/// Request body for the chat function endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub conversation_id: ConversationId,
    /// Prior turns, oldest first.
    pub messages: Vec<ChatTurn>,
    /// The current user message text (with the attachment listing appended).
    pub message: String,
    /// Attachment metadata forwarded for server-side bookkeeping.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileMeta>,
    /// Whether the function should stream its reply.
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    pub mime: String,
    pub size: u64,
    pub url: String,
}

/// Non-streaming reply shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    #[serde(default)]
    pub images: Vec<String>,
}

// ---------------------------------------------------------------------------
// Streaming frames
// ---------------------------------------------------------------------------

/// One decoded `data:` payload from the streaming chat function.
///
/// Two upstream schemas are live at once; untagged detection keeps the
/// variants explicit instead of probing properties at runtime. Order
/// matters: the incremental shape is tried first because a snapshot frame
/// can never carry `choices`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StreamFrame {
    /// Incremental-delta shape: each event carries only the new fragment.
    Incremental { choices: Vec<DeltaChoice> },
    /// Cumulative-snapshot shape: each event repeats the full answer so far.
    Snapshot {
        answer: String,
        #[serde(default)]
        done: bool,
        #[serde(default)]
        thought: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeltaChoice {
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
    /// Internal reasoning text; filtered out before the transcript.
    #[serde(default)]
    pub reasoning: Option<String>,
}

// ---------------------------------------------------------------------------
// History endpoint
// ---------------------------------------------------------------------------

/// Envelope returned by `GET /api/history?page=<n>`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub data: Vec<Message>,
    #[serde(default)]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Realtime channel
// ---------------------------------------------------------------------------

/// Raw row-change notification as delivered by the realtime endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeFrame {
    pub table: String,
    #[serde(rename = "type")]
    pub op: ChangeOp,
    #[serde(default)]
    pub record: Option<serde_json::Value>,
    #[serde(default)]
    pub old_record: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Typed row change folded into the ledger / star set.
#[derive(Debug, Clone)]
pub enum RowChange {
    MessageInserted(Message),
    MessageUpdated(Message),
    StarInserted(StarRecord),
    StarUpdated(StarRecord),
    StarDeleted { message_id: MessageId },
}

impl ChangeFrame {
    /// Convert the raw frame into a typed change.
    ///
    /// Frames for tables this client does not track yield `Ok(None)`.
    pub fn into_row_change(self) -> Result<Option<RowChange>, ProtocolError> {
        match self.table.as_str() {
            "messages" => {
                let Some(record) = self.record else {
                    return Ok(None);
                };
                let message: Message = serde_json::from_value(record)?;
                Ok(match self.op {
                    ChangeOp::Insert => Some(RowChange::MessageInserted(message)),
                    ChangeOp::Update => Some(RowChange::MessageUpdated(message)),
                    // Message rows are never deleted by this client's flows.
                    ChangeOp::Delete => None,
                })
            }
            "starred_messages" => match self.op {
                ChangeOp::Insert | ChangeOp::Update => {
                    let Some(record) = self.record else {
                        return Ok(None);
                    };
                    let star: StarRecord = serde_json::from_value(record)?;
                    Ok(Some(if self.op == ChangeOp::Insert {
                        RowChange::StarInserted(star)
                    } else {
                        RowChange::StarUpdated(star)
                    }))
                }
                ChangeOp::Delete => {
                    let Some(old) = self.old_record else {
                        return Ok(None);
                    };
                    let star: StarRecord = serde_json::from_value(old)?;
                    Ok(Some(RowChange::StarDeleted {
                        message_id: star.message_id,
                    }))
                }
            },
            _ => Ok(None),
        }
    }
}

/// Body returned by one realtime long-poll round.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimePoll {
    #[serde(default)]
    pub events: Vec<ChangeFrame>,
    pub cursor: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_frame_variants() {
        let incremental = r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#;
        match serde_json::from_str::<StreamFrame>(incremental).unwrap() {
            StreamFrame::Incremental { choices } => {
                assert_eq!(choices[0].delta.content.as_deref(), Some("Hi"));
            }
            other => panic!("wrong variant: {other:?}"),
        }

        let snapshot = r#"{"answer":"Hi there","done":false}"#;
        match serde_json::from_str::<StreamFrame>(snapshot).unwrap() {
            StreamFrame::Snapshot { answer, done, .. } => {
                assert_eq!(answer, "Hi there");
                assert!(!done);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_change_frame_message_insert() {
        let raw = serde_json::json!({
            "table": "messages",
            "type": "INSERT",
            "record": {
                "id": "m-1",
                "conversation_id": "a3c1f3e8-0000-4000-8000-000000000002",
                "role": "user",
                "content": "hello",
                "created_at": "2024-05-01T12:00:00Z"
            }
        });

        let frame: ChangeFrame = serde_json::from_value(raw).unwrap();
        match frame.into_row_change().unwrap() {
            Some(RowChange::MessageInserted(m)) => assert_eq!(m.content, "hello"),
            other => panic!("unexpected change: {other:?}"),
        }
    }

    #[test]
    fn test_change_frame_unknown_table_is_skipped() {
        let raw = serde_json::json!({
            "table": "token_ledger",
            "type": "INSERT",
            "record": {}
        });
        let frame: ChangeFrame = serde_json::from_value(raw).unwrap();
        assert!(frame.into_row_change().unwrap().is_none());
    }
}
