use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Message identity = authoritative UUID string, or a locally generated
// `optimistic-<millis>` / `assistant-<millis>` form until reconciled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn authoritative() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Identifier for a locally created, not-yet-persisted user message.
    pub fn optimistic(millis: i64) -> Self {
        Self(format!("optimistic-{millis}"))
    }

    /// Identifier for the assistant placeholder paired with an optimistic
    /// user message.
    pub fn assistant_placeholder(millis: i64) -> Self {
        Self(format!("assistant-{millis}"))
    }

    /// True for locally generated identifiers that have not yet been
    /// superseded by a persisted row.
    pub fn is_local(&self) -> bool {
        self.0.starts_with("optimistic-") || self.0.starts_with("assistant-")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// User identity = opaque subject identifier issued by the hosted auth
// provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> String {
        self.0.chars().take(8).collect()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// Coarse attachment classification derived from the MIME type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Document,
    File,
}

impl AttachmentKind {
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime.starts_with("image/") {
            Self::Image
        } else if mime.starts_with("text/")
            || mime == "application/pdf"
            || mime == "application/msword"
            || mime.starts_with("application/vnd.openxmlformats-officedocument")
        {
            Self::Document
        } else {
            Self::File
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_are_detected() {
        assert!(MessageId::optimistic(1700000000000).is_local());
        assert!(MessageId::assistant_placeholder(1700000000000).is_local());
        assert!(!MessageId::authoritative().is_local());
    }

    #[test]
    fn mime_classification() {
        assert_eq!(AttachmentKind::from_mime("image/png"), AttachmentKind::Image);
        assert_eq!(
            AttachmentKind::from_mime("application/pdf"),
            AttachmentKind::Document
        );
        assert_eq!(
            AttachmentKind::from_mime("application/zip"),
            AttachmentKind::File
        );
    }
}
