//! # meera-shared
//!
//! Core types shared by every Meera crate: identifiers, domain models,
//! wire payloads exchanged with the hosted backend, and tunable constants.

pub mod constants;
pub mod error;
pub mod models;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use models::{Attachment, Message, StarRecord};
pub use types::{AttachmentKind, ConversationId, MessageId, Role, UserId};
