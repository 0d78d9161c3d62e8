//! # meera-store
//!
//! Typed adapters for the hosted backend services: auth/session, paginated
//! message history, starred messages, blob storage, and the token ledger.
//! Everything speaks HTTP via `reqwest` and fails through [`StoreError`].

pub mod auth;
pub mod blobs;
pub mod history;
pub mod stars;
pub mod tokens;

mod error;

pub use auth::{AuthClient, Session};
pub use blobs::{object_path, BlobApi, BlobClient};
pub use error::StoreError;
pub use history::{HistoryApi, HistoryClient};
pub use stars::{StarApi, StarClient};
pub use tokens::{TokenBalance, TokenClient, TokenEntry};
