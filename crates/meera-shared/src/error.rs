use thiserror::Error;

/// Errors produced while decoding wire payloads.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A payload failed to deserialize into its typed shape.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
