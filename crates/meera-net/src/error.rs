use thiserror::Error;

/// Errors produced by the network layer.
#[derive(Error, Debug)]
pub enum NetError {
    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote endpoint answered with a non-success status.
    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The caller aborted the stream.
    #[error("Stream aborted")]
    Aborted,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NetError>;
