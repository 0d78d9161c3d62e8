use thiserror::Error;

/// Errors produced by the store adapters.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the request or reported an application error.
    #[error("Backend error: {0}")]
    Api(String),

    /// The session is no longer valid; callers surface this distinctly
    /// instead of offering a generic retry.
    #[error("Session expired")]
    SessionExpired,

    /// A lookup expected a row that does not exist.
    #[error("Record not found")]
    NotFound,

    /// An attachment upload was rejected before it reached the backend.
    #[error("Upload rejected: {0}")]
    Upload(String),

    /// A bounded retry loop gave up.
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Map a response's status onto the error taxonomy, passing successes through.
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    use reqwest::StatusCode;

    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::SessionExpired),
        StatusCode::NOT_FOUND => Err(StoreError::NotFound),
        status => {
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::Api(format!("{status}: {body}")))
        }
    }
}
