//! Client configuration loaded from environment variables.
//!
//! All settings have defaults so the engine can run against a local backend
//! with zero configuration.

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// URL of the streaming chat function.
    /// Env: `MEERA_CHAT_URL`
    /// Default: `http://localhost:8787/chat`
    pub chat_url: String,

    /// Base URL of the hosted backend (history, stars, storage, auth).
    /// Env: `MEERA_API_BASE`
    /// Default: `http://localhost:8000`
    pub api_base: String,

    /// Storage bucket for attachments.
    /// Env: `MEERA_STORAGE_BUCKET`
    /// Default: `attachments`
    pub storage_bucket: String,

    /// Optional bearer key for the chat function.
    /// Env: `MEERA_CHAT_API_KEY`
    /// Default: none.
    pub chat_api_key: Option<String>,

    /// Whether to request streamed replies.
    /// Env: `MEERA_STREAMING` (true/false)
    /// Default: `true`
    pub streaming: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chat_url: "http://localhost:8787/chat".to_string(),
            api_base: "http://localhost:8000".to_string(),
            storage_bucket: "attachments".to_string(),
            chat_api_key: None,
            streaming: true,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("MEERA_CHAT_URL") {
            config.chat_url = url;
        }

        if let Ok(base) = std::env::var("MEERA_API_BASE") {
            config.api_base = base;
        }

        if let Ok(bucket) = std::env::var("MEERA_STORAGE_BUCKET") {
            config.storage_bucket = bucket;
        }

        if let Ok(key) = std::env::var("MEERA_CHAT_API_KEY") {
            if !key.is_empty() {
                config.chat_api_key = Some(key);
            }
        }

        if let Ok(val) = std::env::var("MEERA_STREAMING") {
            config.streaming = val != "false" && val != "0";
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}
