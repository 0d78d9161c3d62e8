//! Blob storage adapter: attachment uploads and public URL resolution.

use async_trait::async_trait;
use rand::RngCore;
use tracing::debug;

use meera_shared::constants::MAX_ATTACHMENT_SIZE;

use crate::error::{ensure_success, Result, StoreError};

#[async_trait]
pub trait BlobApi: Send + Sync {
    /// Upload bytes under the given object path; returns the stored path.
    async fn upload(&self, path: &str, bytes: Vec<u8>, mime: &str) -> Result<String>;

    /// Resolvable public URL for a stored object path.
    fn public_url(&self, path: &str) -> String;
}

/// Build a collision-resistant object path for an uploaded file:
/// millisecond timestamp, random hex suffix, sanitized original name.
pub fn object_path(file_name: &str, now_millis: i64) -> String {
    let mut suffix = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut suffix);
    format!(
        "{}-{}-{}",
        now_millis,
        hex::encode(suffix),
        sanitize_file_name(file_name)
    )
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

pub struct BlobClient {
    base_url: String,
    bucket: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl BlobClient {
    pub fn new(base_url: String, bucket: String, access_token: Option<String>) -> Self {
        Self {
            base_url,
            bucket,
            access_token,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl BlobApi for BlobClient {
    async fn upload(&self, path: &str, bytes: Vec<u8>, mime: &str) -> Result<String> {
        if bytes.is_empty() {
            return Err(StoreError::Upload("empty file".to_string()));
        }
        if bytes.len() > MAX_ATTACHMENT_SIZE {
            return Err(StoreError::Upload(format!(
                "file too large: {} bytes (max {})",
                bytes.len(),
                MAX_ATTACHMENT_SIZE
            )));
        }

        let size = bytes.len();
        let mut req = self
            .client
            .post(format!(
                "{}/storage/v1/object/{}/{}",
                self.base_url, self.bucket, path
            ))
            .header("Content-Type", mime.to_string())
            .body(bytes);
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }

        ensure_success(req.send().await?).await?;
        debug!(path, size, "blob uploaded");
        Ok(path.to_string())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_safe_chars() {
        assert_eq!(sanitize_file_name("photo-1.png"), "photo-1.png");
        assert_eq!(sanitize_file_name("rapport final.pdf"), "rapport_final.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[test]
    fn test_object_paths_do_not_collide() {
        let a = object_path("a.png", 1_700_000_000_000);
        let b = object_path("a.png", 1_700_000_000_000);
        assert_ne!(a, b);
        assert!(a.ends_with("a.png"));
    }

    #[test]
    fn test_public_url_shape() {
        let client = BlobClient::new(
            "https://backend.example".to_string(),
            "attachments".to_string(),
            None,
        );
        assert_eq!(
            client.public_url("123-abcd-a.png"),
            "https://backend.example/storage/v1/object/public/attachments/123-abcd-a.png"
        );
    }
}
