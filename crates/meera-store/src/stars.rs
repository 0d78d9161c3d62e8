//! Starred-message CRUD against the hosted store.

use async_trait::async_trait;
use tracing::debug;

use meera_shared::models::StarRecord;
use meera_shared::types::MessageId;

use crate::error::{ensure_success, Result};

#[async_trait]
pub trait StarApi: Send + Sync {
    async fn insert_star(&self, star: &StarRecord) -> Result<()>;
    async fn delete_star(&self, message_id: &MessageId) -> Result<()>;
    async fn list_stars(&self) -> Result<Vec<StarRecord>>;
}

pub struct StarClient {
    base_url: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl StarClient {
    pub fn new(base_url: String, access_token: Option<String>) -> Self {
        Self {
            base_url,
            access_token,
            client: reqwest::Client::new(),
        }
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl StarApi for StarClient {
    async fn insert_star(&self, star: &StarRecord) -> Result<()> {
        let req = self
            .client
            .post(format!("{}/api/stars", self.base_url))
            .json(star);
        ensure_success(self.authorize(req).send().await?).await?;
        debug!(message_id = %star.message_id, "star persisted");
        Ok(())
    }

    async fn delete_star(&self, message_id: &MessageId) -> Result<()> {
        let req = self
            .client
            .delete(format!("{}/api/stars/{}", self.base_url, message_id));
        ensure_success(self.authorize(req).send().await?).await?;
        debug!(message_id = %message_id, "star removed");
        Ok(())
    }

    async fn list_stars(&self) -> Result<Vec<StarRecord>> {
        let req = self.client.get(format!("{}/api/stars", self.base_url));
        let response = ensure_success(self.authorize(req).send().await?).await?;
        Ok(response.json::<Vec<StarRecord>>().await?)
    }
}
