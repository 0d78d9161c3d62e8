//! Paginated history reads against the hosted store.
//!
//! Duplicate concurrent requests for the same page are collapsed onto one
//! in-flight future; transient failures retry with linear backoff up to a
//! small bound. A short page is the normal no-more-pages signal and is the
//! caller's to detect — only genuine failures surface as errors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use meera_shared::constants::{HISTORY_MAX_RETRIES, HISTORY_RETRY_STEP_MS};
use meera_shared::models::Message;
use meera_shared::protocol::HistoryPage;
use meera_shared::types::MessageId;

use crate::error::{ensure_success, Result, StoreError};

#[async_trait]
pub trait HistoryApi: Send + Sync {
    /// Fetch one page of persisted messages. Page 0 is the newest; rows
    /// within a page arrive oldest-first.
    async fn fetch_page(&self, page: u32, initial: bool) -> Result<Vec<Message>>;

    /// Targeted context-window fetch centred on one message.
    async fn fetch_context(&self, message_id: &MessageId) -> Result<Vec<Message>>;
}

type SharedPage = Shared<BoxFuture<'static, std::result::Result<Vec<Message>, Arc<StoreError>>>>;

pub struct HistoryClient {
    base_url: String,
    access_token: Option<String>,
    client: reqwest::Client,
    in_flight: Mutex<HashMap<(u32, bool), SharedPage>>,
}

impl HistoryClient {
    pub fn new(base_url: String, access_token: Option<String>) -> Self {
        Self {
            base_url,
            access_token,
            client: reqwest::Client::new(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    async fn get_page_once(
        client: reqwest::Client,
        base_url: String,
        access_token: Option<String>,
        page: u32,
    ) -> Result<Vec<Message>> {
        let mut req = client
            .get(format!("{base_url}/api/history"))
            .query(&[("page", page.to_string())]);
        if let Some(token) = &access_token {
            req = req.bearer_auth(token);
        }

        let response = ensure_success(req.send().await?).await?;
        let body: HistoryPage = response.json().await?;
        if let Some(error) = body.error {
            return Err(StoreError::Api(error));
        }
        Ok(body.data)
    }

    /// One page fetch with bounded linear-backoff retries.
    async fn get_page_with_retries(
        client: reqwest::Client,
        base_url: String,
        access_token: Option<String>,
        page: u32,
    ) -> Result<Vec<Message>> {
        let mut last: Option<StoreError> = None;
        for attempt in 1..=HISTORY_MAX_RETRIES {
            match Self::get_page_once(
                client.clone(),
                base_url.clone(),
                access_token.clone(),
                page,
            )
            .await
            {
                Ok(rows) => {
                    debug!(page, rows = rows.len(), attempt, "history page loaded");
                    return Ok(rows);
                }
                Err(e) if is_transient(&e) => {
                    warn!(page, attempt, error = %e, "transient history failure");
                    last = Some(e);
                    tokio::time::sleep(Duration::from_millis(
                        HISTORY_RETRY_STEP_MS * u64::from(attempt),
                    ))
                    .await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::RetriesExhausted {
            attempts: HISTORY_MAX_RETRIES,
            last: last.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

fn is_transient(error: &StoreError) -> bool {
    matches!(error, StoreError::Http(_) | StoreError::Api(_))
}

/// Rebuild a typed error from the shared-future `Arc` wrapper.
fn unshare(error: Arc<StoreError>) -> StoreError {
    match &*error {
        StoreError::SessionExpired => StoreError::SessionExpired,
        StoreError::NotFound => StoreError::NotFound,
        other => StoreError::Api(other.to_string()),
    }
}

#[async_trait]
impl HistoryApi for HistoryClient {
    async fn fetch_page(&self, page: u32, initial: bool) -> Result<Vec<Message>> {
        let key = (page, initial);
        let shared = {
            let mut guard = self.in_flight.lock().expect("in-flight map poisoned");
            if let Some(existing) = guard.get(&key) {
                existing.clone()
            } else {
                let fut = Self::get_page_with_retries(
                    self.client.clone(),
                    self.base_url.clone(),
                    self.access_token.clone(),
                    page,
                )
                .map(|result| result.map_err(Arc::new))
                .boxed()
                .shared();
                guard.insert(key, fut.clone());
                fut
            }
        };

        let result = shared.await;

        self.in_flight
            .lock()
            .expect("in-flight map poisoned")
            .remove(&key);

        result.map_err(unshare)
    }

    async fn fetch_context(&self, message_id: &MessageId) -> Result<Vec<Message>> {
        let mut req = self
            .client
            .get(format!("{}/api/history/context", self.base_url))
            .query(&[("message_id", message_id.as_str())]);
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }

        let response = ensure_success(req.send().await?).await?;
        let body: HistoryPage = response.json().await?;
        if let Some(error) = body.error {
            return Err(StoreError::Api(error));
        }
        Ok(body.data)
    }
}
