//! Token-ledger reads for the account panel.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use meera_shared::types::UserId;

use crate::error::{ensure_success, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct TokenBalance {
    pub balance: i64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One debit/credit row in the ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEntry {
    pub amount: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

pub struct TokenClient {
    base_url: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl TokenClient {
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

    pub async fn fetch_balance(&self, user_id: &UserId) -> Result<TokenBalance> {
        let req = self
            .client
            .get(format!("{}/api/tokens/balance", self.base_url))
            .query(&[("user_id", user_id.as_str())]);
        let response = ensure_success(self.authorize(req).send().await?).await?;
        Ok(response.json::<TokenBalance>().await?)
    }

    pub async fn fetch_entries(&self, user_id: &UserId) -> Result<Vec<TokenEntry>> {
        let req = self
            .client
            .get(format!("{}/api/tokens/entries", self.base_url))
            .query(&[("user_id", user_id.as_str())]);
        let response = ensure_success(self.authorize(req).send().await?).await?;
        Ok(response.json::<Vec<TokenEntry>>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_rows_deserialize() {
        let balance: TokenBalance = serde_json::from_str(r#"{"balance": 1200}"#).unwrap();
        assert_eq!(balance.balance, 1200);
        assert!(balance.updated_at.is_none());

        let entry: TokenEntry = serde_json::from_str(
            r#"{"amount": -35, "reason": "chat", "created_at": "2024-05-01T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(entry.amount, -35);
        assert_eq!(entry.reason, "chat");
    }
}
