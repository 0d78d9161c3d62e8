//! Session adapter for the hosted identity provider.
//!
//! The provider is opaque: password sign-in, sign-out, and a cached session
//! whose expiry is read from the access token. State changes fan out over a
//! `watch` channel so interested components can react to sign-in/sign-out
//! without polling.

use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::info;

use meera_shared::types::UserId;

use crate::error::{ensure_success, Result, StoreError};

/// An authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: UserId,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

pub struct AuthClient {
    base_url: String,
    client: reqwest::Client,
    session: Mutex<Option<Session>>,
    state_tx: watch::Sender<Option<Session>>,
}

impl AuthClient {
    pub fn new(base_url: String) -> Self {
        let (state_tx, _) = watch::channel(None);
        Self {
            base_url,
            client: reqwest::Client::new(),
            session: Mutex::new(None),
            state_tx,
        }
    }

    /// Password sign-in. Caches the session and notifies watchers.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let body: TokenResponse = ensure_success(response).await?.json().await?;
        let session = session_from_response(body)?;

        info!(user = %session.user_id.short(), "signed in");
        self.store_session(Some(session.clone()));
        Ok(session)
    }

    /// Exchange the refresh token for a fresh session.
    pub async fn refresh(&self) -> Result<Session> {
        let refresh_token = {
            let guard = self.session.lock().expect("session lock poisoned");
            guard
                .as_ref()
                .map(|s| s.refresh_token.clone())
                .ok_or(StoreError::SessionExpired)?
        };

        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "refresh_token")])
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let body: TokenResponse = ensure_success(response).await?.json().await?;
        let session = session_from_response(body)?;
        self.store_session(Some(session.clone()));
        Ok(session)
    }

    /// Sign out and clear the cached session. Watchers see `None`.
    pub async fn sign_out(&self) -> Result<()> {
        let token = {
            let guard = self.session.lock().expect("session lock poisoned");
            guard.as_ref().map(|s| s.access_token.clone())
        };

        if let Some(token) = token {
            let response = self
                .client
                .post(format!("{}/auth/v1/logout", self.base_url))
                .bearer_auth(token)
                .send()
                .await?;
            // Clearing local state matters more than the server's answer.
            let _ = ensure_success(response).await;
        }

        self.store_session(None);
        info!("signed out");
        Ok(())
    }

    /// The cached session, if present and not expired.
    pub fn get_session(&self) -> Option<Session> {
        let guard = self.session.lock().expect("session lock poisoned");
        guard.as_ref().filter(|s| !s.is_expired()).cloned()
    }

    /// Subscribe to sign-in/sign-out transitions.
    pub fn on_auth_state_change(&self) -> watch::Receiver<Option<Session>> {
        self.state_tx.subscribe()
    }

    fn store_session(&self, session: Option<Session>) {
        *self.session.lock().expect("session lock poisoned") = session.clone();
        let _ = self.state_tx.send(session);
    }
}

fn session_from_response(body: TokenResponse) -> Result<Session> {
    let expires_at = body
        .expires_in
        .map(|secs| Utc::now() + Duration::seconds(secs))
        .or_else(|| token_expiry(&body.access_token))
        .ok_or_else(|| StoreError::Api("token response carried no expiry".to_string()))?;

    Ok(Session {
        user_id: UserId(body.user.id),
        access_token: body.access_token,
        refresh_token: body.refresh_token,
        expires_at,
    })
}

/// Read the `exp` claim out of a JWT access token without verifying it;
/// verification is the backend's job, this is only scheduling input.
fn token_expiry(access_token: &str) -> Option<DateTime<Utc>> {
    #[derive(Deserialize)]
    struct Claims {
        exp: i64,
    }

    let payload = access_token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp, 0)
}
