//! Realtime change listener with the tokio mpsc command/notification pattern.
//!
//! The poll loop runs in a dedicated tokio task. External code communicates
//! with it through a typed command channel and receives row changes on a
//! notification channel, keeping the transport fully decoupled from the
//! engine that folds the changes in.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use meera_shared::constants::{REALTIME_POLL_WAIT_SECS, REALTIME_RETRY_DELAY_SECS};
use meera_shared::protocol::{RealtimePoll, RowChange};
use meera_shared::types::UserId;

use crate::error::{NetError, Result};

/// Commands sent *into* the listener task.
#[derive(Debug)]
pub enum RealtimeCommand {
    /// Gracefully stop polling and drop the notification channel.
    Shutdown,
}

/// Configuration for spawning the listener.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Base URL of the hosted backend.
    pub base_url: String,
    /// User whose rows the subscription covers.
    pub user_id: UserId,
    /// Bearer token attached to poll requests, when signed in.
    pub access_token: Option<String>,
}

/// Spawn the realtime listener in a background tokio task.
///
/// Returns `(command_tx, change_rx)`. Poll failures back off and retry; they
/// never terminate the task. The task stops when it receives
/// [`RealtimeCommand::Shutdown`] or when every command sender is dropped.
pub fn spawn_realtime(
    config: RealtimeConfig,
) -> (mpsc::Sender<RealtimeCommand>, mpsc::Receiver<RowChange>) {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<RealtimeCommand>(8);
    let (change_tx, change_rx) = mpsc::channel::<RowChange>(256);

    tokio::spawn(async move {
        let client = reqwest::Client::new();
        let mut cursor: Option<u64> = None;

        info!(user = %config.user_id.short(), "Realtime listener started");

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(RealtimeCommand::Shutdown) | None => {
                            info!("Realtime listener shutting down");
                            return;
                        }
                    }
                }
                polled = poll_changes(&client, &config, cursor) => {
                    match polled {
                        Ok(body) => {
                            cursor = Some(body.cursor);
                            for frame in body.events {
                                match frame.into_row_change() {
                                    Ok(Some(change)) => {
                                        if change_tx.send(change).await.is_err() {
                                            debug!("Change receiver dropped, stopping listener");
                                            return;
                                        }
                                    }
                                    Ok(None) => {}
                                    Err(e) => {
                                        warn!(error = %e, "Dropping malformed realtime frame");
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Realtime poll failed, backing off");
                            tokio::time::sleep(Duration::from_secs(REALTIME_RETRY_DELAY_SECS))
                                .await;
                        }
                    }
                }
            }
        }
    });

    (cmd_tx, change_rx)
}

async fn poll_changes(
    client: &reqwest::Client,
    config: &RealtimeConfig,
    cursor: Option<u64>,
) -> Result<RealtimePoll> {
    let mut req = client
        .get(format!("{}/realtime/v1/changes", config.base_url))
        .query(&[("user_id", config.user_id.as_str())])
        .timeout(Duration::from_secs(REALTIME_POLL_WAIT_SECS + 5));

    if let Some(cursor) = cursor {
        req = req.query(&[("cursor", cursor.to_string())]);
    }
    if let Some(token) = &config.access_token {
        req = req.bearer_auth(token);
    }

    let response = req.send().await?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(NetError::Status { status, body });
    }

    Ok(response.json::<RealtimePoll>().await?)
}
