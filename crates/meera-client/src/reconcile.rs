//! History reconciliation: merging authoritative pages into the ledger
//! without disturbing what is already rendered.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use meera_shared::constants::{HISTORY_PAGE_SIZE, RECONCILE_SKEW_SECS};
use meera_shared::types::{MessageId, Role};

use crate::engine::Engine;
use crate::error::Result;
use crate::events::{ToastKind, UiEvent};

/// Result of one history load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryLoad {
    /// Rows fetched and merged. `more` turns false once a short page
    /// signals the end of history.
    Loaded { rows: usize, more: bool },
    /// A passive trigger was ignored during the post-jump cooldown.
    Suppressed,
}

impl Engine {
    /// Fetch one page and merge it. For non-initial loads the scroll anchor
    /// is preserved by adjusting the offset by exactly the measured
    /// content-height delta.
    pub async fn load_history_page(&self, page: u32, initial: bool) -> Result<HistoryLoad> {
        let mut rows = self.history.fetch_page(page, initial).await?;
        // Oldest-first before merge; the transport orders pages newest-first.
        rows.sort_by_key(|m| m.created_at);
        let fetched = rows.len();
        let more = fetched >= HISTORY_PAGE_SIZE;

        let before = self.viewport.content_height();
        self.ledger().merge_authoritative(&rows);
        let after = self.viewport.content_height();
        if !initial && after > before {
            self.viewport.scroll_by(after - before);
        }

        {
            let mut state = self.state();
            state.loaded_pages = state.loaded_pages.max(page);
        }
        debug!(page, rows = fetched, initial, "history page merged");
        Ok(HistoryLoad::Loaded {
            rows: fetched,
            more,
        })
    }

    /// Passive scroll-triggered load of the next older page. Suppressed
    /// while a directed jump runs and for a cooldown after one, so the two
    /// mechanisms never fight over scroll position.
    pub async fn auto_load_older(&self) -> Result<HistoryLoad> {
        let next = {
            let state = self.state();
            if state.is_jumping {
                return Ok(HistoryLoad::Suppressed);
            }
            if let Some(until) = state.auto_load_suppressed_until {
                if std::time::Instant::now() < until {
                    return Ok(HistoryLoad::Suppressed);
                }
            }
            state.loaded_pages + 1
        };
        match self.load_history_page(next, false).await {
            Ok(loaded) => Ok(loaded),
            Err(e) => {
                self.emit(UiEvent::Toast {
                    kind: ToastKind::Error,
                    text: "Could not load older messages".to_string(),
                });
                Err(e)
            }
        }
    }

    /// Initial page load plus the persisted star set.
    pub async fn load_initial(&self) -> Result<HistoryLoad> {
        let loaded = self.load_history_page(0, true).await?;
        if let Err(e) = self.refresh_stars().await {
            debug!(error = %e, "star refresh failed on initial load");
        }
        Ok(loaded)
    }

    /// Post-stream reconciliation: adopt the newest persisted rows of the
    /// matching roles in place of the optimistic pair.
    ///
    /// Rows older than the submission window are not a match — a slow
    /// backend must not make the just-sent exchange disappear.
    pub(crate) async fn reconcile_after_stream(
        &self,
        user_id: &MessageId,
        assistant_id: &MessageId,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        let rows = self.history.fetch_page(0, false).await?;
        let window = started_at - Duration::seconds(RECONCILE_SKEW_SECS);

        let newest_of = |role: Role| {
            rows.iter()
                .filter(|m| m.role == role && m.created_at >= window)
                .max_by_key(|m| m.created_at)
                .cloned()
        };

        let (Some(user_row), Some(mut assistant_row)) =
            (newest_of(Role::User), newest_of(Role::Assistant))
        else {
            debug!("no persisted rows match this submission; keeping optimistic entries");
            return Ok(());
        };

        // The backend may persist attachments and metadata before the text
        // lands; the local accumulation fills the gap.
        if assistant_row.content.trim().is_empty() {
            let accumulated = self.state().stream_accumulator.clone();
            if !accumulated.is_empty() {
                assistant_row.content = accumulated;
            }
        }

        {
            let mut ledger = self.ledger();
            ledger.remove(user_id);
            ledger.remove(assistant_id);
            ledger.merge_authoritative(&[user_row, assistant_row]);
        }
        self.state().pending_assistant.remove(user_id);
        debug!(user_message = %user_id, "optimistic pair reconciled");
        Ok(())
    }
}
