//! Directed jump to a message that may not be loaded yet.
//!
//! A starred-message shortcut hands over an identifier and/or timestamp;
//! the engine scrolls straight to it when rendered, otherwise it pulls a
//! targeted context window, then walks older pages, bounded by both a page
//! count and a wall-clock budget.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use meera_shared::constants::{JUMP_MAX_PAGES, JUMP_SCROLL_COOLDOWN_MS, JUMP_TIME_BUDGET_MS};
use meera_shared::types::{MessageId, Role};

use crate::engine::Engine;
use crate::events::{ToastKind, UiEvent};
use crate::reconcile::HistoryLoad;

/// What to locate.
#[derive(Debug, Clone, Default)]
pub struct JumpTarget {
    pub message_id: Option<MessageId>,
    pub timestamp: Option<DateTime<Utc>>,
    pub preferred_role: Option<Role>,
}

impl JumpTarget {
    pub fn id(message_id: MessageId) -> Self {
        Self {
            message_id: Some(message_id),
            ..Self::default()
        }
    }

    pub fn near(timestamp: DateTime<Utc>, preferred_role: Role) -> Self {
        Self {
            message_id: None,
            timestamp: Some(timestamp),
            preferred_role: Some(preferred_role),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpOutcome {
    Found(MessageId),
    /// Another jump was already running; nothing happened.
    Busy,
    /// The page and time budget ran out.
    NotFound,
}

impl Engine {
    /// Locate and surface a message. One jump at a time; a second request
    /// while one runs is a silent no-op.
    pub async fn jump_to(&self, target: JumpTarget) -> JumpOutcome {
        {
            let mut state = self.state();
            if state.is_jumping {
                debug!("jump already in progress, ignoring");
                return JumpOutcome::Busy;
            }
            state.is_jumping = true;
        }
        self.emit(UiEvent::Locating { active: true });

        let outcome = self.run_jump(&target).await;

        match &outcome {
            JumpOutcome::Found(id) => {
                self.emit(UiEvent::ScrollTo {
                    message_id: id.clone(),
                });
                self.emit(UiEvent::Highlight {
                    message_id: id.clone(),
                });
            }
            JumpOutcome::NotFound => {
                self.emit(UiEvent::Toast {
                    kind: ToastKind::Info,
                    text: "Message not found".to_string(),
                });
            }
            JumpOutcome::Busy => {}
        }

        {
            let mut state = self.state();
            state.is_jumping = false;
            state.auto_load_suppressed_until =
                Some(Instant::now() + Duration::from_millis(JUMP_SCROLL_COOLDOWN_MS));
        }
        self.emit(UiEvent::Locating { active: false });
        outcome
    }

    async fn run_jump(&self, target: &JumpTarget) -> JumpOutcome {
        // (1) Already rendered.
        if let Some(found) = self.find_target(target) {
            return JumpOutcome::Found(found);
        }

        let deadline = Instant::now() + Duration::from_millis(JUMP_TIME_BUDGET_MS);

        // (2) Targeted context window around the identifier.
        if let Some(id) = &target.message_id {
            match self.history.fetch_context(id).await {
                Ok(mut rows) if !rows.is_empty() => {
                    rows.sort_by_key(|m| m.created_at);
                    self.ledger().merge_authoritative(&rows);
                    if let Some(found) = self.find_target(target) {
                        return JumpOutcome::Found(found);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "context fetch failed; falling back to paging");
                }
            }
        }

        // (3) Walk older pages until the target materializes or the budget
        // runs out.
        let mut page = self.state().loaded_pages + 1;
        let mut walked = 0;
        while walked < JUMP_MAX_PAGES && Instant::now() < deadline {
            match self.load_history_page(page, false).await {
                Ok(HistoryLoad::Loaded { more, .. }) => {
                    if let Some(found) = self.find_target(target) {
                        return JumpOutcome::Found(found);
                    }
                    if !more {
                        break;
                    }
                }
                Ok(HistoryLoad::Suppressed) => break,
                Err(e) => {
                    warn!(page, error = %e, "history page failed during jump");
                    break;
                }
            }
            page += 1;
            walked += 1;
        }

        JumpOutcome::NotFound
    }

    /// The target in the ledger, by exact identifier or by
    /// nearest-timestamp candidate of the preferred role. The nearest
    /// candidate is only final once history older than the target has been
    /// materialized, otherwise an early page would end the search at a
    /// far-off neighbour.
    fn find_target(&self, target: &JumpTarget) -> Option<MessageId> {
        let ledger = self.ledger();
        if let Some(id) = &target.message_id {
            if ledger.contains(id) {
                return Some(id.clone());
            }
        }
        let ts = target.timestamp?;
        if !ledger.oldest().is_some_and(|m| m.created_at <= ts) {
            return None;
        }
        ledger
            .iter()
            .filter(|m| target.preferred_role.map_or(true, |r| m.role == r))
            .min_by_key(|m| (m.created_at - ts).num_milliseconds().abs())
            .map(|m| m.id.clone())
    }
}
