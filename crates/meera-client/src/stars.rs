//! Star (bookmark) set with optimistic toggle and realtime folding.

use chrono::Utc;
use tracing::{debug, warn};

use std::collections::HashMap;

use meera_shared::constants::STAR_SUMMARY_CHARS;
use meera_shared::models::StarRecord;
use meera_shared::types::{MessageId, Role};

use crate::engine::Engine;
use crate::error::Result;
use crate::events::{ToastKind, UiEvent};
use crate::ledger::MessageLedger;

/// The set of starred messages, keyed by message identifier.
#[derive(Debug, Default)]
pub struct StarSet {
    stars: HashMap<MessageId, StarRecord>,
}

impl StarSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    pub fn is_starred(&self, id: &MessageId) -> bool {
        self.stars.contains_key(id)
    }

    pub fn get(&self, id: &MessageId) -> Option<&StarRecord> {
        self.stars.get(id)
    }

    /// Stars newest-first, the order bookmark lists render in.
    pub fn records(&self) -> Vec<StarRecord> {
        let mut records: Vec<StarRecord> = self.stars.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    pub fn upsert(&mut self, star: StarRecord) {
        self.stars.insert(star.message_id.clone(), star);
    }

    pub fn remove(&mut self, id: &MessageId) -> Option<StarRecord> {
        self.stars.remove(id)
    }
}

/// Short summary derived from the starred content.
fn derive_summary(content: &str) -> String {
    let collapsed: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= STAR_SUMMARY_CHARS {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(STAR_SUMMARY_CHARS).collect();
    format!("{}…", truncated.trim_end())
}

/// The nearest user message before the given entry, for snapshot context.
fn user_context_for(ledger: &MessageLedger, id: &MessageId) -> Option<String> {
    let mut context = None;
    for message in ledger.iter() {
        if &message.id == id {
            return context;
        }
        if message.role == Role::User {
            context = Some(message.content.clone());
        }
    }
    None
}

impl Engine {
    /// Toggle a star: optimistic flip, confirmed against the store, rolled
    /// back on failure. Returns the new starred state.
    pub async fn toggle_star(&self, message_id: &MessageId) -> bool {
        // Bind first: the lock must not be held across the await below.
        let existing = self.stars().remove(message_id);
        if let Some(existing) = existing {
            if let Err(e) = self.stars_api.delete_star(message_id).await {
                warn!(message_id = %message_id, error = %e, "unstar failed, rolling back");
                self.stars().upsert(existing);
                self.emit(UiEvent::Toast {
                    kind: ToastKind::Error,
                    text: "Could not remove bookmark".to_string(),
                });
                return true;
            }
            debug!(message_id = %message_id, "message unstarred");
            return false;
        }

        let star = {
            let ledger = self.ledger();
            let Some(message) = ledger.get(message_id) else {
                debug!(message_id = %message_id, "cannot star an unloaded message");
                return false;
            };
            StarRecord {
                message_id: message.id.clone(),
                content: message.content.clone(),
                role: message.role,
                message_created_at: message.created_at,
                summary: derive_summary(&message.content),
                user_context: user_context_for(&ledger, message_id),
                created_at: Utc::now(),
            }
        };

        self.stars().upsert(star.clone());
        if let Err(e) = self.stars_api.insert_star(&star).await {
            warn!(message_id = %message_id, error = %e, "star failed, rolling back");
            self.stars().remove(message_id);
            self.emit(UiEvent::Toast {
                kind: ToastKind::Error,
                text: "Could not bookmark message".to_string(),
            });
            return false;
        }
        debug!(message_id = %message_id, "message starred");
        true
    }

    /// Load the persisted star set, folding rows in by identifier.
    pub async fn refresh_stars(&self) -> Result<usize> {
        let records = self.stars_api.list_stars().await?;
        let count = records.len();
        let mut stars = self.stars();
        for record in records {
            stars.upsert(record);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use meera_shared::models::Message;
    use meera_shared::types::ConversationId;

    fn msg(id: &str, role: Role, content: &str, secs: i64) -> Message {
        Message {
            id: MessageId::from(id),
            conversation_id: ConversationId::new(),
            role,
            content: content.to_string(),
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            attachments: Vec::new(),
            failed: false,
            failure_note: None,
            try_number: 0,
            finish_reason: None,
            thoughts: None,
        }
    }

    #[test]
    fn summary_is_collapsed_and_bounded() {
        assert_eq!(derive_summary("short  text"), "short text");
        let long = "word ".repeat(100);
        let summary = derive_summary(&long);
        assert!(summary.chars().count() <= STAR_SUMMARY_CHARS + 1);
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn user_context_picks_nearest_preceding_user_message() {
        let mut ledger = MessageLedger::new();
        ledger.insert(msg("u1", Role::User, "first question", 0));
        ledger.insert(msg("a1", Role::Assistant, "first answer", 1));
        ledger.insert(msg("u2", Role::User, "second question", 2));
        ledger.insert(msg("a2", Role::Assistant, "second answer", 3));

        assert_eq!(
            user_context_for(&ledger, &MessageId::from("a2")).as_deref(),
            Some("second question")
        );
        assert_eq!(
            user_context_for(&ledger, &MessageId::from("a1")).as_deref(),
            Some("first question")
        );
        assert_eq!(user_context_for(&ledger, &MessageId::from("u1")), None);
    }

    #[tokio::test]
    async fn toggle_star_confirms_and_rolls_back() {
        let harness = crate::testkit::test_engine();
        {
            let mut ledger = harness.engine.ledger();
            ledger.insert(msg("u1", Role::User, "what is rust", 0));
            ledger.insert(msg("a1", Role::Assistant, "a language", 1));
        }

        let target = MessageId::from("a1");
        assert!(harness.engine.toggle_star(&target).await);
        {
            let stars = harness.engine.stars();
            let star = stars.get(&target).unwrap();
            assert_eq!(star.user_context.as_deref(), Some("what is rust"));
            assert_eq!(star.summary, "a language");
        }
        assert_eq!(harness.stars.stored().len(), 1);

        // Unstar round-trips.
        assert!(!harness.engine.toggle_star(&target).await);
        assert!(harness.engine.stars().is_empty());
        assert!(harness.stars.stored().is_empty());

        // A refused write rolls the optimistic flip back.
        harness.stars.fail_writes(true);
        assert!(!harness.engine.toggle_star(&target).await);
        assert!(harness.engine.stars().is_empty());
    }
}
