//! Ordered, deduplicated collection of conversation messages.
//!
//! The ledger is mutated by the submission coordinator, the history
//! reconciler, and the realtime fold, all through the same targeted merge
//! primitives. Nothing ever replaces the backing collection wholesale, so
//! identity-keyed renderings stay stable across merges.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use meera_shared::constants::TIMESTAMP_NUDGE_MS;
use meera_shared::models::Message;
use meera_shared::types::MessageId;

#[derive(Debug, Default)]
pub struct MessageLedger {
    entries: Vec<Message>,
    index: HashMap<MessageId, usize>,
}

impl MessageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    /// Entries oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    pub fn oldest(&self) -> Option<&Message> {
        self.entries.first()
    }

    pub fn newest(&self) -> Option<&Message> {
        self.entries.last()
    }

    /// Append one message. An entry arriving out of timestamp order triggers
    /// a re-sort; an existing identifier is overwritten in place.
    pub fn insert(&mut self, message: Message) {
        if let Some(&i) = self.index.get(&message.id) {
            self.entries[i] = message;
            return;
        }
        let out_of_order = self
            .entries
            .last()
            .is_some_and(|last| last.created_at > message.created_at);
        self.index.insert(message.id.clone(), self.entries.len());
        self.entries.push(message);
        if out_of_order {
            self.sort();
        }
    }

    /// Insert a user message and its assistant placeholder in one batch so
    /// the view never shows the user entry alone.
    pub fn insert_pair(&mut self, user: Message, assistant: Message) {
        self.insert(user);
        self.insert(assistant);
    }

    /// Append streamed delta text to a message's content. Unknown
    /// identifiers are ignored.
    pub fn patch_content(&mut self, id: &MessageId, delta: &str) {
        if let Some(&i) = self.index.get(id) {
            self.entries[i].content.push_str(delta);
        }
    }

    /// Apply a closure to one entry. Returns false for unknown identifiers.
    /// The closure must not change the entry's identifier.
    pub fn update<F>(&mut self, id: &MessageId, f: F) -> bool
    where
        F: FnOnce(&mut Message),
    {
        match self.index.get(id) {
            Some(&i) => {
                f(&mut self.entries[i]);
                true
            }
            None => false,
        }
    }

    /// Merge authoritative records into the ledger.
    ///
    /// Records whose identifier already exists overwrite that entry, except
    /// that an incoming empty attachment list preserves attachments already
    /// held. New identifiers insert. The ledger re-sorts once afterwards;
    /// merging the same record set twice yields the same ledger.
    pub fn merge_authoritative(&mut self, records: &[Message]) {
        for record in records {
            match self.index.get(&record.id) {
                Some(&i) => {
                    let existing = &mut self.entries[i];
                    let attachments = if record.attachments.is_empty()
                        && !existing.attachments.is_empty()
                    {
                        std::mem::take(&mut existing.attachments)
                    } else {
                        record.attachments.clone()
                    };
                    *existing = record.clone();
                    existing.attachments = attachments;
                }
                None => {
                    self.index.insert(record.id.clone(), self.entries.len());
                    self.entries.push(record.clone());
                }
            }
        }
        self.sort();
    }

    pub fn remove(&mut self, id: &MessageId) -> Option<Message> {
        let i = self.index.remove(id)?;
        let removed = self.entries.remove(i);
        self.rebuild_index();
        Some(removed)
    }

    /// Timestamp for a locally created message: wall clock, nudged forward
    /// when it would collide with or precede the newest entry.
    pub fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.entries.last() {
            Some(last) if last.created_at >= now => {
                last.created_at + Duration::milliseconds(TIMESTAMP_NUDGE_MS)
            }
            _ => now,
        }
    }

    fn sort(&mut self) {
        // Stable, so entries with equal timestamps keep their relative order.
        self.entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use meera_shared::types::{AttachmentKind, ConversationId, Role};

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

    fn attachment(name: &str) -> meera_shared::models::Attachment {
        meera_shared::models::Attachment {
            name: name.to_string(),
            kind: AttachmentKind::Image,
            mime: "image/png".to_string(),
            size: 3,
            storage_path: format!("path/{name}"),
            url: format!("https://cdn.example/{name}"),
        }
    }

    #[test]
    fn out_of_order_insert_resorts() {
        let mut ledger = MessageLedger::new();
        ledger.insert(msg("b", Role::User, "second", 10));
        ledger.insert(msg("a", Role::User, "first", 5));
        let order: Vec<_> = ledger.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(order, vec!["first", "second"]);
        assert!(ledger.contains(&MessageId::from("a")));
    }

    #[test]
    fn patch_content_appends_and_ignores_unknown() {
        let mut ledger = MessageLedger::new();
        ledger.insert(msg("a", Role::Assistant, "Hi", 0));
        ledger.patch_content(&MessageId::from("a"), " there");
        ledger.patch_content(&MessageId::from("ghost"), "boo");
        assert_eq!(ledger.get(&MessageId::from("a")).unwrap().content, "Hi there");
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut ledger = MessageLedger::new();
        ledger.insert(msg("a", Role::User, "hello", 0));

        let records = vec![
            msg("a", Role::User, "hello edited", 0),
            msg("b", Role::Assistant, "reply", 1),
        ];
        ledger.merge_authoritative(&records);
        let first: Vec<Message> = ledger.iter().cloned().collect();

        ledger.merge_authoritative(&records);
        let second: Vec<Message> = ledger.iter().cloned().collect();

        assert_eq!(first, second);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn merge_preserves_attachments_when_incoming_is_empty() {
        let mut ledger = MessageLedger::new();
        let mut with_files = msg("a", Role::User, "see attached", 0);
        with_files.attachments = vec![attachment("photo.png")];
        ledger.insert(with_files);

        // Authoritative row without attachment data must not drop them.
        ledger.merge_authoritative(&[msg("a", Role::User, "see attached", 0)]);
        assert_eq!(ledger.get(&MessageId::from("a")).unwrap().attachments.len(), 1);

        // A row that does carry attachments replaces.
        let mut replacement = msg("a", Role::User, "see attached", 0);
        replacement.attachments = vec![attachment("one.png"), attachment("two.png")];
        ledger.merge_authoritative(&[replacement]);
        assert_eq!(ledger.get(&MessageId::from("a")).unwrap().attachments.len(), 2);
    }

    #[test]
    fn remove_keeps_index_consistent() {
        let mut ledger = MessageLedger::new();
        ledger.insert(msg("a", Role::User, "one", 0));
        ledger.insert(msg("b", Role::User, "two", 1));
        ledger.insert(msg("c", Role::User, "three", 2));

        assert!(ledger.remove(&MessageId::from("b")).is_some());
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get(&MessageId::from("c")).unwrap().content, "three");
        assert!(ledger.remove(&MessageId::from("b")).is_none());
    }

    #[test]
    fn next_timestamp_never_regresses() {
        let mut ledger = MessageLedger::new();
        let mut future = msg("a", Role::User, "from the future", 0);
        future.created_at = Utc::now() + Duration::seconds(60);
        ledger.insert(future.clone());

        let ts = ledger.next_timestamp();
        assert!(ts > future.created_at);
    }
}
