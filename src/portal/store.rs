//! In-memory message store.
//!
//! Holds the currently loaded conversation's message list plus the per-contact
//! baseline counts the unread diff works from. Nothing here is persisted; a
//! restart re-fetches everything from the server.

use crate::portal::types::Message;
use std::collections::{HashMap, HashSet};

/// Directly-addressable holder for the loaded conversation.
///
/// Invariant: no two stored messages share an identity key. `append` silently
/// drops a message whose key is already present, which is what keeps the
/// optimistic-send path and the reconcile fetch from double-inserting.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    keys: HashSet<String>,
    /// wa_id -> last seen server message_count, the unread-delta baseline.
    baselines: HashMap<String, i64>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole loaded list. Duplicate keys in the input keep the
    /// first occurrence.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages.clear();
        self.keys.clear();
        for msg in messages {
            self.append(msg);
        }
    }

    /// Append one message in arrival order. Returns `false` (and stores
    /// nothing) if the identity key is already present.
    pub fn append(&mut self, message: Message) -> bool {
        let key = message.identity_key();
        if !self.keys.insert(key) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Remove a message by its identity key. Returns whether anything was
    /// removed. This is how a failed optimistic send is rolled back.
    pub fn remove_by_key(&mut self, key: &str) -> bool {
        if !self.keys.remove(key) {
            return false;
        }
        self.messages.retain(|m| m.identity_key() != key);
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Baseline message count for a contact; absent means never seen.
    pub fn baseline(&self, wa_id: &str) -> Option<i64> {
        self.baselines.get(wa_id).copied()
    }

    pub fn set_baseline(&mut self, wa_id: &str, count: i64) {
        self.baselines.insert(wa_id.to_string(), count);
    }

    /// Drop all baselines. Used when the phone account changes and the old
    /// counts no longer describe anything.
    pub fn clear_baselines(&mut self) {
        self.baselines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::types::{Direction, MessageStatus};
    use chrono::{TimeZone, Utc};

    fn msg(id: Option<&str>, secs: i64) -> Message {
        Message {
            id: id.map(|s| s.to_string()),
            wa_id: "1".to_string(),
            body: "hi".to_string(),
            image_url: None,
            msg_type: "text".to_string(),
            direction: Direction::Inbound,
            status: MessageStatus::Delivered,
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            read: false,
        }
    }

    #[test]
    fn append_rejects_duplicate_keys() {
        let mut store = MessageStore::new();
        assert!(store.append(msg(Some("m1"), 0)));
        assert!(!store.append(msg(Some("m1"), 5)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn timestamp_fallback_keys_deduplicate_too() {
        let mut store = MessageStore::new();
        assert!(store.append(msg(None, 0)));
        assert!(!store.append(msg(None, 0)));
        assert!(store.append(msg(None, 1)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn remove_by_key_rolls_back_exactly_one_entry() {
        let mut store = MessageStore::new();
        let pending = msg(None, 42);
        let key = pending.identity_key();
        store.append(msg(Some("m1"), 0));
        store.append(pending);
        assert!(store.remove_by_key(&key));
        assert!(!store.remove_by_key(&key));
        assert_eq!(store.len(), 1);
        assert!(store.contains("m1"));
        assert!(!store.contains(&key));
    }

    #[test]
    fn replace_all_resets_list_and_keys() {
        let mut store = MessageStore::new();
        store.append(msg(Some("old"), 0));
        store.replace_all(vec![msg(Some("m1"), 1), msg(Some("m2"), 2), msg(Some("m1"), 3)]);
        assert_eq!(store.len(), 2);
        assert!(!store.contains("old"));
        assert_eq!(store.messages()[0].id.as_deref(), Some("m1"));
        assert_eq!(store.messages()[1].id.as_deref(), Some("m2"));
    }

    #[test]
    fn baselines_are_independent_of_the_message_list() {
        let mut store = MessageStore::new();
        assert_eq!(store.baseline("1"), None);
        store.set_baseline("1", 5);
        assert_eq!(store.baseline("1"), Some(5));
        store.replace_all(vec![]);
        assert_eq!(store.baseline("1"), Some(5));
        store.clear_baselines();
        assert_eq!(store.baseline("1"), None);
    }
}
