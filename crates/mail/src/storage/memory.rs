//! In-memory storage implementation
//!
//! Used for testing and for runs that should not touch disk.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::MailStore;
use crate::models::{Message, MessageId};

/// In-memory implementation of MailStore
pub struct InMemoryMailStore {
    messages: RwLock<HashMap<MessageId, Message>>,
}

impl InMemoryMailStore {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryMailStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MailStore for InMemoryMailStore {
    fn upsert_message(&self, message: &Message) -> Result<()> {
        // Attachment parts are not cached, only the flag
        let mut cached = message.clone();
        cached.attachments.clear();
        self.messages
            .write()
            .unwrap()
            .insert(cached.id.clone(), cached);
        Ok(())
    }

    fn get_message(&self, id: &MessageId) -> Result<Option<Message>> {
        Ok(self.messages.read().unwrap().get(id).cloned())
    }

    fn has_message(&self, id: &MessageId) -> Result<bool> {
        Ok(self.messages.read().unwrap().contains_key(id))
    }

    fn list_message_ids(&self) -> Result<HashSet<MessageId>> {
        Ok(self.messages.read().unwrap().keys().cloned().collect())
    }

    fn query(&self, predicate: &dyn Fn(&Message) -> bool) -> Result<Vec<Message>> {
        let messages = self.messages.read().unwrap();
        let mut matching: Vec<Message> = messages.values().filter(|m| predicate(m)).cloned().collect();
        matching.sort_by(|a, b| {
            b.internal_date
                .cmp(&a.internal_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(matching)
    }

    fn update_message_labels(&self, id: &MessageId, label_ids: &[String]) -> Result<()> {
        if let Some(message) = self.messages.write().unwrap().get_mut(id) {
            message.label_ids = label_ids.iter().cloned().collect();
        }
        Ok(())
    }

    fn delete_missing(&self, known_ids: &HashSet<MessageId>) -> Result<usize> {
        let mut messages = self.messages.write().unwrap();
        let before = messages.len();
        messages.retain(|id, _| known_ids.contains(id));
        Ok(before - messages.len())
    }

    fn count_messages(&self) -> Result<usize> {
        Ok(self.messages.read().unwrap().len())
    }

    fn clear(&self) -> Result<()> {
        self.messages.write().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttachmentRef, ThreadId};

    fn msg(id: &str, date: i64) -> Message {
        Message::builder(MessageId::new(id), ThreadId::new(id))
            .internal_date(date)
            .label_ids(["A", "B", "C"])
            .build()
    }

    #[test]
    fn test_upsert_twice_equals_once() {
        let store = InMemoryMailStore::new();
        store.upsert_message(&msg("m1", 1)).unwrap();
        let once = store.query(&|_| true).unwrap();
        store.upsert_message(&msg("m1", 1)).unwrap();
        assert_eq!(store.query(&|_| true).unwrap(), once);
        assert_eq!(store.count_messages().unwrap(), 1);
    }

    #[test]
    fn test_attachment_parts_not_cached() {
        let store = InMemoryMailStore::new();
        let message = Message::builder(MessageId::new("m1"), ThreadId::new("t1"))
            .attachments(vec![AttachmentRef {
                attachment_id: "a".into(),
                filename: "f.pdf".into(),
                mime_type: "application/pdf".into(),
                size: 1,
            }])
            .build();
        store.upsert_message(&message).unwrap();

        let cached = store.get_message(&MessageId::new("m1")).unwrap().unwrap();
        assert!(cached.has_attachment);
        assert!(cached.attachments.is_empty());
    }

    #[test]
    fn test_update_labels_and_prune() {
        let store = InMemoryMailStore::new();
        store.upsert_message(&msg("m1", 1)).unwrap();
        store.upsert_message(&msg("m2", 2)).unwrap();

        store
            .update_message_labels(&MessageId::new("m1"), &["A".to_string()])
            .unwrap();
        let m1 = store.get_message(&MessageId::new("m1")).unwrap().unwrap();
        assert_eq!(m1.label_ids.len(), 1);

        let known: HashSet<MessageId> = [MessageId::new("m1")].into_iter().collect();
        assert_eq!(store.delete_missing(&known).unwrap(), 1);
        assert!(!store.has_message(&MessageId::new("m2")).unwrap());
    }
}
