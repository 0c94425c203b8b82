//! Storage trait definitions

use anyhow::Result;
use std::collections::HashSet;

use crate::models::{Message, MessageId};

/// Local cache of message metadata
///
/// The cache mirrors the remote account and is never authoritative. Writes
/// are idempotent: upserting the same message twice leaves one row.
///
/// Implementations report failures as [`MailError::Storage`](crate::MailError::Storage).
pub trait MailStore: Send + Sync {
    /// Insert or overwrite a message by id
    fn upsert_message(&self, message: &Message) -> Result<()>;

    fn get_message(&self, id: &MessageId) -> Result<Option<Message>>;

    fn has_message(&self, id: &MessageId) -> Result<bool>;

    /// Every cached message id
    fn list_message_ids(&self) -> Result<HashSet<MessageId>>;

    /// Cached messages satisfying `predicate`, newest first
    fn query(&self, predicate: &dyn Fn(&Message) -> bool) -> Result<Vec<Message>>;

    /// Replace the label set of a cached message
    ///
    /// Unknown ids are ignored.
    fn update_message_labels(&self, id: &MessageId, label_ids: &[String]) -> Result<()>;

    /// Drop rows whose id is not in `known_ids`, returning how many were removed
    fn delete_missing(&self, known_ids: &HashSet<MessageId>) -> Result<usize>;

    fn count_messages(&self) -> Result<usize>;

    /// Remove everything
    fn clear(&self) -> Result<()>;
}
