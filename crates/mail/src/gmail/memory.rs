//! In-memory mailbox implementing [`MailApi`]
//!
//! Used by tests and dry runs. Pagination uses offsets encoded as page
//! tokens, and a small subset of the Gmail search syntax is understood:
//! `has:attachment`, `from:`, `to:`, `subject:` and bare words (matched
//! case-insensitively against headers and snippet).

use anyhow::Result;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, RwLock};

use super::{MailApi, MessagePage, MessageRef};
use crate::error::MailError;
use crate::models::{Label, LabelId, Message, MessageId};

const DEFAULT_PAGE_SIZE: usize = 100;

/// Counters of calls made against an [`InMemoryMailbox`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApiCalls {
    pub list_labels: usize,
    pub list_pages: usize,
    pub get_message: usize,
    pub get_metadata: usize,
    pub modify: usize,
    pub batch_modify: usize,
    pub get_attachment: usize,
}

pub struct InMemoryMailbox {
    labels: RwLock<Vec<Label>>,
    messages: RwLock<BTreeMap<MessageId, Message>>,
    attachments: RwLock<HashMap<(MessageId, String), Vec<u8>>>,
    /// Ids still listed but gone by the time they are fetched
    vanished: RwLock<HashSet<MessageId>>,
    page_size: usize,
    fail_auth: RwLock<bool>,
    calls: Mutex<ApiCalls>,
}

impl InMemoryMailbox {
    pub fn new() -> Self {
        Self {
            labels: RwLock::new(vec![
                Label::system(LabelId::INBOX, LabelId::INBOX),
                Label::system(LabelId::UNREAD, LabelId::UNREAD),
                Label::system(LabelId::TRASH, LabelId::TRASH),
                Label::system(LabelId::SPAM, LabelId::SPAM),
            ]),
            messages: RwLock::new(BTreeMap::new()),
            attachments: RwLock::new(HashMap::new()),
            vanished: RwLock::new(HashSet::new()),
            page_size: DEFAULT_PAGE_SIZE,
            fail_auth: RwLock::new(false),
            calls: Mutex::new(ApiCalls::default()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn add_label(&self, label: Label) {
        let mut labels = self.labels.write().unwrap();
        labels.retain(|l| l.id != label.id);
        labels.push(label);
    }

    pub fn add_message(&self, message: Message) {
        self.messages
            .write()
            .unwrap()
            .insert(message.id.clone(), message);
    }

    pub fn add_attachment(&self, message_id: &MessageId, attachment_id: &str, bytes: Vec<u8>) {
        self.attachments
            .write()
            .unwrap()
            .insert((message_id.clone(), attachment_id.to_string()), bytes);
    }

    /// Keep listing `id` but answer `NotFound` when it is fetched or modified
    pub fn vanish_on_fetch(&self, id: &MessageId) {
        self.vanished.write().unwrap().insert(id.clone());
    }

    /// Make every call fail with an authentication error
    pub fn fail_auth(&self, fail: bool) {
        *self.fail_auth.write().unwrap() = fail;
    }

    /// Current state of a message
    pub fn message(&self, id: &MessageId) -> Option<Message> {
        self.messages.read().unwrap().get(id).cloned()
    }

    pub fn calls(&self) -> ApiCalls {
        *self.calls.lock().unwrap()
    }

    fn record(&self, f: impl FnOnce(&mut ApiCalls)) {
        f(&mut self.calls.lock().unwrap());
    }

    fn check_auth(&self) -> Result<()> {
        if *self.fail_auth.read().unwrap() {
            return Err(MailError::Auth("token revoked".into()).into());
        }
        Ok(())
    }

    fn check_present(&self, id: &MessageId) -> Result<()> {
        if self.vanished.read().unwrap().contains(id)
            || !self.messages.read().unwrap().contains_key(id)
        {
            return Err(MailError::NotFound(format!("message {}", id.as_str())).into());
        }
        Ok(())
    }
}

impl Default for InMemoryMailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a message satisfies every term of a search query
fn matches_query(message: &Message, query: &str) -> bool {
    let field = |value: &Option<String>, needle: &str| {
        value
            .as_deref()
            .is_some_and(|v| v.to_lowercase().contains(needle))
    };

    query.split_whitespace().all(|term| {
        let term = term.to_lowercase();
        if term == "has:attachment" {
            message.has_attachment
        } else if let Some(needle) = term.strip_prefix("from:") {
            field(&message.from, needle)
        } else if let Some(needle) = term.strip_prefix("to:") {
            field(&message.to, needle)
        } else if let Some(needle) = term.strip_prefix("subject:") {
            field(&message.subject, needle)
        } else {
            field(&message.from, &term)
                || field(&message.to, &term)
                || field(&message.subject, &term)
                || message.snippet.to_lowercase().contains(&term)
        }
    })
}

impl MailApi for InMemoryMailbox {
    fn list_labels(&self) -> Result<Vec<Label>> {
        self.record(|c| c.list_labels += 1);
        self.check_auth()?;
        Ok(self.labels.read().unwrap().clone())
    }

    fn list_messages_page(
        &self,
        query: &str,
        label_ids: &[String],
        page_token: Option<&str>,
    ) -> Result<MessagePage> {
        self.record(|c| c.list_pages += 1);
        self.check_auth()?;

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| MailError::Network(format!("invalid page token {:?}", token)))?,
            None => 0,
        };

        // Trash and spam are hidden unless explicitly requested
        let include_hidden = |label: &str| label_ids.iter().any(|l| l == label);

        let messages = self.messages.read().unwrap();
        let mut matching: Vec<&Message> = messages
            .values()
            .filter(|m| label_ids.iter().all(|l| m.has_label(l)))
            .filter(|m| !m.has_label(LabelId::TRASH) || include_hidden(LabelId::TRASH))
            .filter(|m| !m.has_label(LabelId::SPAM) || include_hidden(LabelId::SPAM))
            .filter(|m| matches_query(m, query))
            .collect();
        matching.sort_by(|a, b| {
            b.internal_date
                .cmp(&a.internal_date)
                .then_with(|| a.id.cmp(&b.id))
        });

        let end = (offset + self.page_size).min(matching.len());
        let page = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|m| MessageRef {
                id: m.id.0.clone(),
                thread_id: m.thread_id.0.clone(),
            })
            .collect();

        Ok(MessagePage {
            messages: page,
            next_page_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    fn get_message(&self, id: &MessageId) -> Result<Message> {
        self.record(|c| c.get_message += 1);
        self.check_auth()?;
        self.check_present(id)?;
        self.messages
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| MailError::NotFound(format!("message {}", id.as_str())).into())
    }

    fn get_message_metadata(&self, id: &MessageId) -> Result<Message> {
        self.record(|c| c.get_metadata += 1);
        self.check_auth()?;
        self.check_present(id)?;
        let message = self.messages.read().unwrap().get(id).cloned();
        match message {
            Some(mut message) => {
                message.attachments.clear();
                Ok(message)
            }
            None => Err(MailError::NotFound(format!("message {}", id.as_str())).into()),
        }
    }

    fn modify_labels(&self, id: &MessageId, add: &[String], remove: &[String]) -> Result<()> {
        self.record(|c| c.modify += 1);
        self.check_auth()?;
        self.check_present(id)?;

        let mut messages = self.messages.write().unwrap();
        if let Some(message) = messages.get_mut(id) {
            for label in remove {
                message.label_ids.remove(label);
            }
            message.label_ids.extend(add.iter().cloned());
        }
        Ok(())
    }

    fn batch_modify_labels(
        &self,
        ids: &[MessageId],
        add: &[String],
        remove: &[String],
    ) -> Result<super::BatchOutcome> {
        self.record(|c| c.batch_modify += 1);
        self.check_auth()?;
        super::modify_each(self, ids, add, remove)
    }

    fn get_attachment(&self, message_id: &MessageId, attachment_id: &str) -> Result<Vec<u8>> {
        self.record(|c| c.get_attachment += 1);
        self.check_auth()?;
        self.attachments
            .read()
            .unwrap()
            .get(&(message_id.clone(), attachment_id.to_string()))
            .cloned()
            .ok_or_else(|| {
                MailError::NotFound(format!(
                    "attachment {} of message {}",
                    attachment_id,
                    message_id.as_str()
                ))
                .into()
            })
    }
}
