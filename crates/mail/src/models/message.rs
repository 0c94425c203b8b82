//! Message model representing a Gmail message

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a thread (Gmail thread ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An attachment part of a message, fetched separately by id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub attachment_id: String,
    pub filename: String,
    pub mime_type: String,
    pub size: u32,
}

/// A single email message
///
/// Header fields keep the raw header text so that filters match against
/// exactly what the provider reports. A missing header is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub thread_id: ThreadId,
    /// Raw `From` header
    pub from: Option<String>,
    /// Raw `To` header
    pub to: Option<String>,
    pub subject: Option<String>,
    pub snippet: String,
    /// Gmail label IDs (e.g., "INBOX", "UNREAD", "Label_12")
    pub label_ids: BTreeSet<String>,
    /// Gmail's internal timestamp (milliseconds since epoch)
    pub internal_date: i64,
    pub has_attachment: bool,
    /// Attachment parts; only present on freshly fetched messages
    #[serde(default, skip_serializing)]
    pub attachments: Vec<AttachmentRef>,
}

impl Message {
    /// Create a new message builder
    pub fn builder(id: MessageId, thread_id: ThreadId) -> MessageBuilder {
        MessageBuilder::new(id, thread_id)
    }

    pub fn has_label(&self, label_id: &str) -> bool {
        self.label_ids.contains(label_id)
    }
}

/// Builder for creating Message instances
pub struct MessageBuilder {
    id: MessageId,
    thread_id: ThreadId,
    from: Option<String>,
    to: Option<String>,
    subject: Option<String>,
    snippet: String,
    label_ids: BTreeSet<String>,
    internal_date: i64,
    attachments: Vec<AttachmentRef>,
    has_attachment: bool,
}

impl MessageBuilder {
    fn new(id: MessageId, thread_id: ThreadId) -> Self {
        Self {
            id,
            thread_id,
            from: None,
            to: None,
            subject: None,
            snippet: String::new(),
            label_ids: BTreeSet::new(),
            internal_date: 0,
            attachments: Vec::new(),
            has_attachment: false,
        }
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn internal_date(mut self, internal_date: i64) -> Self {
        self.internal_date = internal_date;
        self
    }

    pub fn label_ids<I, S>(mut self, label_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.label_ids = label_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn attachments(mut self, attachments: Vec<AttachmentRef>) -> Self {
        self.has_attachment |= !attachments.is_empty();
        self.attachments = attachments;
        self
    }

    /// Mark the message as carrying attachments without listing them
    /// (cached rows only keep the flag)
    pub fn has_attachment(mut self, has_attachment: bool) -> Self {
        self.has_attachment = has_attachment;
        self
    }

    pub fn build(self) -> Message {
        Message {
            id: self.id,
            thread_id: self.thread_id,
            from: self.from,
            to: self.to,
            subject: self.subject,
            snippet: self.snippet,
            label_ids: self.label_ids,
            internal_date: self.internal_date,
            has_attachment: self.has_attachment,
            attachments: self.attachments,
        }
    }
}
