//! Gmail API integration
//!
//! This module provides:
//! - The [`MailApi`] facade the sync engine talks to
//! - OAuth2 authentication flow
//! - A blocking Gmail REST client and an in-memory mailbox
//! - Lazy, restartable pagination over search results
//! - Response normalization to domain models

mod auth;
mod client;
mod memory;
mod normalize;
mod pages;

use anyhow::Result;
use log::warn;

pub use api::MessageRef;
pub use auth::GmailAuth;
pub use client::GmailClient;
pub use memory::{ApiCalls, InMemoryMailbox};
pub use normalize::{decode_base64, normalize_label, normalize_message};
pub use pages::{MessagePages, search_messages};

use crate::error::MailError;
use crate::models::{Label, Message, MessageId};

/// One page of a message listing
#[derive(Debug, Clone, Default)]
pub struct MessagePage {
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
}

/// Per-id result of a batched label change
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub modified: Vec<MessageId>,
    pub failed: Vec<(MessageId, String)>,
}

impl BatchOutcome {
    pub fn merge(&mut self, other: BatchOutcome) {
        self.modified.extend(other.modified);
        self.failed.extend(other.failed);
    }
}

/// Remote mail operations the sync engine depends on
///
/// Calls block until the provider answers. Failures carry a [`MailError`]:
/// `Auth` for bad credentials, `RateLimited` for throttling, `NotFound` for
/// ids that vanished remotely.
pub trait MailApi: Send + Sync {
    /// List all labels in the mailbox
    fn list_labels(&self) -> Result<Vec<Label>>;

    /// Fetch one page of message references matching `query` and carrying
    /// every label in `label_ids`
    fn list_messages_page(
        &self,
        query: &str,
        label_ids: &[String],
        page_token: Option<&str>,
    ) -> Result<MessagePage>;

    /// Fetch a full message
    fn get_message(&self, id: &MessageId) -> Result<Message>;

    /// Fetch labels and the From, To and Subject headers only
    ///
    /// The body is not downloaded, so `attachments` is always empty.
    fn get_message_metadata(&self, id: &MessageId) -> Result<Message>;

    /// Add and remove labels on one message
    fn modify_labels(&self, id: &MessageId, add: &[String], remove: &[String]) -> Result<()>;

    /// Apply the same label change to many messages
    ///
    /// Not atomic: failures are reported per id. Fatal errors (auth, rate
    /// limit) abort the whole batch.
    fn batch_modify_labels(
        &self,
        ids: &[MessageId],
        add: &[String],
        remove: &[String],
    ) -> Result<BatchOutcome> {
        modify_each(self, ids, add, remove)
    }

    /// Download the decoded bytes of an attachment
    fn get_attachment(&self, message_id: &MessageId, attachment_id: &str) -> Result<Vec<u8>>;
}

/// Apply a label change id by id, collecting per-id failures
pub(crate) fn modify_each<A: MailApi + ?Sized>(
    api: &A,
    ids: &[MessageId],
    add: &[String],
    remove: &[String],
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    for id in ids {
        match api.modify_labels(id, add, remove) {
            Ok(()) => outcome.modified.push(id.clone()),
            Err(e) if MailError::is_fatal(&e) => return Err(e),
            Err(e) => {
                warn!("Failed to modify labels of message {}: {:#}", id.as_str(), e);
                outcome.failed.push((id.clone(), format!("{:#}", e)));
            }
        }
    }
    Ok(outcome)
}

/// Gmail API request and response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Response from listing messages
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a message (just ID and thread ID)
    #[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
        pub thread_id: String,
    }

    /// Full message from Gmail API
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        pub thread_id: String,
        pub label_ids: Option<Vec<String>>,
        #[serde(default)]
        pub snippet: String,
        pub internal_date: Option<String>,
        pub payload: Option<MessagePayload>,
    }

    /// Message payload containing headers and body
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePayload {
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
        pub mime_type: Option<String>,
    }

    /// Email header (name-value pair)
    #[derive(Debug, Deserialize, Serialize)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }

    /// Message body; large bodies are referenced by attachment id
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageBody {
        pub size: Option<u32>,
        pub data: Option<String>,
        pub attachment_id: Option<String>,
    }

    /// Message part (for multipart messages)
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub part_id: Option<String>,
        pub mime_type: Option<String>,
        pub filename: Option<String>,
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }

    /// Response from listing labels
    #[derive(Debug, Deserialize)]
    pub struct ListLabelsResponse {
        pub labels: Option<Vec<GmailLabel>>,
    }

    /// Label as returned by the labels endpoint
    #[derive(Debug, Deserialize)]
    pub struct GmailLabel {
        pub id: String,
        pub name: String,
        #[serde(rename = "type")]
        pub label_type: Option<String>,
    }

    /// Body of `messages/{id}/modify`
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ModifyMessageRequest<'a> {
        #[serde(skip_serializing_if = "<[String]>::is_empty")]
        pub add_label_ids: &'a [String],
        #[serde(skip_serializing_if = "<[String]>::is_empty")]
        pub remove_label_ids: &'a [String],
    }

    /// Body of `messages/batchModify`
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BatchModifyRequest<'a> {
        pub ids: Vec<&'a str>,
        #[serde(skip_serializing_if = "<[String]>::is_empty")]
        pub add_label_ids: &'a [String],
        #[serde(skip_serializing_if = "<[String]>::is_empty")]
        pub remove_label_ids: &'a [String],
    }

    /// Response from `messages/{id}/attachments/{attachmentId}`
    #[derive(Debug, Deserialize)]
    pub struct AttachmentResponse {
        pub size: Option<u32>,
        pub data: Option<String>,
    }
}
