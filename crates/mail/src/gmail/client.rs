//! Gmail API HTTP client
//!
//! Blocking calls against the Gmail REST API (ureq). No retries are made
//! here: throttling surfaces as [`MailError::RateLimited`] and the caller
//! decides what to do.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::sync::Arc;

use super::api::{
    AttachmentResponse, BatchModifyRequest, GmailMessage, ListLabelsResponse,
    ListMessagesResponse, ModifyMessageRequest,
};
use super::{
    BatchOutcome, GmailAuth, MailApi, MessagePage, decode_base64, modify_each, normalize_label,
    normalize_message,
};
use crate::error::MailError;
use crate::http;
use crate::models::{Label, Message, MessageId};

const BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Largest page `messages.list` will return
const MAX_PAGE_SIZE: &str = "500";

/// Largest id list `messages.batchModify` accepts
const BATCH_MODIFY_LIMIT: usize = 1000;

/// Headers filter rules look at
const METADATA_HEADERS: &[&str] = &["From", "To", "Subject"];

/// Gmail API client
pub struct GmailClient {
    auth: Arc<GmailAuth>,
}

impl GmailClient {
    pub fn new(auth: Arc<GmailAuth>) -> Self {
        Self { auth }
    }

    fn token(&self) -> Result<String> {
        self.auth.access_token()
    }
}

impl MailApi for GmailClient {
    fn list_labels(&self) -> Result<Vec<Label>> {
        let url = format!("{}/labels", BASE_URL);
        let response: ListLabelsResponse = http::get_json(&self.token()?, &url, &[], "labels")?;
        Ok(response
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(normalize_label)
            .collect())
    }

    fn list_messages_page(
        &self,
        query: &str,
        label_ids: &[String],
        page_token: Option<&str>,
    ) -> Result<MessagePage> {
        let url = format!("{}/messages", BASE_URL);

        let mut params: Vec<(&str, &str)> = vec![("maxResults", MAX_PAGE_SIZE)];
        if !query.is_empty() {
            params.push(("q", query));
        }
        for label in label_ids {
            params.push(("labelIds", label.as_str()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let response: ListMessagesResponse =
            http::get_json(&self.token()?, &url, &params, "message list")?;
        debug!(
            "Listed {} messages (estimate {:?})",
            response.messages.as_ref().map_or(0, Vec::len),
            response.result_size_estimate
        );

        Ok(MessagePage {
            messages: response.messages.unwrap_or_default(),
            next_page_token: response.next_page_token,
        })
    }

    fn get_message(&self, id: &MessageId) -> Result<Message> {
        let url = format!("{}/messages/{}", BASE_URL, id.as_str());
        let resource = format!("message {}", id.as_str());
        let raw: GmailMessage =
            http::get_json(&self.token()?, &url, &[("format", "full")], &resource)?;
        normalize_message(raw)
    }

    fn get_message_metadata(&self, id: &MessageId) -> Result<Message> {
        let url = format!("{}/messages/{}", BASE_URL, id.as_str());
        let resource = format!("message {}", id.as_str());
        let mut query = vec![("format", "metadata")];
        query.extend(METADATA_HEADERS.iter().map(|h| ("metadataHeaders", *h)));
        let raw: GmailMessage = http::get_json(&self.token()?, &url, &query, &resource)?;
        normalize_message(raw)
    }

    fn modify_labels(&self, id: &MessageId, add: &[String], remove: &[String]) -> Result<()> {
        let url = format!("{}/messages/{}/modify", BASE_URL, id.as_str());
        let body = ModifyMessageRequest {
            add_label_ids: add,
            remove_label_ids: remove,
        };
        // The response echoes the message; only the status matters
        let _: serde_json::Value = http::post_json(
            &self.token()?,
            &url,
            &body,
            &format!("message {}", id.as_str()),
        )?;
        Ok(())
    }

    fn batch_modify_labels(
        &self,
        ids: &[MessageId],
        add: &[String],
        remove: &[String],
    ) -> Result<BatchOutcome> {
        let url = format!("{}/messages/batchModify", BASE_URL);
        let mut outcome = BatchOutcome::default();

        for chunk in ids.chunks(BATCH_MODIFY_LIMIT) {
            let body = BatchModifyRequest {
                ids: chunk.iter().map(MessageId::as_str).collect(),
                add_label_ids: add,
                remove_label_ids: remove,
            };

            match http::post_json_empty(&self.token()?, &url, &body, "batch modify") {
                Ok(()) => outcome.modified.extend_from_slice(chunk),
                Err(e) if MailError::is_fatal(&e) => return Err(e),
                Err(e) => {
                    // One bad id fails the whole request; retry id by id
                    warn!("Batch modify failed ({:#}), falling back to single requests", e);
                    outcome.merge(modify_each(self, chunk, add, remove)?);
                }
            }
        }

        Ok(outcome)
    }

    fn get_attachment(&self, message_id: &MessageId, attachment_id: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/messages/{}/attachments/{}",
            BASE_URL,
            message_id.as_str(),
            attachment_id
        );
        let resource = format!("attachment of message {}", message_id.as_str());
        let response: AttachmentResponse = http::get_json(&self.token()?, &url, &[], &resource)?;

        let data = response
            .data
            .with_context(|| format!("Empty {}", resource))?;
        decode_base64(&data).with_context(|| format!("Invalid base64 in {}", resource))
    }
}
