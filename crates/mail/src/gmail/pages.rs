//! Lazy pagination over message search results

use anyhow::Result;
use std::collections::VecDeque;

use super::{MailApi, MessageRef};
use crate::models::MessageId;

/// Iterator over every message matching a search
///
/// Pages are fetched on demand, one blocking request at a time, following
/// `nextPageToken` until the provider reports no further page. The sequence
/// is finite. It holds no state shared with other searches: restarting means
/// calling [`search_messages`] again.
///
/// A failed page fetch yields one `Err` and ends the iteration.
pub struct MessagePages<'a> {
    api: &'a dyn MailApi,
    query: String,
    label_ids: Vec<String>,
    buffer: VecDeque<MessageRef>,
    page_token: Option<String>,
    finished: bool,
    pages_fetched: usize,
}

/// Search messages by Gmail query, optionally restricted to labels (by id)
pub fn search_messages<'a>(
    api: &'a dyn MailApi,
    query: &str,
    label_ids: &[String],
) -> MessagePages<'a> {
    MessagePages {
        api,
        query: query.to_string(),
        label_ids: label_ids.to_vec(),
        buffer: VecDeque::new(),
        page_token: None,
        finished: false,
        pages_fetched: 0,
    }
}

impl MessagePages<'_> {
    /// Number of pages requested so far
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Drain the remaining results into message ids
    pub fn collect_ids(self) -> Result<Vec<MessageId>> {
        self.map(|r| r.map(|m| MessageId::new(m.id))).collect()
    }
}

impl Iterator for MessagePages<'_> {
    type Item = Result<MessageRef>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(msg_ref) = self.buffer.pop_front() {
                return Some(Ok(msg_ref));
            }
            if self.finished {
                return None;
            }

            let page = self.api.list_messages_page(
                &self.query,
                &self.label_ids,
                self.page_token.as_deref(),
            );
            self.pages_fetched += 1;

            match page {
                Ok(page) => {
                    self.buffer.extend(page.messages);
                    match page.next_page_token {
                        Some(token) if !token.is_empty() => self.page_token = Some(token),
                        _ => self.finished = true,
                    }
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
