//! Orchestrator wiring the API facade, the cache and file storage

use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;

use crate::drive::FileStorage;
use crate::error::MailError;
use crate::gmail::{MailApi, MessagePages, search_messages};
use crate::models::{Label, LabelMap, MessageId};
use crate::storage::MailStore;

/// Entry point for every bulk operation on one account
///
/// The label map is fetched once on construction; labels created remotely
/// afterwards are unknown to this session.
pub struct Orchestrator {
    pub(super) api: Arc<dyn MailApi>,
    pub(super) store: Arc<dyn MailStore>,
    pub(super) drive: Option<Arc<dyn FileStorage>>,
    labels: LabelMap,
}

impl Orchestrator {
    pub fn new(
        api: Arc<dyn MailApi>,
        store: Arc<dyn MailStore>,
        drive: Option<Arc<dyn FileStorage>>,
    ) -> Result<Self> {
        let labels = LabelMap::new(api.list_labels().context("Failed to fetch labels")?);
        info!("Loaded {} labels", labels.len());
        Ok(Self {
            api,
            store,
            drive,
            labels,
        })
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub fn api(&self) -> &dyn MailApi {
        self.api.as_ref()
    }

    pub fn store(&self) -> &dyn MailStore {
        self.store.as_ref()
    }

    /// Look a label up by display name or id
    pub fn resolve_label(&self, name: &str) -> Result<&Label> {
        self.labels
            .resolve(name)
            .ok_or_else(|| MailError::Config(format!("unknown label {:?}", name)).into())
    }

    /// Lazily iterate messages matching `query` that carry every label in `labels`
    pub fn search_messages<S: AsRef<str>>(
        &self,
        query: &str,
        labels: &[S],
    ) -> Result<MessagePages<'_>> {
        let label_ids = labels
            .iter()
            .map(|name| Ok(self.resolve_label(name.as_ref())?.id.0.clone()))
            .collect::<Result<Vec<String>>>()?;
        Ok(search_messages(self.api.as_ref(), query, &label_ids))
    }

    /// Ids of every message matching `query` inside one label (by id)
    pub(super) fn ids_in_label(&self, label_id: &str, query: &str) -> Result<Vec<MessageId>> {
        search_messages(self.api.as_ref(), query, &[label_id.to_string()]).collect_ids()
    }

    /// Mirror a remote label change into the cache, if the message is cached
    pub(super) fn apply_to_cache(
        &self,
        id: &MessageId,
        add: &[String],
        remove: &[String],
    ) -> Result<()> {
        let Some(cached) = self.store.get_message(id)? else {
            return Ok(());
        };

        let mut labels = cached.label_ids;
        for label in remove {
            labels.remove(label);
        }
        labels.extend(add.iter().cloned());
        let labels: Vec<String> = labels.into_iter().collect();
        self.store.update_message_labels(id, &labels)
    }
}
