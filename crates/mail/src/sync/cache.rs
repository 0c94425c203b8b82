//! Bring the local cache up to date with the remote account

use anyhow::{Context, Result};
use log::info;
use std::collections::HashSet;
use std::time::Instant;

use super::{Orchestrator, Skipped, skip_or_abort};
use crate::gmail::search_messages;
use crate::models::MessageId;

/// Optional extra work for [`Orchestrator::update_database`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Re-fetch already cached messages and store their current labels
    pub refresh_labels: bool,
    /// Drop cached messages that no longer exist remotely
    pub prune_missing: bool,
}

/// Statistics from a sync operation
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    /// Message ids listed remotely
    pub listed: usize,
    /// Listed ids that were already cached
    pub already_cached: usize,
    /// New messages stored
    pub stored: usize,
    /// Cached messages whose labels were refreshed
    pub labels_refreshed: usize,
    /// Listed but gone by the time they were fetched
    pub vanished: usize,
    /// Other per-message failures
    pub errors: usize,
    /// Rows removed by pruning
    pub pruned: usize,
    pub duration_ms: u64,
}

impl Orchestrator {
    /// Fetch every remote message the cache does not know yet
    ///
    /// Re-running after an interruption is safe: already stored messages
    /// are skipped and upserts are idempotent.
    pub fn update_database(&self, options: SyncOptions) -> Result<SyncStats> {
        let start = Instant::now();
        let mut stats = SyncStats::default();

        // 1. List every remote id
        let remote = search_messages(self.api.as_ref(), "", &[])
            .collect_ids()
            .context("Failed to list remote messages")?;
        stats.listed = remote.len();
        let remote_set: HashSet<MessageId> = remote.iter().cloned().collect();

        // 2. Diff against the cache
        let cached = self.store.list_message_ids()?;
        let (known, new): (Vec<MessageId>, Vec<MessageId>) =
            remote.into_iter().partition(|id| cached.contains(id));
        stats.already_cached = known.len();
        info!(
            "{} remote messages, {} new, {} cached",
            stats.listed,
            new.len(),
            stats.already_cached
        );

        // 3. Fetch and store the new ones, one at a time
        for id in &new {
            match self.api.get_message(id) {
                Ok(message) => {
                    self.store.upsert_message(&message)?;
                    stats.stored += 1;
                }
                Err(e) => match skip_or_abort(e, &format!("message {}", id.as_str()))? {
                    Skipped::Vanished => stats.vanished += 1,
                    Skipped::Failed => stats.errors += 1,
                },
            }
        }

        if options.refresh_labels {
            for id in &known {
                match self.api.get_message_metadata(id) {
                    Ok(message) => {
                        let labels: Vec<String> = message.label_ids.into_iter().collect();
                        self.store.update_message_labels(id, &labels)?;
                        stats.labels_refreshed += 1;
                    }
                    Err(e) => match skip_or_abort(e, &format!("message {}", id.as_str()))? {
                        Skipped::Vanished => stats.vanished += 1,
                        Skipped::Failed => stats.errors += 1,
                    },
                }
            }
        }

        if options.prune_missing {
            stats.pruned = self.store.delete_missing(&remote_set)?;
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Cache updated: {} stored, {} vanished, {} errors, {} pruned in {}ms",
            stats.stored, stats.vanished, stats.errors, stats.pruned, stats.duration_ms
        );
        Ok(stats)
    }
}
