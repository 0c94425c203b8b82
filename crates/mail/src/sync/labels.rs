//! Bulk label operations: rule-based filing and label removal

use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::HashMap;

use super::{Orchestrator, Skipped, skip_or_abort};
use crate::filter::{FilterRule, evaluate};

/// Statistics from [`Orchestrator::filter_label_by_sender`]
#[derive(Debug, Default, Clone)]
pub struct FilterStats {
    /// Messages inspected in the source label
    pub scanned: usize,
    /// Messages a rule matched and that were relabelled
    pub relabelled: usize,
    /// Messages no rule matched
    pub unmatched: usize,
    pub vanished: usize,
    pub errors: usize,
}

/// Statistics from [`Orchestrator::remove_labels_from_emails`]
#[derive(Debug, Default, Clone)]
pub struct RemovalStats {
    pub labels: usize,
    /// Messages a label was removed from
    pub modified: usize,
    /// Messages whose change failed
    pub failed: usize,
}

impl Orchestrator {
    /// File the messages of `label` according to `rules`
    ///
    /// The first matching rule adds its target label. With `move_messages`
    /// the source label is removed at the same time. Messages no rule
    /// matches are left alone without any API call.
    pub fn filter_label_by_sender(
        &self,
        label: &str,
        rules: &[FilterRule],
        move_messages: bool,
    ) -> Result<FilterStats> {
        let source = self.resolve_label(label)?.id.0.clone();

        // Every target must exist before anything is modified
        let targets = rules
            .iter()
            .map(|rule| {
                let id = self.resolve_label(&rule.target_label)?.id.0.clone();
                Ok((rule.target_label.as_str(), id))
            })
            .collect::<Result<HashMap<&str, String>>>()?;

        let ids = self
            .ids_in_label(&source, "")
            .with_context(|| format!("Failed to list messages in {}", label))?;
        info!("Filtering {} messages in {}", ids.len(), label);

        let mut stats = FilterStats::default();
        for id in &ids {
            stats.scanned += 1;
            let item = format!("message {}", id.as_str());

            let message = match self.api.get_message_metadata(id) {
                Ok(message) => message,
                Err(e) => {
                    match skip_or_abort(e, &item)? {
                        Skipped::Vanished => stats.vanished += 1,
                        Skipped::Failed => stats.errors += 1,
                    }
                    continue;
                }
            };

            let Some(target_name) = evaluate(&message, rules) else {
                stats.unmatched += 1;
                continue;
            };
            let target = &targets[target_name];
            if *target == source {
                // Filing into the label it came from changes nothing
                stats.relabelled += 1;
                continue;
            }

            let add = [target.clone()];
            let remove = if move_messages {
                vec![source.clone()]
            } else {
                Vec::new()
            };

            match self.api.modify_labels(id, &add, &remove) {
                Ok(()) => {
                    debug!("Filed message {} under {}", id.as_str(), target_name);
                    self.apply_to_cache(id, &add, &remove)?;
                    stats.relabelled += 1;
                }
                Err(e) => match skip_or_abort(e, &item)? {
                    Skipped::Vanished => stats.vanished += 1,
                    Skipped::Failed => stats.errors += 1,
                },
            }
        }

        info!(
            "Filtered {}: {} relabelled, {} unmatched, {} vanished, {} errors",
            label, stats.relabelled, stats.unmatched, stats.vanished, stats.errors
        );
        Ok(stats)
    }

    /// Strip each label from every message carrying it
    pub fn remove_labels_from_emails<S: AsRef<str>>(&self, labels: &[S]) -> Result<RemovalStats> {
        let resolved = labels
            .iter()
            .map(|name| {
                let label = self.resolve_label(name.as_ref())?;
                Ok((label.name.clone(), label.id.0.clone()))
            })
            .collect::<Result<Vec<(String, String)>>>()?;

        let mut stats = RemovalStats::default();
        for (name, label_id) in resolved {
            stats.labels += 1;
            let ids = self
                .ids_in_label(&label_id, "")
                .with_context(|| format!("Failed to list messages in {}", name))?;
            if ids.is_empty() {
                debug!("No messages carry {}", name);
                continue;
            }

            let remove = [label_id];
            let outcome = self.api.batch_modify_labels(&ids, &[], &remove)?;
            for id in &outcome.modified {
                self.apply_to_cache(id, &[], &remove)?;
            }

            info!(
                "Removed {} from {} messages ({} failed)",
                name,
                outcome.modified.len(),
                outcome.failed.len()
            );
            stats.modified += outcome.modified.len();
            stats.failed += outcome.failed.len();
        }

        Ok(stats)
    }
}
