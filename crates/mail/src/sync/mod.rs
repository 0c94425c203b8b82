//! Sync engine: cache updates and bulk label operations
//!
//! Everything runs on the calling thread, one blocking request at a time.
//! A terminated run is simply re-run: upserts are idempotent and nothing is
//! checkpointed.
//!
//! Per-item failures are triaged by [`skip_or_abort`]: vanished messages and
//! transient failures are counted and skipped, while authentication,
//! throttling and storage failures abort the operation.

mod attachments;
mod cache;
mod labels;
mod orchestrator;

use anyhow::Result;
use log::{debug, warn};

pub use attachments::AttachmentStats;
pub use cache::{SyncOptions, SyncStats};
pub use labels::{FilterStats, RemovalStats};
pub use orchestrator::Orchestrator;

use crate::error::MailError;

/// What happened to an item whose processing failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Skipped {
    /// Gone remotely since it was listed
    Vanished,
    /// Any other non-fatal failure
    Failed,
}

/// Decide whether a per-item failure ends the whole operation
pub(crate) fn skip_or_abort(err: anyhow::Error, item: &str) -> Result<Skipped> {
    if MailError::is_fatal(&err) {
        return Err(err);
    }
    if MailError::is_not_found(&err) {
        debug!("Skipping {}: no longer exists", item);
        Ok(Skipped::Vanished)
    } else {
        warn!("Skipping {}: {:#}", item, err);
        Ok(Skipped::Failed)
    }
}
