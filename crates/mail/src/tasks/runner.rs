//! Sequential task execution

use anyhow::{Context, Result};
use log::info;
use std::fmt;
use std::time::Instant;

use super::Task;
use crate::sync::{AttachmentStats, FilterStats, Orchestrator, RemovalStats};

/// Result of one task
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    LabelsRemoved(RemovalStats),
    Filtered(FilterStats),
    AttachmentsSaved(AttachmentStats),
}

#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: &'static str,
    pub outcome: TaskOutcome,
    pub duration_ms: u64,
}

impl fmt::Display for TaskReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.task)?;
        match &self.outcome {
            TaskOutcome::LabelsRemoved(s) => write!(
                f,
                "{} labels removed from {} messages, {} failed",
                s.labels, s.modified, s.failed
            )?,
            TaskOutcome::Filtered(s) => write!(
                f,
                "{} scanned, {} relabelled, {} unmatched, {} skipped",
                s.scanned,
                s.relabelled,
                s.unmatched,
                s.vanished + s.errors
            )?,
            TaskOutcome::AttachmentsSaved(s) => write!(
                f,
                "{} attachments saved from {} messages, {} already present",
                s.saved, s.messages, s.skipped_existing
            )?,
        }
        write!(f, " ({}ms)", self.duration_ms)
    }
}

/// Run tasks once each, in order, stopping at the first failure
pub fn run_tasks(orchestrator: &Orchestrator, tasks: &[Task]) -> Result<Vec<TaskReport>> {
    let mut reports = Vec::with_capacity(tasks.len());

    for (i, task) in tasks.iter().enumerate() {
        info!("Task {}/{}: {}", i + 1, tasks.len(), task.name());
        let start = Instant::now();

        let outcome = match task {
            Task::RemoveLabelsFromEmails(labels) => orchestrator
                .remove_labels_from_emails(labels)
                .map(TaskOutcome::LabelsRemoved),
            Task::FilterLabelBySender {
                label,
                rules,
                move_messages,
            } => orchestrator
                .filter_label_by_sender(label, rules, *move_messages)
                .map(TaskOutcome::Filtered),
            Task::SaveAttachmentsOfLabel { label, path } => orchestrator
                .save_attachments_of_label(label, path)
                .map(TaskOutcome::AttachmentsSaved),
        }
        .with_context(|| format!("Task {} ({}) failed", i + 1, task.name()))?;

        reports.push(TaskReport {
            task: task.name(),
            outcome,
            duration_ms: start.elapsed().as_millis() as u64,
        });
    }

    Ok(reports)
}
