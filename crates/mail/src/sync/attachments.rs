//! Export attachments of a label to remote file storage

use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::HashSet;

use super::{Orchestrator, Skipped, skip_or_abort};
use crate::error::MailError;

/// Statistics from [`Orchestrator::save_attachments_of_label`]
#[derive(Debug, Default, Clone)]
pub struct AttachmentStats {
    /// Messages with attachments inspected
    pub messages: usize,
    /// Attachments uploaded
    pub saved: usize,
    /// Attachments whose file name already existed in the folder
    pub skipped_existing: usize,
    pub vanished: usize,
    pub errors: usize,
}

impl Orchestrator {
    /// Upload every attachment of the messages in `label` to
    /// `<path>/<label display name>/`
    ///
    /// A file name that was already in the folder before the run is not
    /// uploaded again. Attachments sharing a name within one run are all
    /// uploaded, since the folder may hold several files of the same name.
    pub fn save_attachments_of_label(&self, label: &str, path: &str) -> Result<AttachmentStats> {
        let drive = self
            .drive
            .as_ref()
            .ok_or_else(|| MailError::Config("no file storage configured".into()))?;
        let label = self.resolve_label(label)?;

        let folder_path = format!("{}/{}", path.trim_end_matches('/'), label.name);
        let folder_id = drive
            .folder_id(&folder_path)
            .with_context(|| format!("Failed to resolve folder {}", folder_path))?;
        let existing: HashSet<String> = drive
            .list_folder(&folder_id)?
            .into_iter()
            .filter(|f| !f.is_folder())
            .map(|f| f.name)
            .collect();

        let ids = self
            .ids_in_label(label.id.as_str(), "has:attachment")
            .with_context(|| format!("Failed to list messages in {}", label.name))?;
        info!(
            "Saving attachments of {} messages in {} to {}",
            ids.len(),
            label.name,
            folder_path
        );

        let mut stats = AttachmentStats::default();
        for id in &ids {
            stats.messages += 1;
            let message = match self.api.get_message(id) {
                Ok(message) => message,
                Err(e) => {
                    match skip_or_abort(e, &format!("message {}", id.as_str()))? {
                        Skipped::Vanished => stats.vanished += 1,
                        Skipped::Failed => stats.errors += 1,
                    }
                    continue;
                }
            };

            for attachment in &message.attachments {
                if existing.contains(&attachment.filename) {
                    debug!("{} already exported", attachment.filename);
                    stats.skipped_existing += 1;
                    continue;
                }

                let item = format!("{} of message {}", attachment.filename, id.as_str());
                let uploaded = self
                    .api
                    .get_attachment(id, &attachment.attachment_id)
                    .and_then(|bytes| {
                        drive.create_file(
                            &folder_id,
                            &attachment.filename,
                            &attachment.mime_type,
                            &bytes,
                        )
                    });

                match uploaded {
                    Ok(_) => stats.saved += 1,
                    Err(e) => match skip_or_abort(e, &item)? {
                        Skipped::Vanished => stats.vanished += 1,
                        Skipped::Failed => stats.errors += 1,
                    },
                }
            }
        }

        info!(
            "Exported {} attachments from {} ({} already present)",
            stats.saved, label.name, stats.skipped_existing
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::{FileStorage, InMemoryDrive};
    use crate::gmail::InMemoryMailbox;
    use crate::models::{AttachmentRef, Label, Message, MessageId, ThreadId};
    use crate::storage::InMemoryMailStore;
    use std::sync::Arc;

    fn attachment(id: &str, name: &str) -> AttachmentRef {
        AttachmentRef {
            attachment_id: id.into(),
            filename: name.into(),
            mime_type: "application/pdf".into(),
            size: 4,
        }
    }

    fn setup() -> (Arc<InMemoryMailbox>, Arc<InMemoryDrive>, Orchestrator) {
        let mailbox = Arc::new(InMemoryMailbox::new());
        mailbox.add_label(Label::new("Label_R", "Receipts"));

        let m1 = MessageId::new("m1");
        mailbox.add_message(
            Message::builder(m1.clone(), ThreadId::new("t1"))
                .label_ids(["Label_R"])
                .internal_date(2)
                .attachments(vec![attachment("a1", "march.pdf"), attachment("a2", "april.pdf")])
                .build(),
        );
        mailbox.add_attachment(&m1, "a1", b"MAR".to_vec());
        mailbox.add_attachment(&m1, "a2", b"APR".to_vec());

        // Plain message in the same label
        mailbox.add_message(
            Message::builder(MessageId::new("m2"), ThreadId::new("t2"))
                .label_ids(["Label_R"])
                .internal_date(1)
                .build(),
        );

        let drive = Arc::new(InMemoryDrive::new());
        let orchestrator = Orchestrator::new(
            mailbox.clone(),
            Arc::new(InMemoryMailStore::new()),
            Some(drive.clone()),
        )
        .unwrap();
        (mailbox, drive, orchestrator)
    }

    #[test]
    fn test_exports_into_label_folder() {
        let (_mailbox, drive, orchestrator) = setup();
        let stats = orchestrator
            .save_attachments_of_label("Receipts", "backup/emails/")
            .unwrap();

        assert_eq!(stats.messages, 1);
        assert_eq!(stats.saved, 2);
        assert_eq!(drive.read_file("backup/emails/Receipts/march.pdf"), vec![b"MAR".to_vec()]);
        assert_eq!(drive.read_file("backup/emails/Receipts/april.pdf"), vec![b"APR".to_vec()]);
    }

    #[test]
    fn test_existing_files_are_skipped() {
        let (_mailbox, drive, orchestrator) = setup();
        drive
            .upload_file("backup/Receipts/march.pdf", b"OLD", "application/pdf")
            .unwrap();

        let stats = orchestrator
            .save_attachments_of_label("Receipts", "backup")
            .unwrap();
        assert_eq!(stats.saved, 1);
        assert_eq!(stats.skipped_existing, 1);
        assert_eq!(drive.read_file("backup/Receipts/march.pdf"), vec![b"OLD".to_vec()]);

        // A second run uploads nothing new
        let again = orchestrator
            .save_attachments_of_label("Receipts", "backup")
            .unwrap();
        assert_eq!(again.saved, 0);
        assert_eq!(drive.file_count(), 2);
    }

    #[test]
    fn test_same_name_in_several_messages_all_exported() {
        let mailbox = Arc::new(InMemoryMailbox::new());
        mailbox.add_label(Label::new("Label_B", "Bank"));
        for (id, date, content) in [("jan", 1, b"JAN"), ("feb", 2, b"FEB")] {
            let message_id = MessageId::new(id);
            mailbox.add_message(
                Message::builder(message_id.clone(), ThreadId::new(id))
                    .label_ids(["Label_B"])
                    .internal_date(date)
                    .attachments(vec![attachment(id, "statement.pdf")])
                    .build(),
            );
            mailbox.add_attachment(&message_id, id, content.to_vec());
        }

        let drive = Arc::new(InMemoryDrive::new());
        let orchestrator = Orchestrator::new(
            mailbox,
            Arc::new(InMemoryMailStore::new()),
            Some(drive.clone()),
        )
        .unwrap();
        let stats = orchestrator
            .save_attachments_of_label("Bank", "backup")
            .unwrap();

        assert_eq!(stats.saved, 2);
        assert_eq!(stats.skipped_existing, 0);
        assert_eq!(drive.file_count(), 2);
        let mut contents = drive.read_file("backup/Bank/statement.pdf");
        contents.sort();
        assert_eq!(contents, vec![b"FEB".to_vec(), b"JAN".to_vec()]);
    }

    #[test]
    fn test_subfolder_name_does_not_block_export() {
        let (_mailbox, drive, orchestrator) = setup();
        drive.folder_id("backup/Receipts/march.pdf").unwrap();

        let stats = orchestrator
            .save_attachments_of_label("Receipts", "backup")
            .unwrap();
        assert_eq!(stats.saved, 2);
        assert_eq!(stats.skipped_existing, 0);
        assert_eq!(drive.read_file("backup/Receipts/march.pdf"), vec![b"MAR".to_vec()]);
    }

    #[test]
    fn test_missing_attachment_is_skipped() {
        let (mailbox, drive, orchestrator) = setup();
        mailbox.add_message(
            Message::builder(MessageId::new("m3"), ThreadId::new("t3"))
                .label_ids(["Label_R"])
                .attachments(vec![attachment("gone", "lost.pdf")])
                .build(),
        );

        let stats = orchestrator
            .save_attachments_of_label("Receipts", "backup")
            .unwrap();
        assert_eq!(stats.saved, 2);
        assert_eq!(stats.vanished, 1);
        assert_eq!(drive.file_count(), 2);
    }

    #[test]
    fn test_requires_file_storage() {
        let mailbox = Arc::new(InMemoryMailbox::new());
        let orchestrator =
            Orchestrator::new(mailbox, Arc::new(InMemoryMailStore::new()), None).unwrap();
        let err = orchestrator
            .save_attachments_of_label("INBOX", "backup")
            .unwrap_err();
        assert!(matches!(MailError::of(&err), Some(MailError::Config(_))));
    }
}
