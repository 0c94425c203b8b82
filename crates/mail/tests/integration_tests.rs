//! Integration tests for the mail crate
//!
//! These tests drive the public API end to end against the in-memory
//! mailbox and drive, with the SQLite cache on disk.

use std::sync::Arc;

use mail::{
    AttachmentRef, InMemoryDrive, InMemoryMailStore, InMemoryMailbox, Label, MailApi, MailError,
    MailStore, Message, MessageId, Orchestrator, SqliteMailStore, SyncOptions, TaskFile,
    TaskOutcome, ThreadId, open_database, run_tasks,
};
use tempfile::TempDir;

/// Helper to create test messages
fn make_message(id: &str, from: &str, subject: &str, labels: &[&str], date: i64) -> Message {
    Message::builder(MessageId::new(id), ThreadId::new(format!("t-{}", id)))
        .from(from)
        .to("me@example.com")
        .subject(subject)
        .snippet(format!("Preview of {}", id))
        .label_ids(labels.iter().copied())
        .internal_date(date)
        .build()
}

fn make_mailbox() -> Arc<InMemoryMailbox> {
    let mailbox = Arc::new(InMemoryMailbox::new().with_page_size(3));
    mailbox.add_label(Label::new("Label_1", "Shopping"));
    mailbox.add_label(Label::new("Label_2", "Work"));
    mailbox.add_label(Label::new("Label_3", "Receipts"));
    mailbox.add_label(Label::new("Label_4", "Old"));

    let messages = [
        ("m1", "Shop <deals@shop.com>", "50% off", vec!["INBOX", "UNREAD"]),
        ("m2", "Boss <boss@work.com>", "Quarterly report", vec!["INBOX"]),
        ("m3", "friend@home.net", "Dinner?", vec!["INBOX", "Label_4"]),
        ("m4", "billing@shop.com", "Your receipt", vec!["Label_3", "Label_4"]),
        ("m5", "noreply@work.com", "Build failed", vec!["INBOX"]),
        ("m6", "spam@bad.biz", "Winner", vec!["SPAM"]),
        ("m7", "alerts@bank.com", "Statement", vec!["INBOX", "Label_4"]),
    ];
    for (i, (id, from, subject, labels)) in messages.into_iter().enumerate() {
        mailbox.add_message(make_message(id, from, subject, &labels, 1_000 + i as i64));
    }

    let receipt = MessageId::new("m4");
    mailbox.add_message(
        Message::builder(receipt.clone(), ThreadId::new("t-m4"))
            .from("billing@shop.com")
            .subject("Your receipt")
            .label_ids(["Label_3", "Label_4"])
            .internal_date(1_003)
            .attachments(vec![AttachmentRef {
                attachment_id: "att-1".into(),
                filename: "receipt.pdf".into(),
                mime_type: "application/pdf".into(),
                size: 8,
            }])
            .build(),
    );
    mailbox.add_attachment(&receipt, "att-1", b"%PDF-1.7".to_vec());

    mailbox
}

fn create_sqlite_store() -> (Arc<SqliteMailStore>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = SqliteMailStore::open(dir.path().join("email.db")).unwrap();
    (Arc::new(store), dir)
}

#[test]
fn test_sync_caches_every_searchable_message() {
    let mailbox = make_mailbox();
    let (store, _dir) = create_sqlite_store();
    let orchestrator = Orchestrator::new(mailbox.clone(), store.clone(), None).unwrap();

    let stats = orchestrator.update_database(SyncOptions::default()).unwrap();
    assert_eq!(stats.stored, stats.listed);

    let listed = orchestrator
        .search_messages::<&str>("", &[])
        .unwrap()
        .collect_ids()
        .unwrap();
    for id in &listed {
        assert!(store.has_message(id).unwrap(), "{} not cached", id.as_str());
    }
    // Spam is not part of a plain listing
    assert!(!store.has_message(&MessageId::new("m6")).unwrap());
}

#[test]
fn test_sync_survives_vanished_message() {
    let mailbox = Arc::new(InMemoryMailbox::new());
    for id in ["1", "7", "9"] {
        mailbox.add_message(make_message(id, "a@x.com", "hi", &["INBOX"], 1));
    }
    mailbox.vanish_on_fetch(&MessageId::new("7"));

    let (store, _dir) = create_sqlite_store();
    let orchestrator = Orchestrator::new(mailbox, store.clone(), None).unwrap();
    let stats = orchestrator.update_database(SyncOptions::default()).unwrap();

    assert_eq!(stats.vanished, 1);
    let cached = store.list_message_ids().unwrap();
    assert_eq!(cached.len(), 2);
    assert!(cached.contains(&MessageId::new("1")));
    assert!(cached.contains(&MessageId::new("9")));
}

#[test]
fn test_interrupted_sync_is_rerun_safely() {
    let mailbox = make_mailbox();
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("email.db");

    {
        // First run dies after storing one message
        let store = SqliteMailStore::open(&db).unwrap();
        let first = mailbox.get_message(&MessageId::new("m1")).unwrap();
        store.upsert_message(&first).unwrap();
    }

    let store: Arc<dyn MailStore> = Arc::new(SqliteMailStore::open(&db).unwrap());
    let orchestrator = Orchestrator::new(mailbox, store.clone(), None).unwrap();
    let stats = orchestrator.update_database(SyncOptions::default()).unwrap();

    assert_eq!(stats.already_cached, 1);
    assert_eq!(store.count_messages().unwrap(), stats.listed);
}

#[test]
fn test_upsert_twice_equals_once() {
    let (store, _dir) = create_sqlite_store();
    let message = make_message("m1", "a@x.com", "hi", &["INBOX"], 1);

    store.upsert_message(&message).unwrap();
    let once = store.query(&|_| true).unwrap();
    store.upsert_message(&message).unwrap();
    assert_eq!(store.query(&|_| true).unwrap(), once);
}

#[test]
fn test_cached_queries() {
    let mailbox = make_mailbox();
    let (store, _dir) = create_sqlite_store();
    let orchestrator = Orchestrator::new(mailbox, store.clone(), None).unwrap();
    orchestrator.update_database(SyncOptions::default()).unwrap();

    let from_shop = store
        .query(&|m| m.from.as_deref().is_some_and(|f| f.contains("shop.com")))
        .unwrap();
    let ids: Vec<&str> = from_shop.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m4", "m1"]);
    assert!(from_shop[0].has_attachment);
}

#[test]
fn test_task_file_end_to_end() {
    let mailbox = make_mailbox();
    let drive = Arc::new(InMemoryDrive::new());
    let file = TaskFile::from_json(
        r#"{
            "database": "sqlite://",
            "remove_labels_from_emails": ["Old"],
            "filter_label_by_sender": {
                "label": "INBOX",
                "filter_dict_lst": [
                    {"from": "shop.com", "label": "Shopping"},
                    {"from": "work.com", "label": "Work"},
                    {"subject": "shop.com", "label": "Work"}
                ],
                "move": true
            },
            "save_attachments_of_label": {"label": "Receipts", "path": "backup/mail"}
        }"#,
    )
    .unwrap();

    let store = open_database(file.database.as_deref().unwrap()).unwrap();
    let orchestrator = Orchestrator::new(mailbox.clone(), store, Some(drive.clone())).unwrap();
    let reports = run_tasks(&orchestrator, &file.tasks).unwrap();
    assert_eq!(reports.len(), 3);

    let labels = |id: &str| -> Vec<String> {
        mailbox
            .message(&MessageId::new(id))
            .unwrap()
            .label_ids
            .into_iter()
            .collect()
    };

    // Old removed everywhere
    assert_eq!(labels("m3"), vec!["INBOX"]);
    assert_eq!(labels("m4"), vec!["Label_3"]);
    // Filed and moved out of the inbox
    assert_eq!(labels("m1"), vec!["Label_1", "UNREAD"]);
    assert_eq!(labels("m2"), vec!["Label_2"]);
    assert_eq!(labels("m5"), vec!["Label_2"]);
    // No rule matched
    assert_eq!(labels("m7"), vec!["INBOX"]);

    match &reports[2].outcome {
        TaskOutcome::AttachmentsSaved(stats) => assert_eq!(stats.saved, 1),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(
        drive.read_file("backup/mail/Receipts/receipt.pdf"),
        vec![b"%PDF-1.7".to_vec()]
    );
}

#[test]
fn test_auth_failure_stops_task_run() {
    let mailbox = make_mailbox();
    let orchestrator =
        Orchestrator::new(mailbox.clone(), Arc::new(InMemoryMailStore::new()), None).unwrap();
    mailbox.fail_auth(true);

    let file = TaskFile::from_json(r#"{"remove_labels_from_emails": ["Old"]}"#).unwrap();
    let err = run_tasks(&orchestrator, &file.tasks).unwrap_err();
    assert!(matches!(MailError::of(&err), Some(MailError::Auth(_))));
}

#[test]
fn test_unknown_task_rejected_before_running() {
    let err = TaskFile::from_json(r#"{"remove_labels_from_emails": ["Old"], "archive": {}}"#)
        .unwrap_err();
    assert!(matches!(MailError::of(&err), Some(MailError::Config(_))));
}
