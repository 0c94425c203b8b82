//! Mail crate - Gmail automation business logic
//!
//! This crate provides:
//! - Domain models (Message, Label, LabelMap)
//! - Gmail and Drive API clients behind the `MailApi` / `FileStorage` traits
//! - OAuth authentication and credential loading
//! - Substring filter rules over message headers
//! - A local message cache (SQLite or in-memory)
//! - The sync orchestrator and the declarative task runner
//!
//! All I/O is blocking and runs on the calling thread.

pub mod config;
pub mod drive;
pub mod error;
pub mod filter;
pub mod gmail;
mod http;
pub mod models;
pub mod storage;
pub mod sync;
pub mod tasks;

pub use config::GmailCredentials;
pub use drive::{DriveClient, FileStorage, InMemoryDrive, RemoteFile};
pub use error::MailError;
pub use filter::{FilterField, FilterRule, evaluate, parse_rules};
pub use gmail::{
    BatchOutcome, GmailAuth, GmailClient, InMemoryMailbox, MailApi, MessagePage, MessagePages,
    MessageRef, search_messages,
};
pub use models::{AttachmentRef, Label, LabelId, LabelMap, Message, MessageId, ThreadId};
pub use storage::{InMemoryMailStore, MailStore, SqliteMailStore, open_database};
pub use sync::{
    AttachmentStats, FilterStats, Orchestrator, RemovalStats, SyncOptions, SyncStats,
};
pub use tasks::{Task, TaskFile, TaskOutcome, TaskReport, run_tasks};
