//! SQLite-backed message cache

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use log::debug;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rusqlite_migration::{M, Migrations};

use super::traits::MailStore;
use crate::error::MailError;
use crate::models::{Message, MessageId, ThreadId};

/// Database migrations
///
/// Applied in order; the user_version pragma tracks progress.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: message metadata
        M::up(
            r#"
            CREATE TABLE messages (
                id TEXT PRIMARY KEY,
                thread_id TEXT NOT NULL,
                from_header TEXT,
                to_header TEXT,
                subject TEXT,
                snippet TEXT NOT NULL DEFAULT '',
                label_ids TEXT NOT NULL DEFAULT '[]',  -- JSON array
                internal_date INTEGER NOT NULL,
                has_attachment INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_messages_internal_date ON messages(internal_date DESC);
            "#,
        ),
    ])
}

const SELECT_COLUMNS: &str = "SELECT id, thread_id, from_header, to_header, subject, snippet, \
     label_ids, internal_date, has_attachment FROM messages";

/// Map rusqlite failures to storage errors
trait StorageResult<T> {
    fn storage(self, action: &str) -> Result<T>;
}

impl<T> StorageResult<T> for rusqlite::Result<T> {
    fn storage(self, action: &str) -> Result<T> {
        self.map_err(|e| MailError::storage(action, e).into())
    }
}

/// Row as stored, before the label column is decoded
struct MessageRow {
    id: String,
    thread_id: String,
    from: Option<String>,
    to: Option<String>,
    subject: Option<String>,
    snippet: String,
    label_ids: String,
    internal_date: i64,
    has_attachment: bool,
}

impl MessageRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            thread_id: row.get(1)?,
            from: row.get(2)?,
            to: row.get(3)?,
            subject: row.get(4)?,
            snippet: row.get(5)?,
            label_ids: row.get(6)?,
            internal_date: row.get(7)?,
            has_attachment: row.get(8)?,
        })
    }

    fn into_message(self) -> Result<Message> {
        let label_ids: BTreeSet<String> = serde_json::from_str(&self.label_ids)
            .map_err(|e| MailError::storage(&format!("corrupt labels on {}", self.id), e))?;

        let mut builder = Message::builder(MessageId::new(self.id), ThreadId::new(self.thread_id))
            .snippet(self.snippet)
            .label_ids(label_ids)
            .internal_date(self.internal_date)
            .has_attachment(self.has_attachment);
        if let Some(from) = self.from {
            builder = builder.from(from);
        }
        if let Some(to) = self.to {
            builder = builder.to(to);
        }
        if let Some(subject) = self.subject {
            builder = builder.subject(subject);
        }
        Ok(builder.build())
    }
}

fn encode_labels<'a>(labels: impl IntoIterator<Item = &'a String>) -> Result<String> {
    let labels: BTreeSet<&String> = labels.into_iter().collect();
    serde_json::to_string(&labels).map_err(|e| MailError::storage("encode labels", e).into())
}

/// SQLite message cache
pub struct SqliteMailStore {
    conn: Mutex<Connection>,
}

impl SqliteMailStore {
    /// Open (or create) a database file
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref();
        let conn = Connection::open(path)
            .storage(&format!("Failed to open database at {}", path.display()))?;
        debug!("Opened cache database {}", path.display());
        Self::with_connection(conn)
    }

    /// Throwaway database that lives as long as the store
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().storage("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        // WAL keeps readers unblocked while a sync writes
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )
        .storage("Failed to configure database")?;

        migrations()
            .to_latest(&mut conn)
            .map_err(|e| MailError::storage("Failed to run database migrations", e))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl MailStore for SqliteMailStore {
    fn upsert_message(&self, message: &Message) -> Result<()> {
        let labels = encode_labels(&message.label_ids)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO messages (id, thread_id, from_header, to_header, subject, snippet,
                                   label_ids, internal_date, has_attachment)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                thread_id = excluded.thread_id,
                from_header = excluded.from_header,
                to_header = excluded.to_header,
                subject = excluded.subject,
                snippet = excluded.snippet,
                label_ids = excluded.label_ids,
                internal_date = excluded.internal_date,
                has_attachment = excluded.has_attachment",
            params![
                message.id.as_str(),
                message.thread_id.as_str(),
                message.from,
                message.to,
                message.subject,
                message.snippet,
                labels,
                message.internal_date,
                message.has_attachment,
            ],
        )
        .storage(&format!("Failed to upsert message {}", message.id.as_str()))?;
        Ok(())
    }

    fn get_message(&self, id: &MessageId) -> Result<Option<Message>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("{} WHERE id = ?", SELECT_COLUMNS),
                [id.as_str()],
                MessageRow::read,
            )
            .optional()
            .storage("Failed to read message")?;
        row.map(MessageRow::into_message).transpose()
    }

    fn has_message(&self, id: &MessageId) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM messages WHERE id = ?",
                [id.as_str()],
                |row| row.get(0),
            )
            .storage("Failed to look up message")?;
        Ok(count > 0)
    }

    fn list_message_ids(&self) -> Result<HashSet<MessageId>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id FROM messages")
            .storage("Failed to list message ids")?;
        stmt.query_map([], |row| row.get::<_, String>(0).map(MessageId::new))
            .storage("Failed to list message ids")?
            .collect::<rusqlite::Result<HashSet<_>>>()
            .storage("Failed to list message ids")
    }

    fn query(&self, predicate: &dyn Fn(&Message) -> bool) -> Result<Vec<Message>> {
        let rows = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn
                .prepare(&format!("{} ORDER BY internal_date DESC, id", SELECT_COLUMNS))
                .storage("Failed to query messages")?;
            stmt.query_map([], MessageRow::read)
                .storage("Failed to query messages")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .storage("Failed to query messages")?
        };

        let mut matching = Vec::new();
        for row in rows {
            let message = row.into_message()?;
            if predicate(&message) {
                matching.push(message);
            }
        }
        Ok(matching)
    }

    fn update_message_labels(&self, id: &MessageId, label_ids: &[String]) -> Result<()> {
        let labels = encode_labels(label_ids)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE messages SET label_ids = ? WHERE id = ?",
            params![labels, id.as_str()],
        )
        .storage(&format!("Failed to update labels of {}", id.as_str()))?;
        Ok(())
    }

    fn delete_missing(&self, known_ids: &HashSet<MessageId>) -> Result<usize> {
        let cached = self.list_message_ids()?;
        let stale: Vec<&MessageId> = cached.iter().filter(|id| !known_ids.contains(*id)).collect();
        if stale.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().storage("Failed to start transaction")?;
        {
            let mut stmt = tx
                .prepare("DELETE FROM messages WHERE id = ?")
                .storage("Failed to prune messages")?;
            for id in &stale {
                stmt.execute([id.as_str()]).storage("Failed to prune messages")?;
            }
        }
        tx.commit().storage("Failed to commit pruning")?;
        Ok(stale.len())
    }

    fn count_messages(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .storage("Failed to count messages")?;
        Ok(count as usize)
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM messages", [])
            .storage("Failed to clear messages")?;
        Ok(())
    }
}
