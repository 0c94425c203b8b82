//! Local message cache
//!
//! This module provides:
//! - [`MailStore`] trait for the cache interface
//! - [`SqliteMailStore`] persisting to a SQLite file
//! - [`InMemoryMailStore`] for tests
//! - [`open_database`] resolving task-file connection strings

mod memory;
mod sqlite;
mod traits;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

pub use memory::InMemoryMailStore;
pub use sqlite::SqliteMailStore;
pub use traits::MailStore;

use crate::error::MailError;

/// Where a connection string points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

/// Parse a connection string
///
/// Accepts `sqlite:///relative.db`, `sqlite:////absolute.db`, `sqlite://`
/// (in-memory) and plain paths, where a leading `~` is expanded.
pub fn parse_connection_string(conn_str: &str) -> Result<DatabaseLocation> {
    let conn_str = conn_str.trim();
    if conn_str.is_empty() {
        return Err(MailError::Config("empty database connection string".into()).into());
    }

    let path = match conn_str.split_once("://") {
        Some(("sqlite", "")) => return Ok(DatabaseLocation::Memory),
        Some(("sqlite", rest)) => match rest.strip_prefix('/') {
            Some(path) if !path.is_empty() => path,
            _ => {
                return Err(MailError::Config(format!(
                    "malformed database connection string {:?}",
                    conn_str
                ))
                .into());
            }
        },
        Some((scheme, _)) => {
            return Err(MailError::Config(format!(
                "unsupported database scheme {:?}, only sqlite is available",
                scheme
            ))
            .into());
        }
        None => conn_str,
    };

    if path == ":memory:" {
        return Ok(DatabaseLocation::Memory);
    }
    Ok(DatabaseLocation::File(config::expand_home(path)))
}

/// Open the cache a connection string points at
pub fn open_database(conn_str: &str) -> Result<Arc<dyn MailStore>> {
    let store = match parse_connection_string(conn_str)? {
        DatabaseLocation::Memory => SqliteMailStore::open_in_memory()?,
        DatabaseLocation::File(path) => SqliteMailStore::open(path)?,
    };
    Ok(Arc::new(store))
}
