//! Remote file storage for exported attachments
//!
//! [`FileStorage`] is the facade the sync engine uploads through.
//! [`DriveClient`] talks to Google Drive, [`InMemoryDrive`] keeps files in
//! memory for tests.

mod client;
mod memory;

use anyhow::Result;
use serde::Deserialize;

pub use client::DriveClient;
pub use memory::InMemoryDrive;

use crate::error::MailError;

/// Folder mime type used by Drive
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A file or folder in remote storage
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

impl RemoteFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// Hierarchical remote file storage
pub trait FileStorage: Send + Sync {
    /// Resolve a `/`-separated folder path from the storage root, creating
    /// missing folders along the way
    fn folder_id(&self, path: &str) -> Result<String>;

    /// Files and folders directly inside a folder
    fn list_folder(&self, folder_id: &str) -> Result<Vec<RemoteFile>>;

    /// Create a file and return its id
    ///
    /// Names are not unique: an existing file with the same name is kept
    /// alongside the new one.
    fn create_file(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<String>;

    /// Upload `bytes` to `path` (`folder/sub/name.ext`)
    fn upload_file(&self, path: &str, bytes: &[u8], mime_type: &str) -> Result<String> {
        let (folder, name) = split_file_path(path)?;
        let folder_id = self.folder_id(folder)?;
        self.create_file(&folder_id, name, mime_type, bytes)
    }
}

/// Path segments with empty components dropped
pub(crate) fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').map(str::trim).filter(|s| !s.is_empty())
}

/// Split `a/b/name` into (`a/b`, `name`)
fn split_file_path(path: &str) -> Result<(&str, &str)> {
    let path = path.trim_end_matches('/');
    let (folder, name) = path.rsplit_once('/').unwrap_or(("", path));
    if name.trim().is_empty() {
        return Err(MailError::Config(format!("no file name in path {:?}", path)).into());
    }
    Ok((folder, name))
}
