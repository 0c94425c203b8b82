//! In-memory file storage

use anyhow::Result;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{FOLDER_MIME_TYPE, FileStorage, RemoteFile, path_segments};
use crate::error::MailError;

const ROOT_ID: &str = "root";

struct StoredFile {
    file: RemoteFile,
    parent: String,
    bytes: Vec<u8>,
}

/// [`FileStorage`] backed by a map, with sequential ids
pub struct InMemoryDrive {
    files: RwLock<Vec<StoredFile>>,
    next_id: RwLock<u64>,
}

impl InMemoryDrive {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(Vec::new()),
            next_id: RwLock::new(1),
        }
    }

    fn allocate_id(&self) -> String {
        let mut next = self.next_id.write().unwrap();
        let id = format!("file-{}", *next);
        *next += 1;
        id
    }

    fn insert(&self, parent: &str, name: &str, mime_type: &str, bytes: &[u8]) -> String {
        let id = self.allocate_id();
        self.files.write().unwrap().push(StoredFile {
            file: RemoteFile {
                id: id.clone(),
                name: name.to_string(),
                mime_type: mime_type.to_string(),
            },
            parent: parent.to_string(),
            bytes: bytes.to_vec(),
        });
        id
    }

    fn folder_exists(&self, id: &str) -> bool {
        id == ROOT_ID
            || self
                .files
                .read()
                .unwrap()
                .iter()
                .any(|f| f.file.id == id && f.file.is_folder())
    }

    /// Contents of every file stored at `path`, in upload order
    pub fn read_file(&self, path: &str) -> Vec<Vec<u8>> {
        let mut parent = ROOT_ID.to_string();
        let segments: Vec<&str> = path_segments(path).collect();
        let Some((name, folders)) = segments.split_last() else {
            return Vec::new();
        };

        let files = self.files.read().unwrap();
        for folder in folders {
            match files
                .iter()
                .find(|f| f.parent == parent && f.file.is_folder() && f.file.name == *folder)
            {
                Some(f) => parent = f.file.id.clone(),
                None => return Vec::new(),
            }
        }
        files
            .iter()
            .filter(|f| f.parent == parent && !f.file.is_folder() && f.file.name == *name)
            .map(|f| f.bytes.clone())
            .collect()
    }

    /// Number of non-folder files stored anywhere
    pub fn file_count(&self) -> usize {
        self.files
            .read()
            .unwrap()
            .iter()
            .filter(|f| !f.file.is_folder())
            .count()
    }
}

impl Default for InMemoryDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStorage for InMemoryDrive {
    fn folder_id(&self, path: &str) -> Result<String> {
        let mut parent = ROOT_ID.to_string();
        for segment in path_segments(path) {
            let existing = self
                .files
                .read()
                .unwrap()
                .iter()
                .find(|f| f.parent == parent && f.file.is_folder() && f.file.name == segment)
                .map(|f| f.file.id.clone());

            parent = match existing {
                Some(id) => id,
                None => self.insert(&parent, segment, FOLDER_MIME_TYPE, &[]),
            };
        }
        Ok(parent)
    }

    fn list_folder(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
        if !self.folder_exists(folder_id) {
            return Err(MailError::NotFound(format!("folder {}", folder_id)).into());
        }
        Ok(self
            .files
            .read()
            .unwrap()
            .iter()
            .filter(|f| f.parent == folder_id)
            .map(|f| f.file.clone())
            .collect())
    }

    fn create_file(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<String> {
        if !self.folder_exists(folder_id) {
            return Err(MailError::NotFound(format!("folder {}", folder_id)).into());
        }
        Ok(self.insert(folder_id, name, mime_type, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_id_is_stable() {
        let drive = InMemoryDrive::new();
        let first = drive.folder_id("a/b").unwrap();
        let second = drive.folder_id("/a/b/").unwrap();
        assert_eq!(first, second);
        assert_eq!(drive.folder_id("").unwrap(), ROOT_ID);
    }

    #[test]
    fn test_duplicate_names_are_kept() {
        let drive = InMemoryDrive::new();
        drive.upload_file("x/doc.txt", b"one", "text/plain").unwrap();
        drive.upload_file("x/doc.txt", b"two", "text/plain").unwrap();
        assert_eq!(drive.read_file("x/doc.txt"), vec![b"one".to_vec(), b"two".to_vec()]);
        assert_eq!(drive.file_count(), 2);
    }

    #[test]
    fn test_unknown_folder() {
        let drive = InMemoryDrive::new();
        let err = drive.create_file("nope", "a.txt", "text/plain", b"").unwrap_err();
        assert!(MailError::is_not_found(&err));
    }
}
