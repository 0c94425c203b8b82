//! Google Drive v3 client
//!
//! Folders are looked up by name under their parent and created when
//! missing. Files are uploaded with a single `multipart/related` request
//! carrying the metadata and the content.

use anyhow::Result;
use chrono::Utc;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{FOLDER_MIME_TYPE, FileStorage, RemoteFile, path_segments};
use crate::gmail::GmailAuth;
use crate::http;

const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const ROOT_ID: &str = "root";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata<'a> {
    name: &'a str,
    mime_type: &'a str,
    parents: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

/// Drive client sharing the Gmail OAuth token
pub struct DriveClient {
    auth: Arc<GmailAuth>,
}

impl DriveClient {
    pub fn new(auth: Arc<GmailAuth>) -> Self {
        Self { auth }
    }

    /// Run a `files.list` query, following every page
    fn list(&self, query: &str) -> Result<Vec<RemoteFile>> {
        let token = self.auth.access_token()?;
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![("q", query), ("fields", LIST_FIELDS), ("pageSize", "1000")];
            if let Some(page) = page_token.as_deref() {
                params.push(("pageToken", page));
            }

            let page: FileList = http::get_json(&token, FILES_URL, &params, "drive file list")?;
            files.extend(page.files);

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(files)
    }

    fn create_folder(&self, parent: &str, name: &str) -> Result<String> {
        debug!("Creating drive folder {:?} under {}", name, parent);
        let metadata = FileMetadata {
            name,
            mime_type: FOLDER_MIME_TYPE,
            parents: [parent],
        };
        let created: CreatedFile = http::post_json(
            &self.auth.access_token()?,
            FILES_URL,
            &metadata,
            &format!("drive folder {}", name),
        )?;
        Ok(created.id)
    }
}

/// Quote a value for a Drive search query
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Build a `multipart/related` upload body, returning it with its content type
fn multipart_body(metadata: &FileMetadata<'_>, bytes: &[u8]) -> Result<(String, Vec<u8>)> {
    let boundary = format!("gmailfilter_{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());

    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(&serde_json::to_vec(metadata)?);
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", metadata.mime_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Ok((format!("multipart/related; boundary={}", boundary), body))
}

impl FileStorage for DriveClient {
    fn folder_id(&self, path: &str) -> Result<String> {
        let mut parent = ROOT_ID.to_string();
        for segment in path_segments(path) {
            let query = format!(
                "name = {} and {} in parents and mimeType = '{}' and trashed = false",
                quote(segment),
                quote(&parent),
                FOLDER_MIME_TYPE
            );
            parent = match self.list(&query)?.into_iter().next() {
                Some(folder) => folder.id,
                None => self.create_folder(&parent, segment)?,
            };
        }
        Ok(parent)
    }

    fn list_folder(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
        self.list(&format!("{} in parents and trashed = false", quote(folder_id)))
    }

    fn create_file(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<String> {
        let metadata = FileMetadata {
            name,
            mime_type,
            parents: [folder_id],
        };
        let (content_type, body) = multipart_body(&metadata, bytes)?;

        let created: CreatedFile = http::post_bytes(
            &self.auth.access_token()?,
            UPLOAD_URL,
            &[("uploadType", "multipart")],
            &content_type,
            &body,
            &format!("upload of {}", name),
        )?;
        debug!("Uploaded {} ({} bytes) as {}", name, bytes.len(), created.id);
        Ok(created.id)
    }
}
