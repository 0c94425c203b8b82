//! OAuth client credentials
//!
//! Loaded from (in order of priority):
//! 1. `credentials.json` in the config folder (Google Cloud Console format)
//! 2. `GMAIL_CLIENT_ID` / `GMAIL_CLIENT_SECRET` environment variables

use anyhow::{Context, Result};
use config::Paths;
use serde::Deserialize;
use std::path::Path;

use crate::error::MailError;

/// OAuth client id and secret of the installed app
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
}

#[derive(Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
}

impl GmailCredentials {
    /// Load credentials for the given config folder
    pub fn load(paths: &Paths) -> Result<Self> {
        let file = paths.credentials_file();
        if file.exists() {
            return Self::from_file(&file);
        }

        Self::from_env().map_err(|_| {
            MailError::Config(format!(
                "no OAuth credentials: place a client secret file at {} \
                 or set GMAIL_CLIENT_ID and GMAIL_CLIENT_SECRET",
                file.display()
            ))
            .into()
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    /// Parse credentials from a JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GMAIL_CLIENT_ID")
            .context("GMAIL_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GMAIL_CLIENT_SECRET")
            .context("GMAIL_CLIENT_SECRET environment variable not set")?;

        Ok(Self {
            client_id,
            client_secret,
        })
    }

    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        // Desktop apps get "installed", web apps get "web"
        let section = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        Ok(Self {
            client_id: section.client_id,
            client_secret: section.client_secret,
        })
    }
}
