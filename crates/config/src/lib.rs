//! Configuration directory handling for gmailfilter
//!
//! All per-user state lives in one directory (~/.config/gmailfilter/ by
//! default): the OAuth client credentials, the cached tokens, the default
//! task file and the default cache database.
//!
//! The directory is described by a [`Paths`] value that callers construct
//! once and pass down explicitly.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Name of the application directory inside the platform config dir
pub const APP_DIR: &str = "gmailfilter";

const CREDENTIALS_FILE: &str = "credentials.json";
const TASKS_FILE: &str = "config.json";
const TOKEN_DIR: &str = "token_files";
const TOKEN_FILE: &str = "token.json";
const DATABASE_FILE: &str = "email.db";

/// Get the default config directory (~/.config/gmailfilter/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Expand a leading `~` to the user's home directory
///
/// Paths without a leading `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Locations of every file gmailfilter reads or writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// Use `root` as the config directory (`~` is expanded)
    pub fn new(root: impl AsRef<str>) -> Self {
        Self {
            root: expand_home(root.as_ref()),
        }
    }

    /// Use the platform default config directory
    pub fn default_location() -> Result<Self> {
        let root = config_dir().context("Could not determine config directory")?;
        Ok(Self { root })
    }

    /// Create the config directory and the token cache directory
    pub fn init(&self) -> Result<()> {
        let token_dir = self.root.join(TOKEN_DIR);
        std::fs::create_dir_all(&token_dir).with_context(|| {
            format!("Failed to create config directory: {}", token_dir.display())
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// OAuth client credentials issued by the Google Cloud Console
    pub fn credentials_file(&self) -> PathBuf {
        self.root.join(CREDENTIALS_FILE)
    }

    /// Task file used when none is given on the command line
    pub fn tasks_file(&self) -> PathBuf {
        self.root.join(TASKS_FILE)
    }

    /// Writable token cache, refreshed across runs
    pub fn token_file(&self) -> PathBuf {
        self.root.join(TOKEN_DIR).join(TOKEN_FILE)
    }

    /// Cache database used when the task file names none
    pub fn default_database(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }
}
