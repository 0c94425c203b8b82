//! OAuth2 for the Gmail and Drive APIs
//!
//! Installed-app authorization code flow: the consent page redirects to a
//! loopback listener, the code is exchanged for tokens, and the tokens are
//! cached as JSON in the config folder's `token_files/`. Cached access
//! tokens are reused until five minutes before expiry, then refreshed.

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::config::GmailCredentials;
use crate::error::MailError;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Label changes on mail, plus file creation on Drive for attachment export
const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/drive",
];

const CALLBACK_PORTS: std::ops::RangeInclusive<u16> = 8080..=8090;

/// Seconds before expiry at which a cached token is treated as stale
const EXPIRY_MARGIN_SECS: i64 = 300;

/// Token as cached on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
}

impl StoredToken {
    fn is_fresh(&self, now: i64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at > now + EXPIRY_MARGIN_SECS)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

/// Credential holder shared by the Gmail and Drive clients
pub struct GmailAuth {
    credentials: GmailCredentials,
    token_path: PathBuf,
    /// Last token handed out, to avoid re-reading the file on every request
    cached: Mutex<Option<StoredToken>>,
}

impl GmailAuth {
    pub fn new(credentials: GmailCredentials, token_path: PathBuf) -> Self {
        Self {
            credentials,
            token_path,
            cached: Mutex::new(None),
        }
    }

    /// Get a valid access token, refreshing or re-authorizing as needed
    ///
    /// Failures are reported as [`MailError::Auth`].
    pub fn access_token(&self) -> Result<String> {
        let now = Utc::now().timestamp();

        let mut cached = self.cached.lock().unwrap();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.access_token.clone());
        }

        let stored = cached.take().or_else(|| self.load_token().ok());
        if let Some(token) = stored {
            if token.is_fresh(now) {
                let access = token.access_token.clone();
                *cached = Some(token);
                return Ok(access);
            }

            if let Some(refresh_token) = &token.refresh_token {
                match self.refresh(refresh_token) {
                    Ok(response) => {
                        let token = self.store(response)?;
                        let access = token.access_token.clone();
                        *cached = Some(token);
                        return Ok(access);
                    }
                    Err(e) => warn!("Token refresh failed, re-authorizing: {:#}", e),
                }
            }
        }

        let response = self
            .authorize()
            .map_err(|e| MailError::Auth(format!("{:#}", e)))?;
        let token = self.store(response)?;
        let access = token.access_token.clone();
        *cached = Some(token);
        Ok(access)
    }

    /// Forget the cached token so the next request prompts for consent
    pub fn logout(&self) -> Result<()> {
        *self.cached.lock().unwrap() = None;
        if self.token_path.exists() {
            fs::remove_file(&self.token_path)
                .with_context(|| format!("Failed to remove {}", self.token_path.display()))?;
        }
        Ok(())
    }

    fn authorize(&self) -> Result<TokenResponse> {
        let (listener, port) = bind_callback_listener()?;
        let redirect_uri = format!("http://localhost:{}", port);
        let auth_url = self.consent_url(&redirect_uri);

        info!("Opening browser for Google authorization");
        eprintln!("If the browser does not open, visit:\n{}", auth_url);
        if let Err(e) = open::that(&auth_url) {
            warn!("Failed to open browser: {}", e);
        }

        let code = wait_for_code(&listener)?;
        debug!("Exchanging authorization code for tokens");

        let mut response = ureq::post(TOKEN_URL)
            .send_form([
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .context("Failed to exchange authorization code")?;

        response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")
    }

    fn consent_url(&self, redirect_uri: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            AUTH_URL,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&SCOPES.join(" ")),
        )
    }

    fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let mut response = ureq::post(TOKEN_URL)
            .send_form([
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .map_err(|e| MailError::from_http(e, "token refresh"))?;

        let mut token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse refresh response")?;

        // Google omits the refresh token on refresh
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }

    fn load_token(&self) -> Result<StoredToken> {
        let content = fs::read_to_string(&self.token_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn store(&self, response: TokenResponse) -> Result<StoredToken> {
        let token = StoredToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response
                .expires_in
                .map(|secs| Utc::now().timestamp() + secs as i64),
        };

        if let Some(parent) = self.token_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.token_path, serde_json::to_string_pretty(&token)?)
            .with_context(|| format!("Failed to write {}", self.token_path.display()))?;
        Ok(token)
    }
}

fn bind_callback_listener() -> Result<(TcpListener, u16)> {
    for port in CALLBACK_PORTS {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            return Ok((listener, port));
        }
    }
    anyhow::bail!(
        "No free callback port in {}-{}",
        CALLBACK_PORTS.start(),
        CALLBACK_PORTS.end()
    )
}

/// Accept one redirect and pull the authorization code out of it
fn wait_for_code(listener: &TcpListener) -> Result<String> {
    let (mut stream, _) = listener.accept().context("Failed to accept callback")?;

    let mut request_line = String::new();
    BufReader::new(&stream)
        .read_line(&mut request_line)
        .context("Failed to read callback request")?;

    let result = parse_callback(&request_line);

    let (status, body) = match &result {
        Ok(_) => ("200 OK", "Authorization complete. You can close this window."),
        Err(_) => ("400 Bad Request", "Authorization failed. Please try again."),
    };
    let reply = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
        status, body
    );
    stream.write_all(reply.as_bytes()).ok();

    result
}

/// Parse `GET /?code=...&scope=... HTTP/1.1`
fn parse_callback(request_line: &str) -> Result<String> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .context("Malformed callback request")?;
    let url = url::Url::parse("http://localhost")?
        .join(target)
        .context("Malformed callback target")?;

    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => anyhow::bail!("Authorization denied: {}", value),
            "code" => code = Some(value.into_owned()),
            _ => {}
        }
    }
    code.context("No authorization code in callback")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn auth(dir: &Path) -> GmailAuth {
        GmailAuth::new(
            GmailCredentials {
                client_id: "id.apps.googleusercontent.com".into(),
                client_secret: "secret".into(),
            },
            dir.join("token_files").join("token.json"),
        )
    }

    #[test]
    fn test_parse_callback_code() {
        let line = "GET /?code=4%2F0Abc&scope=https%3A%2F%2Fmail HTTP/1.1\r\n";
        assert_eq!(parse_callback(line).unwrap(), "4/0Abc");
    }

    #[test]
    fn test_parse_callback_error() {
        let err = parse_callback("GET /?error=access_denied HTTP/1.1").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
        assert!(parse_callback("GET /favicon.ico HTTP/1.1").is_err());
    }

    #[test]
    fn test_consent_url_requests_both_scopes() {
        let dir = tempfile::tempdir().unwrap();
        let url = auth(dir.path()).consent_url("http://localhost:8080");
        assert!(url.contains("gmail.modify"));
        assert!(url.contains("auth%2Fdrive"));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn test_fresh_cached_token_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let auth = auth(dir.path());
        auth.store(TokenResponse {
            access_token: "ya29.token".into(),
            refresh_token: Some("refresh".into()),
            expires_in: Some(3600),
        })
        .unwrap();

        assert_eq!(auth.access_token().unwrap(), "ya29.token");
    }

    #[test]
    fn test_logout_removes_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let auth = auth(dir.path());
        auth.store(TokenResponse {
            access_token: "ya29.token".into(),
            refresh_token: None,
            expires_in: Some(3600),
        })
        .unwrap();
        let token_file = dir.path().join("token_files").join("token.json");
        assert!(token_file.exists());

        auth.logout().unwrap();
        assert!(!token_file.exists());
        assert!(auth.load_token().is_err());

        // Logging out twice is fine
        auth.logout().unwrap();
    }

    #[test]
    fn test_token_freshness_margin() {
        let token = StoredToken {
            access_token: "a".into(),
            refresh_token: None,
            expires_at: Some(1_000),
        };
        assert!(token.is_fresh(0));
        assert!(!token.is_fresh(1_000 - EXPIRY_MARGIN_SECS));
    }
}
