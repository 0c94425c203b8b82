//! Error taxonomy shared by the API facade, the cache store and the sync engine
//!
//! Library functions return `anyhow::Result`. The variants below are raised
//! with `.into()` and recovered with [`MailError::of`], so callers can decide
//! per error kind whether to skip an item or abort.

/// Typed mail errors
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// Credentials are missing, invalid or expired. Fatal, never retried.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The provider throttled the request. The caller may back off and retry.
    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    /// A referenced message, label or file no longer exists remotely.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The local cache is unwritable or corrupt. Fatal for the operation.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid task file, filter rule, label name or connection string.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Transport failure or an unexpected HTTP status.
    #[error("Network error: {0}")]
    Network(String),
}

impl MailError {
    /// Find the typed error inside an `anyhow` chain, if there is one
    pub fn of(err: &anyhow::Error) -> Option<&MailError> {
        err.chain().find_map(|cause| cause.downcast_ref::<MailError>())
    }

    /// Whether `err` must stop the whole operation rather than one item
    pub fn is_fatal(err: &anyhow::Error) -> bool {
        matches!(
            Self::of(err),
            Some(MailError::Auth(_) | MailError::RateLimited(_) | MailError::Storage(_))
        )
    }

    /// Whether `err` reports a vanished remote resource
    pub fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(Self::of(err), Some(MailError::NotFound(_)))
    }

    /// Map a `ureq` failure onto the taxonomy
    pub(crate) fn from_http(err: ureq::Error, resource: &str) -> Self {
        match err {
            ureq::Error::StatusCode(status) => Self::from_status(status, "", resource),
            other => MailError::Network(format!("{}: {}", resource, other)),
        }
    }

    /// Map an error status and its response body onto the taxonomy
    ///
    /// Google reports quota exhaustion as 403 with a rate limit reason in
    /// the body, so a 403 is only an auth failure when no such reason is given.
    pub(crate) fn from_status(status: u16, body: &str, resource: &str) -> Self {
        match status {
            403 if is_rate_limit_body(body) => MailError::RateLimited(resource.to_string()),
            401 | 403 => MailError::Auth(format!("access denied for {}", resource)),
            404 => MailError::NotFound(resource.to_string()),
            429 => MailError::RateLimited(resource.to_string()),
            other => MailError::Network(format!("{}: HTTP status {}", resource, other)),
        }
    }

    pub(crate) fn storage(action: &str, err: impl std::fmt::Display) -> Self {
        MailError::Storage(format!("{}: {}", action, err))
    }
}

const RATE_LIMIT_REASONS: &[&str] = &["rateLimitExceeded", "userRateLimitExceeded"];

/// Whether a Google API error body names a rate limit reason
fn is_rate_limit_body(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return false;
    };
    value["error"]["errors"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|e| e["reason"].as_str())
        .any(|reason| RATE_LIMIT_REASONS.contains(&reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_of_finds_error_under_context() {
        let err: anyhow::Result<()> = Err(MailError::NotFound("message 7".into()).into());
        let err = err.context("Failed to fetch message").unwrap_err();
        assert!(MailError::is_not_found(&err));
        assert!(!MailError::is_fatal(&err));
    }

    #[test]
    fn test_fatal_kinds() {
        for e in [
            MailError::Auth("x".into()),
            MailError::RateLimited("x".into()),
            MailError::Storage("x".into()),
        ] {
            assert!(MailError::is_fatal(&anyhow::Error::from(e)));
        }
        assert!(!MailError::is_fatal(&anyhow::Error::from(MailError::Network("x".into()))));
        assert!(!MailError::is_fatal(&anyhow::anyhow!("untyped")));
    }

    #[test]
    fn test_http_status_mapping() {
        assert!(matches!(
            MailError::from_http(ureq::Error::StatusCode(401), "labels"),
            MailError::Auth(_)
        ));
        assert!(matches!(
            MailError::from_http(ureq::Error::StatusCode(404), "message 1"),
            MailError::NotFound(_)
        ));
        assert!(matches!(
            MailError::from_http(ureq::Error::StatusCode(429), "labels"),
            MailError::RateLimited(_)
        ));
        assert!(matches!(
            MailError::from_http(ureq::Error::StatusCode(500), "labels"),
            MailError::Network(_)
        ));
    }

    #[test]
    fn test_forbidden_with_rate_limit_reason_is_throttling() {
        let body = r#"{"error":{"code":403,"errors":[{"domain":"usageLimits","reason":"userRateLimitExceeded"}]}}"#;
        assert!(matches!(
            MailError::from_status(403, body, "labels"),
            MailError::RateLimited(_)
        ));

        let body = r#"{"error":{"errors":[{"reason":"rateLimitExceeded"}]}}"#;
        assert!(matches!(
            MailError::from_status(403, body, "file upload"),
            MailError::RateLimited(_)
        ));
    }

    #[test]
    fn test_forbidden_without_rate_limit_reason_is_auth() {
        let body = r#"{"error":{"errors":[{"reason":"insufficientPermissions"}]}}"#;
        assert!(matches!(
            MailError::from_status(403, body, "labels"),
            MailError::Auth(_)
        ));
        assert!(matches!(
            MailError::from_status(403, "<html>Forbidden</html>", "labels"),
            MailError::Auth(_)
        ));
        assert!(matches!(
            MailError::from_http(ureq::Error::StatusCode(403), "labels"),
            MailError::Auth(_)
        ));
    }
}
