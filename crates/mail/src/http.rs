//! Authorized blocking HTTP helpers shared by the Gmail and Drive clients
//!
//! Every helper maps transport failures and HTTP status codes onto
//! [`MailError`] so callers can tell an expired token from a vanished message.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use ureq::Body;
use ureq::http::Response;

use crate::error::MailError;

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Turn a non-2xx response into a [`MailError`], reading the error body
/// so throttling reported as 403 is not mistaken for an auth failure
fn check_status(
    sent: Result<Response<Body>, ureq::Error>,
    resource: &str,
) -> Result<Response<Body>> {
    let mut response = sent.map_err(|e| MailError::from_http(e, resource))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.body_mut().read_to_string().unwrap_or_default();
    Err(MailError::from_status(status.as_u16(), &body, resource).into())
}

/// GET `url` with query parameters and parse the JSON response
pub(crate) fn get_json<T: DeserializeOwned>(
    token: &str,
    url: &str,
    query: &[(&str, &str)],
    resource: &str,
) -> Result<T> {
    let mut request = ureq::get(url)
        .config()
        .http_status_as_error(false)
        .build()
        .header("Authorization", &bearer(token));
    for (key, value) in query {
        request = request.query(*key, *value);
    }

    let mut response = check_status(request.call(), resource)?;

    response
        .body_mut()
        .read_json()
        .with_context(|| format!("Failed to parse {} response", resource))
}

/// POST a JSON body and parse the JSON response
pub(crate) fn post_json<B: Serialize, T: DeserializeOwned>(
    token: &str,
    url: &str,
    body: &B,
    resource: &str,
) -> Result<T> {
    let request = ureq::post(url)
        .config()
        .http_status_as_error(false)
        .build()
        .header("Authorization", &bearer(token));
    let mut response = check_status(request.send_json(body), resource)?;

    response
        .body_mut()
        .read_json()
        .with_context(|| format!("Failed to parse {} response", resource))
}

/// POST a JSON body to an endpoint that answers with an empty body
pub(crate) fn post_json_empty<B: Serialize>(
    token: &str,
    url: &str,
    body: &B,
    resource: &str,
) -> Result<()> {
    let request = ureq::post(url)
        .config()
        .http_status_as_error(false)
        .build()
        .header("Authorization", &bearer(token));
    check_status(request.send_json(body), resource)?;
    Ok(())
}

/// POST raw bytes with an explicit content type and parse the JSON response
pub(crate) fn post_bytes<T: DeserializeOwned>(
    token: &str,
    url: &str,
    query: &[(&str, &str)],
    content_type: &str,
    bytes: &[u8],
    resource: &str,
) -> Result<T> {
    let mut request = ureq::post(url)
        .config()
        .http_status_as_error(false)
        .build()
        .header("Authorization", &bearer(token))
        .header("Content-Type", content_type);
    for (key, value) in query {
        request = request.query(*key, *value);
    }

    let mut response = check_status(request.send(bytes), resource)?;

    response
        .body_mut()
        .read_json()
        .with_context(|| format!("Failed to parse {} response", resource))
}
