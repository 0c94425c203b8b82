//! Gmail API response normalization
//!
//! Converts Gmail API responses to domain models.

use anyhow::{Context, Result};
use base64::prelude::*;

use super::api::{GmailLabel, GmailMessage, Header, MessagePart};
use crate::models::{AttachmentRef, Label, Message, MessageId, ThreadId};

/// Normalize a Gmail API message to a Message
pub fn normalize_message(gmail_msg: GmailMessage) -> Result<Message> {
    let id = MessageId::new(&gmail_msg.id);
    let thread_id = ThreadId::new(&gmail_msg.thread_id);

    // Internal date is a decimal string of milliseconds since epoch
    let internal_date: i64 = match gmail_msg.internal_date.as_deref() {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid internalDate {:?} on message {}", raw, gmail_msg.id))?,
        None => 0,
    };

    let mut builder = Message::builder(id, thread_id)
        .snippet(decode_html_entities(&gmail_msg.snippet))
        .internal_date(internal_date)
        .label_ids(gmail_msg.label_ids.unwrap_or_default());

    if let Some(payload) = &gmail_msg.payload {
        let headers = payload.headers.as_deref().unwrap_or_default();
        if let Some(from) = extract_header(headers, "From") {
            builder = builder.from(from);
        }
        if let Some(to) = extract_header(headers, "To") {
            builder = builder.to(to);
        }
        if let Some(subject) = extract_header(headers, "Subject") {
            builder = builder.subject(subject);
        }

        let mut attachments = Vec::new();
        if let Some(parts) = &payload.parts {
            collect_attachments(parts, &mut attachments);
        }
        builder = builder.attachments(attachments);
    }

    Ok(builder.build())
}

/// Normalize a Gmail API label
pub fn normalize_label(label: GmailLabel) -> Label {
    if label.label_type.as_deref() == Some("system") {
        Label::system(label.id, label.name)
    } else {
        Label::new(label.id, label.name)
    }
}

/// Extract a header value by name
fn extract_header(headers: &[Header], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

/// Recursively collect named parts whose body lives behind an attachment id
fn collect_attachments(parts: &[MessagePart], out: &mut Vec<AttachmentRef>) {
    for part in parts {
        if let Some(filename) = part.filename.as_deref().filter(|f| !f.is_empty())
            && let Some(body) = &part.body
            && let Some(attachment_id) = &body.attachment_id
        {
            out.push(AttachmentRef {
                attachment_id: attachment_id.clone(),
                filename: filename.to_string(),
                mime_type: part
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                size: body.size.unwrap_or(0),
            });
        }

        if let Some(nested) = &part.parts {
            collect_attachments(nested, out);
        }
    }
}

/// Decode base64-encoded payload data
///
/// Gmail uses URL-safe base64 but padding can vary, so we try multiple decoders.
pub fn decode_base64(data: &str) -> Option<Vec<u8>> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};

    let decoders: &[&base64::engine::GeneralPurpose] =
        &[&BASE64_URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD];

    let data = data.trim();
    decoders.iter().find_map(|decoder| decoder.decode(data).ok())
}

/// Decode HTML entities in snippet text
fn decode_html_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GmailMessage {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_normalize_headers_and_labels() {
        let msg = normalize_message(parse(
            r#"{
                "id": "m1",
                "threadId": "t1",
                "labelIds": ["INBOX", "UNREAD"],
                "snippet": "Tom &amp; Jerry",
                "internalDate": "1700000000000",
                "payload": {
                    "mimeType": "text/plain",
                    "headers": [
                        {"name": "From", "value": "Alice <alice@example.com>"},
                        {"name": "to", "value": "bob@example.com"},
                        {"name": "Subject", "value": "Hello"}
                    ]
                }
            }"#,
        ))
        .unwrap();

        assert_eq!(msg.id.as_str(), "m1");
        assert_eq!(msg.thread_id.as_str(), "t1");
        assert_eq!(msg.from.as_deref(), Some("Alice <alice@example.com>"));
        assert_eq!(msg.to.as_deref(), Some("bob@example.com"));
        assert_eq!(msg.subject.as_deref(), Some("Hello"));
        assert_eq!(msg.snippet, "Tom & Jerry");
        assert_eq!(msg.internal_date, 1_700_000_000_000);
        assert!(msg.has_label("UNREAD"));
        assert!(!msg.has_attachment);
    }

    #[test]
    fn test_missing_headers_stay_none() {
        let msg = normalize_message(parse(r#"{"id": "m1", "threadId": "t1"}"#)).unwrap();
        assert_eq!(msg.from, None);
        assert_eq!(msg.subject, None);
        assert!(msg.label_ids.is_empty());
    }

    #[test]
    fn test_collects_nested_attachments() {
        let msg = normalize_message(parse(
            r#"{
                "id": "m1",
                "threadId": "t1",
                "payload": {
                    "mimeType": "multipart/mixed",
                    "parts": [
                        {"mimeType": "text/plain", "filename": "", "body": {"size": 5, "data": "aGVsbG8"}},
                        {"mimeType": "multipart/related", "filename": "", "parts": [
                            {"mimeType": "image/png", "filename": "logo.png",
                             "body": {"size": 42, "attachmentId": "att-2"}}
                        ]},
                        {"mimeType": "application/pdf", "filename": "invoice.pdf",
                         "body": {"size": 1000, "attachmentId": "att-1"}}
                    ]
                }
            }"#,
        ))
        .unwrap();

        assert!(msg.has_attachment);
        let names: Vec<&str> = msg.attachments.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["logo.png", "invoice.pdf"]);
        assert_eq!(msg.attachments[1].attachment_id, "att-1");
        assert_eq!(msg.attachments[1].mime_type, "application/pdf");
    }

    #[test]
    fn test_invalid_internal_date() {
        let result = normalize_message(parse(
            r#"{"id": "m1", "threadId": "t1", "internalDate": "yesterday"}"#,
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_normalize_label() {
        let system: GmailLabel =
            serde_json::from_str(r#"{"id": "INBOX", "name": "INBOX", "type": "system"}"#).unwrap();
        let user: GmailLabel =
            serde_json::from_str(r#"{"id": "Label_1", "name": "Receipts", "type": "user"}"#)
                .unwrap();
        assert!(normalize_label(system).is_system);
        let user = normalize_label(user);
        assert!(!user.is_system);
        assert_eq!(user.name, "Receipts");
    }

    #[test]
    fn test_decode_base64() {
        // "Hello, World!" in base64url
        assert_eq!(decode_base64("SGVsbG8sIFdvcmxkIQ"), Some(b"Hello, World!".to_vec()));
        assert_eq!(decode_base64("SGVsbG8sIFdvcmxkIQ=="), Some(b"Hello, World!".to_vec()));
        assert_eq!(decode_base64("!!!"), None);
    }

    #[test]
    fn test_decode_html_entities() {
        let input = "Hello &amp; welcome &lt;user&gt;";
        assert_eq!(decode_html_entities(input), "Hello & welcome <user>");
    }
}
