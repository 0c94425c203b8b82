//! Substring filter rules over message headers
//!
//! A rule matches when its needle occurs (case-sensitively) in one header of
//! the message. Rules are tried in order and the first match wins.

use anyhow::Result;
use serde_json::Value;
use std::fmt;

use crate::error::MailError;
use crate::models::Message;

/// Header a rule inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    /// `From` header, task file key `from`
    Sender,
    /// `To` header, task file key `to`
    Recipient,
    /// `Subject` header, task file key `subject`
    Subject,
}

impl FilterField {
    pub fn key(self) -> &'static str {
        match self {
            FilterField::Sender => "from",
            FilterField::Recipient => "to",
            FilterField::Subject => "subject",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "from" => Some(FilterField::Sender),
            "to" => Some(FilterField::Recipient),
            "subject" => Some(FilterField::Subject),
            _ => None,
        }
    }

    fn value(self, message: &Message) -> Option<&str> {
        match self {
            FilterField::Sender => message.from.as_deref(),
            FilterField::Recipient => message.to.as_deref(),
            FilterField::Subject => message.subject.as_deref(),
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One filter rule: `needle` in `field` sends the message to `target_label`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
    pub field: FilterField,
    pub needle: String,
    /// Label display name (or id)
    pub target_label: String,
}

impl FilterRule {
    pub fn new(field: FilterField, needle: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            field,
            needle: needle.into(),
            target_label: target.into(),
        }
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.field
            .value(message)
            .is_some_and(|header| header.contains(self.needle.as_str()))
    }

    /// Parse a rule object such as `{"from": "shop.com", "label": "Shopping"}`
    pub fn from_value(value: &Value) -> Result<Self> {
        let invalid = |msg: String| -> anyhow::Error { MailError::Config(msg).into() };

        let object = value
            .as_object()
            .ok_or_else(|| invalid(format!("filter rule must be an object, got {}", value)))?;

        let mut field = None;
        let mut target = None;
        for (key, entry) in object {
            let text = entry
                .as_str()
                .ok_or_else(|| invalid(format!("filter rule key {:?} must be a string", key)))?;

            if key == "label" {
                target = Some(text);
            } else if let Some(f) = FilterField::from_key(key) {
                if field.is_some() {
                    return Err(invalid(format!(
                        "filter rule {} names more than one of from/to/subject",
                        value
                    )));
                }
                field = Some((f, text));
            } else {
                return Err(invalid(format!("unrecognized filter rule key {:?}", key)));
            }
        }

        let (field, needle) =
            field.ok_or_else(|| invalid(format!("filter rule {} has no from/to/subject", value)))?;
        let target = target.ok_or_else(|| invalid(format!("filter rule {} has no label", value)))?;
        if needle.is_empty() {
            return Err(invalid(format!("filter rule {} has an empty {}", value, field)));
        }

        Ok(Self::new(field, needle, target))
    }
}

/// Parse a JSON array of rule objects
pub fn parse_rules(value: &Value) -> Result<Vec<FilterRule>> {
    value
        .as_array()
        .ok_or_else(|| MailError::Config(format!("filter rules must be an array, got {}", value)))?
        .iter()
        .map(FilterRule::from_value)
        .collect()
}

/// Target label of the first rule matching `message`
pub fn evaluate<'r>(message: &Message, rules: &'r [FilterRule]) -> Option<&'r str> {
    rules
        .iter()
        .find(|rule| rule.matches(message))
        .map(|rule| rule.target_label.as_str())
}
