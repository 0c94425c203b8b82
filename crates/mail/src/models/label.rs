//! Label model representing a Gmail label

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a label (Gmail label ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelId(pub String);

impl LabelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    // Well-known Gmail system labels
    pub const INBOX: &'static str = "INBOX";
    pub const UNREAD: &'static str = "UNREAD";
    pub const TRASH: &'static str = "TRASH";
    pub const SPAM: &'static str = "SPAM";
}

impl From<String> for LabelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for LabelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A mail label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label ID (e.g., "INBOX", "CATEGORY_SOCIAL", "Label_123")
    pub id: LabelId,
    /// Display name
    pub name: String,
    /// Whether this is a system label
    pub is_system: bool,
}

impl Label {
    /// Create a user label
    pub fn new(id: impl Into<LabelId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_system: false,
        }
    }

    /// Create a system label
    pub fn system(id: impl Into<LabelId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_system: true,
        }
    }
}

/// Label id to display name mapping, fetched once per session
///
/// Task files refer to labels by display name ("Newsletters") while the API
/// wants ids ("Label_42"). System labels have equal name and id.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    labels: Vec<Label>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl LabelMap {
    pub fn new(labels: Vec<Label>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_id = HashMap::new();
        for (i, label) in labels.iter().enumerate() {
            by_name.entry(label.name.clone()).or_insert(i);
            by_id.insert(label.id.0.clone(), i);
        }
        Self {
            labels,
            by_name,
            by_id,
        }
    }

    /// Look a label up by display name first, then by id
    pub fn resolve(&self, name_or_id: &str) -> Option<&Label> {
        self.by_name
            .get(name_or_id)
            .or_else(|| self.by_id.get(name_or_id))
            .map(|&i| &self.labels[i])
    }

    /// Labels in provider order
    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl From<Vec<Label>> for LabelMap {
    fn from(labels: Vec<Label>) -> Self {
        Self::new(labels)
    }
}
