//! Declarative task files
//!
//! A task file is a JSON object whose keys name tasks, run in the order they
//! appear:
//!
//! ```json
//! {
//!     "database": "sqlite:///email.db",
//!     "remove_labels_from_emails": ["Unwanted"],
//!     "filter_label_by_sender": {
//!         "label": "INBOX",
//!         "filter_dict_lst": [{"from": "shop.com", "label": "Shopping"}],
//!         "move": true
//!     },
//!     "save_attachments_of_label": {"label": "Receipts", "path": "backup/emails"}
//! }
//! ```
//!
//! `database` is a setting, not a task. The object forms of
//! `filter_label_by_sender` and `save_attachments_of_label` may also be given
//! as arrays of such objects.

mod runner;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;

pub use runner::{TaskOutcome, TaskReport, run_tasks};

use crate::error::MailError;
use crate::filter::{FilterRule, parse_rules};

const DATABASE_KEY: &str = "database";

/// One unit of work from a task file
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Strip each label from every message carrying it
    RemoveLabelsFromEmails(Vec<String>),
    /// File the messages of `label` by the first matching rule
    FilterLabelBySender {
        label: String,
        rules: Vec<FilterRule>,
        move_messages: bool,
    },
    /// Export attachments of `label` to `path/<label>/` in file storage
    SaveAttachmentsOfLabel { label: String, path: String },
}

impl Task {
    /// Task file key this task is written under
    pub fn name(&self) -> &'static str {
        match self {
            Task::RemoveLabelsFromEmails(_) => "remove_labels_from_emails",
            Task::FilterLabelBySender { .. } => "filter_label_by_sender",
            Task::SaveAttachmentsOfLabel { .. } => "save_attachments_of_label",
        }
    }
}

/// A parsed task file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFile {
    /// Cache connection string, if the file names one
    pub database: Option<String>,
    /// Tasks in file order
    pub tasks: Vec<Task>,
}

fn config_error(msg: String) -> anyhow::Error {
    MailError::Config(msg).into()
}

fn string_field(object: &Map<String, Value>, key: &str, task: &str) -> Result<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| config_error(format!("{}: missing string field {:?}", task, key)))
}

fn reject_unknown_fields(object: &Map<String, Value>, allowed: &[&str], task: &str) -> Result<()> {
    match object.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(config_error(format!("{}: unrecognized field {:?}", task, key))),
        None => Ok(()),
    }
}

/// Objects of a task given either as one object or as an array of them
fn task_objects<'a>(value: &'a Value, task: &str) -> Result<Vec<&'a Map<String, Value>>> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    items
        .into_iter()
        .map(|item| {
            item.as_object()
                .ok_or_else(|| config_error(format!("{}: expected an object, got {}", task, item)))
        })
        .collect()
}

fn parse_removal(value: &Value) -> Result<Task> {
    let task = "remove_labels_from_emails";
    let labels = value
        .as_array()
        .ok_or_else(|| config_error(format!("{}: expected an array of labels", task)))?
        .iter()
        .map(|label| {
            label
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| config_error(format!("{}: label {} is not a string", task, label)))
        })
        .collect::<Result<Vec<String>>>()?;
    Ok(Task::RemoveLabelsFromEmails(labels))
}

fn parse_filter(object: &Map<String, Value>) -> Result<Task> {
    let task = "filter_label_by_sender";
    reject_unknown_fields(object, &["label", "filter_dict_lst", "move"], task)?;

    let rules = object
        .get("filter_dict_lst")
        .ok_or_else(|| config_error(format!("{}: missing \"filter_dict_lst\"", task)))?;
    let move_messages = match object.get("move") {
        None => false,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            return Err(config_error(format!("{}: \"move\" must be a boolean, got {}", task, other)));
        }
    };

    Ok(Task::FilterLabelBySender {
        label: string_field(object, "label", task)?,
        rules: parse_rules(rules).with_context(|| format!("Invalid rules in {}", task))?,
        move_messages,
    })
}

fn parse_export(object: &Map<String, Value>) -> Result<Task> {
    let task = "save_attachments_of_label";
    reject_unknown_fields(object, &["label", "path"], task)?;
    Ok(Task::SaveAttachmentsOfLabel {
        label: string_field(object, "label", task)?,
        path: string_field(object, "path", task)?,
    })
}

impl TaskFile {
    /// Parse task file JSON
    ///
    /// Unknown task names and malformed task bodies are rejected before
    /// anything runs.
    pub fn from_json(json: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(json)
            .map_err(|e| config_error(format!("task file is not valid JSON: {}", e)))?;
        let object = root
            .as_object()
            .ok_or_else(|| config_error("task file must be a JSON object".into()))?;

        let mut file = TaskFile::default();
        for (key, value) in object {
            match key.as_str() {
                DATABASE_KEY => {
                    let conn = value.as_str().ok_or_else(|| {
                        config_error(format!("\"database\" must be a string, got {}", value))
                    })?;
                    file.database = Some(conn.to_string());
                }
                "remove_labels_from_emails" => file.tasks.push(parse_removal(value)?),
                "filter_label_by_sender" => {
                    for object in task_objects(value, key)? {
                        file.tasks.push(parse_filter(object)?);
                    }
                }
                "save_attachments_of_label" => {
                    for object in task_objects(value, key)? {
                        file.tasks.push(parse_export(object)?);
                    }
                }
                other => return Err(config_error(format!("task not recognized: {:?}", other))),
            }
        }
        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read task file {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid task file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterField;

    #[test]
    fn test_parse_full_file_in_order() {
        let file = TaskFile::from_json(
            r#"{
                "save_attachments_of_label": {"label": "Receipts", "path": "backup"},
                "database": "sqlite:///email.db",
                "remove_labels_from_emails": ["A", "B"],
                "filter_label_by_sender": {
                    "label": "INBOX",
                    "filter_dict_lst": [{"from": "shop.com", "label": "Shopping"}]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(file.database.as_deref(), Some("sqlite:///email.db"));
        let names: Vec<&str> = file.tasks.iter().map(Task::name).collect();
        assert_eq!(
            names,
            vec![
                "save_attachments_of_label",
                "remove_labels_from_emails",
                "filter_label_by_sender"
            ]
        );
        assert_eq!(
            file.tasks[2],
            Task::FilterLabelBySender {
                label: "INBOX".into(),
                rules: vec![FilterRule::new(FilterField::Sender, "shop.com", "Shopping")],
                move_messages: false,
            }
        );
    }

    #[test]
    fn test_move_flag_and_arrays() {
        let file = TaskFile::from_json(
            r#"{"filter_label_by_sender": [
                {"label": "INBOX", "filter_dict_lst": [], "move": true},
                {"label": "Later", "filter_dict_lst": []}
            ]}"#,
        )
        .unwrap();
        assert_eq!(file.tasks.len(), 2);
        assert!(matches!(
            file.tasks[0],
            Task::FilterLabelBySender { move_messages: true, .. }
        ));
    }

    #[test]
    fn test_unknown_task_rejected() {
        let err = TaskFile::from_json(r#"{"delete_everything": []}"#).unwrap_err();
        assert!(matches!(MailError::of(&err), Some(MailError::Config(_))));
        assert!(err.to_string().contains("task not recognized"));
    }

    #[test]
    fn test_malformed_tasks_rejected() {
        for bad in [
            r#"[]"#,
            r#"{"remove_labels_from_emails": "A"}"#,
            r#"{"remove_labels_from_emails": [1]}"#,
            r#"{"filter_label_by_sender": {"label": "INBOX"}}"#,
            r#"{"filter_label_by_sender": {"label": "INBOX", "filter_dict_lst": [], "move": "yes"}}"#,
            r#"{"filter_label_by_sender": {"label": "INBOX", "filter_dict_lst": [{"from": "a", "to": "b", "label": "L"}]}}"#,
            r#"{"save_attachments_of_label": {"label": "R"}}"#,
            r#"{"save_attachments_of_label": {"label": "R", "path": "p", "extra": 1}}"#,
            r#"{"database": 5}"#,
            r#"not json"#,
        ] {
            let err = TaskFile::from_json(bad).unwrap_err();
            assert!(matches!(MailError::of(&err), Some(MailError::Config(_))), "{}", bad);
        }
    }

    #[test]
    fn test_empty_file_has_no_tasks() {
        let file = TaskFile::from_json("{}").unwrap();
        assert!(file.tasks.is_empty());
        assert!(file.database.is_none());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"remove_labels_from_emails": ["A"]}"#).unwrap();
        let file = TaskFile::load(&path).unwrap();
        assert_eq!(file.tasks, vec![Task::RemoveLabelsFromEmails(vec!["A".into()])]);

        assert!(TaskFile::load(&dir.path().join("missing.json")).is_err());
    }
}
