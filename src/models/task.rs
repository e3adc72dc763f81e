//! Todoist task and project records as returned by the REST API.

use serde::{Deserialize, Serialize};

/// Due-date descriptor attached to a task.
///
/// Todoist sends a human-readable `string` ("every monday", "today") next
/// to the machine `date` / `datetime` forms. Any of them may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Due {
    /// Human-readable due text.
    #[serde(default)]
    pub string: Option<String>,
    /// Calendar date, `YYYY-MM-DD`.
    #[serde(default)]
    pub date: Option<String>,
    /// RFC 3339 date-time for timed tasks.
    #[serde(default)]
    pub datetime: Option<String>,
}

impl Due {
    /// Preferred display text: the human string, then the date, then the datetime.
    #[must_use]
    pub fn display(&self) -> Option<&str> {
        [&self.string, &self.date, &self.datetime]
            .into_iter()
            .filter_map(Option::as_deref)
            .map(str::trim)
            .find(|value| !value.is_empty())
    }
}

/// A task fetched from the Inbox project.
///
/// Immutable once fetched; a cycle owns its tasks only until it finishes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    /// Opaque identifier, unique within the Todoist account.
    pub id: String,
    /// Title text.
    pub content: String,
    /// Optional long-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Owning project.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Optional due descriptor.
    #[serde(default)]
    pub due: Option<Due>,
    /// Label names.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Priority, 1 (normal) through 4 (urgent).
    #[serde(default)]
    pub priority: Option<u8>,
    /// Canonical web URL.
    #[serde(default)]
    pub url: Option<String>,
}

impl Task {
    /// Construct a bare task with only an id and title.
    #[must_use]
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            description: None,
            project_id: None,
            due: None,
            labels: Vec::new(),
            priority: None,
            url: None,
        }
    }

    /// Description text, if present and not blank.
    #[must_use]
    pub fn description_text(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// A Todoist project; only the fields needed to locate the Inbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    /// Project identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Set on the account's default capture project.
    #[serde(default)]
    pub is_inbox_project: bool,
}
