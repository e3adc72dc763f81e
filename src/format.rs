//! Note text generation for fetched tasks.

use std::fmt::Write as _;

use crate::config::FormatStyle;
use crate::models::task::Task;

/// Turns a [`Task`] into the text of its journal block.
///
/// Parts appear in a fixed order: title, ` ⏰ <due>`, one ` #[label]` per
/// label, then (full style only) ` P<priority>` and ` <url>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFormatter {
    style: FormatStyle,
}

impl TaskFormatter {
    /// Formatter for `style`.
    #[must_use]
    pub fn new(style: FormatStyle) -> Self {
        Self { style }
    }

    /// Block text for `task`, whitespace-trimmed.
    #[must_use]
    pub fn format(&self, task: &Task) -> String {
        let mut out = task.content.trim().to_owned();

        if let Some(due) = task.due.as_ref().and_then(|due| due.display()) {
            let _ = write!(out, " ⏰ {due}");
        }

        for label in task.labels.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            let _ = write!(out, " #[{label}]");
        }

        if self.style == FormatStyle::Full {
            if let Some(priority) = task.priority {
                let _ = write!(out, " P{priority}");
            }
            if let Some(url) = task.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
                let _ = write!(out, " <{url}>");
            }
        }

        out.trim().to_owned()
    }
}
