//! Action log
//!
//! Record of fetch and apply activity shown to the user next to the editor.
//! Failures that never reach the caller as an `Err` end up here.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: ActionKind,
    /// What was being done, e.g. the statement text
    pub action: String,
    pub message: String,
}

/// Sink for user-visible action records
pub trait ActionLog: Send + Sync {
    fn add_entry(&self, kind: ActionKind, action: &str, message: &str);

    fn info(&self, action: &str, message: &str) {
        self.add_entry(ActionKind::Info, action, message);
    }

    fn warning(&self, action: &str, message: &str) {
        self.add_entry(ActionKind::Warning, action, message);
    }

    fn error(&self, action: &str, message: &str) {
        self.add_entry(ActionKind::Error, action, message);
    }
}

/// In-memory action log
#[derive(Debug, Default)]
pub struct MemoryActionLog {
    entries: RwLock<Vec<ActionEntry>>,
}

impl MemoryActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ActionEntry> {
        self.entries.read().clone()
    }

    pub fn errors(&self) -> Vec<ActionEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.kind == ActionKind::Error)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl ActionLog for MemoryActionLog {
    fn add_entry(&self, kind: ActionKind, action: &str, message: &str) {
        self.entries.write().push(ActionEntry {
            timestamp: Utc::now(),
            kind,
            action: action.to_string(),
            message: message.to_string(),
        });
    }
}
