//! Alter script produced by the generator

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static DDL_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(CREATE|ALTER|DROP)\b").expect("valid regex"));

/// Online DDL hints for ALTER TABLE statements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineDdl {
    pub algorithm: Option<String>,
    pub lock: Option<String>,
}

impl OnlineDdl {
    pub fn is_empty(&self) -> bool {
        self.algorithm.is_none() && self.lock.is_none()
    }

    /// `, ALGORITHM=...` / `, LOCK=...` suffix, empty when nothing is set
    pub fn clause(&self) -> String {
        let mut clause = String::new();
        if let Some(algorithm) = &self.algorithm {
            clause.push_str(", ALGORITHM=");
            clause.push_str(algorithm);
        }
        if let Some(lock) = &self.lock {
            clause.push_str(", LOCK=");
            clause.push_str(lock);
        }
        clause
    }
}

/// Ordered DDL statements that turn the server state into the client state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterScript {
    pub statements: Vec<String>,
    /// Hints that were applied, `None` when the server does not support them
    pub online_ddl: Option<OnlineDdl>,
}

impl AlterScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, statement: impl Into<String>) {
        self.statements.push(statement.into());
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// True when no statement creates, alters or drops anything.
    ///
    /// A script made only of `USE` statements is a no-op.
    pub fn is_noop(&self) -> bool {
        !self.statements.iter().any(|s| DDL_KEYWORD.is_match(s))
    }

    /// Statements joined into one script text
    pub fn text(&self) -> String {
        if self.statements.is_empty() {
            return String::new();
        }
        let mut text = self.statements.join(";\n\n");
        text.push(';');
        text
    }
}
