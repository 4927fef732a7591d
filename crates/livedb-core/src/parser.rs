//! DDL parser collaborator

use crate::{Catalog, ColumnType, LiveObjectType, Result};

/// Session `sql_mode` options that change how DDL text is tokenized
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlMode {
    raw: String,
    ansi_quotes: bool,
}

impl SqlMode {
    /// Build from the value of `@@SESSION.sql_mode`
    pub fn from_session_value(value: &str) -> Self {
        let ansi_quotes = value
            .split(',')
            .map(str::trim)
            .any(|mode| mode.eq_ignore_ascii_case("ANSI_QUOTES") || mode.eq_ignore_ascii_case("ANSI"));
        Self {
            raw: value.to_string(),
            ansi_quotes,
        }
    }

    /// Whether double quotes delimit identifiers instead of strings
    pub fn ansi_quotes(&self) -> bool {
        self.ansi_quotes
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The same mode with `ANSI_QUOTES` flipped
    pub fn with_ansi_quotes_toggled(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            ansi_quotes: !self.ansi_quotes,
        }
    }
}

/// A problem reported while parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

/// Object created or replaced by a parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedObject {
    pub object_type: LiveObjectType,
    pub schema: String,
    pub name: String,
}

/// Outcome of parsing DDL into a catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    pub error_count: usize,
    pub issues: Vec<ParseIssue>,
    pub objects: Vec<ParsedObject>,
}

impl ParseOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_count: 1,
            issues: vec![ParseIssue {
                message: message.into(),
                line: None,
                column: None,
            }],
            objects: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error_count == 0
    }
}

/// Resolved column type with the flags written after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec {
    pub datatype: ColumnType,
    pub flags: Vec<String>,
}

/// Turns DDL text into catalog objects
pub trait DdlParser: Send + Sync {
    /// Parse `sql` and create or replace the objects it defines in `catalog`.
    ///
    /// Unqualified names land in `target_schema`. Existing objects with the
    /// same name keep their id so snapshots stay comparable.
    fn parse_into_catalog(
        &self,
        catalog: &mut Catalog,
        sql: &str,
        target_schema: &str,
        mode: &SqlMode,
    ) -> ParseOutcome;

    /// Resolve a column type text (e.g. `varchar(40)`, `INT UNSIGNED`, `BOOL`)
    fn parse_column_type(&self, catalog: &Catalog, text: &str) -> Result<TypeSpec>;
}
