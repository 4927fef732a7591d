//! Process-wide options
//!
//! Options are read once at session start (from `options.toml` in the user's
//! config directory, or defaults) and shared through an [`OptionsStore`]
//! handed to each component's constructor.

use anyhow::Context as _;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{ForeignKeyAction, Result};

/// Options that affect fetching, editing and alter-script generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveDbOptions {
    /// Show information_schema, performance_schema and mysql in the tree
    pub show_metadata_schemata: bool,
    /// Type of the first column added through the placeholder row
    pub default_pk_column_type: String,
    /// Type of every other newly added column
    pub default_column_type: String,
    /// Update rule of newly added foreign keys
    pub fk_default_update_rule: String,
    /// Delete rule of newly added foreign keys
    pub fk_default_delete_rule: String,
    /// Online DDL algorithm (`DEFAULT` omits the clause)
    pub alter_algorithm: String,
    /// Online DDL lock (`DEFAULT` omits the clause)
    pub alter_lock: String,
    /// Server `lower_case_table_names`; non-zero compares names case-insensitively
    pub lower_case_table_names: u32,
    /// Sort tree children case-sensitively
    pub case_sensitive_identifiers: bool,
    /// Keep schema-level tree children sorted by name
    pub sort_tree_children: bool,
    /// Emit `USE` statements instead of schema-qualified names
    pub omit_schema_qualifier: bool,
}

impl Default for LiveDbOptions {
    fn default() -> Self {
        Self {
            show_metadata_schemata: false,
            default_pk_column_type: "INT".to_string(),
            default_column_type: "VARCHAR(45)".to_string(),
            fk_default_update_rule: "NO ACTION".to_string(),
            fk_default_delete_rule: "NO ACTION".to_string(),
            alter_algorithm: "DEFAULT".to_string(),
            alter_lock: "DEFAULT".to_string(),
            lower_case_table_names: 0,
            case_sensitive_identifiers: false,
            sort_tree_children: true,
            omit_schema_qualifier: false,
        }
    }
}

impl LiveDbOptions {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// `<config dir>/livedb/options.toml`
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let config_dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(config_dir.join("livedb").join("options.toml"))
    }

    /// Load the options file if it exists; fall back to defaults on any error
    pub fn load_or_default() -> Self {
        let path = match Self::default_path() {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(error = %e, "using default options");
                return Self::default();
            }
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load(&path) {
            Ok(options) => {
                tracing::info!(path = %path.display(), "loaded options");
                options
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid options file, using defaults");
                Self::default()
            }
        }
    }

    pub fn default_update_rule(&self) -> ForeignKeyAction {
        parse_rule(&self.fk_default_update_rule)
    }

    pub fn default_delete_rule(&self) -> ForeignKeyAction {
        parse_rule(&self.fk_default_delete_rule)
    }

    /// Algorithm clause value, `None` when the server default applies
    pub fn online_ddl_algorithm(&self) -> Option<&str> {
        non_default(&self.alter_algorithm)
    }

    /// Lock clause value, `None` when the server default applies
    pub fn online_ddl_lock(&self) -> Option<&str> {
        non_default(&self.alter_lock)
    }

    /// Compare object names the way the server does
    pub fn names_equal(&self, a: &str, b: &str) -> bool {
        if self.lower_case_table_names != 0 {
            a.to_lowercase() == b.to_lowercase()
        } else {
            a == b
        }
    }
}

fn parse_rule(text: &str) -> ForeignKeyAction {
    text.parse().unwrap_or_else(|e| {
        tracing::warn!(rule = %text, error = %e, "invalid default foreign key rule");
        ForeignKeyAction::Restrict
    })
}

fn non_default(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("DEFAULT") {
        None
    } else {
        Some(value)
    }
}

/// The single options object of a session
#[derive(Debug, Default)]
pub struct OptionsStore {
    inner: RwLock<LiveDbOptions>,
}

/// Options store shared between components
pub type SharedOptions = Arc<OptionsStore>;

impl OptionsStore {
    pub fn new(options: LiveDbOptions) -> Self {
        Self {
            inner: RwLock::new(options),
        }
    }

    pub fn shared(options: LiveDbOptions) -> SharedOptions {
        Arc::new(Self::new(options))
    }

    /// Snapshot of the current options
    pub fn get(&self) -> LiveDbOptions {
        self.inner.read().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&LiveDbOptions) -> R) -> R {
        f(&self.inner.read())
    }

    pub fn update(&self, f: impl FnOnce(&mut LiveDbOptions)) {
        f(&mut self.inner.write());
    }
}
