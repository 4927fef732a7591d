//! Catalog change data structures
//!
//! Changes are expressed with names already resolved, so the script
//! generator never needs to look anything up in either catalog.

use livedb_core::{Column, ForeignKeyAction, IndexType, LiveObjectType};
use serde::{Deserialize, Serialize};

/// Everything that differs between a server and a client catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogChanges {
    pub schemas: Vec<SchemaChange>,
    pub tables: Vec<TableChange>,
    /// Views, routines and triggers, in dependency order
    pub definitions: Vec<DefinitionChange>,
}

impl CatalogChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are no differences
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.tables.is_empty() && self.definitions.is_empty()
    }

    /// Returns the total number of changed objects
    pub fn change_count(&self) -> usize {
        self.schemas.len() + self.tables.len() + self.definitions.len()
    }
}

/// Schema-level change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SchemaChange {
    Create {
        name: String,
        charset: Option<String>,
        collation: Option<String>,
    },
    Drop {
        name: String,
    },
    Alter {
        name: String,
        charset: Option<String>,
        collation: Option<String>,
    },
}

/// Table-level change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableChange {
    Create(TableSpec),
    Drop { schema: String, name: String },
    Alter(TableDiff),
}

impl TableChange {
    pub fn schema(&self) -> &str {
        match self {
            TableChange::Create(spec) => &spec.schema,
            TableChange::Drop { schema, .. } => schema,
            TableChange::Alter(diff) => &diff.schema,
        }
    }
}

/// A table to be created, with its references resolved to names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub schema: String,
    pub name: String,
    pub columns: Vec<Column>,
    pub indexes: Vec<IndexSpec>,
    pub foreign_keys: Vec<ForeignKeySpec>,
    pub engine: Option<String>,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub comment: String,
}

/// An index with column names instead of ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub index_type: IndexType,
    pub columns: Vec<IndexColumnSpec>,
    pub comment: String,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumnSpec {
    pub name: String,
    pub length: Option<u32>,
    pub descending: bool,
}

/// A foreign key with column and table names instead of ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub update_rule: ForeignKeyAction,
    pub delete_rule: ForeignKeyAction,
}

/// Where a column lands in the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    First,
    After(String),
}

/// Column-level change inside an ALTER TABLE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnChange {
    Add {
        column: Column,
        placement: Placement,
    },
    /// Rename, redefinition and/or move; the full definition is always emitted
    Change {
        old_name: String,
        column: Column,
        placement: Option<Placement>,
    },
    Drop {
        name: String,
    },
}

/// Table option that changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableOption {
    Engine(String),
    Charset(String),
    Collation(String),
    Comment(String),
}

/// Differences in a single table present on both sides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDiff {
    pub schema: String,
    /// Name on the server
    pub old_name: String,
    /// Name in the client catalog
    pub name: String,
    pub columns: Vec<ColumnChange>,
    pub dropped_indexes: Vec<IndexSpec>,
    pub added_indexes: Vec<IndexSpec>,
    pub dropped_foreign_keys: Vec<ForeignKeySpec>,
    pub added_foreign_keys: Vec<ForeignKeySpec>,
    pub options: Vec<TableOption>,
}

impl TableDiff {
    pub fn new(schema: impl Into<String>, old_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            old_name: old_name.into(),
            name: name.into(),
            columns: Vec::new(),
            dropped_indexes: Vec::new(),
            added_indexes: Vec::new(),
            dropped_foreign_keys: Vec::new(),
            added_foreign_keys: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn is_renamed(&self) -> bool {
        self.old_name != self.name
    }

    /// Returns true if nothing in the table changed
    pub fn is_empty(&self) -> bool {
        !self.is_renamed()
            && self.columns.is_empty()
            && self.dropped_indexes.is_empty()
            && self.added_indexes.is_empty()
            && self.dropped_foreign_keys.is_empty()
            && self.added_foreign_keys.is_empty()
            && self.options.is_empty()
    }
}

/// An object stored as its verbatim CREATE statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinedObject {
    pub object_type: LiveObjectType,
    pub schema: String,
    pub name: String,
    pub definition: String,
}

/// Change of a view, routine or trigger; these are never altered in place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefinitionChange {
    Create(DefinedObject),
    Drop(DefinedObject),
    Replace {
        old: DefinedObject,
        new: DefinedObject,
    },
}
