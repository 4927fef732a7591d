//! Catalog snapshot model
//!
//! A `Catalog` is a full in-memory copy of one side of a comparison: the
//! client state being edited, or the server state used as the diff
//! baseline. Objects carry a stable [`ObjectId`] so that a renamed object is
//! still matched to its server-side counterpart, and an `old_name` holding
//! the name the object has on the server (empty until it is first created).
//!
//! References that cross ownership (a foreign key's referenced table and
//! columns, an index's columns) are stored as ids and resolved on demand.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{ColumnType, SimpleDatatype, UserDatatype, mysql_simple_datatypes, mysql_user_datatypes};

/// Stable identity of a catalog object, preserved across renames and snapshot copies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of object that can be live-edited and applied to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiveObjectType {
    Schema,
    Table,
    View,
    Procedure,
    Function,
    Trigger,
}

impl LiveObjectType {
    /// Lower-case name used in user-facing messages
    pub fn display_name(&self) -> &'static str {
        match self {
            LiveObjectType::Schema => "schema",
            LiveObjectType::Table => "table",
            LiveObjectType::View => "view",
            LiveObjectType::Procedure => "procedure",
            LiveObjectType::Function => "function",
            LiveObjectType::Trigger => "trigger",
        }
    }

    /// Keyword used in `SHOW CREATE <keyword>` and `DROP <keyword>`
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            LiveObjectType::Schema => "SCHEMA",
            LiveObjectType::Table => "TABLE",
            LiveObjectType::View => "VIEW",
            LiveObjectType::Procedure => "PROCEDURE",
            LiveObjectType::Function => "FUNCTION",
            LiveObjectType::Trigger => "TRIGGER",
        }
    }
}

/// Foreign key referential action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    #[default]
    Restrict,
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
}

impl ForeignKeyAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
        }
    }
}

impl FromStr for ForeignKeyAction {
    type Err = crate::LiveDbError;

    /// Parse a rule as written in DDL; an empty rule means RESTRICT
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        match normalized.as_str() {
            "" | "RESTRICT" => Ok(ForeignKeyAction::Restrict),
            "NO ACTION" => Ok(ForeignKeyAction::NoAction),
            "CASCADE" => Ok(ForeignKeyAction::Cascade),
            "SET NULL" => Ok(ForeignKeyAction::SetNull),
            "SET DEFAULT" => Ok(ForeignKeyAction::SetDefault),
            other => Err(crate::LiveDbError::Parse(format!(
                "unknown referential action '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ForeignKeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Index kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IndexType {
    Primary,
    Unique,
    #[default]
    Index,
    Fulltext,
    Spatial,
}

impl IndexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::Primary => "PRIMARY",
            IndexType::Unique => "UNIQUE",
            IndexType::Index => "INDEX",
            IndexType::Fulltext => "FULLTEXT",
            IndexType::Spatial => "SPATIAL",
        }
    }
}

impl FromStr for IndexType {
    type Err = crate::LiveDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PRIMARY" | "PRIMARY KEY" => Ok(IndexType::Primary),
            "UNIQUE" | "UNIQUE KEY" => Ok(IndexType::Unique),
            "INDEX" | "KEY" => Ok(IndexType::Index),
            "FULLTEXT" => Ok(IndexType::Fulltext),
            "SPATIAL" => Ok(IndexType::Spatial),
            other => Err(crate::LiveDbError::Parse(format!(
                "unknown index type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routine kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoutineType {
    Procedure,
    Function,
}

impl RoutineType {
    pub fn object_type(&self) -> LiveObjectType {
        match self {
            RoutineType::Procedure => LiveObjectType::Procedure,
            RoutineType::Function => LiveObjectType::Function,
        }
    }
}

/// Column of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ObjectId,
    pub name: String,
    pub old_name: String,
    /// `None` until a type has been assigned
    pub datatype: Option<ColumnType>,
    /// Type flags such as UNSIGNED, ZEROFILL, BINARY
    pub flags: Vec<String>,
    pub is_not_null: bool,
    pub auto_increment: bool,
    /// Default expression as written in DDL; `Some("NULL")` is an explicit NULL default
    pub default_value: Option<String>,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub comment: String,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            old_name: String::new(),
            datatype: None,
            flags: Vec::new(),
            is_not_null: false,
            auto_increment: false,
            default_value: None,
            charset: None,
            collation: None,
            comment: String::new(),
        }
    }

    pub fn with_type(mut self, datatype: ColumnType) -> Self {
        self.datatype = Some(datatype);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.is_not_null = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case(flag))
    }

    /// Set or clear a type flag; returns whether the flag set changed
    pub fn set_flag(&mut self, flag: &str, enabled: bool) -> bool {
        let present = self.has_flag(flag);
        if enabled && !present {
            self.flags.push(flag.to_uppercase());
            true
        } else if !enabled && present {
            self.flags.retain(|f| !f.eq_ignore_ascii_case(flag));
            true
        } else {
            false
        }
    }

    /// Whether the default is an explicit `NULL`
    pub fn default_is_null(&self) -> bool {
        self.default_value
            .as_deref()
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("NULL"))
    }

    /// Type as written in DDL, including flags (e.g. `INT UNSIGNED`)
    pub fn formatted_type(&self) -> String {
        let mut text = self
            .datatype
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_default();
        for flag in &self.flags {
            text.push(' ');
            text.push_str(flag);
        }
        text
    }
}

/// A column entry of an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub column: ObjectId,
    pub length: Option<u32>,
    pub descending: bool,
}

impl IndexColumn {
    pub fn new(column: ObjectId) -> Self {
        Self {
            column,
            length: None,
            descending: false,
        }
    }
}

/// Index of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub id: ObjectId,
    pub name: String,
    pub old_name: String,
    pub index_type: IndexType,
    pub columns: Vec<IndexColumn>,
    pub comment: String,
    pub visible: bool,
}

impl Index {
    pub fn new(name: impl Into<String>, index_type: IndexType) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            old_name: String::new(),
            index_type,
            columns: Vec::new(),
            comment: String::new(),
            visible: true,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.index_type == IndexType::Primary
    }

    pub fn is_unique(&self) -> bool {
        matches!(self.index_type, IndexType::Primary | IndexType::Unique)
    }

    pub fn contains_column(&self, column: ObjectId) -> bool {
        self.columns.iter().any(|c| c.column == column)
    }

    pub fn column_ids(&self) -> Vec<ObjectId> {
        self.columns.iter().map(|c| c.column).collect()
    }
}

/// Non-owning reference to a table, by id with cached names for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub id: ObjectId,
    pub schema: String,
    pub name: String,
}

/// Foreign key of a table.
///
/// `columns[i]` references `referenced_columns[i]`; both lists always have
/// the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub id: ObjectId,
    pub name: String,
    pub old_name: String,
    pub columns: Vec<ObjectId>,
    pub referenced_table: Option<TableRef>,
    pub referenced_columns: Vec<ObjectId>,
    pub update_rule: ForeignKeyAction,
    pub delete_rule: ForeignKeyAction,
    /// Backing index maintained automatically
    pub index: Option<ObjectId>,
    pub mandatory: bool,
}

impl ForeignKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            old_name: String::new(),
            columns: Vec::new(),
            referenced_table: None,
            referenced_columns: Vec::new(),
            update_rule: ForeignKeyAction::default(),
            delete_rule: ForeignKeyAction::default(),
            index: None,
            mandatory: false,
        }
    }
}

/// Trigger attached to a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: ObjectId,
    pub name: String,
    pub old_name: String,
    /// INSERT, UPDATE or DELETE
    pub event: String,
    /// BEFORE or AFTER
    pub timing: String,
    /// Full `CREATE TRIGGER` statement
    pub definition: String,
}

impl Trigger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            old_name: String::new(),
            event: String::new(),
            timing: String::new(),
            definition: String::new(),
        }
    }
}

/// Table with its columns, indexes, foreign keys and triggers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: ObjectId,
    pub name: String,
    pub old_name: String,
    pub columns: Vec<Column>,
    pub indices: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
    pub triggers: Vec<Trigger>,
    pub engine: Option<String>,
    pub default_charset: Option<String>,
    pub default_collation: Option<String>,
    pub comment: String,
    /// Placeholder created for a reference to a table that was not loaded
    pub is_stub: bool,
    /// Set once a stub's real definition has been fetched and parsed
    pub is_stub_expanded: bool,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            old_name: String::new(),
            columns: Vec::new(),
            indices: Vec::new(),
            foreign_keys: Vec::new(),
            triggers: Vec::new(),
            engine: None,
            default_charset: None,
            default_collation: None,
            comment: String::new(),
            is_stub: false,
            is_stub_expanded: false,
        }
    }

    /// A placeholder table for an object known only by name
    pub fn stub(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            old_name: name.clone(),
            is_stub: true,
            ..Self::new(name)
        }
    }

    /// Drop every sub-object, keeping identity and names
    pub fn reset_to_stub(&mut self) {
        self.columns.clear();
        self.indices.clear();
        self.foreign_keys.clear();
        self.triggers.clear();
        self.engine = None;
        self.default_charset = None;
        self.default_collation = None;
        self.comment.clear();
    }

    // ========== Columns ==========

    pub fn column(&self, id: ObjectId) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn column_mut(&mut self, id: ObjectId) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.id == id)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_position(&self, id: ObjectId) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    /// Column name for an id, empty when the id is dangling
    pub fn column_name(&self, id: ObjectId) -> &str {
        self.column(id).map(|c| c.name.as_str()).unwrap_or("")
    }

    // ========== Indexes ==========

    pub fn index(&self, id: ObjectId) -> Option<&Index> {
        self.indices.iter().find(|i| i.id == id)
    }

    pub fn index_mut(&mut self, id: ObjectId) -> Option<&mut Index> {
        self.indices.iter_mut().find(|i| i.id == id)
    }

    pub fn index_by_name(&self, name: &str) -> Option<&Index> {
        self.indices.iter().find(|i| i.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_key(&self) -> Option<&Index> {
        self.indices.iter().find(|i| i.is_primary())
    }

    pub fn primary_key_mut(&mut self) -> Option<&mut Index> {
        self.indices.iter_mut().find(|i| i.is_primary())
    }

    pub fn is_primary_key_column(&self, column: ObjectId) -> bool {
        self.primary_key().is_some_and(|pk| pk.contains_column(column))
    }

    /// Whether the column is part of any index
    pub fn is_indexed_column(&self, column: ObjectId) -> bool {
        self.indices.iter().any(|i| i.contains_column(column))
    }

    /// Mark a column as primary key, creating the PRIMARY index if needed.
    ///
    /// PK columns are NOT NULL. Returns false when the column was already
    /// part of the key or does not exist.
    pub fn add_primary_key_column(&mut self, column: ObjectId) -> bool {
        let Some(col) = self.column_mut(column) else {
            return false;
        };
        col.is_not_null = true;

        if self.primary_key().is_none() {
            self.indices.push(Index::new("PRIMARY", IndexType::Primary));
        }
        let Some(pk) = self.primary_key_mut() else {
            return false;
        };
        if pk.contains_column(column) {
            return false;
        }
        pk.columns.push(IndexColumn::new(column));
        self.update_primary_index_order();
        true
    }

    /// Unmark a PK column; the PRIMARY index is removed once it has no columns
    pub fn remove_primary_key_column(&mut self, column: ObjectId) -> bool {
        let Some(pk) = self.primary_key_mut() else {
            return false;
        };
        let before = pk.columns.len();
        pk.columns.retain(|c| c.column != column);
        let removed = pk.columns.len() != before;
        if pk.columns.is_empty() {
            self.indices.retain(|i| !i.is_primary());
        }
        removed
    }

    /// Keep PRIMARY index columns in table column order
    pub fn update_primary_index_order(&mut self) {
        let order: Vec<ObjectId> = self.columns.iter().map(|c| c.id).collect();
        if let Some(pk) = self.indices.iter_mut().find(|i| i.is_primary()) {
            pk.columns.sort_by_key(|c| {
                order
                    .iter()
                    .position(|id| *id == c.column)
                    .unwrap_or(usize::MAX)
            });
        }
    }

    // ========== Foreign Keys ==========

    pub fn foreign_key(&self, id: ObjectId) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.id == id)
    }

    pub fn foreign_key_mut(&mut self, id: ObjectId) -> Option<&mut ForeignKey> {
        self.foreign_keys.iter_mut().find(|fk| fk.id == id)
    }

    pub fn foreign_key_by_name(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys
            .iter()
            .find(|fk| fk.name.eq_ignore_ascii_case(name))
    }

    // ========== Triggers ==========

    pub fn trigger(&self, id: ObjectId) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.id == id)
    }

    /// Advance `old_name` of the table and all sub-objects to their current names
    pub fn mark_applied(&mut self) {
        self.old_name = self.name.clone();
        for column in &mut self.columns {
            column.old_name = column.name.clone();
        }
        for index in &mut self.indices {
            index.old_name = index.name.clone();
        }
        for fk in &mut self.foreign_keys {
            fk.old_name = fk.name.clone();
        }
        for trigger in &mut self.triggers {
            trigger.old_name = trigger.name.clone();
        }
    }
}

/// View; the definition is the full `CREATE VIEW` statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub id: ObjectId,
    pub name: String,
    pub old_name: String,
    pub definition: String,
}

impl View {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            old_name: String::new(),
            definition: definition.into(),
        }
    }
}

/// Stored procedure or function; the definition is the full `CREATE` statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub id: ObjectId,
    pub name: String,
    pub old_name: String,
    pub routine_type: RoutineType,
    pub definition: String,
}

impl Routine {
    pub fn new(
        name: impl Into<String>,
        routine_type: RoutineType,
        definition: impl Into<String>,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            old_name: String::new(),
            routine_type,
            definition: definition.into(),
        }
    }
}

/// Schema (database)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub id: ObjectId,
    pub name: String,
    pub old_name: String,
    pub default_charset: Option<String>,
    pub default_collation: Option<String>,
    pub tables: Vec<Table>,
    pub views: Vec<View>,
    pub routines: Vec<Routine>,
    /// Placeholder created to hold stub tables
    pub is_stub: bool,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            old_name: String::new(),
            default_charset: None,
            default_collation: None,
            tables: Vec::new(),
            views: Vec::new(),
            routines: Vec::new(),
            is_stub: false,
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    pub fn table_by_id(&self, id: ObjectId) -> Option<&Table> {
        self.tables.iter().find(|t| t.id == id)
    }

    pub fn table_by_id_mut(&mut self, id: ObjectId) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.id == id)
    }

    pub fn view(&self, name: &str) -> Option<&View> {
        self.views.iter().find(|v| v.name == name)
    }

    pub fn routine(&self, name: &str, routine_type: RoutineType) -> Option<&Routine> {
        self.routines
            .iter()
            .find(|r| r.name == name && r.routine_type == routine_type)
    }
}

/// Full in-memory catalog snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub schemata: Vec<Schema>,
    pub simple_datatypes: Vec<SimpleDatatype>,
    pub user_datatypes: Vec<UserDatatype>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// An empty catalog with the MySQL datatype registry loaded
    pub fn new() -> Self {
        Self {
            schemata: Vec::new(),
            simple_datatypes: mysql_simple_datatypes(),
            user_datatypes: mysql_user_datatypes(),
        }
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemata.iter().find(|s| s.name == name)
    }

    pub fn schema_mut(&mut self, name: &str) -> Option<&mut Schema> {
        self.schemata.iter_mut().find(|s| s.name == name)
    }

    pub fn schema_by_id(&self, id: ObjectId) -> Option<&Schema> {
        self.schemata.iter().find(|s| s.id == id)
    }

    pub fn schema_by_id_mut(&mut self, id: ObjectId) -> Option<&mut Schema> {
        self.schemata.iter_mut().find(|s| s.id == id)
    }

    /// Get a schema by name, creating a stub schema when it is missing
    pub fn ensure_schema(&mut self, name: &str) -> &mut Schema {
        let position = match self.schemata.iter().position(|s| s.name == name) {
            Some(position) => position,
            None => {
                let mut schema = Schema::new(name);
                schema.old_name = name.to_string();
                schema.is_stub = true;
                self.schemata.push(schema);
                self.schemata.len() - 1
            }
        };
        &mut self.schemata[position]
    }

    pub fn table(&self, schema: &str, name: &str) -> Option<&Table> {
        self.schema(schema).and_then(|s| s.table(name))
    }

    pub fn table_mut(&mut self, schema: &str, name: &str) -> Option<&mut Table> {
        self.schema_mut(schema).and_then(|s| s.table_mut(name))
    }

    /// Find a table anywhere in the catalog, returning its schema too
    pub fn find_table(&self, id: ObjectId) -> Option<(&Schema, &Table)> {
        self.schemata
            .iter()
            .find_map(|s| s.table_by_id(id).map(|t| (s, t)))
    }

    pub fn find_table_mut(&mut self, id: ObjectId) -> Option<&mut Table> {
        self.schemata
            .iter_mut()
            .find_map(|s| s.table_by_id_mut(id))
    }

    /// Reference to a table suitable for storing in a foreign key
    pub fn table_ref(&self, id: ObjectId) -> Option<TableRef> {
        self.find_table(id).map(|(schema, table)| TableRef {
            id,
            schema: schema.name.clone(),
            name: table.name.clone(),
        })
    }

    /// Look up a simple datatype by name or synonym
    pub fn simple_datatype(&self, name: &str) -> Option<&SimpleDatatype> {
        self.simple_datatypes.iter().find(|t| t.matches(name))
    }

    pub fn user_datatype(&self, name: &str) -> Option<&UserDatatype> {
        self.user_datatypes
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Registry entry for a column's simple type, if it has one
    pub fn column_datatype(&self, column: &Column) -> Option<&SimpleDatatype> {
        match &column.datatype {
            Some(ColumnType::Simple(simple)) => self.simple_datatype(&simple.name),
            _ => None,
        }
    }
}
