//! Error types for table editing

use livedb_core::LiveDbError;
use thiserror::Error;

/// A rejected table edit. The catalog is left as it was before the edit.
#[derive(Error, Debug)]
pub enum EditError {
    #[error("Changes are being applied to the server, editing is disabled")]
    Applying,

    #[error("The edited object is not a table in the client catalog")]
    TableNotFound,

    #[error("Row {0} is out of range")]
    RowOutOfRange(usize),

    #[error("Object {0} does not exist in the table")]
    UnknownObject(String),

    #[error("An object named '{0}' already exists")]
    DuplicateName(String),

    #[error("{text} is not a valid column type: {message}")]
    InvalidType { text: String, message: String },

    #[error("Flag {flag} is not valid for datatype {datatype}")]
    InvalidFlag { flag: String, datatype: String },

    #[error("Primary key column '{0}' can't be NULL")]
    PrimaryKeyNullable(String),

    #[error("Cannot add Index on empty table, add some columns first")]
    EmptyTableIndex,

    #[error("Cannot add FK on empty table, add some columns first")]
    EmptyTableForeignKey,

    #[error("The PRIMARY index is maintained through the column primary key markers")]
    PrimaryIndexReadOnly,

    #[error("Index type {0} can't be set")]
    InvalidIndexType(String),

    #[error("Index '{index}' is used by foreign key '{foreign_key}'")]
    IndexUsedByForeignKey { index: String, foreign_key: String },

    #[error("Referenced table {schema}.{table} not found")]
    ReferencedTableNotFound { schema: String, table: String },

    #[error("Could not load referenced table {schema}.{table}: {message}")]
    StubExpansion {
        schema: String,
        table: String,
        message: String,
    },

    #[error("Foreign key '{0}' has no referenced table")]
    NoReferencedTable(String),

    #[error("Referenced table has no candidate columns with a compatible type for {table}.{column}")]
    NoReferenceCandidate { table: String, column: String },

    #[error(
        "Selected column {0} must be indexed and be of a compatible type for a Foreign Key to be created."
    )]
    IncompatibleReferencedColumn(String),

    #[error("The change was reverted")]
    Declined,

    #[error("Field {0} is read-only")]
    ReadOnlyField(&'static str),

    #[error("Invalid value '{value}' for {field}")]
    InvalidValue { field: &'static str, value: String },

    #[error(transparent)]
    Core(LiveDbError),
}

impl From<LiveDbError> for EditError {
    fn from(error: LiveDbError) -> Self {
        match error {
            LiveDbError::InvalidState(_) => EditError::Applying,
            other => EditError::Core(other),
        }
    }
}

/// Result type alias for table edits
pub type EditResult<T> = std::result::Result<T, EditError>;
