use livedb_core::LiveDbError;
use livedb_schema::TreeError;
use livedb_schema_tools::DiffError;
use livedb_table_designer::EditError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level errors with user-facing messages
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Selected name conflicts with existing {object_type} `{name}`.")]
    NameConflict { object_type: String, name: String },

    #[error("There are {0} syntax errors in the object definition. Please correct them and try again.")]
    SqlEditorErrors(usize),

    /// A statement of the alter script failed; earlier statements stay applied
    #[error("Statement {} of the alter script failed: {message}", .index + 1)]
    Execution {
        index: usize,
        statement: String,
        code: Option<u32>,
        message: String,
    },

    #[error("Could not reload the object from the server: {0}")]
    ReadBack(String),

    #[error("Apply was aborted after {applied} statement(s)")]
    Aborted { applied: usize },

    #[error("Object to apply was not found: {0}")]
    ObjectNotFound(String),

    #[error(transparent)]
    Core(#[from] LiveDbError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("Alter script generation failed: {0}")]
    Diff(#[from] DiffError),
}

impl ServiceError {
    /// Server error code of a failed statement or query
    pub fn server_code(&self) -> Option<u32> {
        match self {
            ServiceError::Execution { code, .. } => *code,
            ServiceError::Core(e) => e.server_code(),
            _ => None,
        }
    }
}
