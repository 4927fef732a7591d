//! Error types for LiveDB

use thiserror::Error;

/// Core error type for LiveDB operations
#[derive(Error, Debug)]
pub enum LiveDbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    /// An error reported by the server, with its native error code
    #[error("Error Code: {code}. {message}")]
    Server { code: u32, message: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid edit state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid options file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl LiveDbError {
    /// Server error code, when the error came from the server
    pub fn server_code(&self) -> Option<u32> {
        match self {
            LiveDbError::Server { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type alias for LiveDB operations
pub type Result<T> = std::result::Result<T, LiveDbError>;
