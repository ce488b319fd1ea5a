//! Error types for the knowledge base, editor and storage layers

use thiserror::Error;

/// Errors raised by mutating or loading operations.
///
/// Parsing and searching never produce errors: unknown rows are skipped and
/// unresolvable filters simply do not match.
#[derive(Debug, Error)]
pub enum Error {
    /// Parent or target entity does not exist
    #[error("{kind} with id {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// User-supplied field value rejected before any mutation
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Spreadsheet could not be opened or converted to rows
    #[error("sheet error: {0}")]
    Sheet(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound { kind, id: id.into() }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
