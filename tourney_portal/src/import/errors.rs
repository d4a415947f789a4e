//! Import error types.

use thiserror::Error;

/// Errors that abort a whole import
///
/// Problems confined to a single row are reported as
/// [`RowError`](super::RowError)s instead.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("File is not valid UTF-8")]
    InvalidEncoding,

    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),

    #[error("Unknown import format: {0}")]
    UnknownFormat(String),

    #[error("Tournament not found: {0}")]
    TournamentNotFound(i64),

    #[error("File is for tournament {found:?}, expected {expected:?}")]
    TournamentMismatch { expected: String, found: String },

    #[error("Registrations cannot be imported into a completed tournament")]
    TournamentCompleted,

    #[error("This file has already been imported")]
    DuplicateImport,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Audit error: {0}")]
    Audit(#[from] crate::audit::AuditError),
}

impl ImportError {
    /// Client-safe message
    pub fn client_message(&self) -> String {
        match self {
            ImportError::Database(_) | ImportError::Audit(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

pub type ImportResult<T> = Result<T, ImportError>;
