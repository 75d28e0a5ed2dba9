//! Error types for pv-db

use thiserror::Error;

/// Remote database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Transport-level failure: DNS, TLS, timeout, connection reset (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// The named remote procedure does not exist (D002)
    #[error("[D002] Remote procedure not found: {name}")]
    ProcedureNotFound { name: String },

    /// Table not exposed by the data API (D003)
    #[error("[D003] Table not found: {0}")]
    TableNotFound(String),

    /// The remote side rejected the request (D004)
    #[error("[D004] Remote error{}: {message}", code_suffix(.code))]
    Remote {
        code: Option<String>,
        message: String,
    },

    /// Response body could not be decoded (D005)
    #[error("[D005] Invalid response from database: {0}")]
    InvalidResponse(String),

    /// Backend cannot be constructed from the given settings (D006)
    #[error("[D006] Database backend not configured: {0}")]
    NotConfigured(String),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" {}", c)).unwrap_or_default()
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// Remote error code (SQLSTATE or gateway code), when one was reported
    pub fn code(&self) -> Option<&str> {
        match self {
            DbError::Remote { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether the error means the SQL procedure itself is missing
    pub fn is_procedure_missing(&self) -> bool {
        matches!(self, DbError::ProcedureNotFound { .. })
    }

    /// Whether retrying the same request could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::ConnectionError(_))
    }
}

impl From<reqwest::Error> for DbError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DbError::InvalidResponse(err.to_string())
        } else {
            DbError::ConnectionError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::InvalidResponse(err.to_string())
    }
}
