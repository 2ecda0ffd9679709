//! Crate-wide error type.
//!
//! Read-side analysis prefers partial results, so most store failures are
//! caught close to where they happen. The variants here cover what still
//! has to reach the caller: unknown repositories, genuine write failures,
//! and bad configuration.

use thiserror::Error;

/// Errors surfaced by the crossgraph library.
#[derive(Debug, Error)]
pub enum CrossGraphError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl CrossGraphError {
    /// Whether this error is a duplicate-key violation raised by a unique
    /// index or primary key.
    ///
    /// Concurrent re-analysis of the same repository races on upserts; the
    /// loser sees this condition and must re-read the existing row.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            CrossGraphError::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.extended_code,
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            ),
            _ => false,
        }
    }
}

impl From<serde_yaml::Error> for CrossGraphError {
    fn from(e: serde_yaml::Error) -> Self {
        CrossGraphError::Config(e.to_string())
    }
}

impl From<regex::Error> for CrossGraphError {
    fn from(e: regex::Error) -> Self {
        CrossGraphError::Config(format!("bad pattern: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, CrossGraphError>;
