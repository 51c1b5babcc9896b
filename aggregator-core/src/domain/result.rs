//! Result and error types for the core library

use thiserror::Error;

use super::migration::Version;

/// Core library error type
///
/// Driver and step errors are transparent so callers can match on the
/// underlying condition and see its message unchanged.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid target version (available version range is 0-{max})")]
    InvalidTargetVersion { target: Version, max: Version },

    #[error("current version ({current}) is outside of available migration boundaries")]
    CurrentVersionOutOfBounds { current: Version, max: Version },

    #[error("unexpected number of rows in migration info table (expected: 1, reality: {0})")]
    UnexpectedRowCount(u64),

    #[error("migration info table is empty")]
    EmptyInfoTable,

    #[error("migration info table contain multiple rows")]
    MultipleInfoRows,

    #[error("unexpected number of affected rows in migration info table (expected: 1, reality: {0})")]
    UnexpectedAffectedRows(usize),

    #[error("database is closed")]
    DatabaseClosed,

    #[error("transaction has already been committed or rolled back")]
    TransactionDone,

    #[error("transaction control is not allowed inside a migration step: {0}")]
    TransactionControl(String),

    #[error(transparent)]
    Database(#[from] duckdb::Error),

    #[error(transparent)]
    Step(anyhow::Error),

    #[error("migration lock is held by another process: {0}")]
    Lock(String),

    #[error("Missing auth token")]
    MissingToken,

    #[error("Invalid/Malformed auth token")]
    InvalidAuthHeader,

    #[error("Malformed authentication token")]
    MalformedToken,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The single authoritative version record was found in a state this
    /// library never produces. Never repaired automatically.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::CurrentVersionOutOfBounds { .. }
                | Self::UnexpectedRowCount(_)
                | Self::EmptyInfoTable
                | Self::MultipleInfoRows
                | Self::UnexpectedAffectedRows(_)
        )
    }

    /// The caller asked for something that cannot exist; nothing was touched.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidTargetVersion { .. } | Self::Config(_))
    }

    /// Identity could not be established from the request headers.
    pub fn is_forbidden(&self) -> bool {
        matches!(
            self,
            Self::MissingToken | Self::InvalidAuthHeader | Self::MalformedToken
        )
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
