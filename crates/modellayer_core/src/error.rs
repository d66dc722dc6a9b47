//! Engine error taxonomy and the per-entity captured error.
//!
//! # Invariants
//! - Configuration, validation and usage errors describe caller mistakes and
//!   are raised before anything executes.
//! - Execution errors wrap the driver failure unchanged.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug)]
pub enum ModelError {
    /// Invalid schema, join usage, foreign target or statement shape.
    Configuration(String),
    /// A non-nullable column was empty at insert/update time.
    Validation { column: String },
    /// An operation was called in a state that does not allow it.
    Usage(String),
    /// The executor failed to connect, prepare or execute.
    Execution(DbError),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "configuration error: {message}"),
            Self::Validation { column } => write!(f, "the `{column}` column cannot be empty"),
            Self::Usage(message) => write!(f, "usage error: {message}"),
            Self::Execution(err) => write!(f, "execution error: {err}"),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Execution(err) => Some(err),
            Self::Configuration(_) | Self::Validation { .. } | Self::Usage(_) => None,
        }
    }
}

impl From<DbError> for ModelError {
    fn from(value: DbError) -> Self {
        Self::Execution(value)
    }
}

impl From<rusqlite::Error> for ModelError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Execution(DbError::Sqlite(value))
    }
}

impl ModelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Usage(_) => ErrorKind::Usage,
            Self::Execution(_) => ErrorKind::Execution,
        }
    }

    pub fn sql_state(&self) -> Option<i32> {
        match self {
            Self::Execution(err) => err.sql_state(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Usage,
    Execution,
}

/// Snapshot of the last failure an entity observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedError {
    pub kind: ErrorKind,
    pub message: String,
    pub sql_state: Option<i32>,
}

impl From<&ModelError> for CapturedError {
    fn from(value: &ModelError) -> Self {
        Self {
            kind: value.kind(),
            message: value.to_string(),
            sql_state: value.sql_state(),
        }
    }
}

impl Display for CapturedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
