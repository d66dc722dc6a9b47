//! Connection configuration, routing, and statement execution.
//!
//! # Responsibility
//! - Describe how to reach the database (`DbConfig`) and with which
//!   credentials per operation role.
//! - Cache executable handles per role and hand them out scoped.
//! - Run compiled statements against a SQLite connection.
//!
//! # Invariants
//! - Passwords and bound parameter values are never written to logs.
//! - Handle use is closure-scoped; the connection lock is released on every
//!   exit path.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod config;
pub mod exec;
mod router;

pub use config::{Credentials, DbConfig, Role};
pub use router::{
    ConnectionRouter, Connector, ExecutableHandle, RoutingPolicy, SqliteConnector,
};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Config(serde_json::Error),
    Io(std::io::Error),
    MissingCredentials { role: Role },
    UnsupportedDriver(String),
    InvalidOption(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "invalid connection config: {err}"),
            Self::Io(err) => write!(f, "failed to read connection config: {err}"),
            Self::MissingCredentials { role } => write!(
                f,
                "no credentials for role `{role}` and no `root`/`default` fallback"
            ),
            Self::UnsupportedDriver(driver) => {
                write!(f, "driver `{driver}` is not supported; expected `sqlite`")
            }
            Self::InvalidOption(key) => write!(f, "invalid connection option `{key}`"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::MissingCredentials { .. } => None,
            Self::UnsupportedDriver(_) => None,
            Self::InvalidOption(_) => None,
        }
    }
}

impl DbError {
    /// Returns SQLite's extended result code when the failure came from the
    /// driver.
    pub fn sql_state(&self) -> Option<i32> {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => Some(err.extended_code),
            Self::Sqlite(rusqlite::Error::SqlInputError { error, .. }) => {
                Some(error.extended_code)
            }
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for DbError {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value)
    }
}

impl From<std::io::Error> for DbError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[cfg(test)]
mod tests {
    use super::DbError;
    use rusqlite::Connection;

    #[test]
    fn prepare_failures_carry_an_extended_code() {
        let conn = Connection::open_in_memory().unwrap();
        let err = DbError::from(conn.prepare("SELECT missing_column").unwrap_err());
        assert_eq!(err.sql_state(), Some(rusqlite::ffi::SQLITE_ERROR));
    }

    #[test]
    fn step_failures_carry_an_extended_code() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL);")
            .unwrap();
        let err = DbError::from(
            conn.execute("INSERT INTO t (name) VALUES (NULL)", [])
                .unwrap_err(),
        );
        assert_eq!(
            err.sql_state(),
            Some(rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL)
        );
    }

    #[test]
    fn non_driver_errors_have_no_code() {
        let err = DbError::InvalidOption("dbname".to_string());
        assert_eq!(err.sql_state(), None);
    }
}
