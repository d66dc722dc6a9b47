//! Active-Record data access over SQLite.
//!
//! Schemas are registered once in a [`SchemaRegistry`]; a [`Database`] pairs
//! them with a role-aware [`ConnectionRouter`] and hands out [`Entity`]
//! values that load, mutate and persist rows.

pub mod database;
pub mod db;
pub mod entity;
pub mod error;
pub mod logging;
pub mod model;
pub mod sql;

pub use database::{Database, RunOutput};
pub use db::{
    ConnectionRouter, Connector, Credentials, DbConfig, DbError, DbResult, ExecutableHandle,
    Role, RoutingPolicy, SqliteConnector,
};
pub use entity::{Attribute, EagerLoading, Entity, FetchMode, Relation, SaveOutcome};
pub use error::{CapturedError, ErrorKind, ModelError, ModelResult};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings, LoggingError};
pub use model::{
    ColumnOptions, ColumnSpec, ColumnType, EntitySchema, ForeignRef, Record, Row, SchemaBuilder,
    SchemaRegistry, Value,
};
pub use sql::{CompiledStatement, Params, SelectSpec};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
