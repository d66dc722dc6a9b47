//! Entry point tying registered schemas to a connection router.

use crate::db::{exec, ConnectionRouter, DbConfig, Role};
use crate::entity::Entity;
use crate::error::{ModelError, ModelResult};
use crate::model::{EntitySchema, Row, SchemaRegistry};
use crate::sql::{CompiledStatement, Params};
use log::error;
use std::sync::Arc;

/// Rows returned or affected by [`Database::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutput {
    Rows(Vec<Row>),
    Affected(usize),
    Inserted(i64),
}

/// Owns the schema registry and the connection router shared by entities.
pub struct Database {
    registry: SchemaRegistry,
    router: ConnectionRouter,
}

impl Database {
    /// Builds a database over SQLite with the default routing policy.
    pub fn open(config: DbConfig, registry: SchemaRegistry) -> ModelResult<Self> {
        Ok(Self::with_router(ConnectionRouter::new(config)?, registry))
    }

    pub fn with_router(router: ConnectionRouter, registry: SchemaRegistry) -> Self {
        Self { registry, router }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn router(&self) -> &ConnectionRouter {
        &self.router
    }

    /// Looks up a registered schema.
    pub fn schema(&self, identifier: &str) -> ModelResult<Arc<EntitySchema>> {
        self.registry.require(identifier)
    }

    /// Creates an empty entity for the schema registered as `identifier`.
    pub fn entity(&self, identifier: &str) -> ModelResult<Entity<'_>> {
        Ok(Entity::new(self, self.schema(identifier)?))
    }

    /// Runs a batch of statements (DDL, seeding) with `role` credentials.
    pub fn execute_batch(&self, role: Role, sql: &str) -> ModelResult<()> {
        let handle = self.router.acquire(role)?;
        handle
            .with_connection(|conn| conn.execute_batch(sql))
            .map_err(|err| {
                error!(
                    "event=execute_batch module=database status=error role={} error={}",
                    role, err
                );
                ModelError::from(err)
            })
    }

    /// Runs one statement with `role` credentials.
    ///
    /// `Select` returns rows, `Insert` the new rowid, other roles the number
    /// of affected rows.
    pub fn run(&self, role: Role, sql: &str, params: Params) -> ModelResult<RunOutput> {
        let statement = CompiledStatement::new(sql, params);
        statement.validate()?;
        let handle = self.router.acquire(role)?;
        let output = handle.with_connection(|conn| match role {
            Role::Select => exec::fetch_all(conn, &statement).map(RunOutput::Rows),
            Role::Insert => exec::execute(conn, &statement)
                .map(|outcome| RunOutput::Inserted(outcome.last_insert_id)),
            Role::Root | Role::Update | Role::Delete => exec::execute(conn, &statement)
                .map(|outcome| RunOutput::Affected(outcome.rows_affected)),
        })?;
        Ok(output)
    }
}
