//! Fluent query chain on an entity.
//!
//! Calls append to the entity's query buffer in order; `find` and `query`
//! start over. Callers own clause ordering.

use super::Entity;
use crate::error::{ModelError, ModelResult};
use crate::model::{EntitySchema, Record};
use crate::sql::{Clause, CompiledStatement, JoinKind, Params};
use log::debug;
use std::fmt::Display;
use std::sync::Arc;

/// How many rows a terminal operation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    #[default]
    All,
    One,
}

impl<'db> Entity<'db> {
    /// Starts a SELECT over this entity's table. An explicit projection
    /// without the primary key gets `<table>.<pk>` prefixed.
    pub fn find(&mut self, columns: &str) -> &mut Self {
        let columns = self.projection(columns, true);
        self.buffer.reset(Clause::Select {
            columns,
            table: self.schema.table().to_string(),
        });
        self.join_target = None;
        self
    }

    fn join(&mut self, kind: JoinKind, target: &Arc<EntitySchema>) -> &mut Self {
        self.buffer.push(Clause::Join {
            kind,
            table: target.table().to_string(),
        });
        self.join_target = Some(Arc::clone(target));
        self
    }

    pub fn inner_join(&mut self, target: &Arc<EntitySchema>) -> &mut Self {
        self.join(JoinKind::Inner, target)
    }

    pub fn left_join(&mut self, target: &Arc<EntitySchema>) -> &mut Self {
        self.join(JoinKind::Left, target)
    }

    pub fn right_join(&mut self, target: &Arc<EntitySchema>) -> &mut Self {
        self.join(JoinKind::Right, target)
    }

    /// Appends `ON <table>.<pk> = <joined>.<column>` for the pending join.
    ///
    /// # Errors
    /// - `Configuration` without a preceding join, or when `column` is not a
    ///   column of the joined schema.
    pub fn on(&mut self, column: &str) -> ModelResult<&mut Self> {
        let Some(target) = self.join_target.clone() else {
            return self.fail(ModelError::Configuration(
                "an ON clause must follow a JOIN".to_string(),
            ));
        };
        if !target.has_column(column) {
            return self.fail(ModelError::Configuration(format!(
                "foreign key `{column}` does not belong to entity `{}`",
                target.table()
            )));
        }
        self.buffer.push(Clause::On {
            left: format!("{}.{}", self.schema.table(), self.schema.primary_key()),
            right: format!("{}.{column}", target.table()),
        });
        Ok(self)
    }

    /// Appends `WHERE <conditions>` and binds `params`.
    pub fn r#where(&mut self, conditions: &str, params: Params) -> &mut Self {
        self.buffer.push(Clause::Where(conditions.to_string()));
        self.buffer.bind(params);
        self
    }

    pub fn group(&mut self, group: &str) -> &mut Self {
        self.buffer.push(Clause::GroupBy(group.to_string()));
        self
    }

    pub fn order(&mut self, order: &str) -> &mut Self {
        self.buffer.push(Clause::OrderBy(order.to_string()));
        self
    }

    pub fn limit(&mut self, limit: impl Display) -> &mut Self {
        self.buffer.push(Clause::Limit(limit.to_string()));
        self
    }

    pub fn offset(&mut self, offset: impl Display) -> &mut Self {
        self.buffer.push(Clause::Offset(offset.to_string()));
        self
    }

    /// Replaces the buffer with caller-supplied SQL and parameters.
    pub fn query(&mut self, sql: &str, params: Params) -> &mut Self {
        self.buffer.reset(Clause::Raw(sql.to_string()));
        self.buffer.bind(params);
        self.join_target = None;
        self
    }

    /// SQL text of the pending chain.
    pub fn query_string(&self) -> String {
        self.buffer.render()
    }

    fn pending_statement(&mut self) -> ModelResult<CompiledStatement> {
        if self.buffer.is_empty() {
            return self.fail(ModelError::Usage(
                "nothing to fetch; start the chain with find() or query()".to_string(),
            ));
        }
        Ok(self.buffer.compile())
    }

    /// Runs the pending chain, loads the result into the record and resolves
    /// foreign references.
    pub fn fetch(&mut self, mode: FetchMode) -> ModelResult<&mut Self> {
        self.fetch_with(mode, true)
    }

    pub(super) fn fetch_with(&mut self, mode: FetchMode, resolve: bool) -> ModelResult<&mut Self> {
        let statement = self.pending_statement()?;
        let record = self.execute_query(statement, mode)?;
        self.record = record;
        self.relations.clear();
        if resolve {
            self.resolve_relations()?;
        }
        debug!(
            "event=entity_fetch module=entity status=ok table={} mode={:?} rows={} relations={}",
            self.schema.table(),
            mode,
            self.record.len(),
            self.relations.iter().map(|row| row.len()).sum::<usize>()
        );
        Ok(self)
    }

    /// Runs the pending chain and returns the rows without touching the
    /// record.
    pub fn fetch_get(&mut self, mode: FetchMode) -> ModelResult<Record> {
        let statement = self.pending_statement()?;
        self.execute_query(statement, mode)
    }
}
