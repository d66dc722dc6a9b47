//! CRUD primitives and the record-level helpers built on them.

use super::query::FetchMode;
use super::Entity;
use crate::db::exec::{self, WriteOutcome};
use crate::db::Role;
use crate::error::{ModelError, ModelResult};
use crate::model::{Record, Row, Value};
use crate::sql::{
    compile_delete, compile_insert, compile_select, compile_update, current_timestamp,
    ColumnInput, CompiledStatement, Params, SelectSpec,
};
use log::{debug, error};
use std::time::Instant;

/// What [`Entity::save`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new row was inserted with this rowid.
    Inserted(i64),
    /// The row identified by the primary key was updated.
    Updated(usize),
}

impl<'db> Entity<'db> {
    /// Runs a compiled SELECT on a select-role handle.
    pub(super) fn execute_query(
        &mut self,
        statement: CompiledStatement,
        mode: FetchMode,
    ) -> ModelResult<Record> {
        let started_at = Instant::now();
        let result = self.run_statement(Role::Select, statement, |handle, statement| {
            handle
                .with_connection(|conn| match mode {
                    FetchMode::All => exec::fetch_all(conn, statement).map(Record::Set),
                    FetchMode::One => exec::fetch_one(conn, statement).map(Record::from),
                })
                .map_err(ModelError::from)
        });

        match &result {
            Ok(record) => {
                self.row_count = Some(record.len());
                debug!(
                    "event=entity_select module=entity status=ok table={} rows={} duration_ms={}",
                    self.schema.table(),
                    record.len(),
                    started_at.elapsed().as_millis()
                );
            }
            Err(err) => error!(
                "event=entity_select module=entity status=error table={} duration_ms={} error={}",
                self.schema.table(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn execute_write(
        &mut self,
        role: Role,
        statement: CompiledStatement,
    ) -> ModelResult<WriteOutcome> {
        let started_at = Instant::now();
        let result = self.run_statement(role, statement, |handle, statement| {
            handle
                .with_connection(|conn| exec::execute(conn, statement))
                .map_err(ModelError::from)
        });

        match &result {
            Ok(outcome) => {
                self.row_count = Some(outcome.rows_affected);
                if role == Role::Insert {
                    self.last_insert_id = Some(outcome.last_insert_id);
                }
                debug!(
                    "event=entity_write module=entity status=ok table={} role={} rows={} duration_ms={}",
                    self.schema.table(),
                    role,
                    outcome.rows_affected,
                    started_at.elapsed().as_millis()
                );
            }
            Err(err) => error!(
                "event=entity_write module=entity status=error table={} role={} duration_ms={} error={}",
                self.schema.table(),
                role,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    /// Schema-driven column inputs for `values`.
    ///
    /// Inserts send every non-key column (missing ones as null); updates send
    /// the columns present in `values` plus update-stamped ones.
    fn column_inputs(&mut self, values: &Row, for_insert: bool) -> ModelResult<Vec<ColumnInput>> {
        if let Some(unknown) = values.keys().find(|name| !self.schema.has_column(name)) {
            let err = ModelError::Configuration(format!(
                "column `{unknown}` is not mapped in schema `{}`",
                self.schema.identifier()
            ));
            return self.fail(err);
        }

        Ok(self
            .schema
            .data_columns()
            .filter(|column| {
                for_insert || values.contains_key(&column.name) || column.updated_timestamp
            })
            .map(|column| ColumnInput {
                name: column.name.clone(),
                value: values.get(&column.name).cloned().unwrap_or(Value::Null),
                nullable: column.nullable,
                created_timestamp: column.created_timestamp,
                updated_timestamp: column.updated_timestamp,
            })
            .collect())
    }

    // -- primitives ---------------------------------------------------------

    /// Compiles and runs a SELECT on this entity's table without touching the
    /// loaded record.
    pub fn select(
        &mut self,
        spec: &SelectSpec,
        params: Params,
        mode: FetchMode,
    ) -> ModelResult<Record> {
        let statement = compile_select(self.schema.table(), spec, params);
        self.execute_query(statement, mode)
    }

    /// Inserts explicit column inputs and returns the new rowid.
    pub fn insert_columns(&mut self, inputs: &[ColumnInput]) -> ModelResult<i64> {
        let compiled = compile_insert(self.schema.table(), inputs, &current_timestamp());
        let statement = self.capture(compiled)?;
        Ok(self.execute_write(Role::Insert, statement)?.last_insert_id)
    }

    /// Inserts one row using the schema's column flags.
    pub fn insert(&mut self, values: &Row) -> ModelResult<i64> {
        let inputs = self.column_inputs(values, true)?;
        self.insert_columns(&inputs)
    }

    /// Updates with explicit column inputs; returns affected rows.
    pub fn update_columns(
        &mut self,
        inputs: &[ColumnInput],
        conditions: Option<&str>,
        params: Params,
    ) -> ModelResult<usize> {
        let compiled = compile_update(
            self.schema.table(),
            inputs,
            conditions,
            params,
            &current_timestamp(),
        );
        let statement = self.capture(compiled)?;
        Ok(self.execute_write(Role::Update, statement)?.rows_affected)
    }

    /// Updates the columns in `values` using the schema's column flags.
    pub fn update(
        &mut self,
        values: &Row,
        conditions: Option<&str>,
        params: Params,
    ) -> ModelResult<usize> {
        let inputs = self.column_inputs(values, false)?;
        self.update_columns(&inputs, conditions, params)
    }

    /// Deletes matching rows; `conditions` must not be blank.
    pub fn delete(&mut self, conditions: &str, params: Params) -> ModelResult<usize> {
        let compiled = compile_delete(self.schema.table(), conditions, params);
        let statement = self.capture(compiled)?;
        Ok(self.execute_write(Role::Delete, statement)?.rows_affected)
    }

    // -- record helpers -------------------------------------------------------

    /// Prefixes the primary key to an explicit projection that lacks it.
    pub(super) fn projection(&self, columns: &str, qualify: bool) -> String {
        let columns = columns.trim();
        if columns.is_empty() || columns == "*" {
            return "*".to_string();
        }
        let pk = self.schema.primary_key();
        let qualified = format!("{}.{pk}", self.schema.table());
        let suffix = format!(".{pk}");
        let has_pk = columns.split(',').map(str::trim).any(|column| {
            column == "*" || column == pk || column == qualified || column.ends_with(&suffix)
        });
        if has_pk {
            columns.to_string()
        } else if qualify {
            format!("{qualified}, {columns}")
        } else {
            format!("{pk}, {columns}")
        }
    }

    fn load(&mut self, record: Record) -> ModelResult<&mut Self> {
        self.record = record;
        self.relations.clear();
        self.resolve_relations()?;
        Ok(self)
    }

    /// Loads every row, optionally paginated.
    pub fn get_all(
        &mut self,
        columns: &str,
        limit: Option<&str>,
        offset: Option<&str>,
    ) -> ModelResult<&mut Self> {
        let spec = SelectSpec {
            columns: Some(self.projection(columns, false)),
            limit: limit.map(str::to_string),
            offset: offset.map(str::to_string),
            ..SelectSpec::default()
        };
        let record = self.select(&spec, Params::new(), FetchMode::All)?;
        self.load(record)
    }

    /// Loads the row whose primary key equals `value`.
    pub fn get_by_pk(&mut self, value: impl Into<Value>, columns: &str) -> ModelResult<&mut Self> {
        let pk = self.schema.primary_key().to_string();
        self.get_by(&pk, value, columns)
    }

    /// Loads the first row whose `column` equals `value`.
    ///
    /// # Errors
    /// - `Configuration` when `column` is not part of the schema.
    pub fn get_by(
        &mut self,
        column: &str,
        value: impl Into<Value>,
        columns: &str,
    ) -> ModelResult<&mut Self> {
        if !self.schema.has_column(column) {
            let err = ModelError::Configuration(format!(
                "column `{column}` is not mapped in schema `{}`",
                self.schema.identifier()
            ));
            return self.fail(err);
        }
        let spec = SelectSpec {
            columns: Some(self.projection(columns, false)),
            conditions: Some(format!("{column} = :{column}")),
            ..SelectSpec::default()
        };
        let params = Params::new().bind(column, value);
        let record = self.select(&spec, params, FetchMode::One)?;
        self.load(record)
    }

    /// Deletes by primary key; without `value` the loaded row's key is used.
    /// Clears the record on success.
    ///
    /// # Errors
    /// - `Usage` when no value is given and no single row with a key is
    ///   loaded.
    pub fn del_by_pk(&mut self, value: Option<Value>) -> ModelResult<usize> {
        let pk = self.schema.primary_key().to_string();
        let value = match value {
            Some(value) => value,
            None => {
                let loaded = match &self.record {
                    Record::Single(row) => row
                        .get(&pk)
                        .filter(|value| !value.is_empty())
                        .cloned()
                        .ok_or_else(no_identity_error),
                    Record::Set(_) => Err(ModelError::Usage(
                        "multiple rows are loaded; pass the primary key value explicitly"
                            .to_string(),
                    )),
                    Record::Absent => Err(no_identity_error()),
                };
                self.capture(loaded)?
            }
        };
        self.del(&format!("{pk} = :{pk}"), Params::new().bind(&pk, value))
    }

    /// Deletes rows matching `conditions` and clears the record on success.
    pub fn del(&mut self, conditions: &str, params: Params) -> ModelResult<usize> {
        let deleted = self.delete(conditions, params)?;
        self.record = Record::Absent;
        self.relations.clear();
        Ok(deleted)
    }

    /// Persists the loaded single row: update by primary key when it has one,
    /// insert otherwise. Every non-key column is sent with text trimmed, and
    /// bound values (timestamps included) are written back into the record.
    ///
    /// # Errors
    /// - `Usage` when an error is already captured, a row set is loaded, or
    ///   there is no data.
    pub fn save(&mut self) -> ModelResult<SaveOutcome> {
        if let Some(previous) = &self.error {
            return Err(ModelError::Usage(format!(
                "unable to save because an error was encountered: {previous}"
            )));
        }

        let loaded = match &self.record {
            Record::Single(row) if !row.is_empty() => Ok(row.clone()),
            Record::Set(_) => Err(ModelError::Usage(
                "multiple results found; load just one row to save".to_string(),
            )),
            _ => Err(ModelError::Usage(
                "could not save; no data was found".to_string(),
            )),
        };
        let row = self.capture(loaded)?;

        let pk = self.schema.primary_key().to_string();
        let values: Row = self
            .schema
            .data_columns()
            .map(|column| {
                let value = row.get(&column.name).cloned().unwrap_or(Value::Null);
                (column.name.clone(), value.trimmed())
            })
            .collect();
        let inputs = self.column_inputs(&values, true)?;

        let outcome = match row.get(&pk).filter(|value| !value.is_empty()).cloned() {
            Some(key) => {
                let conditions = format!("{pk} = :pk");
                let params = Params::new().bind("pk", key);
                let updated = self.update_columns(&inputs, Some(&conditions), params)?;
                SaveOutcome::Updated(updated)
            }
            None => SaveOutcome::Inserted(self.insert_columns(&inputs)?),
        };

        self.write_back_bound_values(&inputs);
        if let SaveOutcome::Inserted(id) = outcome {
            if let Record::Single(row) = &mut self.record {
                row.insert(pk, Value::Integer(id).into_text());
            }
        }
        Ok(outcome)
    }

    fn write_back_bound_values(&mut self, inputs: &[ColumnInput]) {
        let Some(statement) = &self.last_statement else {
            return;
        };
        let Record::Single(row) = &mut self.record else {
            return;
        };
        for input in inputs {
            if let Some(value) = statement.params.get(&format!("col_{}", input.name)) {
                row.insert(input.name.clone(), value.clone());
            }
        }
    }
}

fn no_identity_error() -> ModelError {
    ModelError::Usage(
        "no row with a primary key is loaded; fetch one first or pass the key value".to_string(),
    )
}
