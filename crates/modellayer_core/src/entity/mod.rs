//! Schema-bound Active-Record entity.
//!
//! # Responsibility
//! - Hold the record (absent, one row, or a row set) loaded for one schema.
//! - Route attribute access: schema columns go to the record, every other
//!   name to instance state (resolved relations, then free-form fields).
//! - Run CRUD and fluent queries through the owning `Database`.
//!
//! # Invariants
//! - Identity operations (`exist`, `found`, `del_by_pk` without a value,
//!   `save`) require a single-row record and fail with `Usage` on row sets.
//! - Every failure an operation observes is also kept as the last error
//!   until the next operation runs.
//! - Column writes store text; null stays null.

mod crud;
mod query;
mod relations;

use crate::database::Database;
use crate::db::{ExecutableHandle, Role};
use crate::error::{CapturedError, ModelError, ModelResult};
use crate::model::{ColumnSpec, EntitySchema, Record, Row, Value};
use crate::sql::{CompiledStatement, QueryBuffer};
use std::collections::BTreeMap;
use std::sync::Arc;

pub use crud::SaveOutcome;
pub use query::FetchMode;
pub use relations::{EagerLoading, Relation};

/// Attributes resolved by the foreign-key resolver for one row.
pub type RowRelations<'db> = BTreeMap<String, Relation<'db>>;

/// Result of a routed attribute read.
#[derive(Debug)]
pub enum Attribute<'a, 'db> {
    Column(&'a Value),
    Relation(&'a Relation<'db>),
    Field(&'a Value),
}

/// A schema plus the row data currently loaded for it.
pub struct Entity<'db> {
    db: &'db Database,
    schema: Arc<EntitySchema>,
    record: Record,
    relations: Vec<RowRelations<'db>>,
    fields: BTreeMap<String, Value>,
    buffer: QueryBuffer,
    join_target: Option<Arc<EntitySchema>>,
    eager_loading: EagerLoading,
    last_statement: Option<CompiledStatement>,
    row_count: Option<usize>,
    last_insert_id: Option<i64>,
    error: Option<CapturedError>,
}

impl std::fmt::Debug for Entity<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("schema", &self.schema.identifier())
            .field("record", &self.record)
            .field("relations", &self.relations)
            .field("fields", &self.fields)
            .field("error", &self.error)
            .finish()
    }
}

impl<'db> Entity<'db> {
    pub fn new(db: &'db Database, schema: Arc<EntitySchema>) -> Self {
        Self {
            db,
            schema,
            record: Record::Absent,
            relations: Vec::new(),
            fields: BTreeMap::new(),
            buffer: QueryBuffer::default(),
            join_target: None,
            eager_loading: EagerLoading::default(),
            last_statement: None,
            row_count: None,
            last_insert_id: None,
            error: None,
        }
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    /// Table name.
    pub fn name(&self) -> &str {
        self.schema.table()
    }

    pub fn primary_key_name(&self) -> &str {
        self.schema.primary_key()
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        self.schema.columns()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema.column_names()
    }

    fn is_column(&self, name: &str) -> bool {
        self.schema.has_column(name)
    }

    // -- attribute access -------------------------------------------------

    /// Reads a schema column of the loaded single row.
    pub fn get(&self, column: &str) -> Option<&Value> {
        if !self.is_column(column) {
            return None;
        }
        self.record.get(column)
    }

    /// Reads any attribute with column/instance routing.
    pub fn attribute(&self, name: &str) -> Option<Attribute<'_, 'db>> {
        if self.is_column(name) {
            return self.record.get(name).map(Attribute::Column);
        }
        if let Some(relation) = self.related(name) {
            return Some(Attribute::Relation(relation));
        }
        self.fields.get(name).map(Attribute::Field)
    }

    /// Writes an attribute. Columns land in the record as text, creating an
    /// empty single row when nothing is loaded; other names become fields.
    ///
    /// # Errors
    /// - `Usage` when writing a column while a row set is loaded.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> ModelResult<()> {
        let value = value.into();
        if !self.is_column(name) {
            self.fields.insert(name.to_string(), value);
            return Ok(());
        }
        if self.record.is_set() {
            return self.fail(ModelError::Usage(format!(
                "cannot set `{name}` while multiple rows are loaded"
            )));
        }
        match &mut self.record {
            Record::Single(row) => {
                row.insert(name.to_string(), value.into_text());
            }
            _ => {
                let mut row = Row::new();
                row.insert(name.to_string(), value.into_text());
                self.record = Record::Single(row);
            }
        }
        Ok(())
    }

    /// Whether the attribute is present (column set, relation attached, or
    /// field stored).
    pub fn has(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Removes an attribute with the same routing as [`Self::set`].
    ///
    /// # Errors
    /// - `Usage` when removing a column while a row set is loaded.
    pub fn unset(&mut self, name: &str) -> ModelResult<()> {
        if !self.is_column(name) {
            if let Some(relations) = self.relations.first_mut() {
                if relations.remove(name).is_some() {
                    return Ok(());
                }
            }
            self.fields.remove(name);
            return Ok(());
        }
        if self.record.is_set() {
            return self.fail(ModelError::Usage(format!(
                "cannot unset `{name}` while multiple rows are loaded"
            )));
        }
        if let Record::Single(row) = &mut self.record {
            row.shift_remove(name);
        }
        Ok(())
    }

    /// Stores a non-column instance attribute.
    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    // -- record accessors -------------------------------------------------

    /// The loaded record, or `None` when it holds no rows.
    pub fn data(&self) -> Option<&Record> {
        if self.record.is_empty() {
            None
        } else {
            Some(&self.record)
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Replaces the record with one row and drops resolved relations.
    pub fn set_data(&mut self, row: Row) -> &mut Self {
        self.record = Record::Single(row);
        self.relations.clear();
        self
    }

    /// Record coerced per column type; unknown columns are left as they are.
    pub fn typed_data(&self) -> Record {
        let coerce = |row: &Row| -> Row {
            row.iter()
                .map(|(name, value)| {
                    let value = match self.schema.column(name) {
                        Some(column) => value.coerce(column.column_type),
                        None => value.clone(),
                    };
                    (name.clone(), value)
                })
                .collect()
        };
        match &self.record {
            Record::Absent => Record::Absent,
            Record::Single(row) => Record::Single(coerce(row)),
            Record::Set(rows) => Record::Set(rows.iter().map(coerce).collect()),
        }
    }

    /// Whether a single, non-empty row is loaded.
    ///
    /// # Errors
    /// - `Usage` when a row set is loaded.
    pub fn exist(&self) -> ModelResult<bool> {
        match &self.record {
            Record::Single(row) => Ok(!row.is_empty()),
            Record::Absent => Ok(false),
            Record::Set(_) => Err(ModelError::Usage(
                "exist()/found() cannot be used while multiple rows are loaded".to_string(),
            )),
        }
    }

    /// `Some(self)` when [`Self::exist`] holds.
    pub fn found(&self) -> ModelResult<Option<&Self>> {
        Ok(if self.exist()? { Some(self) } else { None })
    }

    /// Rows returned by the last query, or rows affected by the last write.
    ///
    /// # Errors
    /// - `Usage` when no statement has run on this entity.
    pub fn count(&self) -> ModelResult<usize> {
        self.row_count
            .ok_or_else(|| ModelError::Usage("no statement has been executed yet".to_string()))
    }

    pub fn last_statement(&self) -> Option<&CompiledStatement> {
        self.last_statement.as_ref()
    }

    /// Rowid produced by the last successful insert.
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    /// Serializes the record as JSON.
    pub fn to_json(&self) -> ModelResult<String> {
        serde_json::to_string(&self.record)
            .map_err(|err| ModelError::Configuration(format!("record is not serializable: {err}")))
    }

    // -- error surface ----------------------------------------------------

    pub fn error(&self) -> Option<&CapturedError> {
        self.error.as_ref()
    }

    /// SQLite extended result code of the last error, when it came from the
    /// driver.
    pub fn sql_state(&self) -> Option<i32> {
        self.error.as_ref().and_then(|error| error.sql_state)
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    fn fail<T>(&mut self, err: ModelError) -> ModelResult<T> {
        self.error = Some(CapturedError::from(&err));
        Err(err)
    }

    fn capture<T>(&mut self, result: ModelResult<T>) -> ModelResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => self.fail(err),
        }
    }

    /// Validates `statement`, acquires a `role` handle and runs `op` on it,
    /// remembering the statement.
    fn run_statement<T>(
        &mut self,
        role: Role,
        statement: CompiledStatement,
        op: impl FnOnce(&ExecutableHandle, &CompiledStatement) -> ModelResult<T>,
    ) -> ModelResult<T> {
        self.error = None;
        let result = statement.validate().and_then(|()| {
            let handle = self.db.router().acquire(role)?;
            op(&*handle, &statement)
        });
        self.last_statement = Some(statement);
        self.capture(result)
    }
}
