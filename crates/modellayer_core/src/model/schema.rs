//! Entity schema declaration and flag resolution.
//!
//! # Responsibility
//! - Turn caller column declarations into fully resolved `ColumnSpec`s.
//! - Keep registered schemas addressable by identifier for joins and
//!   foreign-key resolution.
//!
//! # Invariants
//! - A schema has at least one declared column and no numeric column names.
//! - The primary key is always the last column and carries neutral flags.
//! - A foreign reference can only target a schema that is already registered
//!   (or the schema itself).

use super::value::ColumnType;
use crate::error::{ModelError, ModelResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Caller-facing column declaration. Unset flags resolve to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnOptions {
    nullable: bool,
    created_timestamp: bool,
    updated_timestamp: bool,
    column_type: ColumnType,
    references: Option<String>,
    foreign_key: Option<String>,
    has_many: bool,
    attach_as: Option<String>,
}

impl ColumnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Stamps the current time on insert.
    pub fn created_timestamp(mut self) -> Self {
        self.created_timestamp = true;
        self
    }

    /// Stamps the current time on insert and update.
    pub fn updated_timestamp(mut self) -> Self {
        self.updated_timestamp = true;
        self
    }

    pub fn typed(mut self, column_type: ColumnType) -> Self {
        self.column_type = column_type;
        self
    }

    /// Declares this column as a reference to the schema registered under
    /// `identifier`.
    pub fn references(mut self, identifier: impl Into<String>) -> Self {
        self.references = Some(identifier.into());
        self
    }

    /// Column of the referenced schema matched against this column's value.
    pub fn foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = Some(column.into());
        self
    }

    pub fn has_many(mut self) -> Self {
        self.has_many = true;
        self
    }

    pub fn attach_as(mut self, name: impl Into<String>) -> Self {
        self.attach_as = Some(name.into());
        self
    }
}

/// Resolved foreign reference of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignRef {
    /// Registry identifier of the referenced schema.
    pub entity: String,
    /// Column of the referenced schema matched against the local value.
    pub key_column: String,
    /// Resolve to a row set instead of a single entity.
    pub has_many: bool,
    /// Attribute name the resolved data is attached under.
    pub attach_as: String,
}

/// Fully resolved column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub nullable: bool,
    pub created_timestamp: bool,
    pub updated_timestamp: bool,
    pub column_type: ColumnType,
    pub foreign: Option<ForeignRef>,
}

impl ColumnSpec {
    fn primary_key(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            nullable: false,
            created_timestamp: false,
            updated_timestamp: false,
            column_type,
            foreign: None,
        }
    }
}

/// Immutable table description shared by every entity built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    identifier: String,
    table: String,
    primary_key: String,
    columns: Vec<ColumnSpec>,
}

impl EntitySchema {
    /// Starts a schema declaration.
    ///
    /// `identifier` names the schema inside a [`SchemaRegistry`] (for example
    /// `models::User`); `table` is the SQL table name.
    pub fn builder(
        identifier: impl Into<String>,
        table: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> SchemaBuilder {
        SchemaBuilder {
            identifier: identifier.into(),
            table: table.into(),
            primary_key: primary_key.into(),
            primary_key_type: ColumnType::Integer,
            columns: Vec::new(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Columns in declaration order, primary key last.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    /// Columns other than the primary key.
    pub fn data_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns
            .iter()
            .filter(move |column| column.name != self.primary_key)
    }

    pub fn foreign_columns(&self) -> impl Iterator<Item = (&ColumnSpec, &ForeignRef)> {
        self.columns
            .iter()
            .filter_map(|column| column.foreign.as_ref().map(|foreign| (column, foreign)))
    }
}

/// Collects column declarations; see [`EntitySchema::builder`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    identifier: String,
    table: String,
    primary_key: String,
    primary_key_type: ColumnType,
    columns: Vec<(String, ColumnOptions)>,
}

impl SchemaBuilder {
    /// Declares a column. Redeclaring a name replaces the earlier options in
    /// place.
    pub fn column(mut self, name: impl Into<String>, options: ColumnOptions) -> Self {
        let name = name.into();
        match self.columns.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = options,
            None => self.columns.push((name, options)),
        }
        self
    }

    /// Storage type of the primary key; integer unless set.
    pub fn primary_key_type(mut self, column_type: ColumnType) -> Self {
        self.primary_key_type = column_type;
        self
    }

    /// Resolves every column against `registry`.
    ///
    /// # Errors
    /// - `Configuration` when no column was declared, a name is empty or
    ///   numeric, or a foreign reference targets an unregistered schema.
    pub fn build(self, registry: &SchemaRegistry) -> ModelResult<EntitySchema> {
        if self.columns.is_empty() {
            return Err(ModelError::Configuration(format!(
                "schema `{}` must declare at least one column",
                self.identifier
            )));
        }
        if self.table.trim().is_empty() || self.primary_key.trim().is_empty() {
            return Err(ModelError::Configuration(format!(
                "schema `{}` needs a table name and a primary key name",
                self.identifier
            )));
        }

        let mut columns = Vec::with_capacity(self.columns.len() + 1);
        for (name, options) in &self.columns {
            if is_positional_name(name) {
                return Err(ModelError::Configuration(format!(
                    "column name `{name}` in schema `{}` must be a name, not a number",
                    self.identifier
                )));
            }
            if *name == self.primary_key {
                continue;
            }
            columns.push(self.resolve_column(name, options, registry)?);
        }
        columns.push(ColumnSpec::primary_key(
            &self.primary_key,
            self.primary_key_type,
        ));

        Ok(EntitySchema {
            identifier: self.identifier,
            table: self.table,
            primary_key: self.primary_key,
            columns,
        })
    }

    fn resolve_column(
        &self,
        name: &str,
        options: &ColumnOptions,
        registry: &SchemaRegistry,
    ) -> ModelResult<ColumnSpec> {
        let foreign = match &options.references {
            Some(target) => {
                let key_column = match &options.foreign_key {
                    Some(column) => column.clone(),
                    None if *target == self.identifier => self.primary_key.clone(),
                    None => registry
                        .get(target)
                        .map(|schema| schema.primary_key().to_string())
                        .ok_or_else(|| {
                            ModelError::Configuration(format!(
                                "column `{name}` references unregistered schema `{target}`"
                            ))
                        })?,
                };
                let attach_as = options
                    .attach_as
                    .as_deref()
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map_or_else(|| default_attach_name(target), str::to_string);
                // A relation named like a column would be shadowed on read.
                if attach_as == self.primary_key
                    || self.columns.iter().any(|(column, _)| *column == attach_as)
                {
                    return Err(ModelError::Configuration(format!(
                        "column `{name}` attaches its reference as `{attach_as}`, \
                         which is already a column of schema `{}`",
                        self.identifier
                    )));
                }
                Some(ForeignRef {
                    entity: target.clone(),
                    key_column,
                    has_many: options.has_many,
                    attach_as,
                })
            }
            None => None,
        };

        Ok(ColumnSpec {
            name: name.to_string(),
            nullable: options.nullable,
            created_timestamp: options.created_timestamp,
            updated_timestamp: options.updated_timestamp,
            column_type: options.column_type,
            foreign,
        })
    }
}

fn is_positional_name(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty()
        || (trimmed.chars().any(|c| c.is_ascii_digit())
            && trimmed
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+')))
}

/// Lower-cased last segment of an identifier such as `models::User`.
fn default_attach_name(identifier: &str) -> String {
    identifier
        .rsplit(|c: char| c == ':' || c == '\\' || c == '.')
        .find(|segment| !segment.is_empty())
        .unwrap_or(identifier)
        .to_lowercase()
}

/// Registered schemas by identifier.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<EntitySchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds `builder` against the schemas registered so far and adds it.
    ///
    /// # Errors
    /// - Any error from [`SchemaBuilder::build`].
    /// - `Configuration` when the identifier is already registered.
    pub fn register(&mut self, builder: SchemaBuilder) -> ModelResult<Arc<EntitySchema>> {
        if self.schemas.contains_key(&builder.identifier) {
            return Err(ModelError::Configuration(format!(
                "schema `{}` is already registered",
                builder.identifier
            )));
        }
        let schema = Arc::new(builder.build(self)?);
        self.schemas
            .insert(schema.identifier().to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    pub fn get(&self, identifier: &str) -> Option<&Arc<EntitySchema>> {
        self.schemas.get(identifier)
    }

    /// Like [`Self::get`] but reports unknown identifiers as configuration
    /// errors.
    pub fn require(&self, identifier: &str) -> ModelResult<Arc<EntitySchema>> {
        self.get(identifier).cloned().ok_or_else(|| {
            ModelError::Configuration(format!("schema `{identifier}` is not registered"))
        })
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
