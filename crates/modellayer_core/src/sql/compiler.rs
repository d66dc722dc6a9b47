//! Pure SQL assembly for SELECT/INSERT/UPDATE/DELETE.
//!
//! # Responsibility
//! - Build statement text and bind parameters from structured inputs.
//! - Apply timestamp overrides and non-nullable validation for writes.
//!
//! # Invariants
//! - Nothing here touches a connection.
//! - Column values always bind as `:col_<column>`.
//! - Timestamps render as `YYYY-MM-DD HH:MM:SS` local time.

use super::params::Params;
use crate::error::{ModelError, ModelResult};
use crate::model::Value;
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Quoted literals and comments are matched first so a `:word` inside them
// never counts as a placeholder.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"'(?:[^']|'')*'|"(?:[^"]|"")*"|--[^\n]*|(?s:/\*.*?\*/)"#,
        r"|(?:^|[^:A-Za-z0-9_]):([A-Za-z_][A-Za-z0-9_]*)",
    ))
    .expect("placeholder pattern is valid")
});

/// Current local time in [`TIMESTAMP_FORMAT`].
pub fn current_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Statement text plus the parameters it binds.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Params,
}

impl CompiledStatement {
    pub fn new(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Named placeholders in the SQL text, sorted and deduplicated.
    pub fn placeholders(&self) -> BTreeSet<String> {
        PLACEHOLDER
            .captures_iter(&self.sql)
            .filter_map(|captures| captures.get(1))
            .map(|name| format!(":{}", name.as_str()))
            .collect()
    }

    /// Checks that every placeholder in the text has a bound value.
    ///
    /// # Errors
    /// - `Configuration` naming the first unbound placeholder.
    pub fn validate(&self) -> ModelResult<()> {
        match self
            .placeholders()
            .into_iter()
            .find(|name| !self.params.contains(name))
        {
            Some(missing) => Err(ModelError::Configuration(format!(
                "placeholder `{missing}` has no bound value"
            ))),
            None => Ok(()),
        }
    }
}

/// Clause inputs for [`compile_select`]. Blank clauses are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectSpec {
    pub columns: Option<String>,
    pub conditions: Option<String>,
    pub group: Option<String>,
    pub order: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// One column handed to [`compile_insert`]/[`compile_update`].
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInput {
    pub name: String,
    pub value: Value,
    pub nullable: bool,
    pub created_timestamp: bool,
    pub updated_timestamp: bool,
}

impl ColumnInput {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            nullable: false,
            created_timestamp: false,
            updated_timestamp: false,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn created_timestamp(mut self, flag: bool) -> Self {
        self.created_timestamp = flag;
        self
    }

    pub fn updated_timestamp(mut self, flag: bool) -> Self {
        self.updated_timestamp = flag;
        self
    }
}

fn push_clause(sql: &mut String, keyword: &str, clause: Option<&str>) {
    if let Some(clause) = clause.map(str::trim).filter(|clause| !clause.is_empty()) {
        sql.push(' ');
        sql.push_str(keyword);
        sql.push(' ');
        sql.push_str(clause);
    }
}

pub fn compile_select(table: &str, spec: &SelectSpec, params: Params) -> CompiledStatement {
    let columns = spec
        .columns
        .as_deref()
        .map(str::trim)
        .filter(|columns| !columns.is_empty())
        .unwrap_or("*");
    let mut sql = format!("SELECT {columns} FROM {table}");
    push_clause(&mut sql, "WHERE", spec.conditions.as_deref());
    push_clause(&mut sql, "GROUP BY", spec.group.as_deref());
    push_clause(&mut sql, "ORDER BY", spec.order.as_deref());
    push_clause(&mut sql, "LIMIT", spec.limit.as_deref());
    push_clause(&mut sql, "OFFSET", spec.offset.as_deref());
    CompiledStatement::new(sql, params)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Insert,
    Update,
}

/// Applies timestamp overrides and the non-nullable check, returning the
/// column names and their bound parameters.
fn prepare_columns(
    inputs: &[ColumnInput],
    kind: WriteKind,
    timestamp: &str,
) -> ModelResult<(Vec<String>, Params)> {
    if inputs.is_empty() {
        return Err(ModelError::Configuration(
            "a write needs at least one column".to_string(),
        ));
    }

    let mut names = Vec::with_capacity(inputs.len());
    let mut params = Params::new();
    for input in inputs {
        let stamped = match kind {
            WriteKind::Insert => input.created_timestamp || input.updated_timestamp,
            WriteKind::Update => input.updated_timestamp,
        };
        let value = if stamped {
            Value::Text(timestamp.to_string())
        } else {
            input.value.clone()
        };
        if value.is_empty() && !input.nullable {
            return Err(ModelError::Validation {
                column: input.name.clone(),
            });
        }
        params.insert(&format!("col_{}", input.name), value);
        names.push(input.name.clone());
    }
    Ok((names, params))
}

/// Compiles `INSERT INTO <table> (<cols>) VALUES (:col_<col>, ..)`.
///
/// # Errors
/// - `Validation` for an empty value in a non-nullable column.
/// - `Configuration` when `inputs` is empty.
pub fn compile_insert(
    table: &str,
    inputs: &[ColumnInput],
    timestamp: &str,
) -> ModelResult<CompiledStatement> {
    let (names, params) = prepare_columns(inputs, WriteKind::Insert, timestamp)?;
    let placeholders: Vec<String> = names.iter().map(|name| format!(":col_{name}")).collect();
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    );
    Ok(CompiledStatement::new(sql, params))
}

/// Compiles `UPDATE <table> SET col = :col_<col>, .. [WHERE <conditions>]`.
///
/// `extra` carries the bind values of `conditions`; column parameters win on
/// a name clash.
///
/// # Errors
/// - Same as [`compile_insert`].
pub fn compile_update(
    table: &str,
    inputs: &[ColumnInput],
    conditions: Option<&str>,
    extra: Params,
    timestamp: &str,
) -> ModelResult<CompiledStatement> {
    let (names, column_params) = prepare_columns(inputs, WriteKind::Update, timestamp)?;
    let assignments: Vec<String> = names
        .iter()
        .map(|name| format!("{name} = :col_{name}"))
        .collect();
    let mut sql = format!("UPDATE {table} SET {}", assignments.join(", "));
    push_clause(&mut sql, "WHERE", conditions);

    let mut params = extra;
    params.merge(column_params);
    Ok(CompiledStatement::new(sql, params))
}

/// Compiles `DELETE FROM <table> WHERE <conditions>`.
///
/// # Errors
/// - `Usage` when `conditions` is blank.
pub fn compile_delete(
    table: &str,
    conditions: &str,
    params: Params,
) -> ModelResult<CompiledStatement> {
    let conditions = conditions.trim();
    if conditions.is_empty() {
        return Err(ModelError::Usage(format!(
            "refusing to delete from `{table}` without conditions"
        )));
    }
    Ok(CompiledStatement::new(
        format!("DELETE FROM {table} WHERE {conditions}"),
        params,
    ))
}
