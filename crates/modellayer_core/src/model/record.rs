//! Data currently held by an entity instance.

use super::value::{Row, Value};
use serde::Serialize;

/// No query yet, one row, or a row set.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Record {
    #[default]
    Absent,
    Single(Row),
    Set(Vec<Row>),
}

impl Record {
    /// True when there is no row data at all: absent, an empty row, or an
    /// empty row set.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Absent => true,
            Self::Single(row) => row.is_empty(),
            Self::Set(rows) => rows.is_empty(),
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    pub fn as_single(&self) -> Option<&Row> {
        match self {
            Self::Single(row) => Some(row),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&[Row]> {
        match self {
            Self::Set(rows) => Some(rows.as_slice()),
            _ => None,
        }
    }

    /// Number of rows held.
    pub fn len(&self) -> usize {
        match self {
            Self::Absent => 0,
            Self::Single(row) if row.is_empty() => 0,
            Self::Single(_) => 1,
            Self::Set(rows) => rows.len(),
        }
    }

    /// Reads a column from a single-row record.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.as_single().and_then(|row| row.get(column))
    }

    /// Rows in order; a single row yields one item.
    pub fn rows(&self) -> Vec<&Row> {
        match self {
            Self::Absent => Vec::new(),
            Self::Single(row) => vec![row],
            Self::Set(rows) => rows.iter().collect(),
        }
    }

    /// Consumes the record into owned rows.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Self::Absent => Vec::new(),
            Self::Single(row) => vec![row],
            Self::Set(rows) => rows,
        }
    }
}

impl From<Option<Row>> for Record {
    fn from(value: Option<Row>) -> Self {
        value.map_or(Self::Absent, Self::Single)
    }
}

impl From<Vec<Row>> for Record {
    fn from(value: Vec<Row>) -> Self {
        Self::Set(value)
    }
}
