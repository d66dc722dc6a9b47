//! Scalar cell values and column types.

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One fetched or staged row, keyed by column name in projection order.
pub type Row = IndexMap<String, Value>;

/// Declared storage type of a column, used by typed coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    #[default]
    Text,
    Integer,
    Real,
    /// Stored as integer `0`/`1`.
    Boolean,
}

/// A scalar cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Null or empty text. `0` and `"0"` are not empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(text) => text.is_empty(),
            Self::Integer(_) | Self::Real(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Converts to the text form used for attribute storage; null stays null.
    pub fn into_text(self) -> Self {
        match self {
            Self::Null => Self::Null,
            Self::Text(text) => Self::Text(text),
            other => Self::Text(other.to_string()),
        }
    }

    /// Trims surrounding whitespace of text values.
    pub fn trimmed(self) -> Self {
        match self {
            Self::Text(text) => Self::Text(text.trim().to_string()),
            other => other,
        }
    }

    /// Coerces this value to `kind`. Unparseable numbers become zero and
    /// null stays null.
    pub fn coerce(&self, kind: ColumnType) -> Self {
        match (kind, self) {
            (_, Self::Null) => Self::Null,
            (ColumnType::Text, value) => value.clone().into_text(),
            (ColumnType::Integer, Self::Integer(number)) => Self::Integer(*number),
            (ColumnType::Integer, Self::Real(number)) => Self::Integer(*number as i64),
            (ColumnType::Integer, Self::Text(text)) => Self::Integer(parse_integer(text)),
            (ColumnType::Real, Self::Integer(number)) => Self::Real(*number as f64),
            (ColumnType::Real, Self::Real(number)) => Self::Real(*number),
            (ColumnType::Real, Self::Text(text)) => {
                Self::Real(text.trim().parse::<f64>().unwrap_or(0.0))
            }
            (ColumnType::Boolean, Self::Integer(number)) => Self::Integer(i64::from(*number != 0)),
            (ColumnType::Boolean, Self::Real(number)) => Self::Integer(i64::from(*number != 0.0)),
            (ColumnType::Boolean, Self::Text(text)) => {
                let falsy = text.is_empty() || text == "0";
                Self::Integer(i64::from(!falsy))
            }
        }
    }
}

fn parse_integer(text: &str) -> i64 {
    let trimmed = text.trim();
    trimmed
        .parse::<i64>()
        .or_else(|_| trimmed.parse::<f64>().map(|number| number as i64))
        .unwrap_or(0)
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(number) => write!(f, "{number}"),
            Self::Real(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(match self {
            Self::Null => ValueRef::Null,
            Self::Integer(number) => ValueRef::Integer(*number),
            Self::Real(number) => ValueRef::Real(*number),
            Self::Text(text) => ValueRef::Text(text.as_bytes()),
        }))
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(number) => Self::Integer(number),
            ValueRef::Real(number) => Self::Real(number),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                Self::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnType, Value};

    #[test]
    fn emptiness_only_covers_null_and_empty_text() {
        assert!(Value::Null.is_empty());
        assert!(Value::from("").is_empty());
        assert!(!Value::from("0").is_empty());
        assert!(!Value::from(0).is_empty());
    }

    #[test]
    fn into_text_keeps_null() {
        assert_eq!(Value::from(42).into_text(), Value::from("42"));
        assert_eq!(Value::from(1.5).into_text(), Value::from("1.5"));
        assert_eq!(Value::Null.into_text(), Value::Null);
    }

    #[test]
    fn coerce_follows_column_type() {
        assert_eq!(Value::from(" 42 ").coerce(ColumnType::Integer), Value::Integer(42));
        assert_eq!(Value::from("3.9").coerce(ColumnType::Integer), Value::Integer(3));
        assert_eq!(Value::from("abc").coerce(ColumnType::Integer), Value::Integer(0));
        assert_eq!(Value::from("2.5").coerce(ColumnType::Real), Value::Real(2.5));
        assert_eq!(Value::from("0").coerce(ColumnType::Boolean), Value::Integer(0));
        assert_eq!(Value::from("yes").coerce(ColumnType::Boolean), Value::Integer(1));
        assert_eq!(Value::Null.coerce(ColumnType::Integer), Value::Null);
    }

    #[test]
    fn serializes_as_plain_json_scalars() {
        let encoded = serde_json::to_string(&vec![
            Value::Null,
            Value::from(7),
            Value::from("x"),
        ])
        .unwrap();
        assert_eq!(encoded, r#"[null,7,"x"]"#);
    }
}
