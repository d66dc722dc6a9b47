//! Named bind parameters and their `key=value&key=value` text form.

use crate::error::{ModelError, ModelResult};
use crate::model::Value;
use rusqlite::types::ToSql;

/// Ordered name→value bind mapping.
///
/// Names are stored with their `:` prefix, so `bind("pk", ..)` and
/// `bind(":pk", ..)` address the same parameter. Rebinding a name replaces
/// its value and keeps its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Self::insert`].
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        let name = normalize_name(name);
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Adds every entry of `other`, overriding names present in both.
    pub fn merge(&mut self, other: Params) {
        for (name, value) in other.entries {
            self.insert(&name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let name = normalize_name(name);
        self.entries
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses the URL-form text convention. Decoded values are text.
    ///
    /// # Errors
    /// - `Configuration` when the input is not valid form encoding.
    pub fn decode(encoded: &str) -> ModelResult<Self> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(encoded.trim())
            .map_err(|err| ModelError::Configuration(format!("invalid parameter string: {err}")))?;
        let mut params = Self::new();
        for (name, value) in pairs {
            if name.trim_start_matches(':').is_empty() {
                return Err(ModelError::Configuration(
                    "parameter names cannot be empty".to_string(),
                ));
            }
            params.insert(&name, value);
        }
        Ok(params)
    }

    /// Renders the URL-form text convention; `=`, `&` and friends are
    /// percent-encoded.
    pub fn encode(&self) -> String {
        let pairs: Vec<(&str, String)> = self
            .entries
            .iter()
            .map(|(name, value)| (name.trim_start_matches(':'), value.to_string()))
            .collect();
        // Serializing a sequence of string pairs cannot fail.
        serde_urlencoded::to_string(pairs).unwrap_or_default()
    }

    pub(crate) fn as_named(&self) -> Vec<(&str, &dyn ToSql)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
            .collect()
    }
}

fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.starts_with(':') {
        trimmed.to_string()
    } else {
        format!(":{trimmed}")
    }
}
