use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{DbRsError, Result};
use crate::types::SqlValue;

/// Key of a bound value: a positional index or a placeholder name.
///
/// Positional indexes are only used for ordering; binding renumbers them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ParamKey {
    Position(i64),
    Name(String),
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Position(index) => write!(f, "{}", index),
            ParamKey::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for ParamKey {
    fn from(value: &str) -> Self {
        ParamKey::Name(value.to_string())
    }
}

impl From<String> for ParamKey {
    fn from(value: String) -> Self {
        ParamKey::Name(value)
    }
}

impl From<i32> for ParamKey {
    fn from(value: i32) -> Self {
        ParamKey::Position(i64::from(value))
    }
}

impl From<i64> for ParamKey {
    fn from(value: i64) -> Self {
        ParamKey::Position(value)
    }
}

impl From<usize> for ParamKey {
    fn from(value: usize) -> Self {
        ParamKey::Position(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

/// Ordered mapping of placeholder keys to values.
///
/// Insertion order is preserved; pushing an existing key replaces its value
/// without moving it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundValues {
    entries: Vec<(ParamKey, SqlValue)>,
}

impl BoundValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn push(&mut self, key: impl Into<ParamKey>, value: impl Into<SqlValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Builder-style variant of [`push`](Self::push).
    pub fn with(mut self, key: impl Into<ParamKey>, value: impl Into<SqlValue>) -> Self {
        self.push(key, value);
        self
    }

    /// Build bound values from JSON input.
    ///
    /// Objects keep their key order; keys that parse as integers are
    /// positional, the rest are names. Arrays give positional keys starting
    /// at 1. Arrays and objects nested as values are rejected with
    /// [`DbRsError::InvalidArgument`].
    pub fn from_json(input: serde_json::Value) -> Result<Self> {
        let mut values = Self::new();
        match input {
            serde_json::Value::Object(map) => {
                for (name, value) in map {
                    let key = match name.parse::<i64>() {
                        Ok(position) => ParamKey::Position(position),
                        Err(_) => ParamKey::Name(name),
                    };
                    let value = json_to_sql_value(&key, value)?;
                    values.entries.push((key, value));
                }
            }
            serde_json::Value::Array(items) => {
                for (index, value) in items.into_iter().enumerate() {
                    let key = ParamKey::from(index + 1);
                    let value = json_to_sql_value(&key, value)?;
                    values.entries.push((key, value));
                }
            }
            serde_json::Value::Null => {}
            other => {
                return Err(DbRsError::InvalidBoundValues {
                    actual_type: json_type_name(&other),
                })
            }
        }
        Ok(values)
    }

    pub fn get(&self, key: &ParamKey) -> Option<&SqlValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParamKey, &SqlValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<ParamKey>, V: Into<SqlValue>> FromIterator<(K, V)> for BoundValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = Self::new();
        for (key, value) in iter {
            values.push(key, value);
        }
        values
    }
}

/// Serialized as `[key, value]` pairs so positional `1` and named `"1"` stay
/// distinct.
impl Serialize for BoundValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter())
    }
}

fn json_to_sql_value(key: &ParamKey, value: serde_json::Value) -> Result<SqlValue> {
    match value {
        serde_json::Value::Null => Ok(SqlValue::Null),
        serde_json::Value::Bool(b) => Ok(SqlValue::Bool(b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(SqlValue::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(SqlValue::Float(f))
            } else {
                Err(DbRsError::InvalidArgument {
                    placeholder: key.clone(),
                    actual_type: "number",
                })
            }
        }
        serde_json::Value::String(s) => Ok(SqlValue::Text(s)),
        other => Err(DbRsError::InvalidArgument {
            placeholder: key.clone(),
            actual_type: json_type_name(&other),
        }),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Where a value is bound in the prepared statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    /// 1-based position.
    Positional(usize),
    Named(String),
}

/// A value tagged with the native type it is bound as.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Floats and strings are both bound as strings.
    Str(String),
}

impl From<&SqlValue> for BindValue {
    fn from(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => BindValue::Null,
            SqlValue::Bool(b) => BindValue::Bool(*b),
            SqlValue::Int(i) => BindValue::Int(*i),
            SqlValue::Float(f) => BindValue::Str(f.to_string()),
            SqlValue::Text(s) => BindValue::Str(s.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub placeholder: Placeholder,
    pub value: BindValue,
}

/// Resolve bound values into placeholder bindings, in insertion order.
///
/// Named keys are used verbatim. Positional keys get the next sequential
/// position regardless of their own value, so `{5: a, 2: b}` binds `1 = a`
/// and `2 = b`.
pub fn resolve_bindings(values: &BoundValues) -> Vec<Binding> {
    let mut position = 0;
    values
        .iter()
        .map(|(key, value)| {
            let placeholder = match key {
                ParamKey::Name(name) => Placeholder::Named(name.clone()),
                ParamKey::Position(_) => {
                    position += 1;
                    Placeholder::Positional(position)
                }
            };
            Binding {
                placeholder,
                value: BindValue::from(value),
            }
        })
        .collect()
}
