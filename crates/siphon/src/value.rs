//! Typed configuration and metadata maps.
//!
//! Source `config` and `metadata` are open-ended mappings. Instead of passing raw
//! JSON around, they are held as a map of string keys to a closed set of value
//! kinds. Conversion from JSON happens once, at the boundary, and rejects shapes
//! outside that set (nulls and nested objects).

use std::collections::BTreeMap;
use std::fmt;

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single config or metadata value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<ConfigValue>),
}

/// Error raised when JSON does not fit the closed value set.
#[derive(Debug, Error, PartialEq)]
pub enum ValueError {
    #[error("expected a JSON object, got {found}")]
    NotAnObject { found: &'static str },

    #[error("unsupported value at '{path}': {found} values are not allowed")]
    Unsupported { path: String, found: &'static str },

    #[error("number at '{path}' is out of range")]
    NumberOutOfRange { path: String },
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl ConfigValue {
    /// Convert a JSON value, reporting `path` on failure.
    pub fn from_json(path: &str, value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::String(s) => Ok(Self::Text(s)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Float(f))
                } else {
                    Err(ValueError::NumberOutOfRange {
                        path: path.to_string(),
                    })
                }
            }
            Value::Array(values) => values
                .into_iter()
                .enumerate()
                .map(|(i, v)| Self::from_json(&format!("{path}[{i}]"), v))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            other => Err(ValueError::Unsupported {
                path: path.to_string(),
                found: kind_of(&other),
            }),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::List(values) => {
                let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

/// Counts saturate at `i64::MAX`.
impl From<usize> for ConfigValue {
    fn from(value: usize) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// String-keyed map of [`ConfigValue`]s, stored as a JSON column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct ConfigMap(BTreeMap<String, ConfigValue>);

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and convert a JSON object.
    pub fn from_json(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| ConfigValue::from_json(&k, v).map(|v| (k, v)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Self),
            other => Err(ValueError::NotAnObject {
                found: kind_of(&other),
            }),
        }
    }

    /// Parse a JSON object from text, as supplied on the command line.
    pub fn parse(text: &str) -> Result<Self, ValueError> {
        let value: Value = serde_json::from_str(text).map_err(|_| ValueError::NotAnObject {
            found: "invalid JSON",
        })?;
        Self::from_json(value)
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ConfigValue::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ConfigValue::as_i64)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.0.remove(key)
    }

    /// Overlay `other` onto this map; keys in `other` win.
    pub fn merge(&mut self, other: ConfigMap) {
        self.0.extend(other.0);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.0.iter()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for ConfigMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
