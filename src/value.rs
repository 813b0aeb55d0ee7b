use std::collections::HashMap;

use chrono::{DateTime, Utc};
use derive_more::From;
use serde::{Deserialize, Serialize};

/// A structured flag or context value.
///
/// Conveniently implements `From` conversions for the underlying types:
/// ```
/// # use configcat_openfeature::Value;
/// let string_value: Value = "example".into();
/// let integer_value: Value = 42i64.into();
/// let list_value: Value = vec![Value::from(true), Value::Null].into();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From)]
#[serde(untagged)]
pub enum Value {
    /// A boolean value.
    Boolean(bool),
    /// A string value.
    String(String),
    /// A 64-bit integer value.
    Integer(i64),
    /// A floating-point value.
    Double(f64),
    /// A point in time.
    Date(DateTime<Utc>),
    /// A list of values.
    List(Vec<Value>),
    /// A string-keyed map of values.
    Structure(HashMap<String, Value>),
    /// A null value or absence of value.
    Null,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl Value {
    /// Return `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value if it is a [`Value::Boolean`].
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The value if it is a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value if it is a [`Value::Integer`].
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The value if it is a [`Value::Double`].
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// The value if it is a [`Value::Date`].
    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    /// The value if it is a [`Value::List`].
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// The value if it is a [`Value::Structure`].
    pub fn as_structure(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Structure(s) => Some(s),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Value {
    /// Convert a decoded JSON document.
    ///
    /// JSON numbers become [`Value::Double`] whenever they are representable as `f64` (which is
    /// every number `serde_json` produces without `arbitrary_precision`), and [`Value::Integer`]
    /// otherwise. JSON has no date type, so dates stay strings.
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Value::Double)
                .or_else(|| n.as_i64().map(Value::Integer))
                .unwrap_or(Value::Null),
            serde_json::Value::Array(values) => {
                Value::List(values.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Structure(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
            serde_json::Value::Null => Value::Null,
        }
    }
}
