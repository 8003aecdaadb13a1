//! Scalar and structured context values.

use serde::{Deserialize, Serialize};

/// A non-media value stored in a [`ContextStore`](crate::ContextStore).
///
/// # Examples
///
/// ```
/// use tempera_context::ContextValue;
///
/// let value = ContextValue::from(42);
/// assert_eq!(value.as_int(), Some(42));
/// assert_eq!(value.as_float(), Some(42.0));
/// assert_eq!(value.as_text(), None);
/// assert_eq!(value.kind_name(), "int");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    /// Explicit null
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Text
    Text(String),
    /// Arbitrary JSON (arrays and objects)
    Object(serde_json::Value),
}

impl ContextValue {
    /// Name of the variant, used in type mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ContextValue::Null => "null",
            ContextValue::Bool(_) => "bool",
            ContextValue::Int(_) => "int",
            ContextValue::Float(_) => "float",
            ContextValue::Text(_) => "text",
            ContextValue::Object(_) => "object",
        }
    }

    /// Whether this is [`ContextValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, ContextValue::Null)
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ContextValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ContextValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The number as `f64`; integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ContextValue::Float(f) => Some(*f),
            ContextValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// The text, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContextValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The JSON value, if this is an object.
    pub fn as_object(&self) -> Option<&serde_json::Value> {
        match self {
            ContextValue::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to plain JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ContextValue::Null => serde_json::Value::Null,
            ContextValue::Bool(b) => serde_json::Value::Bool(*b),
            ContextValue::Int(i) => serde_json::Value::from(*i),
            ContextValue::Float(f) => serde_json::Value::from(*f),
            ContextValue::Text(s) => serde_json::Value::String(s.clone()),
            ContextValue::Object(v) => v.clone(),
        }
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Int(value)
    }
}

impl From<i32> for ContextValue {
    fn from(value: i32) -> Self {
        ContextValue::Int(i64::from(value))
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        ContextValue::Float(value)
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Text(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Text(value.to_string())
    }
}

/// Scalars map to their own variants; arrays and objects become [`ContextValue::Object`].
impl From<serde_json::Value> for ContextValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ContextValue::Null,
            serde_json::Value::Bool(b) => ContextValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ContextValue::Int(i),
                None => ContextValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => ContextValue::Text(s),
            other => ContextValue::Object(other),
        }
    }
}
