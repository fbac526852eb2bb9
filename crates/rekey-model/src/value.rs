//! Typed V2 field values.
//!
//! V2 hash fields hold JSON text: `"x.example"`, `42`, `1000.0`, `true`,
//! `null`. Legacy fields were bare strings.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum V2Value {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl V2Value {
    /// Serialized form stored in the V2 hash.
    pub fn to_serialized(&self) -> String {
        match self {
            V2Value::Null => "null".to_string(),
            V2Value::String(s) => Value::String(s.clone()).to_string(),
            V2Value::Integer(i) => i.to_string(),
            V2Value::Float(f) => match serde_json::Number::from_f64(*f) {
                Some(n) => Value::Number(n).to_string(),
                None => "null".to_string(),
            },
            V2Value::Boolean(b) => b.to_string(),
        }
    }

    /// Parse a serialized V2 field. Text that is not JSON is kept as a string.
    pub fn from_serialized(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Null) => V2Value::Null,
            Ok(Value::Bool(b)) => V2Value::Boolean(b),
            Ok(Value::Number(n)) => match n.as_i64() {
                Some(i) if !raw.contains('.') && !raw.contains('e') => V2Value::Integer(i),
                _ => n.as_f64().map(V2Value::Float).unwrap_or(V2Value::Null),
            },
            Ok(Value::String(s)) => V2Value::String(s),
            Ok(other) => V2Value::String(other.to_string()),
            Err(_) => V2Value::String(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, V2Value::Null)
    }

    /// Non-empty string content, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            V2Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            V2Value::Float(f) => Some(*f),
            V2Value::Integer(i) => Some(*i as f64),
            V2Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// True when the value carries information (not null, not an empty string).
    pub fn is_present(&self) -> bool {
        match self {
            V2Value::Null => false,
            V2Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }
}
