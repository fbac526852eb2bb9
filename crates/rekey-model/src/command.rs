//! Declarative secondary-index mutations.
//!
//! Commands are pure data: nothing is applied at build time. The cutover tool
//! replays them; commands target independent keys so replay order across
//! different keys does not matter.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    #[serde(rename = "ZADD")]
    Zadd,
    #[serde(rename = "HSET")]
    Hset,
}

/// `ZADD key score member` or `HSET key field json-value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexCommand {
    pub command: CommandKind,
    pub key: String,
    pub args: Vec<Value>,
}

impl IndexCommand {
    pub fn zadd(key: impl Into<String>, score: f64, member: impl Into<String>) -> Self {
        Self {
            command: CommandKind::Zadd,
            key: key.into(),
            args: vec![Value::from(score), Value::String(member.into())],
        }
    }

    /// HSET whose value is stored JSON-encoded (`"org1"` for a string).
    pub fn hset(key: impl Into<String>, field: impl Into<String>, value: &str) -> Self {
        Self {
            command: CommandKind::Hset,
            key: key.into(),
            args: vec![
                Value::String(field.into()),
                Value::String(Value::String(value.to_string()).to_string()),
            ],
        }
    }

    /// `(score, member)` for a well-formed ZADD.
    pub fn as_zadd(&self) -> Option<(f64, &str)> {
        if self.command != CommandKind::Zadd || self.args.len() != 2 {
            return None;
        }
        let score = match &self.args[0] {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.parse().ok()?,
            _ => return None,
        };
        Some((score, self.args[1].as_str()?))
    }

    /// `(field, decoded value)` for a well-formed HSET.
    ///
    /// Values that are not valid JSON are returned verbatim.
    pub fn as_hset(&self) -> Option<(&str, String)> {
        if self.command != CommandKind::Hset || self.args.len() != 2 {
            return None;
        }
        let field = self.args[0].as_str()?;
        let raw = self.args[1].as_str()?;
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(Value::String(s)) => s,
            Ok(other) => other.to_string(),
            Err(_) => raw.to_string(),
        };
        Some((field, value))
    }
}
