//! Generic property value type (JSON-like but typed)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Custom properties attached to maps, layers, objects and tiles
pub type Properties = HashMap<String, Value>;

/// Generic property value (JSON-like but typed)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
}

impl Value {
    /// Get value as string reference
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get value as integer
    ///
    /// Floats are truncated and numeric strings are parsed, since property
    /// values authored in text fields often arrive as strings.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Get value as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Get value as boolean
    ///
    /// Accepts `true`/`false` strings (any case) and integers (non-zero is true).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

// Convenience conversions
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Merge `from` into `into`, overwriting values with the same name.
pub fn merge_properties(into: &mut Properties, from: &Properties) {
    for (name, value) in from {
        into.insert(name.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lossy_accessors() {
        assert_eq!(Value::from("TRUE").as_bool(), Some(true));
        assert_eq!(Value::from(0).as_bool(), Some(false));
        assert_eq!(Value::from("maybe").as_bool(), None);
        assert_eq!(Value::from(" 3 ").as_int(), Some(3));
        assert_eq!(Value::from(2).as_float(), Some(2.0));
        assert_eq!(Value::Null.as_int(), None);
        assert!(Value::default().is_null());
    }

    #[test]
    fn test_merge_properties_overwrites() {
        let mut into: Properties = [("a".to_string(), Value::from(1))].into_iter().collect();
        let from: Properties = [
            ("a".to_string(), Value::from(2)),
            ("b".to_string(), Value::from("x")),
        ]
        .into_iter()
        .collect();

        merge_properties(&mut into, &from);

        assert_eq!(into.get("a"), Some(&Value::Int(2)));
        assert_eq!(into.get("b"), Some(&Value::String("x".to_string())));
    }
}
