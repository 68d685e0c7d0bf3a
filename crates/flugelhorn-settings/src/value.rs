//! Scalar values and overlay mappings.
//!
//! `Value` is what a configuration leaf holds. `Overlay` is the recursive
//! input to the overlay engine: either a scalar aimed at a field or a nested
//! mapping aimed at a section.

use serde::Serialize;
use std::fmt;

use crate::schema::Literal;

/// A scalar configuration value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Field is unset.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Coarse value kind, used for the implied-type check on unconstrained fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
        };
        f.write_str(s)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) | Value::Float(_) => ValueKind::Number,
            Value::Str(_) => ValueKind::String,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view. Floats with no fractional part count as integers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Membership equality against a schema literal.
    ///
    /// Numbers compare numerically (`Int(24)` matches `24.0`); booleans never
    /// match numbers.
    pub fn matches(&self, literal: &Literal) -> bool {
        match (self, literal) {
            (Value::Null, Literal::Null) => true,
            (Value::Bool(a), Literal::Bool(b)) => a == b,
            (Value::Str(a), Literal::Str(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Literal::Int(_) | Literal::Float(_)) => {
                match (self.as_f64(), literal.as_f64()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Wire-format rendering of a scalar attribute.
    ///
    /// Booleans become `"1"`/`"0"`. `Null` has no attribute form.
    pub fn to_attribute(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(format_float(*f)),
            Value::Str(s) => Some(s.clone()),
        }
    }

    /// JSON form, used for snapshots.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// Shortest round-trip form, keeping a `.0` on integral values.
pub(crate) fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Errors converting external data into an overlay.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OverlayError {
    #[error("settings document must be a mapping at the top level")]
    NotAMapping,

    #[error("arrays are not supported (at {path})")]
    UnsupportedArray { path: String },
}

/// Nested update mapping applied by the overlay engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    Scalar(Value),
    /// Ordered `(key, overlay)` pairs; applied in this order.
    Map(Vec<(String, Overlay)>),
}

impl Overlay {
    /// An empty mapping.
    pub fn map() -> Self {
        Overlay::Map(Vec::new())
    }

    /// Append an entry, turning a scalar overlay into a mapping.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Overlay>) -> Self {
        self.insert(key, value);
        self
    }

    /// Append an entry in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Overlay>) {
        match self {
            Overlay::Map(entries) => entries.push((key.into(), value.into())),
            Overlay::Scalar(_) => *self = Overlay::Map(vec![(key.into(), value.into())]),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Overlay::Map(entries) => entries.is_empty(),
            Overlay::Scalar(_) => false,
        }
    }

    /// Convert a parsed JSON document. The top level must be an object.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, OverlayError> {
        match value {
            serde_json::Value::Object(_) => Self::from_json_at(value, ""),
            serde_json::Value::Null => Ok(Overlay::map()),
            _ => Err(OverlayError::NotAMapping),
        }
    }

    fn from_json_at(value: &serde_json::Value, path: &str) -> Result<Self, OverlayError> {
        let overlay = match value {
            serde_json::Value::Null => Overlay::Scalar(Value::Null),
            serde_json::Value::Bool(b) => Overlay::Scalar(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Overlay::Scalar(Value::Int(i)),
                None => Overlay::Scalar(Value::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            serde_json::Value::String(s) => Overlay::Scalar(Value::Str(s.clone())),
            serde_json::Value::Array(_) => {
                return Err(OverlayError::UnsupportedArray {
                    path: path.to_string(),
                })
            }
            serde_json::Value::Object(map) => {
                let mut entries = Vec::with_capacity(map.len());
                for (key, child) in map {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };
                    entries.push((key.clone(), Self::from_json_at(child, &child_path)?));
                }
                Overlay::Map(entries)
            }
        };
        Ok(overlay)
    }
}

impl From<Value> for Overlay {
    fn from(value: Value) -> Self {
        Overlay::Scalar(value)
    }
}

impl From<bool> for Overlay {
    fn from(value: bool) -> Self {
        Overlay::Scalar(Value::from(value))
    }
}

impl From<i64> for Overlay {
    fn from(value: i64) -> Self {
        Overlay::Scalar(Value::from(value))
    }
}

impl From<f64> for Overlay {
    fn from(value: f64) -> Self {
        Overlay::Scalar(Value::from(value))
    }
}

impl From<&str> for Overlay {
    fn from(value: &str) -> Self {
        Overlay::Scalar(Value::from(value))
    }
}

impl From<String> for Overlay {
    fn from(value: String) -> Self {
        Overlay::Scalar(Value::from(value))
    }
}
