//! Schema types: field definitions and the section tree.
//!
//! A schema is declared as `static` data (see [`crate::registry`]) and is
//! never mutated. Leaves carry an optional allowed-value set and a default;
//! branches carry their children in declaration order.

use std::collections::HashSet;

use crate::value::{Value, ValueKind};

/// A constant scalar usable in `static` schema tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'static str),
}

impl Literal {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Int(i) => Some(*i as f64),
            Literal::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::Str(s) => Value::Str((*s).to_string()),
        }
    }

    pub fn kind(&self) -> ValueKind {
        self.to_value().kind()
    }
}

/// Allowed values for both booleans.
pub const BOOL: &[Literal] = &[Literal::Bool(true), Literal::Bool(false)];

/// Leaf definition: allowed values (None = unconstrained) plus a default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDef {
    pub allowed: Option<&'static [Literal]>,
    pub default: Literal,
}

impl FieldDef {
    /// A field restricted to `allowed`.
    pub const fn one_of(allowed: &'static [Literal], default: Literal) -> Self {
        Self {
            allowed: Some(allowed),
            default,
        }
    }

    /// A field accepting any value of its implied type.
    pub const fn any(default: Literal) -> Self {
        Self {
            allowed: None,
            default,
        }
    }

    /// The type implied by the default, if any.
    ///
    /// Unconstrained fields with a `Null` default accept any scalar,
    /// `Null` included. Otherwise only values of the implied kind pass.
    pub fn implied_kind(&self) -> Option<ValueKind> {
        match self.default.kind() {
            ValueKind::Null => None,
            kind => Some(kind),
        }
    }

    /// Check `value` against this definition.
    pub fn admits(&self, value: &Value) -> bool {
        match self.allowed {
            Some(allowed) => allowed.iter().any(|lit| value.matches(lit)),
            None => match self.implied_kind() {
                None => true,
                Some(kind) => value.kind() == kind,
            },
        }
    }

    /// Human-readable allowed set for diagnostics.
    pub fn describe_allowed(&self) -> String {
        match self.allowed {
            Some(allowed) => {
                let items: Vec<String> = allowed.iter().map(|l| l.to_value().to_string()).collect();
                format!("[{}]", items.join(", "))
            }
            None => match self.implied_kind() {
                Some(kind) => format!("any {}", kind),
                None => "any".to_string(),
            },
        }
    }
}

/// A node in the schema tree.
#[derive(Debug, Clone, Copy)]
pub enum SchemaNode {
    Field(FieldDef),
    Section(&'static [(&'static str, SchemaNode)]),
}

/// Malformed schema. Fatal at startup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("schema root must be a section")]
    RootIsField,

    #[error("section '{path}' has no children")]
    EmptySection { path: String },

    #[error("duplicate entry '{name}' in section '{path}'")]
    DuplicateName { path: String, name: String },

    #[error("empty entry name in section '{path}'")]
    EmptyName { path: String },

    #[error("field '{path}' declares an empty allowed-value set")]
    EmptyAllowedSet { path: String },
}

/// Join a parent path and a child name with a dot.
pub(crate) fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

/// Check a section's entries recursively.
pub(crate) fn check_section(
    entries: &'static [(&'static str, SchemaNode)],
    path: &str,
) -> Result<(), SchemaError> {
    if entries.is_empty() {
        return Err(SchemaError::EmptySection {
            path: path.to_string(),
        });
    }

    let mut seen = HashSet::new();
    for (name, node) in entries {
        if name.is_empty() {
            return Err(SchemaError::EmptyName {
                path: path.to_string(),
            });
        }
        if !seen.insert(*name) {
            return Err(SchemaError::DuplicateName {
                path: path.to_string(),
                name: (*name).to_string(),
            });
        }
        if let SchemaNode::Field(FieldDef {
            allowed: Some(allowed),
            ..
        }) = node
        {
            if allowed.is_empty() {
                return Err(SchemaError::EmptyAllowedSet {
                    path: join_path(path, name),
                });
            }
        }
    }
    Ok(())
}
