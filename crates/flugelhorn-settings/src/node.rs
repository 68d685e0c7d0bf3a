//! Runtime configuration graph.
//!
//! A [`Section`] mirrors a schema section: its entries are fixed at build time
//! and appear in declaration order. Leaves are [`Field`]s holding a current
//! value and a reference back to their [`FieldDef`].

use crate::schema::{check_section, join_path, FieldDef, SchemaError, SchemaNode};
use crate::value::Value;

/// A configuration leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: &'static str,
    def: &'static FieldDef,
    value: Value,
}

impl Field {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn definition(&self) -> &'static FieldDef {
        self.def
    }

    /// True while the field still holds its declared default.
    pub fn is_default(&self) -> bool {
        self.value.matches(&self.def.default)
    }
}

/// A child of a section.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Field(Field),
    Section(Section),
}

/// A configuration branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    name: &'static str,
    path: String,
    entries: Vec<(&'static str, Node)>,
}

/// Rejected single-field assignment.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{path} value must be in {allowed}, requested value was {value}")]
    Rejected {
        path: String,
        value: Value,
        allowed: String,
    },

    #[error("unknown field '{path}'")]
    UnknownField { path: String },

    #[error("'{path}' is a section, not a field")]
    NotAField { path: String },
}

/// Build a configuration graph with every field at its default.
pub fn build_default(schema: &'static SchemaNode) -> Result<Section, SchemaError> {
    match schema {
        SchemaNode::Section(entries) => build_section("", String::new(), entries),
        SchemaNode::Field(_) => Err(SchemaError::RootIsField),
    }
}

fn build_section(
    name: &'static str,
    path: String,
    entries: &'static [(&'static str, SchemaNode)],
) -> Result<Section, SchemaError> {
    check_section(entries, &path)?;

    let mut children = Vec::with_capacity(entries.len());
    for (child_name, node) in entries {
        let child_name = *child_name;
        let child = match node {
            SchemaNode::Field(def) => Node::Field(Field {
                name: child_name,
                def,
                value: def.default.to_value(),
            }),
            SchemaNode::Section(sub) => {
                Node::Section(build_section(child_name, join_path(&path, child_name), sub)?)
            }
        };
        children.push((child_name, child));
    }

    Ok(Section {
        name,
        path,
        entries: children,
    })
}

impl Section {
    /// Section name (empty for the root).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Dotted path from the root (empty for the root).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// All entries in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &Node)> {
        self.entries.iter().map(|(name, node)| (*name, node))
    }

    /// Plain fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.entries.iter().filter_map(|(_, node)| match node {
            Node::Field(field) => Some(field),
            Node::Section(_) => None,
        })
    }

    /// Nested sections in declaration order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.entries.iter().filter_map(|(_, node)| match node {
            Node::Section(section) => Some(section),
            Node::Field(_) => None,
        })
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, node)| node)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        match self.node(name)? {
            Node::Field(field) => Some(field),
            Node::Section(_) => None,
        }
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        match self.node(name)? {
            Node::Section(section) => Some(section),
            Node::Field(_) => None,
        }
    }

    pub(crate) fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(entry, _)| *entry == name)
            .map(|(_, node)| node)
    }

    /// Look up a field value by dotted path, e.g. `"blend.calibration.lensType"`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        let mut parts = path.split('.').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                return current.field(part).map(Field::value);
            }
            current = current.section(part)?;
        }
        None
    }

    /// Set a field of this section after validating it.
    ///
    /// On rejection the previous value is kept. The declared default is
    /// always accepted.
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), ValidationError> {
        let path = join_path(&self.path, name);
        let field = match self.node_mut(name) {
            Some(Node::Field(field)) => field,
            Some(Node::Section(_)) => return Err(ValidationError::NotAField { path }),
            None => return Err(ValidationError::UnknownField { path }),
        };

        if !field.def.admits(&value) && !value.matches(&field.def.default) {
            return Err(ValidationError::Rejected {
                path,
                value,
                allowed: field.def.describe_allowed(),
            });
        }

        field.value = value;
        Ok(())
    }

    /// Names of every entry, recursively, as dotted paths.
    pub fn shape(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (name, node) in &self.entries {
            let path = join_path(&self.path, name);
            match node {
                Node::Field(_) => out.push(path),
                Node::Section(section) => {
                    out.push(format!("{}/", path));
                    out.extend(section.shape());
                }
            }
        }
        out
    }

    /// JSON snapshot of the current values.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (name, node) in &self.entries {
            let value = match node {
                Node::Field(field) => field.value.to_json(),
                Node::Section(section) => section.to_json(),
            };
            map.insert((*name).to_string(), value);
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SETTING_DEFINITIONS;
    use crate::schema::{Literal, BOOL};

    static SMALL: SchemaNode = SchemaNode::Section(&[
        (
            "output",
            SchemaNode::Section(&[
                (
                    "width",
                    SchemaNode::Field(FieldDef::one_of(
                        &[Literal::Int(2560), Literal::Int(3840)],
                        Literal::Int(3840),
                    )),
                ),
                ("dst", SchemaNode::Field(FieldDef::any(Literal::Null))),
            ]),
        ),
        (
            "blend",
            SchemaNode::Section(&[
                (
                    "useOpticalFlow",
                    SchemaNode::Field(FieldDef::one_of(BOOL, Literal::Bool(true))),
                ),
                (
                    "calibration",
                    SchemaNode::Section(&[(
                        "lensType",
                        SchemaNode::Field(FieldDef::any(Literal::Int(12))),
                    )]),
                ),
            ]),
        ),
    ]);

    fn schema_shape(entries: &'static [(&'static str, SchemaNode)], path: &str) -> Vec<String> {
        let mut out = Vec::new();
        for (name, node) in entries {
            let child = join_path(path, name);
            match node {
                SchemaNode::Field(_) => out.push(child),
                SchemaNode::Section(sub) => {
                    out.push(format!("{}/", child));
                    out.extend(schema_shape(sub, &child));
                }
            }
        }
        out
    }

    fn assert_defaults(entries: &'static [(&'static str, SchemaNode)], section: &Section) {
        for (name, node) in entries {
            match node {
                SchemaNode::Field(def) => {
                    let field = section.field(name).unwrap();
                    assert_eq!(field.value(), &def.default.to_value(), "field {}", name);
                    assert!(field.is_default());
                }
                SchemaNode::Section(sub) => assert_defaults(sub, section.section(name).unwrap()),
            }
        }
    }

    #[test]
    fn test_build_default_matches_schema() {
        for schema in [&SMALL, &SETTING_DEFINITIONS] {
            let SchemaNode::Section(entries) = schema else {
                panic!("root must be a section");
            };
            let config = build_default(schema).unwrap();
            assert_eq!(config.shape(), schema_shape(entries, ""));
            assert_defaults(entries, &config);
        }
    }

    #[test]
    fn test_build_default_is_deterministic() {
        let a = build_default(&SETTING_DEFINITIONS).unwrap();
        let b = build_default(&SETTING_DEFINITIONS).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_build_default_rejects_field_root() {
        static ROOT_FIELD: SchemaNode = SchemaNode::Field(FieldDef::any(Literal::Null));
        assert_eq!(build_default(&ROOT_FIELD), Err(SchemaError::RootIsField));
    }

    #[test]
    fn test_build_default_rejects_empty_section() {
        static HOLLOW: SchemaNode =
            SchemaNode::Section(&[("color", SchemaNode::Section(&[]))]);
        assert_eq!(
            build_default(&HOLLOW),
            Err(SchemaError::EmptySection {
                path: "color".to_string()
            })
        );
    }

    #[test]
    fn test_fields_and_sections_keep_order() {
        let config = build_default(&SMALL).unwrap();
        let blend = config.section("blend").unwrap();
        let fields: Vec<&str> = blend.fields().map(Field::name).collect();
        let sections: Vec<&str> = blend.sections().map(Section::name).collect();
        assert_eq!(fields, vec!["useOpticalFlow"]);
        assert_eq!(sections, vec!["calibration"]);
        assert_eq!(blend.section("calibration").unwrap().path(), "blend.calibration");
    }

    #[test]
    fn test_get_by_path() {
        let config = build_default(&SETTING_DEFINITIONS).unwrap();
        assert_eq!(config.get("blend.calibration.lensType"), Some(&Value::Int(12)));
        assert_eq!(config.get("video.fps"), Some(&Value::Float(29.97)));
        assert_eq!(config.get("gyro.timeOffset"), Some(&Value::Null));
        assert_eq!(config.get("blend.calibration"), None);
        assert_eq!(config.get("nope.width"), None);
    }

    #[test]
    fn test_set_field_validates() {
        let mut config = build_default(&SMALL).unwrap();
        let output = match config.node_mut("output") {
            Some(Node::Section(section)) => section,
            _ => panic!("output section missing"),
        };

        assert!(output.set_field("width", Value::Int(2560)).is_ok());
        assert_eq!(output.get("width"), Some(&Value::Int(2560)));

        let err = output.set_field("width", Value::Int(1)).unwrap_err();
        assert!(matches!(err, ValidationError::Rejected { ref path, .. } if path == "output.width"));
        assert_eq!(output.get("width"), Some(&Value::Int(2560)));

        assert!(matches!(
            output.set_field("height", Value::Int(1920)),
            Err(ValidationError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_to_json_snapshot() {
        let config = build_default(&SMALL).unwrap();
        let json = config.to_json();
        assert_eq!(json["output"]["width"], 3840);
        assert!(json["output"]["dst"].is_null());
        assert_eq!(json["blend"]["calibration"]["lensType"], 12);
    }
}
