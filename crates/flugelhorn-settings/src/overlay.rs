//! Overlay engine.
//!
//! Applies a nested [`Overlay`] onto a configuration graph, field by field.
//! Bad entries never abort the pass: the previous value is kept and a
//! diagnostic is recorded and logged.

use serde::Serialize;

use crate::node::{Node, Section, ValidationError};
use crate::schema::join_path;
use crate::value::{Overlay, Value};

/// A non-fatal problem found while applying an overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlayDiagnostic {
    /// Value outside the field's allowed set; previous value kept.
    FieldValidationRejected {
        path: String,
        value: Value,
        allowed: String,
    },

    /// Mapping names a section the schema does not have.
    UnknownSection { path: String },

    /// Scalar names a field the schema does not have.
    UnknownField { path: String },

    /// Mapping aimed at a plain field.
    NotASection { path: String },

    /// Scalar aimed at a section.
    NotAField { path: String },
}

impl OverlayDiagnostic {
    pub fn path(&self) -> &str {
        match self {
            OverlayDiagnostic::FieldValidationRejected { path, .. }
            | OverlayDiagnostic::UnknownSection { path }
            | OverlayDiagnostic::UnknownField { path }
            | OverlayDiagnostic::NotASection { path }
            | OverlayDiagnostic::NotAField { path } => path,
        }
    }
}

impl std::fmt::Display for OverlayDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayDiagnostic::FieldValidationRejected {
                path,
                value,
                allowed,
            } => write!(
                f,
                "{} value must be in {}, requested value was {}",
                path, allowed, value
            ),
            OverlayDiagnostic::UnknownSection { path } => write!(f, "unknown section '{}'", path),
            OverlayDiagnostic::UnknownField { path } => write!(f, "unknown field '{}'", path),
            OverlayDiagnostic::NotASection { path } => {
                write!(f, "'{}' is a field, got a mapping", path)
            }
            OverlayDiagnostic::NotAField { path } => {
                write!(f, "'{}' is a section, got a scalar", path)
            }
        }
    }
}

impl From<ValidationError> for OverlayDiagnostic {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Rejected {
                path,
                value,
                allowed,
            } => OverlayDiagnostic::FieldValidationRejected {
                path,
                value,
                allowed,
            },
            ValidationError::UnknownField { path } => OverlayDiagnostic::UnknownField { path },
            ValidationError::NotAField { path } => OverlayDiagnostic::NotAField { path },
        }
    }
}

/// Outcome of one overlay pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverlayReport {
    /// Dotted paths of fields that took a new value.
    pub applied: Vec<String>,

    /// Everything that was skipped, in encounter order.
    pub diagnostics: Vec<OverlayDiagnostic>,
}

impl OverlayReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl Section {
    /// Apply `updates` onto this section, in mapping order.
    pub fn apply_overlay(&mut self, updates: &Overlay) -> OverlayReport {
        let mut report = OverlayReport::default();
        match updates {
            Overlay::Map(entries) => self.apply_entries(entries, &mut report),
            Overlay::Scalar(_) => record(
                &mut report,
                OverlayDiagnostic::NotAField {
                    path: self.path().to_string(),
                },
            ),
        }
        report
    }

    fn apply_entries(&mut self, entries: &[(String, Overlay)], report: &mut OverlayReport) {
        for (key, value) in entries {
            match value {
                Overlay::Map(children) => {
                    let path = join_path(self.path(), key);
                    match self.node_mut(key) {
                        Some(Node::Section(section)) => section.apply_entries(children, report),
                        Some(Node::Field(_)) => {
                            record(report, OverlayDiagnostic::NotASection { path })
                        }
                        None => record(report, OverlayDiagnostic::UnknownSection { path }),
                    }
                }
                Overlay::Scalar(scalar) => match self.set_field(key, scalar.clone()) {
                    Ok(()) => {
                        let path = join_path(self.path(), key);
                        tracing::debug!(field = %path, value = %scalar, "setting applied");
                        report.applied.push(path);
                    }
                    Err(err) => record(report, err.into()),
                },
            }
        }
    }
}

fn record(report: &mut OverlayReport, diagnostic: OverlayDiagnostic) {
    match &diagnostic {
        OverlayDiagnostic::FieldValidationRejected { path, value, .. } => {
            tracing::warn!(field = %path, rejected = %value, "{}; keeping previous value", diagnostic);
        }
        _ => tracing::warn!(path = diagnostic.path(), "{}; ignored", diagnostic),
    }
    report.diagnostics.push(diagnostic);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::build_default;
    use crate::registry::SETTING_DEFINITIONS;
    use crate::schema::{FieldDef, Literal, SchemaNode};

    fn defaults() -> Section {
        build_default(&SETTING_DEFINITIONS).unwrap()
    }

    /// Every constrained field in the registry, with its section path.
    fn constrained_fields(section: &Section, out: &mut Vec<(String, &'static FieldDef)>) {
        for field in section.fields() {
            if field.definition().allowed.is_some() {
                out.push((join_path(section.path(), field.name()), field.definition()));
            }
        }
        for sub in section.sections() {
            constrained_fields(sub, out);
        }
    }

    /// Build `{a: {b: {c: value}}}` from `"a.b.c"`.
    fn nested(path: &str, value: Value) -> Overlay {
        let mut overlay = Overlay::Scalar(value);
        for part in path.rsplit('.') {
            overlay = Overlay::map().with(part, overlay);
        }
        overlay
    }

    #[test]
    fn test_output_width_accepted() {
        let mut config = defaults();
        let report = config.apply_overlay(&Overlay::map().with("output", Overlay::map().with("width", 5120i64)));
        assert_eq!(config.get("output.width"), Some(&Value::Int(5120)));
        assert_eq!(report.applied, vec!["output.width".to_string()]);
        assert!(report.is_clean());

        let report = config.apply_overlay(&Overlay::map().with("output", Overlay::map().with("width", 3840i64)));
        assert!(report.is_clean());
        assert_eq!(config.get("output.width"), Some(&Value::Int(3840)));
    }

    #[test]
    fn test_output_width_rejected_keeps_previous() {
        let mut config = defaults();
        let before = config.clone();
        let report = config.apply_overlay(&Overlay::map().with("output", Overlay::map().with("width", 1i64)));

        assert_eq!(config.get("output.width"), Some(&Value::Int(3840)));
        assert_eq!(config, before);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(
            report.diagnostics[0],
            OverlayDiagnostic::FieldValidationRejected {
                path: "output.width".to_string(),
                value: Value::Int(1),
                allowed: "[2560, 3840, 5120, 6400, 7680]".to_string(),
            }
        );
    }

    #[test]
    fn test_every_constrained_field_accepts_members_rejects_outsiders() {
        let base = defaults();
        let mut fields = Vec::new();
        constrained_fields(&base, &mut fields);
        assert!(!fields.is_empty());

        for (path, def) in fields {
            let allowed = def.allowed.unwrap();
            for literal in allowed {
                let mut config = base.clone();
                let report = config.apply_overlay(&nested(&path, literal.to_value()));
                assert!(report.is_clean(), "{} should accept {:?}", path, literal);
                assert_eq!(config.get(&path), Some(&literal.to_value()));
            }

            let mut config = base.clone();
            let outsider = Value::from("definitely-not-allowed");
            let report = config.apply_overlay(&nested(&path, outsider));
            assert_eq!(report.diagnostics.len(), 1, "{}", path);
            assert_eq!(config, base, "{} rejection must not touch the graph", path);
        }
    }

    #[test]
    fn test_rejection_does_not_affect_siblings() {
        let mut config = defaults();
        let overlay = Overlay::map().with(
            "video",
            Overlay::map()
                .with("fps", 27i64)
                .with("codec", "h265")
                .with("useInterpolation", true),
        );
        let report = config.apply_overlay(&overlay);

        assert_eq!(config.get("video.fps"), Some(&Value::Float(29.97)));
        assert_eq!(config.get("video.codec"), Some(&Value::from("h265")));
        assert_eq!(config.get("video.useInterpolation"), Some(&Value::Bool(true)));
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.applied.len(), 2);
    }

    #[test]
    fn test_fps_accepts_integer_and_float_forms() {
        let mut config = defaults();
        let report = config.apply_overlay(&nested("video.fps", Value::Float(24.0)));
        assert!(report.is_clean());
        let report = config.apply_overlay(&nested("video.fps", Value::Float(23.98)));
        assert!(report.is_clean());
        assert_eq!(config.get("video.fps"), Some(&Value::Float(23.98)));
    }

    #[test]
    fn test_overlay_twice_is_idempotent() {
        let overlay = Overlay::map()
            .with("output", Overlay::map().with("width", 7680i64).with("height", 3840i64))
            .with("blend", Overlay::map().with("mode", "stereo_top_left").with("mode", "bogus"))
            .with("preference", Overlay::map().with("encode", Overlay::map().with("threads", 4i64)));

        let mut once = defaults();
        once.apply_overlay(&overlay);
        let mut twice = once.clone();
        twice.apply_overlay(&overlay);

        assert_eq!(once, twice);
        assert_eq!(once.get("blend.mode"), Some(&Value::from("stereo_top_left")));
        assert_eq!(once.get("preference.encode.threads"), Some(&Value::Int(4)));
    }

    #[test]
    fn test_null_rejected_for_typed_field() {
        let mut config = defaults();
        let report = config.apply_overlay(&nested("preference.encode.threads", Value::Null));

        assert_eq!(config.get("preference.encode.threads"), Some(&Value::Int(1)));
        assert_eq!(
            report.diagnostics,
            vec![OverlayDiagnostic::FieldValidationRejected {
                path: "preference.encode.threads".to_string(),
                value: Value::Null,
                allowed: "any number".to_string(),
            }]
        );

        let report = config.apply_overlay(&nested("gyro.timeOffset", Value::Null));
        assert!(report.is_clean());
    }

    #[test]
    fn test_unknown_section_is_ignored() {
        let mut config = defaults();
        let before = config.clone();
        let report = config.apply_overlay(
            &Overlay::map().with("blend_calibration", Overlay::map().with("lensType", 3i64)),
        );
        assert_eq!(config, before);
        assert_eq!(
            report.diagnostics,
            vec![OverlayDiagnostic::UnknownSection {
                path: "blend_calibration".to_string()
            }]
        );
    }

    #[test]
    fn test_unknown_field_does_not_grow_shape() {
        let mut config = defaults();
        let shape = config.shape();
        let report = config.apply_overlay(&nested("gyro.drift", Value::Int(1)));
        assert_eq!(config.shape(), shape);
        assert!(matches!(
            report.diagnostics.as_slice(),
            [OverlayDiagnostic::UnknownField { path }] if path == "gyro.drift"
        ));
    }

    #[test]
    fn test_shape_mismatches_are_reported() {
        let mut config = defaults();
        let before = config.clone();
        let overlay = Overlay::map()
            .with("gyro", 3i64)
            .with("output", Overlay::map().with("width", Overlay::map().with("value", 5120i64)));
        let report = config.apply_overlay(&overlay);
        assert_eq!(config, before);
        assert_eq!(
            report.diagnostics,
            vec![
                OverlayDiagnostic::NotAField {
                    path: "gyro".to_string()
                },
                OverlayDiagnostic::NotASection {
                    path: "output.width".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_later_pass_wins_and_rejection_keeps_earlier_value() {
        let mut config = defaults();
        config.apply_overlay(&nested("gyro.version", Value::Int(3)));
        let report = config.apply_overlay(&nested("gyro.version", Value::Int(9)));
        assert_eq!(config.get("gyro.version"), Some(&Value::Int(3)));
        assert_eq!(report.diagnostics.len(), 1);

        config.apply_overlay(&nested("gyro.version", Value::Int(1)));
        assert_eq!(config.get("gyro.version"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_default_is_exempt_from_validation() {
        static ODD: SchemaNode = SchemaNode::Section(&[(
            "audio",
            SchemaNode::Section(&[(
                "device",
                SchemaNode::Field(FieldDef::one_of(
                    &[Literal::Str("insta360")],
                    Literal::Str("builtin"),
                )),
            )]),
        )]);
        let mut config = build_default(&ODD).unwrap();
        config.apply_overlay(&nested("audio.device", Value::from("insta360")));
        let report = config.apply_overlay(&nested("audio.device", Value::from("builtin")));
        assert!(report.is_clean());
        assert_eq!(config.get("audio.device"), Some(&Value::from("builtin")));
    }

    #[test]
    fn test_report_serializes_with_type_tag() {
        let diag = OverlayDiagnostic::UnknownSection {
            path: "foo".to_string(),
        };
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["type"], "UNKNOWN_SECTION");
        assert_eq!(json["path"], "foo");
    }
}
