//! Schema-driven stitcher settings.
//!
//! The settings tree is declared once as static data ([`SETTING_DEFINITIONS`]).
//! [`build_default`] turns a schema into a mutable configuration graph with
//! every field at its default, and [`Section::apply_overlay`] merges nested
//! user or calibration data onto it, validating each field against its
//! allowed values.

mod node;
mod overlay;
mod registry;
mod schema;
mod value;

pub use node::{build_default, Field, Node, Section, ValidationError};
pub use overlay::{OverlayDiagnostic, OverlayReport};
pub use registry::{DEFAULT_LENS_COUNT, SETTING_DEFINITIONS};
pub use schema::{FieldDef, Literal, SchemaError, SchemaNode, BOOL};
pub use value::{Overlay, OverlayError, Value, ValueKind};

/// Build the stitcher settings graph at its defaults.
pub fn default_settings() -> Result<Section, SchemaError> {
    build_default(&SETTING_DEFINITIONS)
}
