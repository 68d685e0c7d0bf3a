//! Settings layering
//!
//! A job's stitcher settings are built in passes:
//! 1. Schema defaults
//! 2. User settings document (TOML, YAML or JSON)
//! 3. Camera calibration from the project file
//! 4. Per-job values (output destination, gyro data file)

mod effective;
mod settings;

pub use effective::{
    ConfigOrigin, ConfigSource, EffectiveSettings, LayeredSettings, SCHEMA_ID, SCHEMA_VERSION,
};
pub use settings::{SettingsDocument, SettingsError, SettingsFormat};
