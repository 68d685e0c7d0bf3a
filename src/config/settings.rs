//! Settings document loading
//!
//! A settings document is a nested mapping in TOML, YAML or JSON. It is
//! normalized to a JSON value, then to an [`Overlay`] for the overlay engine.

use flugelhorn_settings::{Overlay, OverlayError};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings document formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    Toml,
    Yaml,
    Json,
}

impl SettingsFormat {
    /// Pick the format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self, SettingsError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("toml") => Ok(SettingsFormat::Toml),
            Some("yaml") | Some("yml") => Ok(SettingsFormat::Yaml),
            Some("json") => Ok(SettingsFormat::Json),
            _ => Err(SettingsError::UnsupportedFormat(
                path.to_string_lossy().to_string(),
            )),
        }
    }
}

/// A loaded settings document
#[derive(Debug, Clone)]
pub struct SettingsDocument {
    /// Where it was read from
    pub path: PathBuf,

    /// SHA-256 digest of the raw file bytes
    pub digest: String,

    /// Parsed overlay
    pub overlay: Overlay,
}

impl SettingsDocument {
    /// Read and parse a settings file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let format = SettingsFormat::from_path(path)?;
        let bytes = fs::read(path)
            .map_err(|e| SettingsError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| SettingsError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        let overlay = Self::parse(&contents, format)?;
        tracing::debug!(path = %path.display(), %digest, "loaded settings document");

        Ok(Self {
            path: path.to_path_buf(),
            digest,
            overlay,
        })
    }

    /// Parse document text in the given format.
    pub fn parse(contents: &str, format: SettingsFormat) -> Result<Overlay, SettingsError> {
        let json = match format {
            SettingsFormat::Toml => {
                let toml_value: toml::Value = toml::from_str(contents)
                    .map_err(|e| SettingsError::ParseError(format!("TOML parse error: {}", e)))?;
                toml_to_json(toml_value)
            }
            SettingsFormat::Yaml => serde_yaml::from_str::<Value>(contents)
                .map_err(|e| SettingsError::ParseError(format!("YAML parse error: {}", e)))?,
            SettingsFormat::Json => serde_json::from_str::<Value>(contents)
                .map_err(|e| SettingsError::ParseError(format!("JSON parse error: {}", e)))?,
        };

        Ok(Overlay::from_json(&json)?)
    }
}

/// Convert TOML Value to JSON Value
fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            Value::Object(map)
        }
    }
}

/// Settings document errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Unsupported settings format (expected .toml, .yaml, .yml or .json): {0}")]
    UnsupportedFormat(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid settings shape: {0}")]
    Shape(#[from] OverlayError),
}
