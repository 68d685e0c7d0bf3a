//! Effective settings with full provenance
//!
//! A job's settings are built in passes over the schema defaults. The
//! effective record captures the final values plus where each pass came
//! from and everything the overlay engine rejected along the way.

use chrono::{DateTime, Utc};
use flugelhorn_settings::{
    default_settings, Overlay, OverlayDiagnostic, OverlayReport, SchemaError, Section,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::Path;

use super::settings::SettingsDocument;

/// Schema version for effective_settings
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "flugelhorn/effective_settings@1";

/// Origin of an overlay pass
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    /// Schema defaults
    Defaults,
    /// User settings document
    Settings,
    /// Camera project file
    Calibration,
    /// Per-job computed values
    Job,
}

/// A contributing pass with provenance
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSource {
    /// Origin of this pass
    pub origin: ConfigOrigin,

    /// File path (None for defaults/job)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (settings documents only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Fields this pass changed
    pub applied: Vec<String>,

    /// Entries this pass could not apply
    pub diagnostics: Vec<OverlayDiagnostic>,
}

/// Effective settings with full provenance
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveSettings {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// When the settings were computed
    pub created_at: DateTime<Utc>,

    /// Job ID (set later)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    /// Raw media directory (set later)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<String>,

    /// Snapshot of the final configuration
    pub config: Value,

    /// Contributing passes in application order
    pub sources: Vec<ConfigSource>,
}

impl EffectiveSettings {
    /// Set job context
    pub fn with_job_context(mut self, job_id: String, source_dir: String) -> Self {
        self.job_id = Some(job_id);
        self.source_dir = Some(source_dir);
        self
    }

    /// All diagnostics across passes, in order.
    pub fn diagnostics(&self) -> impl Iterator<Item = &OverlayDiagnostic> {
        self.sources.iter().flat_map(|s| s.diagnostics.iter())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            )
        })?;
        fs::write(path, json)
    }

    /// Get a snapshot value by path (dot-separated)
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.config;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Get a snapshot value as string
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    /// Get a snapshot value as i64
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(|v| v.as_i64())
    }
}

/// Settings graph under construction, recording each pass.
#[derive(Debug, Clone)]
pub struct LayeredSettings {
    config: Section,
    sources: Vec<ConfigSource>,
}

impl LayeredSettings {
    /// Start from the schema defaults.
    pub fn from_defaults() -> Result<Self, SchemaError> {
        Ok(Self {
            config: default_settings()?,
            sources: vec![ConfigSource {
                origin: ConfigOrigin::Defaults,
                path: None,
                digest: None,
                applied: Vec::new(),
                diagnostics: Vec::new(),
            }],
        })
    }

    /// Apply a user settings document.
    pub fn apply_document(&mut self, doc: &SettingsDocument) -> &ConfigSource {
        let report = self.config.apply_overlay(&doc.overlay);
        self.push(
            ConfigOrigin::Settings,
            Some(doc.path.to_string_lossy().to_string()),
            Some(doc.digest.clone()),
            report,
        )
    }

    /// Apply an in-memory pass.
    pub fn apply(
        &mut self,
        origin: ConfigOrigin,
        path: Option<&Path>,
        overlay: &Overlay,
    ) -> &ConfigSource {
        let report = self.config.apply_overlay(overlay);
        self.push(
            origin,
            path.map(|p| p.to_string_lossy().to_string()),
            None,
            report,
        )
    }

    fn push(
        &mut self,
        origin: ConfigOrigin,
        path: Option<String>,
        digest: Option<String>,
        report: OverlayReport,
    ) -> &ConfigSource {
        tracing::info!(
            ?origin,
            applied = report.applied.len(),
            rejected = report.diagnostics.len(),
            "settings pass applied"
        );
        self.sources.push(ConfigSource {
            origin,
            path,
            digest,
            applied: report.applied,
            diagnostics: report.diagnostics,
        });
        &self.sources[self.sources.len() - 1]
    }

    /// Current graph.
    pub fn config(&self) -> &Section {
        &self.config
    }

    /// Contributing passes so far.
    pub fn sources(&self) -> &[ConfigSource] {
        &self.sources
    }

    /// Finish: the graph for rendering plus its provenance record.
    pub fn finish(self) -> (Section, EffectiveSettings) {
        let record = EffectiveSettings {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            job_id: None,
            source_dir: None,
            config: self.config.to_json(),
            sources: self.sources,
        };
        (self.config, record)
    }
}
