//! Flugelhorn - 360 video stitching automation
//!
//! This crate copies raw Insta360 Pro media off a camera card, derives a
//! stitching document for each recording from schema-validated settings
//! and the camera's own calibration, and drives the external stitcher.
//! The settings schema and overlay engine live in `flugelhorn-settings`.

pub mod config;
pub mod media;
pub mod pipeline;
pub mod project;
pub mod render;
pub mod source;
pub mod stitcher;
pub mod xml;

pub use config::{ConfigOrigin, EffectiveSettings, LayeredSettings, SettingsDocument};
pub use pipeline::{BatchSummary, Pipeline, PipelineConfig, PipelineError};
pub use project::ProjectCalibration;
pub use source::{MediaProbe, StitchSource, VideoGroup};
