//! Job pipeline for raw video directories
//!
//! Each raw directory is one job:
//! - Build settings: defaults, settings document, project calibration, job values
//! - Group the per-lens media and probe segment durations
//! - Render the stitch document and the effective-settings record
//! - Run the stitcher (skipped in dry-run mode)
//!
//! A batch runs jobs one after another and keeps going past failures.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use flugelhorn_settings::{Overlay, SchemaError, Section};
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigOrigin, EffectiveSettings, LayeredSettings, SettingsDocument, SettingsError};
use crate::media::{check_paths, copy_source_to_raw_dirs, find_media_dirs, MediaError, MediaScan};
use crate::project::{ProjectCalibration, ProjectFileError};
use crate::render::{self, RenderError};
use crate::source::{FfprobeProbe, MediaProbe, SourceError, StitchSource};
use crate::stitcher::{StitcherApp, StitcherError};

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("{0}")]
    Project(#[from] ProjectFileError),

    #[error("stitch source error: {0}")]
    Source(#[from] SourceError),

    #[error("{0}")]
    Render(#[from] RenderError),

    #[error("media error: {0}")]
    Media(#[from] MediaError),

    #[error("{0}")]
    Stitcher(#[from] StitcherError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl PipelineError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Schema(_) => 2,
            PipelineError::Settings(_) => 3,
            PipelineError::Project(_) => 10,
            PipelineError::Source(_) => 11,
            PipelineError::Render(_) => 12,
            PipelineError::Media(_) => 20,
            PipelineError::Stitcher(StitcherError::NotInstalled(_)) => 30,
            PipelineError::Stitcher(_) => 31,
            PipelineError::Io(_) => 1,
            PipelineError::Serialization(_) => 1,
            PipelineError::InvalidPath(_) => 1,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base directory for stitched output
    pub stitched_dir: PathBuf,

    /// Settings document applied to every job
    pub settings_path: PathBuf,

    /// Explicit stitcher binary
    pub stitcher: Option<PathBuf>,

    /// Write documents without running the stitcher
    pub dry_run: bool,
}

/// A job ready to render
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub job_id: String,
    pub raw_dir: PathBuf,

    /// `{stitched_dir}/{raw_dir_name}`, without extension
    pub stitched_base: PathBuf,

    pub source: StitchSource,
    pub config: Section,
    pub effective: EffectiveSettings,
}

impl PreparedJob {
    pub fn xml_path(&self) -> PathBuf {
        with_suffix(&self.stitched_base, ".xml")
    }

    pub fn log_path(&self) -> PathBuf {
        with_suffix(&self.stitched_base, ".log")
    }

    pub fn settings_path(&self) -> PathBuf {
        with_suffix(&self.stitched_base, ".settings.json")
    }

    pub fn output_path(&self) -> PathBuf {
        with_suffix(&self.stitched_base, ".mp4")
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Result of one successful job
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub raw_dir: PathBuf,
    pub xml_path: PathBuf,
    pub settings_path: PathBuf,
    pub output_path: PathBuf,

    /// Overlay entries that could not be applied
    pub diagnostics: usize,

    /// Whether the stitcher ran
    pub stitched: bool,
}

/// A failed job in a batch
#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    pub raw_dir: PathBuf,
    pub error: String,
    pub exit_code: i32,
}

/// Outcome of a batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub succeeded: Vec<JobOutcome>,
    pub failed: Vec<JobFailure>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Exit code of the first failed job, or 0.
    pub fn exit_code(&self) -> i32 {
        self.failed.first().map(|f| f.exit_code).unwrap_or(0)
    }
}

/// Pipeline execution context
pub struct Pipeline {
    config: PipelineConfig,
    settings: SettingsDocument,
    stitcher: Option<StitcherApp>,
    probe: Box<dyn MediaProbe>,
}

impl Pipeline {
    /// Load the settings document and, unless dry-running, locate the stitcher.
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        let settings = SettingsDocument::load(&config.settings_path)?;
        let stitcher = if config.dry_run {
            None
        } else {
            Some(StitcherApp::locate(config.stitcher.as_deref())?)
        };

        Ok(Self {
            config,
            settings,
            stitcher,
            probe: Box::new(FfprobeProbe::default()),
        })
    }

    /// Replace the duration probe
    pub fn with_probe(mut self, probe: Box<dyn MediaProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Build the settings graph and stitch source for one raw directory.
    pub fn prepare_job(&self, raw_dir: &Path) -> PipelineResult<PreparedJob> {
        let name = raw_dir
            .file_name()
            .ok_or_else(|| PipelineError::InvalidPath(raw_dir.to_string_lossy().to_string()))?;
        let stitched_base = self.config.stitched_dir.join(name);

        let mut layered = LayeredSettings::from_defaults()?;
        layered.apply_document(&self.settings);

        let lens_count = layered
            .config()
            .get("input.lensCount")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        if lens_count <= 0 {
            return Err(SourceError::InvalidLensCount(lens_count).into());
        }

        let source = StitchSource::from_raw_dir(raw_dir, lens_count as usize, self.probe.as_ref())?;

        let calibration = ProjectCalibration::from_file(&source.project_file)?;
        if !calibration.agrees_with(&source.media) {
            tracing::warn!(
                project_file = %source.project_file.display(),
                listed = calibration.file_groups.len(),
                scanned = source.media.len(),
                "project file groups do not match the scanned media"
            );
        }
        layered.apply(
            ConfigOrigin::Calibration,
            Some(source.project_file.as_path()),
            &calibration.to_overlay(),
        );

        let output_path = with_suffix(&stitched_base, ".mp4");
        let job_values = Overlay::map()
            .with("input", Overlay::map().with("fileCount", source.media.len() as i64))
            .with(
                "gyro",
                Overlay::map().with("filename", source.gyro_file.to_string_lossy().to_string()),
            )
            .with(
                "output",
                Overlay::map().with("dst", output_path.to_string_lossy().to_string()),
            );
        layered.apply(ConfigOrigin::Job, None, &job_values);

        let job_id = uuid::Uuid::new_v4().to_string();
        let (config, effective) = layered.finish();
        let effective =
            effective.with_job_context(job_id.clone(), raw_dir.to_string_lossy().to_string());

        Ok(PreparedJob {
            job_id,
            raw_dir: raw_dir.to_path_buf(),
            stitched_base,
            source,
            config,
            effective,
        })
    }

    /// Stitch one raw directory.
    pub fn stitch_from_raw(&self, raw_dir: &Path) -> PipelineResult<JobOutcome> {
        tracing::info!(raw_dir = %raw_dir.display(), "starting job");
        let job = self.prepare_job(raw_dir)?;
        tracing::info!(
            job_id = %job.job_id,
            groups = job.source.media.len(),
            duration = job.source.duration(),
            "job prepared"
        );

        let xml_path = job.xml_path();
        let settings_path = job.settings_path();
        render::write_document(&job.config, &job.source, &xml_path)?;
        job.effective.write_to_file(&settings_path)?;

        let stitched = match &self.stitcher {
            Some(app) => {
                app.run(&xml_path, &job.log_path())?;
                true
            }
            None => {
                tracing::info!(xml = %xml_path.display(), "dry run, stitcher not started");
                false
            }
        };

        let outcome = JobOutcome {
            job_id: job.job_id.clone(),
            raw_dir: job.raw_dir.clone(),
            xml_path,
            settings_path,
            output_path: job.output_path(),
            diagnostics: job.effective.diagnostics().count(),
            stitched,
        };
        tracing::info!(job_id = %outcome.job_id, stitched, "job complete");
        Ok(outcome)
    }

    /// Stitch every directory, continuing past failures.
    pub fn stitch_all(&self, raw_dirs: &[PathBuf]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for raw_dir in raw_dirs {
            match self.stitch_from_raw(raw_dir) {
                Ok(outcome) => summary.succeeded.push(outcome),
                Err(e) => {
                    tracing::error!(raw_dir = %raw_dir.display(), error = %e, "job failed");
                    summary.failed.push(JobFailure {
                        raw_dir: raw_dir.clone(),
                        error: e.to_string(),
                        exit_code: e.exit_code(),
                    });
                }
            }
        }
        summary
    }
}

/// Copy every media directory under `source_dir` into `raw_dir`.
///
/// Returns the copies.
pub fn run_copy(source_dir: &Path, raw_dir: &Path) -> PipelineResult<MediaScan> {
    check_paths(&[source_dir, raw_dir])?;
    let found = find_media_dirs(source_dir)?;

    let copied = MediaScan {
        video: copy_source_to_raw_dirs(&found.video, raw_dir)?,
        image: copy_source_to_raw_dirs(&found.image, raw_dir)?,
    };
    tracing::info!(
        video = copied.video.len(),
        image = copied.image.len(),
        "copy complete"
    );
    Ok(copied)
}

/// Apply a settings document to the defaults without touching media.
pub fn check_settings(path: &Path) -> PipelineResult<(Section, EffectiveSettings)> {
    let document = SettingsDocument::load(path)?;
    let mut layered = LayeredSettings::from_defaults()?;
    layered.apply_document(&document);
    Ok(layered.finish())
}
