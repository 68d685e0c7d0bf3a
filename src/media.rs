//! Media discovery and copying
//!
//! A camera card holds one directory per recording. Directories holding
//! per-lens video are stitched; still-image directories are copied only.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const VIDEO_EXTENSIONS: &[&str] = &["mp4"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "insp", "dng"];

/// What a recording directory holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
}

/// A recording directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDir {
    pub path: PathBuf,
    pub name: String,
    pub kind: MediaKind,
}

/// Media found under a source path, split by kind
#[derive(Debug, Clone, Default)]
pub struct MediaScan {
    pub video: Vec<MediaDir>,
    pub image: Vec<MediaDir>,
}

impl MediaScan {
    pub fn is_empty(&self) -> bool {
        self.video.is_empty() && self.image.is_empty()
    }
}

/// Find recording directories anywhere under `source`.
///
/// A directory counts when it directly contains media files; its own
/// subdirectories are not searched further.
pub fn find_media_dirs(source: &Path) -> Result<MediaScan, MediaError> {
    let mut scan = MediaScan::default();
    let mut walker = WalkDir::new(source).min_depth(1).sort_by_file_name().into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| MediaError::IoError(e.to_string()))?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let Some(kind) = classify_dir(entry.path())? else {
            continue;
        };
        let dir = MediaDir {
            path: entry.path().to_path_buf(),
            name: entry.file_name().to_string_lossy().to_string(),
            kind,
        };
        match kind {
            MediaKind::Video => scan.video.push(dir),
            MediaKind::Image => scan.image.push(dir),
        }
        walker.skip_current_dir();
    }

    tracing::info!(
        source = %source.display(),
        video = scan.video.len(),
        image = scan.image.len(),
        "media directories found"
    );
    Ok(scan)
}

fn classify_dir(dir: &Path) -> Result<Option<MediaKind>, MediaError> {
    let entries =
        fs::read_dir(dir).map_err(|e| MediaError::IoError(format!("{}: {}", dir.display(), e)))?;

    let mut kind = None;
    for entry in entries {
        let entry = entry.map_err(|e| MediaError::IoError(e.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            return Ok(Some(MediaKind::Video));
        }
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            kind = Some(MediaKind::Image);
        }
    }
    Ok(kind)
}

/// Whether `dir` directly holds camera video.
pub fn is_video_dir(dir: &Path) -> bool {
    matches!(classify_dir(dir), Ok(Some(MediaKind::Video)))
}

/// Raw video directories to stitch: `raw` itself when it holds video,
/// otherwise its immediate subdirectories that do.
pub fn find_raw_video_dirs(raw: &Path) -> Result<Vec<PathBuf>, MediaError> {
    if is_video_dir(raw) {
        return Ok(vec![raw.to_path_buf()]);
    }

    let mut dirs = Vec::new();
    for entry in WalkDir::new(raw).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| MediaError::IoError(e.to_string()))?;
        if entry.file_type().is_dir() && is_video_dir(entry.path()) {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

/// Copy each directory to `dest_base/{name}` and return the copies.
///
/// An existing destination is an error; nothing is overwritten.
pub fn copy_source_to_raw_dirs(
    dirs: &[MediaDir],
    dest_base: &Path,
) -> Result<Vec<MediaDir>, MediaError> {
    let mut copied = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let dest = dest_base.join(&dir.name);
        if dest.exists() {
            return Err(MediaError::DestinationExists(
                dest.to_string_lossy().to_string(),
            ));
        }

        tracing::info!(from = %dir.path.display(), to = %dest.display(), "copying");
        let files = copy_tree(&dir.path, &dest)?;
        tracing::debug!(files, dest = %dest.display(), "copy complete");

        copied.push(MediaDir {
            path: dest,
            name: dir.name.clone(),
            kind: dir.kind,
        });
    }
    Ok(copied)
}

fn copy_tree(from: &Path, to: &Path) -> Result<usize, MediaError> {
    let mut files = 0;
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| MediaError::IoError(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| MediaError::IoError(e.to_string()))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| MediaError::IoError(format!("{}: {}", target.display(), e)))?;
        } else {
            fs::copy(entry.path(), &target)
                .map_err(|e| MediaError::IoError(format!("{}: {}", target.display(), e)))?;
            files += 1;
        }
    }
    Ok(files)
}

/// Check that every path is an existing directory.
pub fn check_paths(paths: &[&Path]) -> Result<(), MediaError> {
    for path in paths {
        if !path.is_dir() {
            return Err(MediaError::NotADirectory(
                path.to_string_lossy().to_string(),
            ));
        }
    }
    Ok(())
}

/// Media discovery and copy errors
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("{0} is not a directory")]
    NotADirectory(String),

    #[error("destination already exists: {0}")]
    DestinationExists(String),
}
