//! Test fixtures for stitching jobs
//!
//! This module provides:
//! - A camera project file (`pro.prj`) with gyro calibration
//! - Fake raw recording directories with per-lens media
//! - A fixed-duration media probe in place of ffprobe

#![allow(dead_code)]

use flugelhorn::source::{MediaProbe, SourceError};
use std::fs;
use std::path::{Path, PathBuf};

/// Path to the project file fixture
pub fn project_file_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/pro.prj")
}

/// Path to the bundled settings presets
pub fn settings_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("settings")
}

/// Media probe reporting the same duration for every file
pub struct FixedProbe(pub f64);

impl MediaProbe for FixedProbe {
    fn duration(&self, _path: &Path) -> Result<f64, SourceError> {
        Ok(self.0)
    }
}

/// Camera media file names for `segments` recording segments of six lenses.
pub fn media_names(segments: usize) -> Vec<String> {
    let mut names = Vec::new();
    for segment in 0..segments {
        for lens in 0..6 {
            if segment == 0 {
                names.push(format!("origin_{}.mp4", lens));
            } else {
                names.push(format!("origin_{}_{:03}.mp4", lens, segment));
            }
        }
    }
    names
}

/// Create `parent/name` as a raw recording directory.
pub fn write_raw_dir(parent: &Path, name: &str, segments: usize) -> PathBuf {
    let dir = parent.join(name);
    fs::create_dir_all(&dir).unwrap();
    for file in media_names(segments) {
        fs::write(dir.join(file), b"mp4").unwrap();
    }
    fs::copy(project_file_path(), dir.join("pro.prj")).unwrap();
    fs::write(dir.join("gyro.dat"), b"gyro").unwrap();
    dir
}

/// Create a camera card layout with one video and one image recording.
pub fn write_card(root: &Path) -> PathBuf {
    let dcim = root.join("DCIM");
    write_raw_dir(&dcim, "VID_2018_07_13_00_04_31", 2);

    let image = dcim.join("IMG_2018_07_13_00_10_02");
    fs::create_dir_all(&image).unwrap();
    fs::write(image.join("origin_0.jpg"), b"jpg").unwrap();
    dcim
}

/// Write a settings document and return its path.
pub fn write_settings(dir: &Path, file_name: &str, contents: &str) -> PathBuf {
    let path = dir.join(file_name);
    fs::write(&path, contents).unwrap();
    path
}
