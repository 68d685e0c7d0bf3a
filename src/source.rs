//! Stitch sources: grouping raw per-lens video files
//!
//! The camera records one file per lens per segment:
//! `origin_{lens}.mp4` for the first segment and `origin_{lens}_{seq}.mp4`
//! for later ones. Each segment becomes one video group whose timing comes
//! from probing the slot-0 file.

use regex_lite::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

/// Project file written by the camera
pub const PROJECT_FILE_NAME: &str = "pro.prj";

/// Gyro stabilization data written by the camera
pub const GYRO_FILE_NAME: &str = "gyro.dat";

const MEDIA_NAME_PATTERN: &str = r"^origin_(\d+)(?:_(\d+))?\.mp4$";

/// One recording segment: a file per lens plus timing
#[derive(Debug, Clone, PartialEq)]
pub struct VideoGroup {
    /// One path per lens, in slot order
    pub slots: Vec<PathBuf>,

    /// Trim start in seconds
    pub start: f64,

    /// Trim end in seconds (segment duration)
    pub end: f64,

    /// Presentation offset in seconds: the previous group's end, 0 for the first
    pub pts_offset: f64,
}

/// Everything a job reads from a raw media directory
#[derive(Debug, Clone, PartialEq)]
pub struct StitchSource {
    pub media: Vec<VideoGroup>,
    pub project_file: PathBuf,
    pub gyro_file: PathBuf,
}

impl StitchSource {
    /// Scan a raw video directory and group its media.
    ///
    /// Files named for a lens beyond `lens_count` (such as a preview
    /// stream) are skipped.
    pub fn from_raw_dir(
        dir: &Path,
        lens_count: usize,
        probe: &dyn MediaProbe,
    ) -> Result<Self, SourceError> {
        let pattern = media_name_pattern()?;

        let mut media = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| SourceError::IoError(e.to_string()))?;
            if !entry.file_type().is_file() || !is_mp4(entry.path()) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            match parse_media_name(&pattern, &name) {
                Some((lens, _)) if lens >= lens_count => {
                    tracing::debug!(file = %name, lens, lens_count, "skipping file beyond lens count");
                }
                Some(_) => media.push(entry.into_path()),
                None => {
                    tracing::warn!(file = %entry.path().display(), "skipping unrecognized video file");
                }
            }
        }

        let project_file = required_file(dir, PROJECT_FILE_NAME)?;
        let gyro_file = required_file(dir, GYRO_FILE_NAME)?;
        let media = group_media(&media, lens_count, probe)?;

        tracing::info!(
            dir = %dir.display(),
            groups = media.len(),
            "built stitch source"
        );

        Ok(Self {
            media,
            project_file,
            gyro_file,
        })
    }

    /// Total duration across groups, in seconds.
    pub fn duration(&self) -> f64 {
        self.media.iter().map(|g| g.end - g.start).sum()
    }
}

fn required_file(dir: &Path, name: &str) -> Result<PathBuf, SourceError> {
    let path = dir.join(name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(SourceError::MissingFile(path.to_string_lossy().to_string()))
    }
}

fn is_mp4(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("mp4"))
        .unwrap_or(false)
}

fn media_name_pattern() -> Result<Regex, SourceError> {
    Regex::new(MEDIA_NAME_PATTERN).map_err(|e| SourceError::Pattern(e.to_string()))
}

/// Lens index and segment number from a camera file name.
fn parse_media_name(pattern: &Regex, file_name: &str) -> Option<(usize, usize)> {
    let caps = pattern.captures(file_name)?;
    let lens = caps.get(1)?.as_str().parse().ok()?;
    let segment = match caps.get(2) {
        Some(seq) => seq.as_str().parse().ok()?,
        None => 0,
    };
    Some((lens, segment))
}

fn round_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// Group per-lens files into complete video groups.
///
/// Every file must name a lens below `lens_count`, and every segment must
/// have exactly one file per lens. Segments must be numbered without gaps.
pub fn group_media(
    files: &[PathBuf],
    lens_count: usize,
    probe: &dyn MediaProbe,
) -> Result<Vec<VideoGroup>, SourceError> {
    if lens_count == 0 {
        return Err(SourceError::InvalidLensCount(0));
    }
    if files.is_empty() {
        return Err(SourceError::NoMedia);
    }
    if files.len() % lens_count != 0 {
        return Err(SourceError::FileCount {
            count: files.len(),
            lens_count,
        });
    }

    let pattern = media_name_pattern()?;
    let mut segments: BTreeMap<usize, Vec<Option<PathBuf>>> = BTreeMap::new();

    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let (lens, segment) = parse_media_name(&pattern, &name)
            .ok_or_else(|| SourceError::UnrecognizedFile(file.to_string_lossy().to_string()))?;
        if lens >= lens_count {
            return Err(SourceError::LensOutOfRange {
                file: name,
                lens,
                lens_count,
            });
        }

        let slots = segments
            .entry(segment)
            .or_insert_with(|| vec![None; lens_count]);
        if slots[lens].is_some() {
            return Err(SourceError::DuplicateSlot { segment, lens });
        }
        slots[lens] = Some(file.clone());
    }

    let mut groups = Vec::with_capacity(segments.len());
    let mut pts_offset = 0.0;

    for (expected, (segment, slots)) in segments.into_iter().enumerate() {
        if segment != expected {
            return Err(SourceError::MissingSegment(expected));
        }

        let missing: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(lens, _)| lens)
            .collect();
        if !missing.is_empty() {
            return Err(SourceError::IncompleteGroup { segment, missing });
        }
        let slots: Vec<PathBuf> = slots.into_iter().flatten().collect();

        let end = round_millis(probe.duration(&slots[0])?);
        tracing::debug!(segment, end, pts_offset, "video group");

        groups.push(VideoGroup {
            slots,
            start: 0.0,
            end,
            pts_offset,
        });
        pts_offset = end;
    }

    Ok(groups)
}

/// Media duration lookup
pub trait MediaProbe {
    /// Duration of a media file in seconds
    fn duration(&self, path: &Path) -> Result<f64, SourceError>;
}

/// Duration probe backed by `ffprobe`
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    program: PathBuf,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffprobe"),
        }
    }
}

impl FfprobeProbe {
    /// Use a specific ffprobe binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<serde_json::Value>,
}

impl MediaProbe for FfprobeProbe {
    fn duration(&self, path: &Path) -> Result<f64, SourceError> {
        let output = Command::new(&self.program)
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
            .arg(path)
            .output()
            .map_err(|e| SourceError::Probe(format!("{}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            return Err(SourceError::Probe(format!(
                "{} failed for {}: {}",
                self.program.display(),
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_probe_output(&output.stdout)
            .ok_or_else(|| SourceError::Probe(format!("no duration reported for {}", path.display())))
    }
}

/// ffprobe reports the duration as a JSON string; accept a number too.
fn parse_probe_output(stdout: &[u8]) -> Option<f64> {
    let parsed: ProbeOutput = serde_json::from_slice(stdout).ok()?;
    match parsed.format.duration? {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Stitch source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("no video files found")]
    NoMedia,

    #[error("invalid lens count: {0}")]
    InvalidLensCount(i64),

    #[error("{count} video files cannot be split into groups of {lens_count}")]
    FileCount { count: usize, lens_count: usize },

    #[error("unrecognized video file name: {0}")]
    UnrecognizedFile(String),

    #[error("{file} names lens {lens}, camera has {lens_count}")]
    LensOutOfRange {
        file: String,
        lens: usize,
        lens_count: usize,
    },

    #[error("segment {segment} has two files for lens {lens}")]
    DuplicateSlot { segment: usize, lens: usize },

    #[error("segment {segment} is missing lenses {missing:?}")]
    IncompleteGroup { segment: usize, missing: Vec<usize> },

    #[error("segment {0} is missing")]
    MissingSegment(usize),

    #[error("required file not found: {0}")]
    MissingFile(String),

    #[error("duration probe failed: {0}")]
    Probe(String),

    #[error("invalid media name pattern: {0}")]
    Pattern(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct FixedProbe(f64);

    impl MediaProbe for FixedProbe {
        fn duration(&self, _path: &Path) -> Result<f64, SourceError> {
            Ok(self.0)
        }
    }

    fn camera_files(dir: &Path, segments: usize) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for segment in 0..segments {
            for lens in 0..6 {
                let name = if segment == 0 {
                    format!("origin_{}.mp4", lens)
                } else {
                    format!("origin_{}_{:03}.mp4", lens, segment)
                };
                files.push(dir.join(name));
            }
        }
        files
    }

    #[test]
    fn test_parse_media_name() {
        let pattern = media_name_pattern().unwrap();
        assert_eq!(parse_media_name(&pattern, "origin_3.mp4"), Some((3, 0)));
        assert_eq!(parse_media_name(&pattern, "origin_3_001.mp4"), Some((3, 1)));
        assert_eq!(parse_media_name(&pattern, "origin_12_010.mp4"), Some((12, 10)));
        assert_eq!(parse_media_name(&pattern, "preview.mp4"), None);
        assert_eq!(parse_media_name(&pattern, "origin_3.mp4.bak"), None);
    }

    #[test]
    fn test_twelve_files_make_two_groups() {
        let files = camera_files(Path::new("/raw/VID_1"), 2);
        let groups = group_media(&files, 6, &FixedProbe(12.3456)).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].slots[0], Path::new("/raw/VID_1/origin_0.mp4"));
        assert_eq!(groups[1].slots[5], Path::new("/raw/VID_1/origin_5_001.mp4"));
        assert_eq!(groups[0].start, 0.0);
        assert_eq!(groups[0].end, 12.346);
        assert_eq!(groups[0].pts_offset, 0.0);
        assert_eq!(groups[1].pts_offset, 12.346);
    }

    #[test]
    fn test_slot_order_does_not_depend_on_input_order() {
        let mut files = camera_files(Path::new("/raw"), 1);
        files.reverse();
        let groups = group_media(&files, 6, &FixedProbe(1.0)).unwrap();
        for (lens, slot) in groups[0].slots.iter().enumerate() {
            assert_eq!(slot, &PathBuf::from(format!("/raw/origin_{}.mp4", lens)));
        }
    }

    #[test]
    fn test_pts_offset_is_previous_group_end() {
        let files = camera_files(Path::new("/raw"), 3);
        let groups = group_media(&files, 6, &FixedProbe(10.0)).unwrap();
        let offsets: Vec<f64> = groups.iter().map(|g| g.pts_offset).collect();
        assert_eq!(offsets, vec![0.0, 10.0, 10.0]);
    }

    struct SegmentProbe;

    impl MediaProbe for SegmentProbe {
        fn duration(&self, path: &Path) -> Result<f64, SourceError> {
            let name = path.file_name().unwrap().to_string_lossy();
            Ok(if name.contains("_002") {
                3.0
            } else if name.contains("_001") {
                20.5
            } else {
                10.0
            })
        }
    }

    #[test]
    fn test_pts_offset_follows_each_segment_length() {
        let files = camera_files(Path::new("/raw"), 3);
        let groups = group_media(&files, 6, &SegmentProbe).unwrap();
        let ends: Vec<f64> = groups.iter().map(|g| g.end).collect();
        let offsets: Vec<f64> = groups.iter().map(|g| g.pts_offset).collect();
        assert_eq!(ends, vec![10.0, 20.5, 3.0]);
        assert_eq!(offsets, vec![0.0, 10.0, 20.5]);
    }

    #[test]
    fn test_thirteen_files_fail() {
        let mut files = camera_files(Path::new("/raw"), 2);
        files.push(PathBuf::from("/raw/origin_0_002.mp4"));
        let err = group_media(&files, 6, &FixedProbe(1.0)).unwrap_err();
        assert!(matches!(err, SourceError::FileCount { count: 13, lens_count: 6 }));
    }

    #[test]
    fn test_incomplete_group() {
        let mut files = camera_files(Path::new("/raw"), 1);
        files[2] = PathBuf::from("/raw/origin_0_001.mp4");
        let err = group_media(&files, 6, &FixedProbe(1.0)).unwrap_err();
        assert!(matches!(err, SourceError::IncompleteGroup { segment: 0, ref missing } if missing == &vec![2]));
    }

    #[test]
    fn test_grouping_rejects_bad_names() {
        let mut files = camera_files(Path::new("/raw"), 1);
        files[0] = PathBuf::from("/raw/origin_6.mp4");
        assert!(matches!(
            group_media(&files, 6, &FixedProbe(1.0)),
            Err(SourceError::LensOutOfRange { lens: 6, .. })
        ));

        files[0] = PathBuf::from("/raw/clip.mp4");
        assert!(matches!(
            group_media(&files, 6, &FixedProbe(1.0)),
            Err(SourceError::UnrecognizedFile(_))
        ));
    }

    #[test]
    fn test_missing_segment() {
        let files: Vec<PathBuf> = camera_files(Path::new("/raw"), 3)
            .into_iter()
            .filter(|f| !f.to_string_lossy().contains("_001"))
            .collect();
        assert!(matches!(
            group_media(&files, 6, &FixedProbe(1.0)),
            Err(SourceError::MissingSegment(1))
        ));
    }

    #[test]
    fn test_empty_and_invalid_lens_count() {
        assert!(matches!(
            group_media(&[], 6, &FixedProbe(1.0)),
            Err(SourceError::NoMedia)
        ));
        let files = camera_files(Path::new("/raw"), 1);
        assert!(matches!(
            group_media(&files, 0, &FixedProbe(1.0)),
            Err(SourceError::InvalidLensCount(0))
        ));
    }

    #[test]
    fn test_from_raw_dir() {
        let temp = TempDir::new().unwrap();
        for file in camera_files(temp.path(), 2) {
            fs::write(file, b"").unwrap();
        }
        fs::write(temp.path().join("origin_6.mp4"), b"").unwrap();
        fs::write(temp.path().join("notes.txt"), b"").unwrap();
        fs::write(temp.path().join(PROJECT_FILE_NAME), b"<project/>").unwrap();
        fs::write(temp.path().join(GYRO_FILE_NAME), b"").unwrap();

        let source = StitchSource::from_raw_dir(temp.path(), 6, &FixedProbe(5.0)).unwrap();
        assert_eq!(source.media.len(), 2);
        assert_eq!(source.project_file, temp.path().join("pro.prj"));
        assert_eq!(source.gyro_file, temp.path().join("gyro.dat"));
        assert_eq!(source.duration(), 10.0);
    }

    #[test]
    fn test_from_raw_dir_requires_gyro() {
        let temp = TempDir::new().unwrap();
        for file in camera_files(temp.path(), 1) {
            fs::write(file, b"").unwrap();
        }
        fs::write(temp.path().join(PROJECT_FILE_NAME), b"<project/>").unwrap();

        let err = StitchSource::from_raw_dir(temp.path(), 6, &FixedProbe(5.0)).unwrap_err();
        assert!(matches!(err, SourceError::MissingFile(p) if p.ends_with("gyro.dat")));
    }

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{"format": {"duration": "61.394000"}}"#;
        assert_eq!(parse_probe_output(json), Some(61.394));
        assert_eq!(parse_probe_output(br#"{"format": {"duration": 2.5}}"#), Some(2.5));
        assert_eq!(parse_probe_output(br#"{"format": {}}"#), None);
        assert_eq!(parse_probe_output(b"not json"), None);
    }
}
