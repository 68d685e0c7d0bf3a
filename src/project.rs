//! Camera project file (`pro.prj`) parsing
//!
//! The camera writes an XML project file next to the raw media. Only the
//! gyro calibration is used for stitching; file groups are read for
//! cross-checking against the directory scan.

use flugelhorn_settings::Overlay;
use std::path::Path;

use crate::source::VideoGroup;
use crate::xml::{Element, XmlError};

/// Calibration data extracted from a project file
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectCalibration {
    /// File names listed by each `filegroup`, in document order
    pub file_groups: Vec<Vec<String>>,

    /// Gyro data format version
    pub gyro_version: i64,

    pub gravity_x: f64,
    pub gravity_y: f64,
    pub gravity_z: f64,

    /// Capture start timestamp, used as the gyro time offset
    pub start_ts: String,
}

impl ProjectCalibration {
    /// Read and parse a project file.
    pub fn from_file(path: &Path) -> Result<Self, ProjectFileError> {
        let root = Element::parse_file(path)?;
        let calibration = Self::from_element(&root)?;
        tracing::debug!(
            path = %path.display(),
            gyro_version = calibration.gyro_version,
            file_groups = calibration.file_groups.len(),
            "parsed project file"
        );
        Ok(calibration)
    }

    /// Parse project file text.
    pub fn parse(contents: &str) -> Result<Self, ProjectFileError> {
        let root = Element::parse(contents)?;
        Self::from_element(&root)
    }

    fn from_element(root: &Element) -> Result<Self, ProjectFileError> {
        let file_groups = root
            .descendants("filegroup")
            .into_iter()
            .map(|group| {
                group
                    .children
                    .iter()
                    .filter_map(|file| file.text().map(str::to_string))
                    .collect()
            })
            .collect();

        let gyro = root
            .child("gyro")
            .ok_or_else(|| ProjectFileError::Missing("gyro".to_string()))?;
        let version = gyro
            .attribute("version")
            .ok_or_else(|| ProjectFileError::Missing("gyro@version".to_string()))?;
        let gyro_version = version.trim().parse::<i64>().map_err(|_| {
            ProjectFileError::InvalidValue {
                element: "gyro@version".to_string(),
                value: version.to_string(),
            }
        })?;

        Ok(Self {
            file_groups,
            gyro_version,
            gravity_x: gravity(root, "gravity_x")?,
            gravity_y: gravity(root, "gravity_y")?,
            gravity_z: gravity(root, "gravity_z")?,
            start_ts: required_text(root, "gyro/start_ts")?.to_string(),
        })
    }

    /// Whether the listed file groups name the same files as the scanned
    /// video groups, segment by segment. A project file that lists no
    /// groups has nothing to compare.
    pub fn agrees_with(&self, media: &[VideoGroup]) -> bool {
        if self.file_groups.is_empty() {
            return true;
        }
        self.file_groups.len() == media.len()
            && self
                .file_groups
                .iter()
                .zip(media)
                .all(|(listed, group)| same_files(listed, group))
    }

    /// Overlay carrying the calibration into a job's settings.
    pub fn to_overlay(&self) -> Overlay {
        Overlay::map()
            .with(
                "gyro",
                Overlay::map()
                    .with("version", self.gyro_version)
                    .with("timeOffset", self.start_ts.as_str()),
            )
            .with(
                "gyro_calibration",
                Overlay::map()
                    .with("gravity_x", self.gravity_x)
                    .with("gravity_y", self.gravity_y)
                    .with("gravity_z", self.gravity_z),
            )
    }
}

fn same_files(listed: &[String], group: &VideoGroup) -> bool {
    let mut listed = listed.to_vec();
    let mut scanned: Vec<String> = group
        .slots
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .collect();
    listed.sort_unstable();
    scanned.sort_unstable();
    listed == scanned
}

fn required_text<'a>(root: &'a Element, path: &str) -> Result<&'a str, ProjectFileError> {
    root.find(path)
        .and_then(Element::text)
        .ok_or_else(|| ProjectFileError::Missing(path.to_string()))
}

fn gravity(root: &Element, axis: &str) -> Result<f64, ProjectFileError> {
    let path = format!("gyro/calibration/{}", axis);
    let text = required_text(root, &path)?;
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ProjectFileError::InvalidValue {
            element: path,
            value: text.to_string(),
        }),
    }
}

/// Project file errors; any of these is a malformed project file.
#[derive(Debug, thiserror::Error)]
pub enum ProjectFileError {
    #[error("malformed project file: {0}")]
    Xml(#[from] XmlError),

    #[error("malformed project file: missing {0}")]
    Missing(String),

    #[error("malformed project file: invalid value '{value}' for {element}")]
    InvalidValue { element: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use flugelhorn_settings::{default_settings, Value};
    use std::path::PathBuf;

    fn project(gravity_y: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<project version="2">
  <media>
    <filegroup>
      <file>origin_0.mp4</file>
      <file>origin_1.mp4</file>
    </filegroup>
    <filegroup>
      <file>origin_0_001.mp4</file>
      <file>origin_1_001.mp4</file>
    </filegroup>
  </media>
  <gyro version="3">
    <calibration>
      <gravity_x>0.0008186848958333335</gravity_x>
      {}
      <gravity_z>0.9980732421875</gravity_z>
    </calibration>
    <start_ts>1531440271.345</start_ts>
  </gyro>
</project>
"#,
            gravity_y
        )
    }

    #[test]
    fn test_parse_calibration() {
        let xml = project("<gravity_y>-0.00043326822916666665</gravity_y>");
        let cal = ProjectCalibration::parse(&xml).unwrap();

        assert_eq!(cal.gyro_version, 3);
        assert_eq!(cal.gravity_x, 0.0008186848958333335);
        assert_eq!(cal.gravity_y, -0.00043326822916666665);
        assert_eq!(cal.gravity_z, 0.9980732421875);
        assert_eq!(cal.start_ts, "1531440271.345");
        assert_eq!(cal.file_groups.len(), 2);
        assert_eq!(cal.file_groups[1], vec!["origin_0_001.mp4", "origin_1_001.mp4"]);
    }

    #[test]
    fn test_missing_gravity_is_malformed() {
        let err = ProjectCalibration::parse(&project("")).unwrap_err();
        assert!(matches!(&err, ProjectFileError::Missing(p) if p == "gyro/calibration/gravity_y"));
        assert!(err.to_string().contains("malformed project file"));
    }

    #[test]
    fn test_non_numeric_values_are_malformed() {
        let err = ProjectCalibration::parse(&project("<gravity_y>down</gravity_y>")).unwrap_err();
        assert!(matches!(err, ProjectFileError::InvalidValue { .. }));

        let xml = project("<gravity_y>0.1</gravity_y>").replace("version=\"3\"", "version=\"v3\"");
        let err = ProjectCalibration::parse(&xml).unwrap_err();
        assert!(matches!(err, ProjectFileError::InvalidValue { element, .. } if element == "gyro@version"));
    }

    #[test]
    fn test_non_finite_gravity_is_malformed() {
        for text in ["nan", "NaN", "inf", "-infinity"] {
            let xml = project(&format!("<gravity_y>{}</gravity_y>", text));
            let err = ProjectCalibration::parse(&xml).unwrap_err();
            assert!(
                matches!(&err, ProjectFileError::InvalidValue { element, value }
                    if element == "gyro/calibration/gravity_y" && value == text),
                "{} should be rejected",
                text
            );
        }
    }

    fn scanned(segments: &[&[&str]]) -> Vec<VideoGroup> {
        segments
            .iter()
            .map(|names| VideoGroup {
                slots: names
                    .iter()
                    .map(|name| PathBuf::from("/raw/VID_1").join(name))
                    .collect(),
                start: 0.0,
                end: 10.0,
                pts_offset: 0.0,
            })
            .collect()
    }

    #[test]
    fn test_file_groups_cross_check() {
        let cal = ProjectCalibration::parse(&project("<gravity_y>0.1</gravity_y>")).unwrap();

        let matching = scanned(&[
            &["origin_1.mp4", "origin_0.mp4"],
            &["origin_0_001.mp4", "origin_1_001.mp4"],
        ]);
        assert!(cal.agrees_with(&matching));

        let short = scanned(&[&["origin_0.mp4", "origin_1.mp4"]]);
        assert!(!cal.agrees_with(&short));

        let renamed = scanned(&[
            &["origin_0.mp4", "origin_1.mp4"],
            &["origin_0_001.mp4", "origin_1_002.mp4"],
        ]);
        assert!(!cal.agrees_with(&renamed));

        let unlisted = ProjectCalibration {
            file_groups: Vec::new(),
            ..cal
        };
        assert!(unlisted.agrees_with(&short));
    }

    #[test]
    fn test_missing_gyro() {
        let err = ProjectCalibration::parse("<project/>").unwrap_err();
        assert!(matches!(err, ProjectFileError::Missing(p) if p == "gyro"));
    }

    #[test]
    fn test_overlay_applies_cleanly() {
        let xml = project("<gravity_y>-0.5</gravity_y>");
        let cal = ProjectCalibration::parse(&xml).unwrap();

        let mut config = default_settings().unwrap();
        let report = config.apply_overlay(&cal.to_overlay());

        assert!(report.is_clean());
        assert_eq!(config.get("gyro.version"), Some(&Value::Int(3)));
        assert_eq!(config.get("gyro.timeOffset"), Some(&Value::from("1531440271.345")));
        assert_eq!(config.get("gyro_calibration.gravity_y"), Some(&Value::Float(-0.5)));
    }
}
