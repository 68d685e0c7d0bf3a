//! Stitcher binary location and invocation

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variable overriding the stitcher location
pub const STITCHER_ENV: &str = "FLUGELHORN_STITCHER";

/// Default install location on macOS
pub const MACOS_STITCHER_APP: &str =
    "/Applications/Insta360Stitcher.app/Contents/Resources/tools/ProStitcher/ProStitcher";

/// A located stitcher binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitcherApp {
    path: PathBuf,
}

impl StitcherApp {
    /// Locate the stitcher: explicit path, then `FLUGELHORN_STITCHER`,
    /// then the platform default install path.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, StitcherError> {
        let env_path = env::var_os(STITCHER_ENV).map(PathBuf::from);
        Self::resolve(explicit, env_path.as_deref())
    }

    fn resolve(explicit: Option<&Path>, env_path: Option<&Path>) -> Result<Self, StitcherError> {
        let candidate = explicit
            .or(env_path)
            .map(Path::to_path_buf)
            .or_else(default_app_path)
            .ok_or_else(|| {
                StitcherError::NotInstalled(format!(
                    "no default location on {}; set {} or pass --stitcher",
                    env::consts::OS,
                    STITCHER_ENV
                ))
            })?;

        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "found stitcher");
            Ok(Self { path: candidate })
        } else {
            Err(StitcherError::NotInstalled(
                candidate.to_string_lossy().to_string(),
            ))
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Arguments for one stitch job.
    pub fn args(xml_path: &Path, log_path: &Path) -> Vec<String> {
        vec![
            "-l".to_string(),
            log_path.to_string_lossy().to_string(),
            "-x".to_string(),
            xml_path.to_string_lossy().to_string(),
        ]
    }

    /// Run the stitcher on a document, blocking until it exits.
    pub fn run(&self, xml_path: &Path, log_path: &Path) -> Result<(), StitcherError> {
        tracing::info!(
            stitcher = %self.path.display(),
            xml = %xml_path.display(),
            log = %log_path.display(),
            "running stitcher"
        );

        let status = Command::new(&self.path)
            .args(Self::args(xml_path, log_path))
            .status()
            .map_err(|e| StitcherError::Launch(format!("{}: {}", self.path.display(), e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(StitcherError::Failed {
                code: status.code(),
                log: log_path.to_string_lossy().to_string(),
            })
        }
    }
}

fn default_app_path() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        Some(PathBuf::from(MACOS_STITCHER_APP))
    } else {
        None
    }
}

/// Stitcher errors
#[derive(Debug, thiserror::Error)]
pub enum StitcherError {
    #[error("stitcher not installed: {0}")]
    NotInstalled(String),

    #[error("failed to launch stitcher: {0}")]
    Launch(String),

    #[error("stitcher exited with {} (see {log})", exit_status(.code))]
    Failed { code: Option<i32>, log: String },
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_path_wins() {
        let temp = TempDir::new().unwrap();
        let explicit = temp.path().join("ProStitcher");
        let from_env = temp.path().join("Other");
        fs::write(&explicit, b"").unwrap();
        fs::write(&from_env, b"").unwrap();

        let app = StitcherApp::resolve(Some(explicit.as_path()), Some(from_env.as_path())).unwrap();
        assert_eq!(app.path(), explicit);

        let app = StitcherApp::resolve(None, Some(from_env.as_path())).unwrap();
        assert_eq!(app.path(), from_env);
    }

    #[test]
    fn test_missing_binary_is_not_installed() {
        let err = StitcherApp::resolve(Some(Path::new("/Users/NotExist/ProStitcher")), None)
            .unwrap_err();
        assert!(matches!(err, StitcherError::NotInstalled(p) if p.contains("NotExist")));
    }

    #[test]
    fn test_args() {
        let args = StitcherApp::args(Path::new("/out/VID_1.xml"), Path::new("/out/VID_1.log"));
        assert_eq!(args, vec!["-l", "/out/VID_1.log", "-x", "/out/VID_1.xml"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reports_exit_status() {
        let app = StitcherApp {
            path: PathBuf::from("false"),
        };
        let err = app
            .run(Path::new("/nonexistent.xml"), Path::new("/nonexistent.log"))
            .unwrap_err();
        assert!(matches!(err, StitcherError::Failed { code: Some(c), .. } if c != 0));
    }
}
