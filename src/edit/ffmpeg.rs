//! FFmpeg Runner
//!
//! Thin async wrapper around the `ffmpeg`/`ffprobe` binaries. All editing
//! operations funnel through [`Ffmpeg::run`], which turns non-zero exits
//! into editing errors carrying the tail of stderr.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// How much of stderr to keep in error messages
const STDERR_TAIL_CHARS: usize = 600;

/// Handle to a detected ffmpeg/ffprobe installation
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

impl Ffmpeg {
    /// Uses `ffmpeg`/`ffprobe` from PATH.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses explicit binary locations.
    pub fn from_paths(ffmpeg_path: impl Into<PathBuf>, ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Verifies both binaries start. Fails with a configuration error when
    /// ffmpeg is not installed.
    pub async fn detect() -> Result<Self> {
        let tool = Self::default();
        for binary in [&tool.ffmpeg_path, &tool.ffprobe_path] {
            let status = tokio::process::Command::new(binary)
                .arg("-version")
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status()
                .await
                .map_err(|e| {
                    Error::Configuration(format!(
                        "'{}' is not runnable: {}",
                        binary.display(),
                        e
                    ))
                })?;
            if !status.success() {
                return Err(Error::Configuration(format!(
                    "'{}' exited with {}",
                    binary.display(),
                    status
                )));
            }
        }
        Ok(tool)
    }

    /// Runs ffmpeg with the given arguments.
    pub async fn run<I, S>(&self, operation: &str, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        debug!("running ffmpeg for '{}'", operation);
        let output = tokio::process::Command::new(&self.ffmpeg_path)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::editing(operation, format!("failed to start ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::editing(operation, tail(&stderr)));
        }
        Ok(())
    }

    /// Returns the duration of a media file in seconds via ffprobe.
    pub async fn probe_duration(&self, media: &Path) -> Result<f64> {
        if !media.exists() {
            return Err(Error::editing(
                "probe",
                format!("input file does not exist: {}", media.display()),
            ));
        }

        let output = tokio::process::Command::new(&self.ffprobe_path)
            .args([
                OsStr::new("-v"),
                OsStr::new("error"),
                OsStr::new("-show_entries"),
                OsStr::new("format=duration"),
                OsStr::new("-of"),
                OsStr::new("default=noprint_wrappers=1:nokey=1"),
                media.as_os_str(),
            ])
            .output()
            .await
            .map_err(|e| Error::editing("probe", format!("failed to start ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::editing("probe", tail(&stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.trim().parse::<f64>().map_err(|_| {
            Error::editing(
                "probe",
                format!("unparsable duration '{}' for {}", stdout.trim(), media.display()),
            )
        })
    }
}

/// Keeps the informative end of an ffmpeg stderr dump.
fn tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= STDERR_TAIL_CHARS {
        trimmed.to_string()
    } else {
        chars[chars.len() - STDERR_TAIL_CHARS..].iter().collect()
    }
}

/// Derives a sibling path by appending a suffix to the file stem:
/// `video.mp4` + `_trim` -> `video_trim.mp4`.
pub(crate) fn derive_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "artifact".to_string());
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_name = if ext.is_empty() {
        format!("{}{}", stem, suffix)
    } else {
        format!("{}{}.{}", stem, suffix, ext)
    };
    path.with_file_name(file_name)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_path() {
        assert_eq!(
            derive_path(Path::new("/work/video.mp4"), "_trim"),
            Path::new("/work/video_trim.mp4")
        );
        assert_eq!(
            derive_path(Path::new("/work/track.mp3"), "_mix"),
            Path::new("/work/track_mix.mp3")
        );
        assert_eq!(
            derive_path(Path::new("/work/noext"), "_x"),
            Path::new("/work/noext_x")
        );
    }

    #[test]
    fn test_stderr_tail() {
        let short = "quick failure";
        assert_eq!(tail(short), "quick failure");

        let long = "x".repeat(2000);
        assert_eq!(tail(&long).chars().count(), STDERR_TAIL_CHARS);
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let tool = Ffmpeg::new();
        let err = tool
            .probe_duration(Path::new("/definitely/not/here.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Editing { .. }));
    }
}
