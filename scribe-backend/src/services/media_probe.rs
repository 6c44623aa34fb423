//! Media duration probing
//!
//! Uses the `ffprobe` command-line tool. Probing is best effort: a missing
//! binary or unreadable file yields `None` and a warning, never an error.

use async_trait::async_trait;
use std::path::Path;
use std::process::Command;

/// Duration lookup for an audio file
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Duration in seconds, `None` when it cannot be determined
    async fn duration_seconds(&self, path: &Path) -> Option<f64>;
}

/// [`MediaProbe`] backed by `ffprobe`
pub struct FfprobeProbe {
    binary_path: String,
}

impl FfprobeProbe {
    pub fn new(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Check if the binary can be executed
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary_path)
            .arg("-version")
            .output()
            .is_ok()
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

/// Parse ffprobe's `format=duration` output
fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn duration_seconds(&self, path: &Path) -> Option<f64> {
        let output = tokio::task::spawn_blocking({
            let binary = self.binary_path.clone();
            let audio = path.to_path_buf();
            move || {
                Command::new(&binary)
                    .args([
                        "-v",
                        "error",
                        "-show_entries",
                        "format=duration",
                        "-of",
                        "default=noprint_wrappers=1:nokey=1",
                    ])
                    .arg(&audio)
                    .output()
            }
        })
        .await;

        let output = match output {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not run ffprobe");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ffprobe task failed");
                return None;
            }
        };

        if !output.status.success() {
            tracing::warn!(
                path = %path.display(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Could not get duration"
            );
            return None;
        }

        let duration = parse_duration(&String::from_utf8_lossy(&output.stdout));
        if duration.is_none() {
            tracing::warn!(path = %path.display(), "ffprobe returned no duration");
        }
        duration
    }
}
