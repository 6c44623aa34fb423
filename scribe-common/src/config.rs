//! Configuration file discovery and loading
//!
//! Scribe services resolve settings in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! This module owns step 3: finding the TOML file and parsing it. Steps 1, 2
//! and 4 live with each service's own `Args`/defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name searched for inside the platform config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Locate the TOML configuration file
///
/// An explicit path (from `--config` or its environment variable) always
/// wins and must exist. Otherwise the platform locations are probed:
/// - Linux: `~/.config/scribe/config.toml`, then `/etc/scribe/config.toml`
/// - macOS / Windows: `<config_dir>/scribe/config.toml`
///
/// Returns `Ok(None)` when no file is present; running without a config file
/// is normal.
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("scribe").join(CONFIG_FILE_NAME));
    }
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc/scribe").join(CONFIG_FILE_NAME));
    }

    for candidate in candidates {
        if candidate.is_file() {
            debug!("Using config file {}", candidate.display());
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}

/// Read and parse a TOML file into `T`
pub fn load_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Default data directory for a named subfolder
///
/// `~/.local/share/scribe/<name>` on Linux, the platform equivalent elsewhere,
/// `./scribe_data/<name>` when the platform gives no answer.
pub fn default_data_dir(name: &str) -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("scribe").join(name))
        .unwrap_or_else(|| PathBuf::from("./scribe_data").join(name))
}
