//! Configuration resolution for scribe-backend
//!
//! Priority: command line → environment (both via clap) → TOML file →
//! compiled default.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use scribe_common::config::{default_data_dir, load_toml_file, locate_config_file};
use scribe_common::{Error, Result};

use crate::models::StageRole;
use crate::services::{PollPolicy, StageExecution};

pub const DEFAULT_PORT: u16 = 5501;
pub const DEFAULT_WHISPER_URL: &str = "http://localhost:8501";
pub const DEFAULT_WORKERS: usize = 2;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Weights used when both whisper and pyannote are configured
const WHISPER_WEIGHT: f64 = 0.7;
const PYANNOTE_WEIGHT: f64 = 0.3;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Command-line arguments for scribe-backend
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "scribe-backend")]
#[command(about = "Transcription job orchestrator for Scribe")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "SCRIBE_PORT")]
    pub port: Option<u16>,

    /// TOML config file (default: ~/.config/scribe/config.toml)
    #[arg(short, long, env = "SCRIBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the audio files
    #[arg(long, env = "SCRIBE_AUDIO_DIR")]
    pub audio_dir: Option<PathBuf>,

    /// Directory transcripts are written to
    #[arg(long, env = "SCRIBE_TRANSCRIPT_DIR")]
    pub transcript_dir: Option<PathBuf>,

    /// Speech recognition service URL
    #[arg(long, env = "SCRIBE_WHISPER_URL")]
    pub whisper_url: Option<String>,

    /// Speaker attribution service URL; enables the attribution stage
    #[arg(long, env = "SCRIBE_PYANNOTE_URL")]
    pub pyannote_url: Option<String>,

    /// Seconds between status polls
    #[arg(long, env = "SCRIBE_POLL_INTERVAL_SECS")]
    pub poll_interval_secs: Option<f64>,

    /// Give up on a stage after this many seconds (0 = never)
    #[arg(long, env = "SCRIBE_MAX_WAIT_SECS")]
    pub max_wait_secs: Option<u64>,

    /// Concurrent jobs
    #[arg(long, env = "SCRIBE_WORKERS")]
    pub workers: Option<usize>,

    /// Allowed CORS origin (default: any)
    #[arg(long, env = "SCRIBE_CORS_ORIGIN")]
    pub cors_origin: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter directive, used when RUST_LOG is unset
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: Option<f64>,
    pub max_interval_secs: Option<f64>,
    pub backoff_factor: Option<f64>,
    pub max_wait_secs: Option<u64>,
    pub max_consecutive_failures: Option<u32>,
}

/// One stage as written in the config file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StageConfig {
    pub name: String,
    pub url: String,
    pub weight: f64,
    #[serde(default = "default_role")]
    pub role: StageRole,
    #[serde(default = "default_submit_path")]
    pub submit_path: String,
}

fn default_role() -> StageRole {
    StageRole::Primary
}

fn default_submit_path() -> String {
    "/submit".to_string()
}

impl StageConfig {
    pub fn new(
        name: &str,
        url: &str,
        weight: f64,
        role: StageRole,
        submit_path: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            weight,
            role,
            submit_path: submit_path.to_string(),
        }
    }
}

/// Contents of the TOML config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub audio_dir: Option<PathBuf>,
    pub transcript_dir: Option<PathBuf>,
    pub whisper_url: Option<String>,
    pub pyannote_url: Option<String>,
    /// Full stage list; replaces the whisper/pyannote defaults when present
    pub stages: Vec<StageConfig>,
    pub execution: Option<StageExecution>,
    pub workers: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub cors_origin: Option<String>,
    pub ffprobe_path: Option<String>,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub audio_dir: PathBuf,
    pub transcript_dir: PathBuf,
    pub stages: Vec<StageConfig>,
    pub poll_policy: PollPolicy,
    pub execution: StageExecution,
    pub workers: usize,
    pub queue_capacity: usize,
    pub cors_origin: Option<String>,
    pub ffprobe_path: String,
    pub log_level: Option<String>,
    /// TOML file the settings were read from, if any
    pub config_file: Option<PathBuf>,
}

/// Stage list used when the config file names none
pub fn default_stages(whisper_url: &str, pyannote_url: Option<&str>) -> Vec<StageConfig> {
    match pyannote_url {
        Some(pyannote_url) => vec![
            StageConfig::new("whisper", whisper_url, WHISPER_WEIGHT, StageRole::Primary, "/transcribe"),
            StageConfig::new(
                "pyannote",
                pyannote_url,
                PYANNOTE_WEIGHT,
                StageRole::Attribution,
                "/diarize",
            ),
        ],
        None => vec![StageConfig::new(
            "whisper",
            whisper_url,
            1.0,
            StageRole::Primary,
            "/transcribe",
        )],
    }
}

fn secs(value: f64, field: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| Error::Config(format!("{} must be a non-negative number of seconds", field)))
}

impl ServiceConfig {
    /// Load the TOML file (if any) and merge it under `args`
    pub fn resolve(args: &Args) -> Result<Self> {
        let config_file = locate_config_file(args.config.as_deref())?;
        let toml_config = match &config_file {
            Some(path) => load_toml_file(path)?,
            None => TomlConfig::default(),
        };
        let mut config = Self::from_sources(args, toml_config)?;
        config.config_file = config_file;
        Ok(config)
    }

    /// Merge `args` over `toml_config` over defaults and validate
    pub fn from_sources(args: &Args, toml_config: TomlConfig) -> Result<Self> {
        let whisper_url = args.whisper_url.clone().or(toml_config.whisper_url);
        let pyannote_url = args.pyannote_url.clone().or(toml_config.pyannote_url);

        let stages = if toml_config.stages.is_empty() {
            default_stages(
                whisper_url.as_deref().unwrap_or(DEFAULT_WHISPER_URL),
                pyannote_url.as_deref(),
            )
        } else {
            let mut stages = toml_config.stages;
            for stage in &mut stages {
                let override_url = match stage.name.as_str() {
                    "whisper" => args.whisper_url.as_ref(),
                    "pyannote" => args.pyannote_url.as_ref(),
                    _ => None,
                };
                if let Some(url) = override_url {
                    stage.url = url.clone();
                }
            }
            stages
        };

        let polling = toml_config.polling;
        let defaults = PollPolicy::default();
        let interval = match args.poll_interval_secs.or(polling.interval_secs) {
            Some(value) => secs(value, "poll interval")?,
            None => defaults.interval,
        };
        let max_interval = match polling.max_interval_secs {
            Some(value) => secs(value, "max poll interval")?,
            None => defaults.max_interval.max(interval),
        };
        let max_wait = match args.max_wait_secs.or(polling.max_wait_secs) {
            Some(0) => None,
            Some(value) => Some(Duration::from_secs(value)),
            None => defaults.max_wait,
        };
        let poll_policy = PollPolicy::fixed(interval)
            .with_backoff(
                polling.backoff_factor.unwrap_or(defaults.backoff_factor),
                max_interval,
            )
            .with_max_wait(max_wait)
            .with_max_consecutive_failures(
                polling
                    .max_consecutive_failures
                    .unwrap_or(defaults.max_consecutive_failures),
            );

        let config = Self {
            port: args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT),
            audio_dir: args
                .audio_dir
                .clone()
                .or(toml_config.audio_dir)
                .unwrap_or_else(|| default_data_dir("audio")),
            transcript_dir: args
                .transcript_dir
                .clone()
                .or(toml_config.transcript_dir)
                .unwrap_or_else(|| default_data_dir("transcripts")),
            stages,
            poll_policy,
            execution: toml_config.execution.unwrap_or_default(),
            workers: args.workers.or(toml_config.workers).unwrap_or(DEFAULT_WORKERS),
            queue_capacity: toml_config.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            cors_origin: args.cors_origin.clone().or(toml_config.cors_origin),
            ffprobe_path: toml_config
                .ffprobe_path
                .unwrap_or_else(|| "ffprobe".to_string()),
            log_level: toml_config.logging.level,
            config_file: None,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(Error::Config("At least one stage must be configured".into()));
        }

        let primaries = self
            .stages
            .iter()
            .filter(|s| s.role == StageRole::Primary)
            .count();
        if primaries != 1 {
            return Err(Error::Config(format!(
                "Exactly one primary stage is required, found {}",
                primaries
            )));
        }

        for (i, stage) in self.stages.iter().enumerate() {
            if stage.name.trim().is_empty() || stage.url.trim().is_empty() {
                return Err(Error::Config(format!("Stage {} needs a name and a url", i + 1)));
            }
            if self.stages[..i].iter().any(|s| s.name == stage.name) {
                return Err(Error::Config(format!("Duplicate stage name: {}", stage.name)));
            }
            if !(stage.weight > 0.0 && stage.weight <= 1.0) {
                return Err(Error::Config(format!(
                    "Stage {} weight must be in (0, 1], got {}",
                    stage.name, stage.weight
                )));
            }
        }

        let total: f64 = self.stages.iter().map(|s| s.weight).sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(Error::Config(format!(
                "Stage weights must sum to 1.0, got {}",
                total
            )));
        }

        if self.poll_policy.interval.is_zero() {
            return Err(Error::Config("Poll interval must be greater than zero".into()));
        }
        if self.workers == 0 || self.queue_capacity == 0 {
            return Err(Error::Config("Worker count and queue capacity must be at least 1".into()));
        }

        Ok(())
    }

    /// Stage names and weights in declared order
    pub fn stage_weights(&self) -> Vec<(String, f64)> {
        self.stages
            .iter()
            .map(|s| (s.name.clone(), s.weight))
            .collect()
    }
}
