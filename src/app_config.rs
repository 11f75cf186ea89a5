use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings. The configuration is
/// passed explicitly into every component; nothing here is global.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Append-only manifest written by the acquisition service
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,

    /// Root directory for extracted frames
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// Sampling parameters
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Worker count for the batch runner, derived from the CPU count if unset
    #[serde(default)]
    pub workers: Option<usize>,

    /// Only process videos whose file name contains this substring
    #[serde(default)]
    pub only_video: Option<String>,

    /// External transcoder settings
    #[serde(default)]
    pub transcoder: TranscoderConfig,

    /// External acquisition service settings
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Per-video sampling parameters
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SamplingConfig {
    /// Maximum subtitle entries considered per video, 0 means unlimited
    #[serde(default)]
    pub max_entries: usize,

    /// Maximum Hamming distance at which two frames count as duplicates.
    /// Smaller is stricter, 0 only suppresses exact matches.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: u32,

    /// Entries starting before this many seconds are never sampled
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_entries: 0,
            similarity_threshold: default_similarity_threshold(),
            warmup_secs: default_warmup_secs(),
        }
    }
}

/// ffmpeg / ffprobe configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranscoderConfig {
    // @field: ffmpeg executable
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    // @field: ffprobe executable
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    /// Per-frame extraction timeout. Unset means a frame grab may block
    /// for as long as the transcoder runs.
    #[serde(default)]
    pub frame_timeout_secs: Option<u64>,

    // @field: Duration probe timeout
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            frame_timeout_secs: None,
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

/// External acquisition (download) service configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AcquisitionConfig {
    /// Command that performs one acquisition run. When unset the
    /// acquisition step is skipped and only the manifest is consulted.
    #[serde(default)]
    pub command: Option<String>,

    // @field: Arguments passed to the command
    #[serde(default)]
    pub args: Vec<String>,

    // @field: Timeout for one acquisition run
    #[serde(default = "default_acquisition_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_secs: default_acquisition_timeout_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    // @returns: Matching filter for the log facade
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Upper bound of the Hamming distance between two fingerprints
pub const MAX_SIMILARITY_THRESHOLD: u32 = 64;

fn default_manifest_path() -> PathBuf {
    PathBuf::from("video_storage").join("manifest.jsonl")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("frames_output")
}

fn default_similarity_threshold() -> u32 {
    5
}

fn default_warmup_secs() -> f64 {
    10.0
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    60
}

fn default_acquisition_timeout_secs() -> u64 {
    6 * 60 * 60
}

/// Default worker count for the batch runner.
///
/// Work is dominated by waiting on ffmpeg and the filesystem, so the pool
/// stays between 2 and 4 threads whatever the CPU count.
pub fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus.clamp(2, 4)
}

impl Config {
    /// Load a configuration file, writing a default one first if it is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {:?}", path))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            return Ok(config);
        }

        log::warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {:?}", path))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.sampling.similarity_threshold > MAX_SIMILARITY_THRESHOLD {
            return Err(anyhow!(
                "Similarity threshold must be between 0 and {}, got {}",
                MAX_SIMILARITY_THRESHOLD,
                self.sampling.similarity_threshold
            ));
        }

        if !self.sampling.warmup_secs.is_finite() || self.sampling.warmup_secs < 0.0 {
            return Err(anyhow!(
                "Warm-up window must be a non-negative number of seconds, got {}",
                self.sampling.warmup_secs
            ));
        }

        if self.workers == Some(0) {
            return Err(anyhow!("Worker count must be at least 1"));
        }

        if self.transcoder.ffmpeg_path.trim().is_empty()
            || self.transcoder.ffprobe_path.trim().is_empty()
        {
            return Err(anyhow!("ffmpeg and ffprobe paths must not be empty"));
        }

        if let Some(command) = &self.acquisition.command {
            if command.trim().is_empty() {
                return Err(anyhow!("Acquisition command must not be empty when set"));
            }
        }

        Ok(())
    }

    /// Worker count to use, falling back to the CPU-derived default
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(default_workers)
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            manifest_path: default_manifest_path(),
            output_root: default_output_root(),
            sampling: SamplingConfig::default(),
            workers: None,
            only_video: None,
            transcoder: TranscoderConfig::default(),
            acquisition: AcquisitionConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
