use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::audio::{PipelineConfig, WavDeviceConfig};
use crate::session::SessionConfig;

/// Environment variable prefix; nested keys use `__`
/// (e.g. `MIC_CAPTURE__SESSION__DEVICE_CACHE_TTL_MS`)
pub const ENV_PREFIX: &str = "MIC_CAPTURE";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub pipeline: PipelineConfig,
    pub devices: WavDeviceConfig,
    pub recording: RecordingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub output_dir: PathBuf,
    pub chunk_duration_secs: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("recordings"),
            chunk_duration_secs: 300,
        }
    }
}

impl Config {
    /// Load defaults, then the optional config file, then environment overrides
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}
