use serde::Deserialize;
use std::time::Duration;

use crate::audio::AudioProcessing;

/// Configuration for the capture session manager
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a device enumeration stays valid, in milliseconds
    /// Default: 5000
    pub device_cache_ttl_ms: u64,

    /// Voice processing requested for every acquired stream
    pub processing: AudioProcessing,
}

impl SessionConfig {
    pub fn device_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.device_cache_ttl_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_cache_ttl_ms: 5000,
            processing: AudioProcessing::default(),
        }
    }
}
