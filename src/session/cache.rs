use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::audio::DeviceInfo;

/// A system audio-input device as presented to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Microphone {
    pub device_id: String,
    pub label: String,
}

impl Microphone {
    /// Build from a platform descriptor, substituting a label when the
    /// platform withholds one.
    pub fn from_device(device: DeviceInfo) -> Self {
        let label = if device.label.trim().is_empty() {
            format!("Microphone ({})", device.device_id)
        } else {
            device.label
        };
        Self {
            device_id: device.device_id,
            label,
        }
    }
}

#[derive(Debug)]
struct CachedList {
    entries: Vec<Microphone>,
    fetched_at: Instant,
}

/// Time-limited cache of the last device enumeration
///
/// Either empty or holding one complete enumeration result; entries are only
/// ever replaced wholesale.
#[derive(Debug)]
pub struct DeviceListCache {
    ttl: Duration,
    cached: Option<CachedList>,
}

impl DeviceListCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, cached: None }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached entries, if fetched less than `ttl` before `now`
    pub fn get(&self, now: Instant) -> Option<&[Microphone]> {
        self.cached
            .as_ref()
            .filter(|c| now.saturating_duration_since(c.fetched_at) < self.ttl)
            .map(|c| c.entries.as_slice())
    }

    pub fn store(&mut self, entries: Vec<Microphone>, fetched_at: Instant) {
        self.cached = Some(CachedList {
            entries,
            fetched_at,
        });
    }

    pub fn clear(&mut self) {
        self.cached = None;
    }

    pub fn is_empty(&self) -> bool {
        self.cached.is_none()
    }
}
