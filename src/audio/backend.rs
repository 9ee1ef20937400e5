use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::MediaError;

/// One quantum of mono floating-point samples in [-1.0, 1.0]
pub type AudioBlock = Arc<[f32]>;

/// Kind of a platform media device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Microphone / line input
    AudioInput,
    /// Speakers / headphones
    AudioOutput,
    /// Camera
    VideoInput,
}

/// Device descriptor as reported by the platform enumeration call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_id: String,
    pub kind: DeviceKind,
    /// May be empty when the platform withholds labels
    pub label: String,
}

impl DeviceInfo {
    pub fn audio_input(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            kind: DeviceKind::AudioInput,
            label: label.into(),
        }
    }
}

/// Voice processing flags requested from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioProcessing {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for AudioProcessing {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Constraints for a stream acquisition request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConstraints {
    /// Exact device to open; `None` selects the default input
    pub device_id: Option<String>,
    pub processing: AudioProcessing,
}

impl AudioConstraints {
    pub fn new(device_id: Option<&str>, processing: AudioProcessing) -> Self {
        Self {
            device_id: device_id.map(str::to_string),
            processing,
        }
    }

    /// Any default input with the given processing flags
    pub fn default_input(processing: AudioProcessing) -> Self {
        Self::new(None, processing)
    }
}

/// A single track of an open stream
pub trait MediaTrack: Send {
    fn id(&self) -> &str;

    /// Stop the track. Stopping an already stopped track succeeds.
    fn stop(&mut self) -> Result<(), MediaError>;
}

/// An open hardware audio stream
///
/// Audio arrives as mono [`AudioBlock`]s, one per platform quantum, through a
/// broadcast channel; call [`MediaStream::subscribe`] to receive them.
pub struct MediaStream {
    id: String,
    device_id: String,
    sample_rate: u32,
    tracks: Vec<Box<dyn MediaTrack>>,
    audio_tx: broadcast::Sender<AudioBlock>,
}

impl MediaStream {
    pub fn new(
        device_id: impl Into<String>,
        sample_rate: u32,
        audio_tx: broadcast::Sender<AudioBlock>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            device_id: device_id.into(),
            sample_rate,
            tracks: Vec::new(),
            audio_tx,
        }
    }

    pub fn with_track(mut self, track: Box<dyn MediaTrack>) -> Self {
        self.tracks.push(track);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Source sample rate in Hz (0 if the platform did not report one)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Receive the stream's audio blocks from now on
    pub fn subscribe(&self) -> broadcast::Receiver<AudioBlock> {
        self.audio_tx.subscribe()
    }

    /// Stop every track, returning the failures instead of aborting on the
    /// first one.
    pub fn stop_tracks(&mut self) -> Vec<(String, MediaError)> {
        let mut failures = Vec::new();
        for track in &mut self.tracks {
            match track.stop() {
                Ok(()) => debug!("Stopped track {}", track.id()),
                Err(e) => failures.push((track.id().to_string(), e)),
            }
        }
        failures
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("device_id", &self.device_id)
            .field("sample_rate", &self.sample_rate)
            .field("tracks", &self.tracks.len())
            .finish()
    }
}

/// Platform media API
///
/// Implementations:
/// - [`WavDirectoryDevices`](super::file::WavDirectoryDevices): WAV files as virtual microphones
/// - test doubles in `tests/common`
#[async_trait::async_trait]
pub trait MediaDevices: Send + Sync {
    /// List every device the platform knows about (all kinds)
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, MediaError>;

    /// Open a stream satisfying the constraints
    async fn acquire_stream(&self, constraints: &AudioConstraints) -> Result<MediaStream, MediaError>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
