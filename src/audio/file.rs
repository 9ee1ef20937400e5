use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::backend::{
    AudioBlock, AudioConstraints, DeviceInfo, MediaDevices, MediaStream, MediaTrack,
};
use crate::error::MediaError;

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, 32) => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            (SampleFormat::Int, bits) if (1..=32).contains(&bits) => {
                let scale = 1.0 / (1u64 << (bits - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to read audio samples")?
            }
            (format, bits) => bail!("Unsupported WAV sample format: {:?} {}-bit", format, bits),
        };

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Average all channels into a single mono signal
    pub fn to_mono(&self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}

/// Configuration for WAV-backed virtual microphones
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WavDeviceConfig {
    /// Directory scanned for `.wav` files
    pub directory: PathBuf,
    /// Frames per delivered audio block
    pub quantum_frames: usize,
    /// Restart from the beginning when a file runs out
    pub loop_playback: bool,
    /// Simulates the user's answer to the microphone permission prompt
    pub permission_granted: bool,
}

impl Default for WavDeviceConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("devices"),
            quantum_frames: 2048,
            loop_playback: true,
            permission_granted: true,
        }
    }
}

/// Media backend exposing each WAV file in a directory as a microphone
///
/// The device id is the file stem. Acquired streams deliver the file's audio
/// at real-time pace, one quantum per tick.
pub struct WavDirectoryDevices {
    config: WavDeviceConfig,
}

impl WavDirectoryDevices {
    pub fn new(config: WavDeviceConfig) -> Self {
        info!(
            "WAV device backend initialized: {} ({} frames per block)",
            config.directory.display(),
            config.quantum_frames
        );
        Self { config }
    }

    /// WAV files in the device directory as `(device_id, path)`, sorted by id
    fn device_files(&self) -> Result<Vec<(String, PathBuf)>, MediaError> {
        let entries = std::fs::read_dir(&self.config.directory).map_err(|e| {
            debug!(
                "Device directory {} unreadable: {}",
                self.config.directory.display(),
                e
            );
            MediaError::NotSupported
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| MediaError::Other(e.to_string()))?.path();
            let is_wav = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("wav"))
                .unwrap_or(false);
            if !is_wav {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                files.push((stem.to_string(), path.clone()));
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(files)
    }
}

#[async_trait::async_trait]
impl MediaDevices for WavDirectoryDevices {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, MediaError> {
        let files = self.device_files()?;

        Ok(files
            .into_iter()
            .map(|(id, _)| {
                // Labels stay hidden until access is granted
                let label = if self.config.permission_granted {
                    id.replace(['_', '-'], " ")
                } else {
                    String::new()
                };
                DeviceInfo::audio_input(id, label)
            })
            .collect())
    }

    async fn acquire_stream(&self, constraints: &AudioConstraints) -> Result<MediaStream, MediaError> {
        if !self.config.permission_granted {
            return Err(MediaError::PermissionDenied(
                "microphone access was not granted".to_string(),
            ));
        }

        let files = self.device_files()?;
        let (device_id, path) = match &constraints.device_id {
            Some(wanted) => files
                .into_iter()
                .find(|(id, _)| id == wanted)
                .ok_or_else(|| MediaError::DeviceNotFound(wanted.clone()))?,
            None => files
                .into_iter()
                .next()
                .ok_or_else(|| MediaError::DeviceNotFound("default".to_string()))?,
        };

        debug!(
            "Opening {} (echo_cancellation={}, noise_suppression={}, auto_gain_control={})",
            device_id,
            constraints.processing.echo_cancellation,
            constraints.processing.noise_suppression,
            constraints.processing.auto_gain_control
        );

        let audio = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .map_err(|e| MediaError::Other(format!("WAV loader task failed: {}", e)))?
            .map_err(|e| MediaError::Other(format!("{:#}", e)))?;

        if audio.sample_rate == 0 {
            return Err(MediaError::Other(format!("{} reports a 0 Hz sample rate", device_id)));
        }

        let quantum = self.config.quantum_frames.max(1);
        let period = Duration::from_secs_f64(quantum as f64 / audio.sample_rate as f64);
        let (audio_tx, _) = broadcast::channel(32);

        let pump = tokio::spawn(pump_blocks(
            audio.to_mono(),
            quantum,
            self.config.loop_playback,
            period,
            audio_tx.clone(),
        ));

        let track = WavTrack {
            id: format!("{}-audio", device_id),
            pump: Some(pump),
        };

        info!(
            "Virtual microphone {} opened ({}Hz, {:?} per block)",
            device_id, audio.sample_rate, period
        );

        Ok(MediaStream::new(device_id, audio.sample_rate, audio_tx).with_track(Box::new(track)))
    }

    fn name(&self) -> &str {
        "WAV directory"
    }
}

/// Deliver `samples` in blocks of `quantum`, one block per `period`
async fn pump_blocks(
    samples: Vec<f32>,
    quantum: usize,
    looping: bool,
    period: Duration,
    audio_tx: broadcast::Sender<AudioBlock>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut offset = 0;

    loop {
        ticker.tick().await;

        if offset >= samples.len() {
            if looping && !samples.is_empty() {
                offset = 0;
            } else {
                break;
            }
        }

        let end = (offset + quantum).min(samples.len());
        let block: AudioBlock = Arc::from(&samples[offset..end]);
        offset = end;

        // Nobody may be subscribed yet; blocks are dropped until someone is
        let _ = audio_tx.send(block);
    }

    debug!("Virtual microphone reached end of file");
}

struct WavTrack {
    id: String,
    pump: Option<JoinHandle<()>>,
}

impl MediaTrack for WavTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&mut self) -> Result<(), MediaError> {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        Ok(())
    }
}

impl Drop for WavTrack {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
