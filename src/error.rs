//! Error types for mic-capture.

use thiserror::Error;

use crate::session::CaptureState;

/// Errors reported by the platform media layer (device enumeration and
/// stream acquisition).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("media devices API not supported")]
    NotSupported,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("requested device not found: {0}")]
    DeviceNotFound(String),

    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by the capture session manager.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("A session manager instance already exists in this process")]
    InstanceAlreadyExists,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: CaptureState, to: CaptureState },

    #[error("Audio devices unavailable: {message}")]
    DeviceUnavailable { message: String },

    #[error("Microphone permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Failed to acquire audio stream{}: {source}", device_suffix(.device_id))]
    StreamAcquisitionFailed {
        device_id: Option<String>,
        source: MediaError,
    },

    #[error("Failed to stop track {track_id}: {source}")]
    TrackStopFailure { track_id: String, source: MediaError },
}

fn device_suffix(device_id: &Option<String>) -> String {
    match device_id {
        Some(id) => format!(" for device {}", id),
        None => String::new(),
    }
}

impl SessionError {
    /// Map an enumeration-phase media error onto the session taxonomy.
    pub(crate) fn from_enumeration(err: MediaError) -> Self {
        match err {
            MediaError::PermissionDenied(message) => SessionError::PermissionDenied { message },
            MediaError::NotSupported => SessionError::DeviceUnavailable {
                message: MediaError::NotSupported.to_string(),
            },
            other => SessionError::DeviceUnavailable {
                message: other.to_string(),
            },
        }
    }
}

/// Errors from constructing a resample pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Invalid {which} sample rate: {rate} Hz")]
    InvalidSampleRate { which: &'static str, rate: u32 },
}

pub type Result<T> = std::result::Result<T, SessionError>;
