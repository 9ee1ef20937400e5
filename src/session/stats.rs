use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the open capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Stream identifier assigned at acquisition
    pub stream_id: String,

    /// Device the stream was opened on
    pub device_id: String,

    /// Device requested by the caller, if any
    pub requested_device_id: Option<String>,

    /// When the stream was acquired
    pub started_at: DateTime<Utc>,

    /// Time since acquisition in seconds
    pub duration_secs: f64,

    /// Source sample rate of the stream
    pub sample_rate: u32,
}
