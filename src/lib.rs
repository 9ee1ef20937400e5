pub mod audio;
pub mod config;
pub mod error;
pub mod session;
pub mod target;

pub use audio::{
    AudioBlock, AudioConstraints, AudioFile, AudioProcessing, ChunkConfig, ChunkMetadata,
    ChunkedRecorder, DeviceInfo, DeviceKind, MediaDevices, MediaStream, MediaTrack,
    PcmBufferChunk, PipelineConfig, ResamplePipeline, WavDeviceConfig, WavDirectoryDevices,
};
pub use config::{Config, RecordingConfig};
pub use error::{MediaError, PipelineError, SessionError};
pub use session::{CaptureState, Microphone, SessionConfig, SessionInfo, SessionManager, Subscription};
pub use target::{Capabilities, PcmStreamer, PlaybackElement, StreamHandler, StreamTarget};
