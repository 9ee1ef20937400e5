pub mod backend;
pub mod chunk;
pub mod file;
pub mod pcm;
pub mod resample;

pub use backend::{
    AudioBlock, AudioConstraints, AudioProcessing, DeviceInfo, DeviceKind, MediaDevices,
    MediaStream, MediaTrack,
};
pub use chunk::{ChunkConfig, ChunkMetadata, ChunkedRecorder};
pub use file::{AudioFile, WavDeviceConfig, WavDirectoryDevices};
pub use pcm::{quantize, PcmBufferChunk};
pub use resample::{PipelineConfig, ResamplePipeline};
