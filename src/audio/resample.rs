// Streaming sample-rate conversion from float capture blocks to PCM16
//
// Audio arrives in fixed-size quanta. The read position into the source
// signal is fractional and is carried from one block into the next, together
// with the last sample of the previous block, so the output is the same as if
// the whole signal had been converted in one call.

use serde::Deserialize;

use super::pcm::{quantize, PcmBufferChunk};
use crate::error::PipelineError;

/// Buffers kept for reuse after a consumer hands them back
const MAX_SPARE_BUFFERS: usize = 4;

/// Configuration for the PCM transform
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capture rate assumed when a stream does not report one
    pub source_sample_rate: u32,
    /// Output rate of the PCM16 frames
    pub target_sample_rate: u32,
    /// Source frames per processing quantum
    pub quantum_frames: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_sample_rate: 44100,
            target_sample_rate: 16000,
            quantum_frames: 2048,
        }
    }
}

/// Converts float sample blocks at `source_rate` into PCM16 blocks at
/// `target_rate` using linear interpolation.
#[derive(Debug)]
pub struct ResamplePipeline {
    source_rate: u32,
    target_rate: u32,
    /// Source samples advanced per output sample
    ratio: f64,
    /// Position of the next output sample relative to the start of the next
    /// input block. Never below -1.0; index -1 refers to `previous`.
    position: f64,
    /// Last sample of the previous block
    previous: Option<f32>,
    spare: Vec<Vec<i16>>,
}

impl ResamplePipeline {
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Self, PipelineError> {
        if source_rate == 0 {
            return Err(PipelineError::InvalidSampleRate {
                which: "source",
                rate: source_rate,
            });
        }
        if target_rate == 0 {
            return Err(PipelineError::InvalidSampleRate {
                which: "target",
                rate: target_rate,
            });
        }

        Ok(Self {
            source_rate,
            target_rate,
            ratio: source_rate as f64 / target_rate as f64,
            position: 0.0,
            previous: None,
            spare: Vec::new(),
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        Self::new(config.source_sample_rate, config.target_sample_rate)
    }

    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Upper bound on the output length for an input block of `input_len`
    pub fn max_output_len(&self, input_len: usize) -> usize {
        (input_len as f64 / self.ratio).ceil() as usize + 1
    }

    /// Convert one block and hand the result over to the caller.
    ///
    /// The returned buffer is never touched again by the pipeline unless it
    /// is given back through [`recycle`](Self::recycle).
    pub fn process(&mut self, input: &[f32]) -> PcmBufferChunk {
        let mut samples = self.spare.pop().unwrap_or_default();
        self.process_into(input, &mut samples);
        PcmBufferChunk::mono(self.target_rate, samples)
    }

    /// Convert one block into a caller-owned buffer, replacing its contents.
    /// Returns the number of samples written.
    pub fn process_into(&mut self, input: &[f32], out: &mut Vec<i16>) -> usize {
        out.clear();
        if input.is_empty() {
            return 0;
        }

        if self.source_rate == self.target_rate {
            out.extend(input.iter().map(|&s| quantize(s)));
            self.previous = input.last().copied();
            return out.len();
        }

        let needed = self.max_output_len(input.len());
        if out.capacity() < needed {
            out.reserve(needed);
        }

        let len = input.len() as isize;
        loop {
            let floor = self.position.floor();
            let idx = floor as isize;
            // The ceiling sample must be in hand; otherwise wait for the next block
            if idx + 1 >= len {
                break;
            }
            let Some(s0) = self.sample_at(input, idx) else {
                break;
            };
            let s1 = input[(idx + 1) as usize];
            let frac = (self.position - floor) as f32;

            out.push(quantize(s0 + frac * (s1 - s0)));
            self.position += self.ratio;
        }

        self.previous = input.last().copied();
        self.position -= input.len() as f64;

        out.len()
    }

    /// Return a consumed chunk's buffer for reuse
    pub fn recycle(&mut self, chunk: PcmBufferChunk) {
        if self.spare.len() < MAX_SPARE_BUFFERS {
            let mut samples = chunk.into_samples();
            samples.clear();
            self.spare.push(samples);
        }
    }

    /// Forget the carried position, e.g. before feeding an unrelated stream
    pub fn reset(&mut self) {
        self.position = 0.0;
        self.previous = None;
    }

    fn sample_at(&self, input: &[f32], idx: isize) -> Option<f32> {
        if idx >= 0 {
            input.get(idx as usize).copied()
        } else if idx == -1 {
            self.previous
        } else {
            None
        }
    }
}
