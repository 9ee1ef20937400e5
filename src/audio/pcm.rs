/// Largest positive PCM16 magnitude
const INT16_MAX: f32 = 32767.0;
/// Magnitude of the most negative PCM16 value
const INT16_MIN_MAGNITUDE: f32 = 32768.0;

/// Convert one float sample to signed 16-bit PCM
///
/// The sample is clamped to [-1.0, 1.0]; negative values scale by 32768 and
/// non-negative values by 32767, truncating toward zero.
#[inline]
pub fn quantize(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * INT16_MIN_MAGNITUDE) as i16
    } else {
        // NaN falls through here and `as` maps it to 0
        (s * INT16_MAX) as i16
    }
}

/// A block of PCM16 audio ready for a downstream consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBufferChunk {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (always 1 for pipeline output)
    pub channel_count: u16,
    /// Raw audio samples
    pub samples: Vec<i16>,
}

impl PcmBufferChunk {
    pub fn mono(sample_rate: u32, samples: Vec<i16>) -> Self {
        Self {
            sample_rate,
            channel_count: 1,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback duration of this chunk in milliseconds
    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 || self.channel_count == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1000.0
            / (self.sample_rate as f64 * self.channel_count as f64)
    }

    /// Little-endian byte payload, as a relay would put it on the wire
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}
