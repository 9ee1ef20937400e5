use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::pcm::PcmBufferChunk;

/// Chunk configuration
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Duration of each chunk in seconds (default: 300 = 5 minutes)
    pub chunk_duration_secs: u64,
    /// Output directory for chunks
    pub output_dir: PathBuf,
    /// Session ID (used for chunk filenames)
    pub session_id: String,
}

impl ChunkConfig {
    pub fn new(session_id: String, output_dir: PathBuf) -> Self {
        Self {
            chunk_duration_secs: 300, // 5 minutes default
            output_dir,
            session_id,
        }
    }
}

/// Metadata for a single chunk
#[derive(Debug, Clone)]
pub struct ChunkMetadata {
    /// Chunk number (0-indexed)
    pub chunk_index: usize,
    /// File path to the chunk
    pub file_path: PathBuf,
    /// Start time in milliseconds of audio since recording started
    pub start_ms: u64,
    /// End time in milliseconds of audio since recording started
    pub end_ms: u64,
    /// Sample rate
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Number of samples in this chunk
    pub sample_count: usize,
}

/// Chunked PCM16 recorder
///
/// Receives PCM buffers from a stream handler and saves them to disk in
/// fixed-duration WAV chunks. Time is measured in audio samples, not wall
/// clock, so chunk boundaries are exact.
pub struct ChunkedRecorder {
    config: ChunkConfig,
    current_chunk: Option<ChunkWriter>,
    chunk_index: usize,
    /// Samples written across all chunks
    total_samples: u64,
    /// Where written buffers go back for reuse
    recycle_tx: Option<mpsc::Sender<PcmBufferChunk>>,
}

impl ChunkedRecorder {
    pub fn new(config: ChunkConfig) -> Result<Self> {
        if config.chunk_duration_secs == 0 {
            bail!("Chunk duration must be at least 1 second");
        }

        // Create output directory if it doesn't exist
        fs::create_dir_all(&config.output_dir).context("Failed to create output directory")?;

        info!(
            "Chunked recorder initialized: {} (chunks: {}s each)",
            config.session_id, config.chunk_duration_secs
        );

        Ok(Self {
            config,
            current_chunk: None,
            chunk_index: 0,
            total_samples: 0,
            recycle_tx: None,
        })
    }

    /// Hand every written buffer back on `recycle_tx` (dropped when full)
    pub fn with_recycling(mut self, recycle_tx: mpsc::Sender<PcmBufferChunk>) -> Self {
        self.recycle_tx = Some(recycle_tx);
        self
    }

    /// Write incoming PCM buffers to chunk files until the sender side closes
    pub async fn record(
        &mut self,
        mut pcm_rx: mpsc::Receiver<PcmBufferChunk>,
    ) -> Result<Vec<ChunkMetadata>> {
        let mut metadata = Vec::new();

        info!("Starting chunked recording");

        while let Some(buffer) = pcm_rx.recv().await {
            if buffer.is_empty() {
                continue;
            }

            let mut remaining: &[i16] = &buffer.samples;
            while !remaining.is_empty() {
                // Finish current chunk if full or the format changed
                if self.chunk_is_full(&buffer) {
                    if let Some(chunk) = self.current_chunk.take() {
                        let chunk_meta = chunk.finish()?;
                        info!(
                            "Chunk {} complete: {:.1}s - {:.1}s ({} samples)",
                            chunk_meta.chunk_index,
                            chunk_meta.start_ms as f64 / 1000.0,
                            chunk_meta.end_ms as f64 / 1000.0,
                            chunk_meta.sample_count
                        );
                        metadata.push(chunk_meta);
                    }
                }

                if self.current_chunk.is_none() {
                    self.current_chunk = Some(self.start_new_chunk(&buffer)?);
                }

                let chunk_capacity = self.chunk_capacity(&buffer);
                if let Some(chunk) = &mut self.current_chunk {
                    let room = chunk_capacity.saturating_sub(chunk.metadata.sample_count).max(1);
                    let take = room.min(remaining.len());
                    chunk.write_samples(&remaining[..take])?;
                    self.total_samples += take as u64;
                    remaining = &remaining[take..];
                }
            }

            if let Some(recycle_tx) = &self.recycle_tx {
                let _ = recycle_tx.try_send(buffer);
            }
        }

        // Finish final chunk
        if let Some(chunk) = self.current_chunk.take() {
            let chunk_meta = chunk.finish()?;
            info!(
                "Final chunk {} complete: {:.1}s - {:.1}s ({} samples)",
                chunk_meta.chunk_index,
                chunk_meta.start_ms as f64 / 1000.0,
                chunk_meta.end_ms as f64 / 1000.0,
                chunk_meta.sample_count
            );
            metadata.push(chunk_meta);
        }

        info!("Chunked recording complete: {} chunks saved", metadata.len());

        Ok(metadata)
    }

    /// Samples that fit in one chunk at the buffer's format
    fn chunk_capacity(&self, buffer: &PcmBufferChunk) -> usize {
        (self.config.chunk_duration_secs
            * buffer.sample_rate as u64
            * buffer.channel_count as u64) as usize
    }

    fn chunk_is_full(&self, buffer: &PcmBufferChunk) -> bool {
        match &self.current_chunk {
            None => false,
            Some(chunk) => {
                let format_changed = chunk.metadata.sample_rate != buffer.sample_rate
                    || chunk.metadata.channels != buffer.channel_count;
                if format_changed {
                    warn!(
                        "PCM format changed from {}Hz/{}ch to {}Hz/{}ch, starting new chunk",
                        chunk.metadata.sample_rate,
                        chunk.metadata.channels,
                        buffer.sample_rate,
                        buffer.channel_count
                    );
                }
                format_changed || chunk.metadata.sample_count >= self.chunk_capacity(buffer)
            }
        }
    }

    fn start_new_chunk(&mut self, buffer: &PcmBufferChunk) -> Result<ChunkWriter> {
        let chunk_path = self.config.output_dir.join(format!(
            "{}-chunk-{:03}.wav",
            self.config.session_id, self.chunk_index
        ));

        let start_ms = samples_to_ms(self.total_samples, buffer.sample_rate, buffer.channel_count);
        let chunk = ChunkWriter::new(
            chunk_path,
            self.chunk_index,
            start_ms,
            buffer.sample_rate,
            buffer.channel_count,
        )?;

        self.chunk_index += 1;

        Ok(chunk)
    }
}

fn samples_to_ms(samples: u64, sample_rate: u32, channels: u16) -> u64 {
    let per_second = sample_rate as u64 * channels.max(1) as u64;
    if per_second == 0 {
        return 0;
    }
    samples * 1000 / per_second
}

/// Writes a single chunk to disk as WAV file
struct ChunkWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    metadata: ChunkMetadata,
}

impl ChunkWriter {
    fn new(
        file_path: PathBuf,
        chunk_index: usize,
        start_ms: u64,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&file_path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", file_path))?;

        Ok(Self {
            writer: Some(writer),
            metadata: ChunkMetadata {
                chunk_index,
                file_path,
                start_ms,
                end_ms: start_ms,
                sample_rate,
                channels,
                sample_count: 0,
            },
        })
    }

    fn write_samples(&mut self, samples: &[i16]) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            for &sample in samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }

            self.metadata.sample_count += samples.len();
            self.metadata.end_ms = self.metadata.start_ms
                + samples_to_ms(
                    self.metadata.sample_count as u64,
                    self.metadata.sample_rate,
                    self.metadata.channels,
                );
        }

        Ok(())
    }

    fn finish(mut self) -> Result<ChunkMetadata> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize WAV file")?;
        }

        Ok(self.metadata.clone())
    }
}

impl Drop for ChunkWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}
