// HandlerSink that turns a captured stream into PCM16 buffers
//
// Every audio block of the stream goes through a ResamplePipeline and the
// resulting PcmBufferChunk is moved into an mpsc channel for a downstream
// consumer (file writer, network relay, ...).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{Capabilities, StreamHandler};
use crate::audio::{MediaStream, PcmBufferChunk, PipelineConfig, ResamplePipeline};
use crate::error::SessionError;

type Returned = Arc<Mutex<mpsc::Receiver<PcmBufferChunk>>>;

pub struct PcmStreamer {
    config: PipelineConfig,
    pcm_tx: mpsc::Sender<PcmBufferChunk>,
    returned: Option<Returned>,
    task: Option<JoinHandle<()>>,
    chunks_sent: Arc<AtomicUsize>,
}

impl PcmStreamer {
    pub fn new(config: PipelineConfig, pcm_tx: mpsc::Sender<PcmBufferChunk>) -> Self {
        Self {
            config,
            pcm_tx,
            returned: None,
            task: None,
            chunks_sent: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reuse buffers the consumer sends back on `returned`
    ///
    /// Without a return path every emitted buffer is a fresh allocation
    /// owned by the consumer.
    pub fn with_recycling(mut self, returned: mpsc::Receiver<PcmBufferChunk>) -> Self {
        self.returned = Some(Arc::new(Mutex::new(returned)));
        self
    }

    /// Number of PCM buffers handed to the consumer so far
    pub fn chunks_sent(&self) -> usize {
        self.chunks_sent.load(Ordering::SeqCst)
    }

    pub fn is_streaming(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    fn halt(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("PCM streaming halted");
        }
    }
}

impl StreamHandler for PcmStreamer {
    fn set_stream(&mut self, stream: Option<&MediaStream>) {
        self.halt();

        let Some(stream) = stream else {
            return;
        };

        let source_rate = if stream.sample_rate() > 0 {
            stream.sample_rate()
        } else {
            warn!(
                "Stream {} reports no sample rate, assuming {}Hz",
                stream.id(),
                self.config.source_sample_rate
            );
            self.config.source_sample_rate
        };

        let mut pipeline = match ResamplePipeline::new(source_rate, self.config.target_sample_rate) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                error!("Cannot stream {}: {}", stream.id(), e);
                return;
            }
        };

        let mut audio_rx = stream.subscribe();
        let pcm_tx = self.pcm_tx.clone();
        let chunks_sent = Arc::clone(&self.chunks_sent);
        let stream_id = stream.id().to_string();
        let returned = self.returned.clone();

        info!(
            "Streaming {} as PCM16 ({}Hz -> {}Hz)",
            stream_id, source_rate, self.config.target_sample_rate
        );

        self.task = Some(tokio::spawn(async move {
            loop {
                match audio_rx.recv().await {
                    Ok(block) => {
                        if let Some(returned) = &returned {
                            let mut returned = returned.lock().unwrap_or_else(|p| p.into_inner());
                            while let Ok(spent) = returned.try_recv() {
                                pipeline.recycle(spent);
                            }
                        }

                        let chunk = pipeline.process(&block);
                        if chunk.is_empty() {
                            pipeline.recycle(chunk);
                            continue;
                        }
                        if pcm_tx.send(chunk).await.is_err() {
                            warn!("PCM consumer closed, stopping stream {}", stream_id);
                            break;
                        }
                        chunks_sent.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("PCM streamer fell behind, {} audio blocks dropped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            info!("PCM streaming task for {} finished", stream_id);
        }));
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            on_stream_start: true,
            on_stream_stop: true,
            on_stream_error: true,
            ..Capabilities::NONE
        }
    }

    fn on_stream_start(&mut self) {
        info!("PCM stream started");
    }

    fn on_stream_stop(&mut self) {
        info!("PCM stream stopped after {} buffers", self.chunks_sent());
    }

    fn on_stream_error(&mut self, error: &SessionError) {
        error!("PCM stream error: {}", error);
    }
}

impl Drop for PcmStreamer {
    fn drop(&mut self) {
        self.halt();
    }
}
