use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use mic_capture::{
    ChunkConfig, ChunkedRecorder, Config, PcmStreamer, SessionManager, StreamTarget,
    WavDirectoryDevices,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// PCM buffers queued between the streamer and the file writer
const PCM_QUEUE_DEPTH: usize = 64;

#[derive(Parser)]
#[command(name = "mic-capture")]
#[command(about = "Capture microphone audio as 16-bit PCM")]
struct Cli {
    /// Config file (toml, yaml or json; extension optional)
    #[arg(short, long, default_value = "config/mic-capture")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available microphones
    Devices {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record from a microphone into chunked WAV files
    Record {
        /// Device id (default input when omitted)
        #[arg(short, long)]
        device: Option<String>,

        /// Stop after this many seconds (Ctrl+C otherwise)
        #[arg(short, long)]
        seconds: Option<u64>,

        /// Output directory (overrides recording.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(Some(cli.config.as_str()))?;

    let devices = Arc::new(WavDirectoryDevices::new(cfg.devices.clone()));
    let mut manager = SessionManager::new(cfg.session.clone(), devices)?;

    let _states = manager.on_state_change(|state| info!("Capture state: {}", state));

    let result = match cli.command {
        Command::Devices { json } => list_devices(&mut manager, json).await,
        Command::Record {
            device,
            seconds,
            output,
        } => record(&mut manager, &cfg, device.as_deref(), seconds, output).await,
    };

    manager.dispose();
    result
}

async fn list_devices(manager: &mut SessionManager, json: bool) -> Result<()> {
    let microphones = manager.get_microphone_list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&microphones)?);
        return Ok(());
    }

    if microphones.is_empty() {
        println!("No microphones found");
    }
    for mic in &microphones {
        println!("{}\t{}", mic.device_id, mic.label);
    }

    Ok(())
}

async fn record(
    manager: &mut SessionManager,
    cfg: &Config,
    device: Option<&str>,
    seconds: Option<u64>,
    output: Option<PathBuf>,
) -> Result<()> {
    let session_id = format!("capture-{}", Utc::now().format("%Y%m%d-%H%M%S"));
    let output_dir = output.unwrap_or_else(|| cfg.recording.output_dir.clone());

    let mut chunk_config = ChunkConfig::new(session_id.clone(), output_dir.clone());
    chunk_config.chunk_duration_secs = cfg.recording.chunk_duration_secs;
    let (pcm_tx, pcm_rx) = mpsc::channel(PCM_QUEUE_DEPTH);
    let (spent_tx, spent_rx) = mpsc::channel(PCM_QUEUE_DEPTH);

    let mut recorder = ChunkedRecorder::new(chunk_config)?.with_recycling(spent_tx);
    manager.set_stream_target(StreamTarget::handler(
        PcmStreamer::new(cfg.pipeline.clone(), pcm_tx).with_recycling(spent_rx),
    ));

    let recording_handle = tokio::spawn(async move { recorder.record(pcm_rx).await });

    manager
        .start_recording(device)
        .await
        .context("Failed to start recording")?;

    info!("Recording session {} to {}", session_id, output_dir.display());

    match seconds {
        Some(secs) => {
            info!("Recording for {} seconds (Ctrl+C to stop early)", secs);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
        }
        None => {
            info!("Recording until Ctrl+C");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl+C")?;
        }
    }

    if let Some(session) = manager.session_info() {
        info!(
            "Stopping {} after {:.1}s",
            session.device_id, session.duration_secs
        );
    }
    manager.stop_recording();

    // Dropping the streamer closes the PCM channel and lets the recorder finish
    drop(manager.clear_stream_target());

    info!("Finalizing chunks...");
    let metadata = recording_handle.await??;

    if metadata.is_empty() {
        warn!("No audio was captured");
    }
    for chunk in &metadata {
        info!(
            "  - Chunk {}: {} ({:.1}s - {:.1}s, {} samples)",
            chunk.chunk_index,
            chunk.file_path.display(),
            chunk.start_ms as f64 / 1000.0,
            chunk.end_ms as f64 / 1000.0,
            chunk.sample_count
        );
    }

    Ok(())
}
