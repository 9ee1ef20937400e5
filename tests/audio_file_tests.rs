// Integration tests for WAV file input
//
// These tests verify that we can read WAV files and expose a directory of
// them as virtual microphones.

use anyhow::Result;
use mic_capture::audio::{
    AudioConstraints, AudioFile, AudioProcessing, DeviceKind, MediaDevices, WavDeviceConfig,
    WavDirectoryDevices,
};
use mic_capture::MediaError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

fn write_int16_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

fn write_float_wav(path: &Path, sample_rate: u32, samples: &[f32]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Directory with `desk-mic.wav` (250 samples @ 1kHz) and `usb_headset.wav`
fn device_dir() -> Result<TempDir> {
    let dir = TempDir::new()?;
    let ramp: Vec<f32> = (0..250).map(|i| i as f32 / 250.0).collect();
    write_float_wav(&dir.path().join("desk-mic.wav"), 1000, &ramp)?;
    write_int16_wav(&dir.path().join("usb_headset.wav"), 16000, 1, &[0; 160])?;
    std::fs::write(dir.path().join("notes.txt"), "not audio")?;
    Ok(dir)
}

fn backend(dir: &Path, loop_playback: bool, permission_granted: bool) -> WavDirectoryDevices {
    WavDirectoryDevices::new(WavDeviceConfig {
        directory: dir.to_path_buf(),
        quantum_frames: 100,
        loop_playback,
        permission_granted,
    })
}

fn constraints(device_id: Option<&str>) -> AudioConstraints {
    AudioConstraints::new(device_id, AudioProcessing::default())
}

#[test]
fn test_audio_file_open_int16_stereo() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("stereo.wav");
    write_int16_wav(&path, 8000, 2, &[16384, -16384, 0, 32767])?;

    let audio = AudioFile::open(&path)?;

    assert_eq!(audio.sample_rate, 8000);
    assert_eq!(audio.channels, 2);
    assert_eq!(audio.samples, vec![0.5, -0.5, 0.0, 32767.0 / 32768.0]);
    assert!((audio.duration_seconds - 2.0 / 8000.0).abs() < 1e-9);
    assert!(audio.path.contains("stereo.wav"));

    // Interleaved frames average down to mono
    assert_eq!(audio.to_mono(), vec![0.0, 32767.0 / 65536.0]);

    Ok(())
}

#[test]
fn test_audio_file_open_float32() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("float.wav");
    write_float_wav(&path, 44100, &[0.25, -1.0, 1.0])?;

    let audio = AudioFile::open(&path)?;

    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples, vec![0.25, -1.0, 1.0]);
    assert_eq!(audio.to_mono(), audio.samples);

    Ok(())
}

#[test]
fn test_audio_file_nonexistent() {
    let path = PathBuf::from("/nonexistent/path/to/audio.wav");
    let result = AudioFile::open(&path);

    assert!(result.is_err(), "Opening nonexistent file should fail");
}

#[tokio::test]
async fn test_wav_directory_lists_wav_files_sorted() -> Result<()> {
    let dir = device_dir()?;
    let devices = backend(dir.path(), false, true);

    let found = devices.enumerate_devices().await.unwrap();

    let ids: Vec<_> = found.iter().map(|d| d.device_id.as_str()).collect();
    assert_eq!(ids, vec!["desk-mic", "usb_headset"]);
    assert!(found.iter().all(|d| d.kind == DeviceKind::AudioInput));
    assert_eq!(found[0].label, "desk mic");
    assert_eq!(found[1].label, "usb headset");

    Ok(())
}

#[tokio::test]
async fn test_wav_directory_hides_labels_without_permission() -> Result<()> {
    let dir = device_dir()?;
    let devices = backend(dir.path(), false, false);

    let found = devices.enumerate_devices().await.unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|d| d.label.is_empty()));

    let err = devices.acquire_stream(&constraints(None)).await.unwrap_err();
    assert!(matches!(err, MediaError::PermissionDenied(_)));

    Ok(())
}

#[tokio::test]
async fn test_wav_directory_missing_is_not_supported() {
    let devices = backend(Path::new("/nonexistent/mic-capture/devices"), false, true);

    assert_eq!(
        devices.enumerate_devices().await.unwrap_err(),
        MediaError::NotSupported
    );
}

#[tokio::test]
async fn test_wav_directory_unknown_device() -> Result<()> {
    let dir = device_dir()?;
    let devices = backend(dir.path(), false, true);

    let err = devices
        .acquire_stream(&constraints(Some("nope")))
        .await
        .unwrap_err();

    assert_eq!(err, MediaError::DeviceNotFound("nope".to_string()));

    Ok(())
}

#[tokio::test]
async fn test_wav_stream_delivers_quanta() -> Result<()> {
    let dir = device_dir()?;
    let devices = backend(dir.path(), false, true);

    // Default input is the first device
    let stream = devices.acquire_stream(&constraints(None)).await.unwrap();
    assert_eq!(stream.device_id(), "desk-mic");
    assert_eq!(stream.sample_rate(), 1000);
    assert_eq!(stream.track_count(), 1);

    let mut rx = stream.subscribe();
    let mut lengths = Vec::new();
    for _ in 0..3 {
        let block = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await??;
        lengths.push(block.len());
    }

    assert_eq!(lengths, vec![100, 100, 50]);

    Ok(())
}

#[tokio::test]
async fn test_wav_stream_loops() -> Result<()> {
    let dir = device_dir()?;
    let devices = backend(dir.path(), true, true);

    let stream = devices
        .acquire_stream(&constraints(Some("desk-mic")))
        .await
        .unwrap();
    let mut rx = stream.subscribe();

    let first = rx.recv().await?;
    for _ in 0..2 {
        rx.recv().await?;
    }
    let wrapped = rx.recv().await?;

    assert_eq!(first[..], wrapped[..]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stopping_track_ends_delivery() -> Result<()> {
    let dir = device_dir()?;
    let devices = backend(dir.path(), true, true);

    let mut stream = devices.acquire_stream(&constraints(None)).await.unwrap();
    let mut rx = stream.subscribe();
    rx.recv().await?;

    assert!(stream.stop_tracks().is_empty());

    // Drain anything sent before the stop landed
    while rx.try_recv().is_ok() {}
    let next = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
    assert!(next.is_err(), "no blocks after the track is stopped");

    Ok(())
}
