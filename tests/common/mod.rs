// Shared test doubles for session manager tests
//
// The session manager is a per-process singleton, so every test that builds
// one must hold `serial()` for its whole duration.

#![allow(dead_code)]

use mic_capture::audio::{
    AudioBlock, AudioConstraints, DeviceInfo, DeviceKind, MediaDevices, MediaStream, MediaTrack,
};
use mic_capture::{
    Capabilities, CaptureState, MediaError, PlaybackElement, SessionError, StreamHandler,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

static SERIAL: Mutex<()> = Mutex::new(());

/// Serialize tests that construct a `SessionManager`
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub type Events = Arc<Mutex<Vec<String>>>;

pub fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn snapshot(events: &Events) -> Vec<String> {
    events.lock().unwrap().clone()
}

/// Collect every state a listener is told about
pub fn state_log() -> (
    Arc<Mutex<Vec<CaptureState>>>,
    impl FnMut(CaptureState) + Send + 'static,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |state| sink.lock().unwrap().push(state))
}

/// Scriptable stand-in for the platform media API
pub struct FakeDevices {
    devices: Mutex<Vec<DeviceInfo>>,
    sample_rate: u32,
    tracks_per_stream: usize,
    enumerate_error: Mutex<Option<MediaError>>,
    acquire_error: Mutex<Option<MediaError>>,
    failing_track_stop: AtomicBool,
    pub enumerate_calls: AtomicUsize,
    pub acquire_calls: AtomicUsize,
    /// Requested device id of every acquire call
    pub requested: Mutex<Vec<Option<String>>>,
    /// Ids of tracks as they are stopped
    pub stopped_tracks: Events,
    last_sender: Mutex<Option<broadcast::Sender<AudioBlock>>>,
}

impl FakeDevices {
    pub fn new() -> Self {
        Self::with_devices(vec![
            DeviceInfo::audio_input("mic-1", "Built-in Microphone"),
            DeviceInfo::audio_input("mic-2", "USB Headset"),
        ])
    }

    pub fn with_devices(devices: Vec<DeviceInfo>) -> Self {
        Self {
            devices: Mutex::new(devices),
            sample_rate: 48000,
            tracks_per_stream: 1,
            enumerate_error: Mutex::new(None),
            acquire_error: Mutex::new(None),
            failing_track_stop: AtomicBool::new(false),
            enumerate_calls: AtomicUsize::new(0),
            acquire_calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
            stopped_tracks: events(),
            last_sender: Mutex::new(None),
        }
    }

    pub fn tracks_per_stream(mut self, tracks: usize) -> Self {
        self.tracks_per_stream = tracks;
        self
    }

    pub fn set_devices(&self, devices: Vec<DeviceInfo>) {
        *self.devices.lock().unwrap() = devices;
    }

    pub fn fail_enumerate(&self, error: Option<MediaError>) {
        *self.enumerate_error.lock().unwrap() = error;
    }

    pub fn fail_acquire(&self, error: Option<MediaError>) {
        *self.acquire_error.lock().unwrap() = error;
    }

    /// Make the first track of every new stream fail to stop
    pub fn fail_track_stop(&self, fail: bool) {
        self.failing_track_stop.store(fail, Ordering::SeqCst);
    }

    pub fn enumerate_calls(&self) -> usize {
        self.enumerate_calls.load(Ordering::SeqCst)
    }

    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn stopped_tracks(&self) -> Vec<String> {
        snapshot(&self.stopped_tracks)
    }

    /// Audio input of the most recently acquired stream
    pub fn last_sender(&self) -> Option<broadcast::Sender<AudioBlock>> {
        self.last_sender.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MediaDevices for FakeDevices {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, MediaError> {
        self.enumerate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.enumerate_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn acquire_stream(&self, constraints: &AudioConstraints) -> Result<MediaStream, MediaError> {
        let call = self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .unwrap()
            .push(constraints.device_id.clone());

        if let Some(err) = self.acquire_error.lock().unwrap().clone() {
            return Err(err);
        }

        let device_id = match &constraints.device_id {
            Some(id) => {
                let known = self
                    .devices
                    .lock()
                    .unwrap()
                    .iter()
                    .any(|d| &d.device_id == id && d.kind == DeviceKind::AudioInput);
                if !known {
                    return Err(MediaError::DeviceNotFound(id.clone()));
                }
                id.clone()
            }
            None => "default".to_string(),
        };

        let (audio_tx, _) = broadcast::channel(16);
        *self.last_sender.lock().unwrap() = Some(audio_tx.clone());

        let mut stream = MediaStream::new(device_id, self.sample_rate, audio_tx);
        for n in 0..self.tracks_per_stream {
            stream = stream.with_track(Box::new(FakeTrack {
                id: format!("track-{}-{}", call, n),
                fail: n == 0 && self.failing_track_stop.load(Ordering::SeqCst),
                stopped: Arc::clone(&self.stopped_tracks),
            }));
        }
        Ok(stream)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakeTrack {
    id: String,
    fail: bool,
    stopped: Events,
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&mut self) -> Result<(), MediaError> {
        if self.fail {
            return Err(MediaError::Other("track already ended".to_string()));
        }
        self.stopped.lock().unwrap().push(self.id.clone());
        Ok(())
    }
}

/// Handler that records every call it receives
pub struct RecordingHandler {
    pub events: Events,
    pub caps: Capabilities,
}

impl RecordingHandler {
    pub fn new(caps: Capabilities) -> (Self, Events) {
        let events = events();
        (
            Self {
                events: Arc::clone(&events),
                caps,
            },
            events,
        )
    }

    fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }
}

impl StreamHandler for RecordingHandler {
    fn set_stream(&mut self, stream: Option<&MediaStream>) {
        match stream {
            Some(s) => self.push(format!("set_stream:{}", s.device_id())),
            None => self.push("set_stream:none"),
        }
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn start(&mut self) {
        self.push("start");
    }

    fn stop(&mut self) {
        self.push("stop");
    }

    fn on_stream_start(&mut self) {
        self.push("on_stream_start");
    }

    fn on_stream_stop(&mut self) {
        self.push("on_stream_stop");
    }

    fn on_stream_error(&mut self, error: &SessionError) {
        self.push(format!("on_stream_error:{}", error));
    }
}

/// Playback element that records calls and can refuse to play
pub struct MockElement {
    pub events: Events,
    pub refuse_play: bool,
}

impl MockElement {
    pub fn new(refuse_play: bool) -> (Self, Events) {
        let events = events();
        (
            Self {
                events: Arc::clone(&events),
                refuse_play,
            },
            events,
        )
    }
}

impl PlaybackElement for MockElement {
    fn attach(&mut self, stream: &MediaStream) {
        self.events
            .lock()
            .unwrap()
            .push(format!("attach:{}", stream.device_id()));
    }

    fn play(&mut self) -> Result<(), MediaError> {
        self.events.lock().unwrap().push("play".to_string());
        if self.refuse_play {
            return Err(MediaError::Other("playback was blocked".to_string()));
        }
        Ok(())
    }

    fn detach(&mut self) {
        self.events.lock().unwrap().push("detach".to_string());
    }
}
