use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::cache::{DeviceListCache, Microphone};
use super::config::SessionConfig;
use super::notify::{StateNotifier, Subscription};
use super::registry::InstanceGuard;
use super::state::CaptureState;
use super::stats::SessionInfo;
use crate::audio::{AudioConstraints, DeviceKind, MediaDevices, MediaStream};
use crate::error::{MediaError, Result, SessionError};
use crate::target::StreamTarget;

/// One open hardware stream
struct CaptureSession {
    stream: MediaStream,
    requested_device_id: Option<String>,
    started_at: DateTime<Utc>,
}

/// Owns the capture lifecycle: device discovery, stream acquisition,
/// hand-off to the stream target and teardown.
///
/// Only one manager may be live per process; see [`SessionManager::new`].
/// All operations take `&mut self`, so they are mutually exclusive by
/// construction.
pub struct SessionManager {
    config: SessionConfig,
    devices: Arc<dyn MediaDevices>,
    state: CaptureState,
    notifier: StateNotifier,
    device_cache: DeviceListCache,
    session: Option<CaptureSession>,
    target: Option<StreamTarget>,
    _instance: InstanceGuard,
}

impl SessionManager {
    /// Create the process's session manager
    ///
    /// Fails with `InstanceAlreadyExists` while another manager is live.
    pub fn new(config: SessionConfig, devices: Arc<dyn MediaDevices>) -> Result<Self> {
        let instance = InstanceGuard::acquire()?;

        info!(
            "Session manager created (backend: {}, device cache TTL: {}ms)",
            devices.name(),
            config.device_cache_ttl_ms
        );

        Ok(Self {
            device_cache: DeviceListCache::new(config.device_cache_ttl()),
            config,
            devices,
            state: CaptureState::Uninitialized,
            notifier: StateNotifier::new(),
            session: None,
            target: None,
            _instance: instance,
        })
    }

    pub fn current_state(&self) -> CaptureState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn has_stream_target(&self) -> bool {
        self.target.is_some()
    }

    /// Details of the open session, if recording
    pub fn session_info(&self) -> Option<SessionInfo> {
        self.session.as_ref().map(|s| {
            let elapsed = Utc::now().signed_duration_since(s.started_at);
            SessionInfo {
                stream_id: s.stream.id().to_string(),
                device_id: s.stream.device_id().to_string(),
                requested_device_id: s.requested_device_id.clone(),
                started_at: s.started_at,
                duration_secs: elapsed.num_milliseconds() as f64 / 1000.0,
                sample_rate: s.stream.sample_rate(),
            }
        })
    }

    /// Register a state listener
    ///
    /// The handler is called immediately with the current state and then
    /// on every committed transition.
    pub fn on_state_change<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(CaptureState) + Send + 'static,
    {
        self.notifier.subscribe(self.state, handler)
    }

    /// List the available microphones, served from cache while fresh
    ///
    /// Cache hits return without notifying state listeners; every platform
    /// round trip notifies, on success or failure.
    pub async fn get_microphone_list(&mut self) -> Result<Vec<Microphone>> {
        let now = Instant::now();
        if let Some(cached) = self.device_cache.get(now) {
            debug!("Serving {} microphones from cache", cached.len());
            return Ok(cached.to_vec());
        }

        match self.enumerate_microphones().await {
            Ok(microphones) => {
                info!("Found {} microphones", microphones.len());
                self.device_cache.store(microphones.clone(), now);

                match self.state {
                    CaptureState::Uninitialized | CaptureState::Error => {
                        self.change_state(CaptureState::Idle)?
                    }
                    current => self.notifier.publish(current),
                }

                Ok(microphones)
            }
            Err(err) => {
                error!("Error getting microphone list: {}", err);
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Open a stream on `device_id` (or the default input) and route it to
    /// the stream target. An open session is stopped first.
    pub async fn start_recording(&mut self, device_id: Option<&str>) -> Result<()> {
        if self.session.is_some() {
            info!("Restarting capture, stopping current session first");
            self.stop_recording();
        }

        if self.state == CaptureState::Error {
            self.change_state(CaptureState::Idle)?;
        }

        let constraints = AudioConstraints::new(device_id, self.config.processing);
        info!(
            "Starting recording on {}",
            device_id.unwrap_or("default input")
        );

        let mut stream = match self.devices.acquire_stream(&constraints).await {
            Ok(stream) => stream,
            Err(source) => return Err(self.acquisition_failed(device_id, source)),
        };

        if let Some(target) = &mut self.target {
            if let Err(source) = target.deliver(&stream) {
                Self::stop_tracks(&mut stream);
                return Err(self.acquisition_failed(device_id, source));
            }
        } else {
            debug!("No stream target set, holding stream {} unrouted", stream.id());
        }

        info!(
            "Recording from {} (stream {}, {}Hz, {} tracks)",
            stream.device_id(),
            stream.id(),
            stream.sample_rate(),
            stream.track_count()
        );

        self.session = Some(CaptureSession {
            stream,
            requested_device_id: device_id.map(str::to_string),
            started_at: Utc::now(),
        });

        self.change_state(CaptureState::Recording)
    }

    /// Stop the open session, if any
    ///
    /// Never fails: track stop errors are logged and skipped.
    pub fn stop_recording(&mut self) {
        if !self.teardown() {
            debug!("stop_recording: no open session");
            return;
        }

        if let Err(e) = self.change_state(CaptureState::Idle) {
            error!("Failed to settle after stopping: {}", e);
        }
    }

    /// Install a new stream target, returning the previous one
    ///
    /// An open session is stopped first so the new target never sees a
    /// stream opened for another target.
    pub fn set_stream_target(&mut self, target: StreamTarget) -> Option<StreamTarget> {
        if self.session.is_some() {
            info!("Stream target changed while recording, stopping session");
            self.stop_recording();
        }

        debug!("Stream target set ({})", target.kind());
        self.target.replace(target)
    }

    /// Remove the stream target, returning it
    pub fn clear_stream_target(&mut self) -> Option<StreamTarget> {
        if self.session.is_some() {
            self.stop_recording();
        }

        self.target.take()
    }

    /// Stop recording and give up the process-wide manager slot
    pub fn dispose(mut self) {
        self.stop_recording();
        info!("Session manager disposed");
    }

    pub(crate) fn change_state(&mut self, next: CaptureState) -> Result<()> {
        let next = self.state.transition(next)?;
        debug!("State change: {} -> {}", self.state, next);
        self.state = next;
        self.notifier.publish(next);
        Ok(())
    }

    async fn enumerate_microphones(&self) -> Result<Vec<Microphone>> {
        // Ask for access the way a capture would, then let go of the hardware
        let access = AudioConstraints::default_input(self.config.processing);
        let mut permission_stream = self
            .devices
            .acquire_stream(&access)
            .await
            .map_err(SessionError::from_enumeration)?;
        Self::stop_tracks(&mut permission_stream);
        drop(permission_stream);

        let devices = self
            .devices
            .enumerate_devices()
            .await
            .map_err(SessionError::from_enumeration)?;

        Ok(devices
            .into_iter()
            .filter(|d| d.kind == DeviceKind::AudioInput)
            .map(Microphone::from_device)
            .collect())
    }

    /// Stop tracks, notify the target and drop the stream.
    /// Returns false when no session was open.
    fn teardown(&mut self) -> bool {
        let Some(mut session) = self.session.take() else {
            return false;
        };

        info!("Stopping stream {}", session.stream.id());
        Self::stop_tracks(&mut session.stream);

        if let Some(target) = &mut self.target {
            target.release();
        }

        true
    }

    fn stop_tracks(stream: &mut MediaStream) {
        for (track_id, source) in stream.stop_tracks() {
            let err = SessionError::TrackStopFailure { track_id, source };
            warn!("Error stopping track: {}", err);
        }
    }

    fn acquisition_failed(&mut self, device_id: Option<&str>, source: MediaError) -> SessionError {
        let err = SessionError::StreamAcquisitionFailed {
            device_id: device_id.map(str::to_string),
            source,
        };
        error!("Error starting recording: {}", err);
        self.fail(&err);
        err
    }

    /// Enter `Error`, tearing down any open session, and tell the target
    fn fail(&mut self, err: &SessionError) {
        self.teardown();

        if let Some(target) = &mut self.target {
            target.report_error(err);
        }

        if self.state == CaptureState::Error {
            self.notifier.publish(CaptureState::Error);
        } else if let Err(e) = self.change_state(CaptureState::Error) {
            error!("Failed to enter error state: {}", e);
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if self.teardown() {
            debug!("Session manager dropped while recording, stream released");
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("backend", &self.devices.name())
            .field("state", &self.state)
            .field("recording", &self.session.is_some())
            .field("target", &self.target)
            .finish()
    }
}
