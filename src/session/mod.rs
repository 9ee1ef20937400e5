//! Capture session management
//!
//! This module provides the `SessionManager` that owns:
//! - The capture lifecycle state machine
//! - The cached microphone list
//! - The open media stream and its hand-off to the stream target
//! - The process-wide single-instance guard

mod cache;
mod config;
mod manager;
mod notify;
mod registry;
mod state;
mod stats;

pub use cache::{DeviceListCache, Microphone};
pub use config::SessionConfig;
pub use manager::SessionManager;
pub use notify::{StateNotifier, Subscription};
pub use registry::InstanceGuard;
pub use state::CaptureState;
pub use stats::SessionInfo;
