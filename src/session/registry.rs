// Process-wide single-instance registry
//
// Two managers would fight over one physical microphone, so at most one may
// be live per process. The slot is claimed when a manager is constructed and
// released when its guard is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::error::SessionError;

static INSTANCE_LIVE: AtomicBool = AtomicBool::new(false);

/// Proof of holding the process-wide manager slot
#[derive(Debug)]
pub struct InstanceGuard {
    _private: (),
}

impl InstanceGuard {
    pub fn acquire() -> Result<Self, SessionError> {
        INSTANCE_LIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SessionError::InstanceAlreadyExists)?;

        debug!("Session manager slot acquired");
        Ok(Self { _private: () })
    }

    /// Whether some manager currently holds the slot
    pub fn is_held() -> bool {
        INSTANCE_LIVE.load(Ordering::Acquire)
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        INSTANCE_LIVE.store(false, Ordering::Release);
        debug!("Session manager slot released");
    }
}
