use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SessionError;

/// Lifecycle state of the capture session manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureState {
    /// No device list fetched and no stream opened yet
    Uninitialized,
    /// Devices known, no stream open
    Idle,
    /// A stream is open and routed to the stream target
    Recording,
    /// The last device or stream operation failed
    Error,
}

impl CaptureState {
    pub const ALL: [CaptureState; 4] = [
        CaptureState::Uninitialized,
        CaptureState::Idle,
        CaptureState::Recording,
        CaptureState::Error,
    ];

    /// States reachable from `self` in one step
    pub fn allowed_next(self) -> &'static [CaptureState] {
        use CaptureState::*;
        match self {
            Uninitialized => &[Idle, Recording, Error],
            Idle => &[Recording, Error],
            Recording => &[Idle, Error],
            Error => &[Idle],
        }
    }

    pub fn can_transition_to(self, next: CaptureState) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Validate a transition, returning the new state
    pub fn transition(self, next: CaptureState) -> Result<CaptureState, SessionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SessionError::InvalidStateTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Uninitialized => "Uninitialized",
            CaptureState::Idle => "Idle",
            CaptureState::Recording => "Recording",
            CaptureState::Error => "Error",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CaptureState::*;

    const LEGAL: [(CaptureState, CaptureState); 8] = [
        (Uninitialized, Idle),
        (Uninitialized, Recording),
        (Uninitialized, Error),
        (Idle, Recording),
        (Idle, Error),
        (Recording, Idle),
        (Recording, Error),
        (Error, Idle),
    ];

    #[test]
    fn test_legal_transitions_succeed() {
        for (from, to) in LEGAL {
            assert_eq!(from.transition(to).unwrap(), to, "{} -> {}", from, to);
        }
    }

    #[test]
    fn test_illegal_transitions_fail_and_keep_state() {
        for from in CaptureState::ALL {
            for to in CaptureState::ALL {
                if LEGAL.contains(&(from, to)) {
                    continue;
                }

                let err = from
                    .transition(to)
                    .expect_err(&format!("{} -> {} should be rejected", from, to));
                assert!(matches!(
                    err,
                    SessionError::InvalidStateTransition { from: f, to: t } if f == from && t == to
                ));
            }
        }
    }

    #[test]
    fn test_no_self_transitions() {
        for state in CaptureState::ALL {
            assert!(!state.can_transition_to(state));
        }
    }

    #[test]
    fn test_nothing_returns_to_uninitialized() {
        for state in CaptureState::ALL {
            assert!(!state.can_transition_to(Uninitialized));
        }
    }
}
