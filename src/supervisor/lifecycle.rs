// src/supervisor/lifecycle.rs

//! Pure lifecycle state machine for one supervised service.
//!
//! No Tokio, no processes, no IO: the async shell in
//! [`crate::supervisor::ServiceSupervisor`] observes the world and feeds
//! [`LifecycleEvent`]s in; this module decides whether each one is legal.

use std::fmt;

use crate::errors::{HarnessError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceState {
    #[default]
    Idle,
    Starting,
    WaitingForReady,
    Ready,
    Stopping,
    Stopped,
    Errored,
}

impl ServiceState {
    /// `Stopped` and `Errored` accept no further events.
    pub fn is_terminal(self) -> bool {
        matches!(self, ServiceState::Stopped | ServiceState::Errored)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Idle => "idle",
            ServiceState::Starting => "starting",
            ServiceState::WaitingForReady => "waiting-for-ready",
            ServiceState::Ready => "ready",
            ServiceState::Stopping => "stopping",
            ServiceState::Stopped => "stopped",
            ServiceState::Errored => "errored",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Begin,
    LaunchFailed,
    Launched,
    ReadinessConfirmed,
    ReadinessTimedOut,
    ExitedUnexpectedly,
    StopRequested,
    ExitConfirmed,
}

/// The transition table. `None` means the pair is not allowed.
pub fn next_state(from: ServiceState, event: LifecycleEvent) -> Option<ServiceState> {
    use LifecycleEvent as E;
    use ServiceState as S;

    match (from, event) {
        (S::Idle, E::Begin) => Some(S::Starting),
        (S::Starting, E::LaunchFailed) => Some(S::Errored),
        (S::Starting, E::Launched) => Some(S::WaitingForReady),
        (S::WaitingForReady, E::ReadinessConfirmed) => Some(S::Ready),
        (S::WaitingForReady, E::ReadinessTimedOut) => Some(S::Errored),
        (S::Starting | S::WaitingForReady | S::Ready, E::ExitedUnexpectedly) => Some(S::Errored),
        (S::Ready, E::StopRequested) => Some(S::Stopping),
        (S::Stopping, E::ExitConfirmed) => Some(S::Stopped),
        _ => None,
    }
}

/// Current state plus the rule that every change goes through [`next_state`].
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    state: ServiceState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn apply(&mut self, event: LifecycleEvent) -> Result<ServiceState> {
        match next_state(self.state, event) {
            Some(next) => {
                self.state = next;
                Ok(next)
            }
            None => Err(HarnessError::InvalidTransition {
                from: self.state,
                event,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleEvent as E;
    use ServiceState as S;

    const ALL_STATES: [ServiceState; 7] = [
        S::Idle,
        S::Starting,
        S::WaitingForReady,
        S::Ready,
        S::Stopping,
        S::Stopped,
        S::Errored,
    ];

    const ALL_EVENTS: [LifecycleEvent; 8] = [
        E::Begin,
        E::LaunchFailed,
        E::Launched,
        E::ReadinessConfirmed,
        E::ReadinessTimedOut,
        E::ExitedUnexpectedly,
        E::StopRequested,
        E::ExitConfirmed,
    ];

    const ALLOWED: &[(ServiceState, LifecycleEvent, ServiceState)] = &[
        (S::Idle, E::Begin, S::Starting),
        (S::Starting, E::LaunchFailed, S::Errored),
        (S::Starting, E::Launched, S::WaitingForReady),
        (S::WaitingForReady, E::ReadinessConfirmed, S::Ready),
        (S::WaitingForReady, E::ReadinessTimedOut, S::Errored),
        (S::Starting, E::ExitedUnexpectedly, S::Errored),
        (S::WaitingForReady, E::ExitedUnexpectedly, S::Errored),
        (S::Ready, E::ExitedUnexpectedly, S::Errored),
        (S::Ready, E::StopRequested, S::Stopping),
        (S::Stopping, E::ExitConfirmed, S::Stopped),
    ];

    #[test]
    fn transition_table_is_exact() {
        for from in ALL_STATES {
            for event in ALL_EVENTS {
                let expected = ALLOWED
                    .iter()
                    .find(|(f, e, _)| *f == from && *e == event)
                    .map(|(_, _, to)| *to);
                assert_eq!(next_state(from, event), expected, "{from:?} + {event:?}");
            }
        }
    }

    #[test]
    fn happy_path_reaches_stopped() {
        let mut lc = Lifecycle::new();
        for event in [
            E::Begin,
            E::Launched,
            E::ReadinessConfirmed,
            E::StopRequested,
            E::ExitConfirmed,
        ] {
            lc.apply(event).unwrap();
        }
        assert_eq!(lc.state(), S::Stopped);
        assert!(lc.state().is_terminal());
    }

    #[test]
    fn double_start_is_rejected_and_state_kept() {
        let mut lc = Lifecycle::new();
        lc.apply(E::Begin).unwrap();

        let err = lc.apply(E::Begin).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::InvalidTransition {
                from: S::Starting,
                event: E::Begin
            }
        ));
        assert_eq!(lc.state(), S::Starting);
    }

    #[test]
    fn ready_is_unreachable_without_confirmation() {
        for from in ALL_STATES {
            for event in ALL_EVENTS {
                if next_state(from, event) == Some(S::Ready) {
                    assert_eq!((from, event), (S::WaitingForReady, E::ReadinessConfirmed));
                }
            }
        }
    }
}
