//! Ledger connection state
//!
//! Connection status is an explicit state machine:
//!
//! ```text
//! Idle --ConnectInit--> Connecting --ConnectSuccess--> Ready
//!                                  \--ConnectFailure--> Error --ConnectInit--> Connecting
//! any state --Disconnect--> Idle
//! ```

use std::fmt;
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

/// Current connection status
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Ready,
    Error(String),
}

/// Inputs driving [`ConnectionState`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    ConnectInit,
    ConnectSuccess,
    ConnectFailure(String),
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid connection transition: {event:?} while {state}")]
pub struct TransitionError {
    pub state: ConnectionState,
    pub event: ConnectionEvent,
}

impl ConnectionState {
    /// Applies one event, returning the next state
    pub fn transition(&self, event: ConnectionEvent) -> Result<ConnectionState, TransitionError> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        match (self, event) {
            (_, E::Disconnect) => Ok(S::Idle),
            (S::Idle | S::Error(_), E::ConnectInit) => Ok(S::Connecting),
            (S::Connecting, E::ConnectSuccess) => Ok(S::Ready),
            (S::Connecting, E::ConnectFailure(reason)) => Ok(S::Error(reason)),
            (state, event) => Err(TransitionError {
                state: state.clone(),
                event,
            }),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "Idle"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Ready => write!(f, "Ready"),
            ConnectionState::Error(reason) => write!(f, "Error({})", reason),
        }
    }
}

/// Shared holder for a [`ConnectionState`]
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    state: Mutex<ConnectionState>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state (cloned)
    pub fn state(&self) -> ConnectionState {
        self.lock().clone()
    }

    /// Applies an event; the state is left untouched when the transition is invalid
    pub fn apply(&self, event: ConnectionEvent) -> Result<ConnectionState, TransitionError> {
        let mut state = self.lock();
        let next = state.transition(event)?;
        debug!("Connection {} -> {}", state, next);
        *state = next.clone();
        Ok(next)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ConnectionState> {
        // A poisoned lock still holds a valid state value
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = ConnectionState::Idle
            .transition(ConnectionEvent::ConnectInit)
            .and_then(|s| s.transition(ConnectionEvent::ConnectSuccess))
            .unwrap();
        assert!(state.is_ready());
    }

    #[test]
    fn test_failure_then_retry() {
        let state = ConnectionState::Connecting
            .transition(ConnectionEvent::ConnectFailure("timeout".into()))
            .unwrap();
        assert_eq!(state, ConnectionState::Error("timeout".into()));

        let retry = state.transition(ConnectionEvent::ConnectInit).unwrap();
        assert_eq!(retry, ConnectionState::Connecting);
    }

    #[test]
    fn test_disconnect_from_any_state() {
        for state in [
            ConnectionState::Idle,
            ConnectionState::Connecting,
            ConnectionState::Ready,
            ConnectionState::Error("x".into()),
        ] {
            assert_eq!(
                state.transition(ConnectionEvent::Disconnect),
                Ok(ConnectionState::Idle)
            );
        }
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(ConnectionState::Idle
            .transition(ConnectionEvent::ConnectSuccess)
            .is_err());
        assert!(ConnectionState::Ready
            .transition(ConnectionEvent::ConnectInit)
            .is_err());
        assert!(ConnectionState::Connecting
            .transition(ConnectionEvent::ConnectInit)
            .is_err());
    }

    #[test]
    fn test_tracker_keeps_state_on_invalid_event() {
        let tracker = ConnectionTracker::new();
        tracker.apply(ConnectionEvent::ConnectInit).unwrap();
        assert!(tracker.apply(ConnectionEvent::ConnectInit).is_err());
        assert_eq!(tracker.state(), ConnectionState::Connecting);

        tracker.apply(ConnectionEvent::ConnectSuccess).unwrap();
        assert!(tracker.state().is_ready());
    }
}
