//! Connection lifecycle shared by both roles.

use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Where a connection is in its lifecycle.
///
/// ```text
/// Disconnected → Handshaking → Connected → Running ⇄ Paused
///       ↑______________________________________________|
/// ```
///
/// - **Disconnected**: No peer. A server waits here for a visualizer.
/// - **Handshaking**: Magic strings are being exchanged.
/// - **Connected**: Handshake done, bootstrap in progress.
/// - **Running**: Commands flow; the heap runs freely.
/// - **Paused**: The heap is held at a safepoint until the visualizer
///   restarts it, plays one event, or shuts it down.
///
/// Any state can drop back to `Disconnected` when the peer goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Disconnected,
    Handshaking,
    Connected,
    Running,
    Paused,
}

impl SessionState {
    /// Returns `true` once bootstrap may have happened and commands flow.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Running | Self::Paused)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Returns `true` if moving to `target` is allowed.
    pub fn can_transition_to(self, target: Self) -> bool {
        match (self, target) {
            (_, Self::Disconnected) => self != Self::Disconnected,
            (Self::Disconnected, Self::Handshaking) => true,
            (Self::Handshaking, Self::Connected) => true,
            (Self::Connected, Self::Running | Self::Paused) => true,
            (Self::Running, Self::Paused) | (Self::Paused, Self::Running) => true,
            _ => false,
        }
    }

    /// Moves to `target`, or fails without changing state.
    pub fn transition(&mut self, target: Self) -> Result<(), SessionError> {
        if !self.can_transition_to(target) {
            return Err(SessionError::InvalidTransition {
                from: *self,
                to: target,
            });
        }
        tracing::debug!(from = %self, to = %target, "session state");
        *self = target;
        Ok(())
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Handshaking => write!(f, "Handshaking"),
            Self::Connected => write!(f, "Connected"),
            Self::Running => write!(f, "Running"),
            Self::Paused => write!(f, "Paused"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_happy_path() {
        let mut state = SessionState::default();
        for next in [
            SessionState::Handshaking,
            SessionState::Connected,
            SessionState::Running,
            SessionState::Paused,
            SessionState::Running,
            SessionState::Disconnected,
        ] {
            state.transition(next).unwrap();
        }
        assert_eq!(state, SessionState::Disconnected);
    }

    #[test]
    fn test_session_state_rejects_skips() {
        assert!(!SessionState::Disconnected.can_transition_to(SessionState::Running));
        assert!(!SessionState::Handshaking.can_transition_to(SessionState::Paused));
        assert!(!SessionState::Disconnected.can_transition_to(SessionState::Disconnected));

        let mut state = SessionState::Handshaking;
        let err = state.transition(SessionState::Running).unwrap_err();
        assert_eq!(err.to_string(), "invalid session transition Handshaking -> Running");
        assert_eq!(state, SessionState::Handshaking);
    }

    #[test]
    fn test_session_state_connected_may_start_paused() {
        assert!(SessionState::Connected.can_transition_to(SessionState::Paused));
        assert!(SessionState::Paused.is_connected());
        assert!(!SessionState::Handshaking.is_connected());
    }
}
