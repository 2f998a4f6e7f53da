//! Connection lifecycle state

use serde::{Deserialize, Serialize};

/// Lifecycle of a controller connection
///
/// `Unopened -> Open -> Closed`. `Closed` is terminal for a controller
/// instance; reconnecting requires a new controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ConnectionState {
    /// Constructed, never connected (or the vendor declined the session)
    #[default]
    Unopened,
    /// Session established, reads are allowed
    Open,
    /// Session released by disconnect
    Closed,
}

impl ConnectionState {
    /// Check if reads are allowed
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Check if a connect attempt may be made
    pub fn can_connect(&self) -> bool {
        matches!(self, Self::Unopened)
    }

    /// State after a disconnect request
    ///
    /// Only an open connection closes; other states are left unchanged.
    pub fn after_disconnect(&self) -> Self {
        match self {
            Self::Open => Self::Closed,
            other => *other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_unopened() {
        let state = ConnectionState::default();
        assert_eq!(state, ConnectionState::Unopened);
        assert!(state.can_connect());
        assert!(!state.is_open());
    }

    #[test]
    fn closed_is_terminal() {
        let state = ConnectionState::Closed;
        assert!(!state.can_connect());
        assert!(!state.is_open());
        assert_eq!(state.after_disconnect(), ConnectionState::Closed);
    }

    #[test]
    fn disconnect_transitions() {
        assert_eq!(ConnectionState::Open.after_disconnect(), ConnectionState::Closed);
        assert_eq!(ConnectionState::Unopened.after_disconnect(), ConnectionState::Unopened);
    }
}
