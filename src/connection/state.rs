//! Connection state machine

use crate::{Error, Result};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No physical link (never opened, or released)
    Closed,

    /// Live link, ready for statements
    Open,

    /// Was open, found dropped or timed out; must be reacquired before use
    Stale,
}

impl ConnectionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Closed, Open) | (Open, Stale) | (Stale, Open) | (_, Closed)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {:?}", self),
                actual: format!("{:?}", next),
            });
        }
        *self = next;
        Ok(())
    }

    /// Whether statements may run without reacquiring
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::Stale => write!(f, "stale"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let mut state = ConnectionState::Closed;
        assert!(state.transition(ConnectionState::Open).is_ok());
        assert!(state.transition(ConnectionState::Stale).is_ok());
        assert!(state.transition(ConnectionState::Open).is_ok());
    }

    #[test]
    fn test_invalid_transition() {
        let mut state = ConnectionState::Closed;
        assert!(state.transition(ConnectionState::Stale).is_err());
        assert_eq!(state, ConnectionState::Closed);
    }

    #[test]
    fn test_open_cannot_reopen() {
        let mut state = ConnectionState::Open;
        assert!(state.transition(ConnectionState::Open).is_err());
    }

    #[test]
    fn test_close_from_any_state() {
        for start in [
            ConnectionState::Closed,
            ConnectionState::Open,
            ConnectionState::Stale,
        ] {
            let mut state = start;
            assert!(state.transition(ConnectionState::Closed).is_ok());
        }
    }

    #[test]
    fn test_only_open_is_usable() {
        assert!(ConnectionState::Open.is_usable());
        assert!(!ConnectionState::Stale.is_usable());
        assert!(!ConnectionState::Closed.is_usable());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Stale.to_string(), "stale");
    }
}
