//! Per-connection session record
//!
//! Tracks where a connection is in its lifecycle:
//! `Anonymous → Joined → Disconnected`. Disconnected sessions are dropped
//! from the hub, so only the first two states are represented here.

use crate::error::AppError;
use crate::types::ClientId;

/// Lifecycle state of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no display name claimed yet
    Anonymous,
    /// Joined under a unique display name
    Joined { username: String },
}

/// Session bound to one transport connection
#[derive(Debug, Clone)]
pub struct Session {
    pub id: ClientId,
    pub state: SessionState,
}

impl Session {
    /// Create an anonymous session for a new connection
    pub fn new(id: ClientId) -> Self {
        Self {
            id,
            state: SessionState::Anonymous,
        }
    }

    /// Display name of a joined session
    ///
    /// Fails with `Unauthenticated` while anonymous.
    pub fn username(&self) -> Result<&str, AppError> {
        match &self.state {
            SessionState::Joined { username } => Ok(username),
            SessionState::Anonymous => Err(AppError::Unauthenticated),
        }
    }

    pub fn is_joined(&self) -> bool {
        matches!(self.state, SessionState::Joined { .. })
    }

    /// Transition to `Joined`
    pub fn join(&mut self, username: String) {
        self.state = SessionState::Joined { username };
    }
}
