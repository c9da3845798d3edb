//! Typing indicators
//!
//! Ephemeral, last-write-wins per connection. Nothing here is kept in
//! room history.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{ClientId, RoomId};

/// Typing state of one connection, as broadcast to its room
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypingState {
    pub username: String,
    pub room_id: RoomId,
    pub is_typing: bool,
}

#[derive(Debug, Default)]
pub struct TypingTracker {
    typing: HashMap<ClientId, TypingState>,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or clear, when `is_typing` is false) the typing state
    ///
    /// Returns the record to broadcast.
    pub fn set_typing(
        &mut self,
        client_id: ClientId,
        username: &str,
        room_id: RoomId,
        is_typing: bool,
    ) -> TypingState {
        let state = TypingState {
            username: username.to_string(),
            room_id,
            is_typing,
        };
        if is_typing {
            self.typing.insert(client_id, state.clone());
        } else {
            self.typing.remove(&client_id);
        }
        state
    }

    /// Drop the record for a connection, returning it if one was set
    pub fn clear(&mut self, client_id: ClientId) -> Option<TypingState> {
        self.typing.remove(&client_id)
    }

    pub fn get(&self, client_id: ClientId) -> Option<&TypingState> {
        self.typing.get(&client_id)
    }

    /// Names currently typing in `room_id`, sorted
    pub fn typing_in(&self, room_id: &RoomId) -> Vec<String> {
        let mut names: Vec<String> = self
            .typing
            .values()
            .filter(|state| &state.room_id == room_id)
            .map(|state| state.username.clone())
            .collect();
        names.sort();
        names
    }
}
