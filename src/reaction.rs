//! Reactions and read receipts
//!
//! Mutates stored room messages by id. Toggling is keyed by
//! (connection, reaction type): a second identical toggle removes the
//! entry again, so a retransmitted toggle is not a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;
use crate::error::AppError;
use crate::room::RoomStore;
use crate::types::{ClientId, MessageId, RoomId};

/// Maximum reaction type length (in characters)
pub const MAX_REACTION_LEN: usize = 32;

/// One user's reaction on a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub user_id: ClientId,
    pub username: String,
    #[serde(rename = "type")]
    pub reaction_type: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Add the reaction if absent, remove it if present
    ///
    /// Returns true when the reaction was added.
    pub fn toggle_reaction(
        &mut self,
        user_id: ClientId,
        username: &str,
        reaction_type: &str,
    ) -> bool {
        let before = self.reactions.len();
        self.reactions
            .retain(|r| !(r.user_id == user_id && r.reaction_type == reaction_type));
        if self.reactions.len() != before {
            return false;
        }

        self.reactions.push(Reaction {
            user_id,
            username: username.to_string(),
            reaction_type: reaction_type.to_string(),
            timestamp: Utc::now(),
        });
        true
    }

    /// Record `reader` in the read-by list if absent
    ///
    /// Returns true when the reader was newly added.
    pub fn mark_read(&mut self, reader: &str) -> bool {
        if self.read_by.iter().any(|r| r == reader) {
            return false;
        }
        self.read_by.push(reader.to_string());
        true
    }
}

impl RoomStore {
    /// Toggle a reaction on a stored room message
    ///
    /// Returns the full updated message for broadcast.
    pub fn toggle_reaction(
        &mut self,
        room_id: &RoomId,
        message_id: MessageId,
        user_id: ClientId,
        username: &str,
        reaction_type: &str,
    ) -> Result<ChatMessage, AppError> {
        let reaction_type = validate_reaction(reaction_type)?;
        let message = self.find_message_mut(room_id, message_id)?;
        message.toggle_reaction(user_id, username, reaction_type);
        Ok(message.clone())
    }

    /// Add a read receipt to a stored room message
    ///
    /// Returns the message and whether the read-by list changed.
    pub fn mark_read(
        &mut self,
        room_id: &RoomId,
        message_id: MessageId,
        reader: &str,
    ) -> Result<(ChatMessage, bool), AppError> {
        let message = self.find_message_mut(room_id, message_id)?;
        let changed = message.mark_read(reader);
        Ok((message.clone(), changed))
    }
}

fn validate_reaction(reaction_type: &str) -> Result<&str, AppError> {
    let reaction_type = reaction_type.trim();
    if reaction_type.is_empty() || reaction_type.chars().count() > MAX_REACTION_LEN {
        return Err(AppError::Validation(format!(
            "Reaction must be 1 to {} characters",
            MAX_REACTION_LEN
        )));
    }
    Ok(reaction_type)
}
