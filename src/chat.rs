//! Chat message records
//!
//! A `ChatMessage` is created once per send. Its core fields never change;
//! only the reaction and read-by lists are mutated afterwards (see
//! `reaction`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reaction::Reaction;
use crate::types::{ClientId, MessageId, RoomId};

/// Kind of a stored message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    File,
    Private,
    System,
}

/// A single chat message, either in a room history or a private conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    /// Sender display name
    pub sender: String,
    pub sender_id: ClientId,
    /// Set for room messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Set for private messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<ClientId>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Reference returned by the file-storage service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub read_by: Vec<String>,
}

impl ChatMessage {
    /// Create a message addressed to a room
    pub fn for_room(
        sender: &str,
        sender_id: ClientId,
        room_id: RoomId,
        content: String,
        kind: MessageKind,
        file_url: Option<String>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            sender: sender.to_string(),
            sender_id,
            room_id: Some(room_id),
            recipient: None,
            recipient_id: None,
            content,
            timestamp: Utc::now(),
            kind,
            file_url,
            reactions: Vec::new(),
            read_by: Vec::new(),
        }
    }

    /// Create a private message between two online users
    pub fn private(
        sender: &str,
        sender_id: ClientId,
        recipient: &str,
        recipient_id: ClientId,
        content: String,
    ) -> Self {
        Self {
            id: MessageId::new(),
            sender: sender.to_string(),
            sender_id,
            room_id: None,
            recipient: Some(recipient.to_string()),
            recipient_id: Some(recipient_id),
            content,
            timestamp: Utc::now(),
            kind: MessageKind::Private,
            file_url: None,
            reactions: Vec::new(),
            read_by: Vec::new(),
        }
    }
}
