//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, MessageKind};
use crate::error::AppError;
use crate::room::RoomSummary;
use crate::typing::TypingState;
use crate::types::{ClientId, MessageId, RoomId};
use crate::user::User;

/// Client → Server message
///
/// All messages from client to server. Uses tagged enum with snake_case naming.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Claim a display name (required before any other action)
    #[serde(alias = "user_join")]
    Join { username: String },
    /// Join with a signed identity token instead of a bare name
    Authenticate { token: String },
    /// Send a message to a room (default room when omitted)
    SendMessage {
        #[serde(default)]
        content: String,
        #[serde(default)]
        room_id: Option<RoomId>,
        #[serde(default)]
        file_url: Option<String>,
        #[serde(default)]
        kind: Option<MessageKind>,
    },
    /// Send a private message to an online user
    PrivateMessage { to: String, content: String },
    /// Fetch the private conversation with another user
    PrivateHistory { with: String },
    /// Typing started/stopped
    Typing {
        #[serde(default)]
        room_id: Option<RoomId>,
        is_typing: bool,
    },
    /// Move to another room (created on demand)
    JoinRoom { room_id: RoomId },
    /// Create a new room
    CreateRoom { name: String },
    /// Toggle a reaction on a room message
    MessageReaction {
        room_id: RoomId,
        message_id: MessageId,
        reaction: String,
    },
    /// Mark a room message as read
    MarkRead {
        room_id: RoomId,
        message_id: MessageId,
    },
}

/// Server → Client message
///
/// All messages from server to client. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection accepted, client ID issued
    Connected { client_id: String },
    /// Current rooms with member counts
    RoomsList { rooms: Vec<RoomSummary> },
    /// Join accepted (sent to the joining connection only)
    Joined { user: User },
    /// A user came online
    UserJoined {
        username: String,
        id: ClientId,
        timestamp: DateTime<Utc>,
    },
    /// A user went offline
    UserLeft {
        username: String,
        id: ClientId,
        timestamp: DateTime<Utc>,
    },
    /// Presence snapshot
    UserList { users: Vec<User> },
    /// New room message
    ReceiveMessage { message: ChatMessage },
    /// Acknowledgement to the sender that a message was stored
    MessageDelivered { message_id: MessageId },
    /// Private message (delivered to both parties)
    PrivateMessage { message: ChatMessage },
    /// Stored private conversation
    PrivateHistory {
        with: String,
        messages: Vec<ChatMessage>,
    },
    /// Someone in the room started or stopped typing
    TypingIndicator(TypingState),
    /// Room history snapshot, oldest first
    RoomMessages {
        room_id: RoomId,
        messages: Vec<ChatMessage>,
    },
    /// A user entered the room
    UserJoinedRoom { username: String, room_id: RoomId },
    /// A user moved out of the room
    UserLeftRoom { username: String, room_id: RoomId },
    /// A room was created
    RoomCreated(RoomSummary),
    /// Reactions or read receipts of a message changed
    MessageUpdated { message: ChatMessage },
    /// Error occurred
    Error { code: ErrorCode, message: String },
}

/// Error codes for ServerMessage::Error
///
/// Represents different error scenarios that can be communicated to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Empty or oversized input
    InvalidInput,
    /// Display name held by another online user
    NameTaken,
    /// Action attempted before joining
    Unauthenticated,
    /// Join attempted twice
    AlreadyJoined,
    /// Unknown room id
    RoomNotFound,
    /// Unknown message id
    MessageNotFound,
    /// Private message target not online
    RecipientOffline,
    /// Token rejected or verification unavailable
    AuthFailed,
    /// Invalid message format
    InvalidMessage,
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let code = match &err {
            AppError::Validation(_) => ErrorCode::InvalidInput,
            AppError::NameTaken(_) => ErrorCode::NameTaken,
            AppError::Unauthenticated => ErrorCode::Unauthenticated,
            AppError::AlreadyJoined => ErrorCode::AlreadyJoined,
            AppError::RoomNotFound(_) => ErrorCode::RoomNotFound,
            AppError::MessageNotFound(_) => ErrorCode::MessageNotFound,
            AppError::RecipientOffline(_) => ErrorCode::RecipientOffline,
            AppError::AuthFailed(_) => ErrorCode::AuthFailed,
            AppError::Json(_) => ErrorCode::InvalidMessage,
            // Fatal errors are not typically converted (connection closes)
            _ => {
                return ServerMessage::Error {
                    code: ErrorCode::InvalidMessage,
                    message: "Internal error".to_string(),
                }
            }
        };
        let message = match &err {
            AppError::Validation(reason) => reason.clone(),
            AppError::Json(e) => format!("Invalid message format: {}", e),
            _ => err.to_string(),
        };
        ServerMessage::Error { code, message }
    }
}
