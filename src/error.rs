//! Error types for the chat hub
//!
//! Defines application-level errors, message send errors and configuration
//! errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::{MessageId, RoomId};

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (send error message to the offending client only).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Empty or oversized name, content or identifier
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Another online user already holds this display name
    #[error("Username '{0}' is already taken")]
    NameTaken(String),

    /// Action attempted before a successful join
    #[error("Not authenticated")]
    Unauthenticated,

    /// Join attempted by a connection that already joined
    #[error("Already joined")]
    AlreadyJoined,

    /// Room not found with the given id
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    /// Message not found in the given room
    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    /// Private message target is not connected
    #[error("User '{0}' is not online")]
    RecipientOffline(String),

    /// Token verification failed or is unavailable
    #[error("Authentication failed: {0}")]
    AuthFailed(String),
}

/// Message send errors
///
/// Occurs when attempting to deliver to a connection's outbound channel.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The connection's outbound buffer is full; the event was dropped
    #[error("Channel full")]
    ChannelFull,

    /// No connection is registered under the given id
    #[error("Recipient not found")]
    RecipientNotFound,
}

/// Configuration errors raised while reading the environment
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
