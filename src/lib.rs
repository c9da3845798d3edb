//! Multi-room WebSocket Chat Hub Library
//!
//! A real-time chat hub built with tokio-tungstenite using the Actor
//! pattern for state management.
//!
//! # Features
//! - Unique display names with online presence
//! - Default `general` room plus user-created rooms
//! - Bounded per-room history (oldest evicted first)
//! - Text and file messages, private messages
//! - Typing indicators
//! - Reaction toggling and read receipts
//! - Optional JWT identity verification
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning the `SessionHub`
//! - `SessionHub` validates events and drives the registry, room store,
//!   typing tracker and broadcast router
//! - Each connection has a `handler` task communicating with the server
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use chat_hub::{handle_connection, ChatServer, Config, SessionHub};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let listener = TcpListener::bind(&config.addr).await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
//!
//!     tokio::spawn(ChatServer::new(cmd_rx, SessionHub::new(&config)).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, cmd_tx.clone(), config.client_buffer));
//!     }
//! }
//! ```

pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod handler;
pub mod history;
pub mod hub;
pub mod message;
pub mod reaction;
pub mod room;
pub mod router;
pub mod server;
pub mod session;
pub mod typing;
pub mod types;
pub mod user;

// Re-export main types for convenience
pub use auth::{Identity, IdentityVerifier, JwtVerifier};
pub use chat::{ChatMessage, MessageKind};
pub use config::Config;
pub use error::{AppError, ConfigError, SendError};
pub use handler::handle_connection;
pub use history::{MessageLog, PrivateLog};
pub use hub::SessionHub;
pub use message::{ClientMessage, ErrorCode, ServerMessage};
pub use reaction::Reaction;
pub use room::{Room, RoomStore, RoomSummary};
pub use router::BroadcastRouter;
pub use server::{ChatServer, ServerCommand};
pub use session::{Session, SessionState};
pub use typing::{TypingState, TypingTracker};
pub use types::{ClientId, MessageId, RoomId};
pub use user::{User, UserRegistry};
