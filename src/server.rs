//! ChatServer Actor implementation
//!
//! The central actor that owns the `SessionHub`. Connection handlers send
//! `ServerCommand`s over an mpsc channel; commands are applied one at a time,
//! which serializes every mutation of chat state.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::AppError;
use crate::hub::SessionHub;
use crate::message::{ClientMessage, ServerMessage};
use crate::types::ClientId;

/// Commands sent from handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New client connected
    Connect {
        client_id: ClientId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Client disconnected
    Disconnect { client_id: ClientId },
    /// Parsed client event
    Client {
        client_id: ClientId,
        message: ClientMessage,
    },
    /// Frame the handler could not parse
    Reject { client_id: ClientId, error: AppError },
}

/// The main ChatServer actor
pub struct ChatServer {
    hub: SessionHub,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>, hub: SessionHub) -> Self {
        Self { hub, receiver }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { client_id, sender } => {
                self.hub.connect(client_id, sender);
            }
            ServerCommand::Disconnect { client_id } => {
                self.hub.disconnect(client_id);
            }
            ServerCommand::Client { client_id, message } => {
                debug!("Event from {}: {:?}", client_id, message);
                self.hub.handle(client_id, message);
            }
            ServerCommand::Reject { client_id, error } => {
                self.hub.reject(client_id, error);
            }
        }
    }
}
