//! Broadcast router
//!
//! Owns the outbound channel of every connection and fans events out to
//! all connections, one room, or a single connection. Delivery is a single
//! non-blocking attempt: a full or closed channel drops the event.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::room::RoomStore;
use crate::types::{ClientId, RoomId};

#[derive(Debug, Default)]
pub struct BroadcastRouter {
    connections: HashMap<ClientId, mpsc::Sender<ServerMessage>>,
}

impl BroadcastRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, client_id: ClientId, sender: mpsc::Sender<ServerMessage>) {
        self.connections.insert(client_id, sender);
    }

    pub fn unregister(&mut self, client_id: ClientId) {
        self.connections.remove(&client_id);
    }

    pub fn is_connected(&self, client_id: ClientId) -> bool {
        self.connections.contains_key(&client_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Deliver to every registered connection
    pub fn to_all(&self, msg: ServerMessage) {
        for (client_id, sender) in &self.connections {
            deliver(*client_id, sender, msg.clone());
        }
    }

    /// Deliver to every member of a room
    pub fn to_room(&self, rooms: &RoomStore, room_id: &RoomId, msg: ServerMessage) {
        self.to_room_except(rooms, room_id, None, msg);
    }

    /// Deliver to every member of a room except `skip`
    pub fn to_room_except(
        &self,
        rooms: &RoomStore,
        room_id: &RoomId,
        skip: Option<ClientId>,
        msg: ServerMessage,
    ) {
        let Some(room) = rooms.get(room_id) else {
            debug!("Broadcast to unknown room {} dropped", room_id);
            return;
        };
        for member in room.members().filter(|m| Some(*m) != skip) {
            if let Some(sender) = self.connections.get(&member) {
                deliver(member, sender, msg.clone());
            }
        }
    }

    /// Deliver to a single connection
    pub fn to_connection(&self, client_id: ClientId, msg: ServerMessage) -> Result<(), SendError> {
        let sender = self
            .connections
            .get(&client_id)
            .ok_or(SendError::RecipientNotFound)?;
        sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::ChannelFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}

fn deliver(client_id: ClientId, sender: &mpsc::Sender<ServerMessage>, msg: ServerMessage) {
    match sender.try_send(msg) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!("Outbound buffer full for {}, event dropped", client_id);
        }
        Err(TrySendError::Closed(_)) => {
            debug!("Connection {} closed, event dropped", client_id);
        }
    }
}
