//! Room store
//!
//! Owns every room, its membership set and its bounded message history.
//! A connection is a member of at most one room at a time.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chat::ChatMessage;
use crate::error::AppError;
use crate::history::{MessageLog, DEFAULT_HISTORY_CAPACITY};
use crate::types::{ClientId, MessageId, RoomId, DEFAULT_ROOM_NAME};

/// Multi-member chat room
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    /// Creator display name (None for the default room and implicit rooms)
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    members: HashSet<ClientId>,
    history: MessageLog,
}

impl Room {
    fn new(id: RoomId, name: String, created_by: Option<String>, capacity: usize) -> Self {
        Self {
            id,
            name,
            created_by,
            created_at: Utc::now(),
            members: HashSet::new(),
            history: MessageLog::new(capacity),
        }
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.members.contains(&client_id)
    }

    pub fn members(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.members.iter().copied()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn history(&self) -> &MessageLog {
        &self.history
    }

    /// Presence summary of this room
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_by: self.created_by.clone(),
            user_count: self.member_count(),
        }
    }
}

/// Room listing entry sent to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub user_count: usize,
}

/// All rooms, in creation order, plus the connection → room index
#[derive(Debug)]
pub struct RoomStore {
    rooms: HashMap<RoomId, Room>,
    order: Vec<RoomId>,
    /// Room each connection currently occupies
    locations: HashMap<ClientId, RoomId>,
    capacity: usize,
}

impl RoomStore {
    /// Create a store containing only the default room
    pub fn new(capacity: usize) -> Self {
        let mut store = Self {
            rooms: HashMap::new(),
            order: Vec::new(),
            locations: HashMap::new(),
            capacity,
        };
        store.ensure_room(&RoomId::default_room(), Some(DEFAULT_ROOM_NAME));
        store
    }

    /// Return the room with `id`, creating it if absent
    ///
    /// The name defaults to the id when omitted. Idempotent: an existing
    /// room is returned unchanged.
    pub fn ensure_room(&mut self, id: &RoomId, name: Option<&str>) -> &Room {
        if !self.rooms.contains_key(id) {
            let name = name.unwrap_or(id.as_str()).to_string();
            let room = Room::new(id.clone(), name, None, self.capacity);
            self.order.push(id.clone());
            self.rooms.insert(id.clone(), room);
        }
        &self.rooms[id]
    }

    /// Create a new room with a fresh id
    ///
    /// Names are not required to be unique.
    pub fn create_room(&mut self, name: &str, creator: &str) -> &Room {
        let id = loop {
            let id = RoomId::generate();
            if !self.rooms.contains_key(&id) {
                break id;
            }
        };
        let room = Room::new(
            id.clone(),
            name.to_string(),
            Some(creator.to_string()),
            self.capacity,
        );
        self.order.push(id.clone());
        self.rooms.insert(id.clone(), room);
        &self.rooms[&id]
    }

    /// Move `client_id` into `room_id`, leaving its previous room
    ///
    /// Creates the target room if it does not exist. Returns the id of the
    /// room that was left, if it differs from the target.
    pub fn join(&mut self, client_id: ClientId, room_id: &RoomId) -> Option<RoomId> {
        let previous = self.leave_all(client_id);

        self.ensure_room(room_id, None);
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.members.insert(client_id);
        }
        self.locations.insert(client_id, room_id.clone());

        previous.filter(|prev| prev != room_id)
    }

    /// Remove `client_id` from the room it occupies
    ///
    /// Returns the room it was in, if any.
    pub fn leave_all(&mut self, client_id: ClientId) -> Option<RoomId> {
        let previous = self.locations.remove(&client_id)?;
        if let Some(room) = self.rooms.get_mut(&previous) {
            room.members.remove(&client_id);
        }
        Some(previous)
    }

    /// Room the connection currently occupies
    pub fn location(&self, client_id: ClientId) -> Option<&RoomId> {
        self.locations.get(&client_id)
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Append to a room's history, evicting the oldest entry past capacity
    pub fn append_message(
        &mut self,
        room_id: &RoomId,
        message: ChatMessage,
    ) -> Result<ChatMessage, AppError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| AppError::RoomNotFound(room_id.clone()))?;
        Ok(room.history.push(message).clone())
    }

    /// History of a room, oldest first; empty for unknown rooms
    pub fn history(&self, room_id: &RoomId) -> Vec<ChatMessage> {
        self.rooms
            .get(room_id)
            .map(|room| room.history.snapshot())
            .unwrap_or_default()
    }

    pub fn find_message(&self, room_id: &RoomId, message_id: MessageId) -> Option<&ChatMessage> {
        self.rooms.get(room_id)?.history.find(message_id)
    }

    /// Mutable lookup used by reaction and read-receipt updates
    pub(crate) fn find_message_mut(
        &mut self,
        room_id: &RoomId,
        message_id: MessageId,
    ) -> Result<&mut ChatMessage, AppError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| AppError::RoomNotFound(room_id.clone()))?;
        room.history
            .find_mut(message_id)
            .ok_or(AppError::MessageNotFound(message_id))
    }

    /// All rooms with member counts, in creation order
    pub fn list(&self) -> Vec<RoomSummary> {
        self.order
            .iter()
            .filter_map(|id| self.rooms.get(id))
            .map(Room::summary)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
