//! Session hub
//!
//! Validates every inbound event against the sender's session, applies it
//! to the owning store, and hands the resulting record to the router.
//! The hub is owned by a single `ChatServer` task, so each event is applied
//! atomically and room broadcasts leave in the order they were applied.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::auth::{IdentityVerifier, JwtVerifier};
use crate::chat::{ChatMessage, MessageKind};
use crate::config::Config;
use crate::error::AppError;
use crate::history::PrivateLog;
use crate::message::{ClientMessage, ServerMessage};
use crate::room::RoomStore;
use crate::router::BroadcastRouter;
use crate::session::Session;
use crate::typing::{TypingState, TypingTracker};
use crate::types::{ClientId, MessageId, RoomId};
use crate::user::UserRegistry;

/// Maximum message content length (in characters)
pub const MAX_CONTENT_LEN: usize = 4000;

/// Maximum room name / room id length (in characters)
pub const MAX_ROOM_NAME_LEN: usize = 64;

pub struct SessionHub {
    sessions: HashMap<ClientId, Session>,
    users: UserRegistry,
    rooms: RoomStore,
    typing: TypingTracker,
    private: PrivateLog,
    router: BroadcastRouter,
    verifier: Option<Arc<dyn IdentityVerifier>>,
    require_auth: bool,
}

impl SessionHub {
    pub fn new(config: &Config) -> Self {
        let verifier = config
            .jwt_secret
            .as_deref()
            .map(|secret| Arc::new(JwtVerifier::new(secret)) as Arc<dyn IdentityVerifier>);
        Self {
            sessions: HashMap::new(),
            users: UserRegistry::new(),
            rooms: RoomStore::new(config.history_capacity),
            typing: TypingTracker::new(),
            private: PrivateLog::new(),
            router: BroadcastRouter::new(),
            verifier,
            require_auth: config.require_auth,
        }
    }

    /// Replace the identity verifier used by `authenticate`
    pub fn with_verifier(mut self, verifier: Arc<dyn IdentityVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn users(&self) -> &UserRegistry {
        &self.users
    }

    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    pub fn typing(&self) -> &TypingTracker {
        &self.typing
    }

    pub fn private_log(&self) -> &PrivateLog {
        &self.private
    }

    pub fn session(&self, client_id: ClientId) -> Option<&Session> {
        self.sessions.get(&client_id)
    }

    /// Register a new connection and greet it with its id and the room list
    pub fn connect(&mut self, client_id: ClientId, sender: mpsc::Sender<ServerMessage>) {
        info!("Client {} connected", client_id);
        self.router.register(client_id, sender);
        self.sessions.insert(client_id, Session::new(client_id));

        self.reply(
            client_id,
            ServerMessage::Connected {
                client_id: client_id.to_string(),
            },
        );
        self.reply(
            client_id,
            ServerMessage::RoomsList {
                rooms: self.rooms.list(),
            },
        );
        debug!(
            "Total connections: {}, Total rooms: {}",
            self.router.connection_count(),
            self.rooms.len()
        );
    }

    /// Tear down a connection: presence, typing, membership, then broadcasts
    pub fn disconnect(&mut self, client_id: ClientId) {
        self.router.unregister(client_id);
        self.sessions.remove(&client_id);

        let Some(user) = self.users.leave(client_id) else {
            self.rooms.leave_all(client_id);
            info!("Anonymous client {} disconnected", client_id);
            return;
        };

        if let Some(state) = self.typing.clear(client_id) {
            let room_id = state.room_id.clone();
            self.router.to_room(
                &self.rooms,
                &room_id,
                ServerMessage::TypingIndicator(TypingState {
                    is_typing: false,
                    ..state
                }),
            );
        }
        self.rooms.leave_all(client_id);

        self.router.to_all(ServerMessage::UserLeft {
            username: user.username.clone(),
            id: user.id,
            timestamp: user.last_seen,
        });
        self.users.remove(client_id);
        self.broadcast_user_list();

        info!("User '{}' ({}) disconnected", user.username, client_id);
    }

    /// Apply one inbound event; failures are reported to the sender only
    pub fn handle(&mut self, client_id: ClientId, msg: ClientMessage) {
        let result = match msg {
            ClientMessage::Join { username } => self.join(client_id, &username),
            ClientMessage::Authenticate { token } => self.authenticate(client_id, &token),
            ClientMessage::SendMessage {
                content,
                room_id,
                file_url,
                kind,
            } => self.send_message(client_id, content, room_id, file_url, kind),
            ClientMessage::PrivateMessage { to, content } => {
                self.private_message(client_id, &to, content)
            }
            ClientMessage::PrivateHistory { with } => self.private_history(client_id, &with),
            ClientMessage::Typing { room_id, is_typing } => {
                self.set_typing(client_id, room_id, is_typing)
            }
            ClientMessage::JoinRoom { room_id } => self.join_room(client_id, room_id),
            ClientMessage::CreateRoom { name } => self.create_room(client_id, &name),
            ClientMessage::MessageReaction {
                room_id,
                message_id,
                reaction,
            } => self.react(client_id, &room_id, message_id, &reaction),
            ClientMessage::MarkRead {
                room_id,
                message_id,
            } => self.mark_read(client_id, &room_id, message_id),
        };

        if let Err(err) = result {
            self.reject(client_id, err);
        }
    }

    /// Send an error notice to a single connection
    pub fn reject(&self, client_id: ClientId, err: AppError) {
        debug!("Rejected event from {}: {}", client_id, err);
        self.reply(client_id, err.into());
    }

    fn join(&mut self, client_id: ClientId, username: &str) -> Result<(), AppError> {
        if self.require_auth {
            return Err(AppError::AuthFailed(
                "token authentication is required".to_string(),
            ));
        }
        self.admit(client_id, username, None)
    }

    fn authenticate(&mut self, client_id: ClientId, token: &str) -> Result<(), AppError> {
        let identity = self
            .verifier
            .as_ref()
            .ok_or_else(|| AppError::AuthFailed("authentication is not enabled".to_string()))?
            .verify(token)?;
        self.admit(client_id, &identity.username, identity.avatar)
    }

    /// Anonymous → Joined: claim the name and enter the default room
    fn admit(
        &mut self,
        client_id: ClientId,
        username: &str,
        avatar: Option<String>,
    ) -> Result<(), AppError> {
        let session = self
            .sessions
            .get_mut(&client_id)
            .ok_or(AppError::Unauthenticated)?;
        if session.is_joined() {
            return Err(AppError::AlreadyJoined);
        }

        let user = self.users.join(client_id, username, avatar)?;
        session.join(user.username.clone());

        let general = RoomId::default_room();
        self.rooms.join(client_id, &general);
        info!("Client {} joined as '{}'", client_id, user.username);

        self.reply(client_id, ServerMessage::Joined { user: user.clone() });
        self.reply(
            client_id,
            ServerMessage::RoomMessages {
                messages: self.rooms.history(&general),
                room_id: general,
            },
        );
        self.broadcast_user_list();
        self.router.to_all(ServerMessage::UserJoined {
            username: user.username,
            id: user.id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn send_message(
        &mut self,
        client_id: ClientId,
        content: String,
        room_id: Option<RoomId>,
        file_url: Option<String>,
        kind: Option<MessageKind>,
    ) -> Result<(), AppError> {
        let username = self.username(client_id)?;
        let room_id = room_id.unwrap_or_else(RoomId::default_room);
        let kind = kind.unwrap_or_default();

        match kind {
            MessageKind::Text => validate_content(&content)?,
            MessageKind::File => {
                if file_url.as_deref().map_or(true, |url| url.trim().is_empty()) {
                    return Err(AppError::Validation(
                        "File messages require a file_url".to_string(),
                    ));
                }
                validate_content_len(&content)?;
            }
            MessageKind::Private | MessageKind::System => {
                return Err(AppError::Validation(
                    "Message type must be text or file".to_string(),
                ));
            }
        }
        if !self.rooms.contains(&room_id) {
            return Err(AppError::RoomNotFound(room_id));
        }

        if self
            .typing
            .get(client_id)
            .is_some_and(|state| state.room_id == room_id)
        {
            self.stop_typing(client_id, &username, &room_id);
        }

        let message = ChatMessage::for_room(
            &username,
            client_id,
            room_id.clone(),
            content,
            kind,
            file_url,
        );
        let stored = self.rooms.append_message(&room_id, message)?;
        debug!("'{}' sent {} to room {}", username, stored.id, room_id);

        let message_id = stored.id;
        self.router
            .to_room(&self.rooms, &room_id, ServerMessage::ReceiveMessage { message: stored });
        self.reply(client_id, ServerMessage::MessageDelivered { message_id });
        Ok(())
    }

    fn private_message(
        &mut self,
        client_id: ClientId,
        to: &str,
        content: String,
    ) -> Result<(), AppError> {
        let username = self.username(client_id)?;
        validate_content(&content)?;

        let to = to.trim();
        if to == username {
            return Err(AppError::Validation(
                "Cannot send a private message to yourself".to_string(),
            ));
        }
        let recipient_id = self
            .users
            .find_online(to)
            .map(|user| user.id)
            .filter(|id| self.router.is_connected(*id))
            .ok_or_else(|| AppError::RecipientOffline(to.to_string()))?;

        let message = ChatMessage::private(&username, client_id, to, recipient_id, content);
        self.private.push(message.clone());
        debug!("'{}' sent private message {} to '{}'", username, message.id, to);

        self.reply(client_id, ServerMessage::PrivateMessage { message: message.clone() });
        if let Err(e) = self
            .router
            .to_connection(recipient_id, ServerMessage::PrivateMessage { message })
        {
            warn!("Private message to '{}' not delivered: {}", to, e);
        }
        Ok(())
    }

    fn private_history(&mut self, client_id: ClientId, with: &str) -> Result<(), AppError> {
        let username = self.username(client_id)?;
        let with = with.trim().to_string();
        let messages = self.private.conversation(&username, &with);
        self.reply(client_id, ServerMessage::PrivateHistory { with, messages });
        Ok(())
    }

    fn set_typing(
        &mut self,
        client_id: ClientId,
        room_id: Option<RoomId>,
        is_typing: bool,
    ) -> Result<(), AppError> {
        let username = self.username(client_id)?;
        let room_id = room_id.unwrap_or_else(RoomId::default_room);
        if !self.rooms.contains(&room_id) {
            return Err(AppError::RoomNotFound(room_id));
        }

        let stale = self
            .typing
            .get(client_id)
            .map(|prev| prev.room_id.clone())
            .filter(|prev| prev != &room_id);
        if let Some(prev) = stale {
            self.stop_typing(client_id, &username, &prev);
        }

        let state = self.typing.set_typing(client_id, &username, room_id, is_typing);
        self.router.to_room_except(
            &self.rooms,
            &state.room_id,
            Some(client_id),
            ServerMessage::TypingIndicator(state.clone()),
        );
        Ok(())
    }

    fn join_room(&mut self, client_id: ClientId, room_id: RoomId) -> Result<(), AppError> {
        let username = self.username(client_id)?;
        validate_room_id(&room_id)?;

        let created = !self.rooms.contains(&room_id);
        self.move_to_room(client_id, &username, &room_id);
        if created {
            info!("Room {} created on join by '{}'", room_id, username);
            if let Some(room) = self.rooms.get(&room_id) {
                self.router.to_all(ServerMessage::RoomCreated(room.summary()));
            }
        }

        self.reply(
            client_id,
            ServerMessage::RoomMessages {
                room_id: room_id.clone(),
                messages: self.rooms.history(&room_id),
            },
        );
        self.router.to_room_except(
            &self.rooms,
            &room_id,
            Some(client_id),
            ServerMessage::UserJoinedRoom {
                username,
                room_id: room_id.clone(),
            },
        );
        Ok(())
    }

    fn create_room(&mut self, client_id: ClientId, name: &str) -> Result<(), AppError> {
        let username = self.username(client_id)?;
        let name = validate_room_name(name)?;

        let room_id = self.rooms.create_room(name, &username).id.clone();
        info!("'{}' created room {} ({})", username, room_id, name);
        self.move_to_room(client_id, &username, &room_id);

        self.reply(
            client_id,
            ServerMessage::RoomMessages {
                room_id: room_id.clone(),
                messages: Vec::new(),
            },
        );
        if let Some(room) = self.rooms.get(&room_id) {
            self.router.to_all(ServerMessage::RoomCreated(room.summary()));
        }
        Ok(())
    }

    fn react(
        &mut self,
        client_id: ClientId,
        room_id: &RoomId,
        message_id: MessageId,
        reaction: &str,
    ) -> Result<(), AppError> {
        let username = self.username(client_id)?;
        let message = self
            .rooms
            .toggle_reaction(room_id, message_id, client_id, &username, reaction)?;
        self.router
            .to_room(&self.rooms, room_id, ServerMessage::MessageUpdated { message });
        Ok(())
    }

    fn mark_read(
        &mut self,
        client_id: ClientId,
        room_id: &RoomId,
        message_id: MessageId,
    ) -> Result<(), AppError> {
        let username = self.username(client_id)?;
        let (message, changed) = self.rooms.mark_read(room_id, message_id, &username)?;
        if changed {
            self.router
                .to_room(&self.rooms, room_id, ServerMessage::MessageUpdated { message });
        }
        Ok(())
    }

    /// Move a joined connection into `room_id`, notifying the room it left
    fn move_to_room(&mut self, client_id: ClientId, username: &str, room_id: &RoomId) {
        let Some(previous) = self.rooms.join(client_id, room_id) else {
            return;
        };

        if self
            .typing
            .get(client_id)
            .is_some_and(|state| state.room_id == previous)
        {
            self.stop_typing(client_id, username, &previous);
        }
        self.router.to_room(
            &self.rooms,
            &previous,
            ServerMessage::UserLeftRoom {
                username: username.to_string(),
                room_id: previous.clone(),
            },
        );
    }

    fn stop_typing(&mut self, client_id: ClientId, username: &str, room_id: &RoomId) {
        let state = self.typing.set_typing(client_id, username, room_id.clone(), false);
        self.router.to_room_except(
            &self.rooms,
            room_id,
            Some(client_id),
            ServerMessage::TypingIndicator(state),
        );
    }

    fn broadcast_user_list(&self) {
        self.router.to_all(ServerMessage::UserList {
            users: self.users.list(),
        });
    }

    fn reply(&self, client_id: ClientId, msg: ServerMessage) {
        if let Err(e) = self.router.to_connection(client_id, msg) {
            debug!("Reply to {} dropped: {}", client_id, e);
        }
    }

    /// Display name of a joined connection
    fn username(&self, client_id: ClientId) -> Result<String, AppError> {
        self.sessions
            .get(&client_id)
            .ok_or(AppError::Unauthenticated)?
            .username()
            .map(str::to_string)
    }
}

fn validate_content(content: &str) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("Message content is required".to_string()));
    }
    validate_content_len(content)
}

/// File captions may be empty but share the length limit
fn validate_content_len(content: &str) -> Result<(), AppError> {
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(AppError::Validation(format!(
            "Message content must be at most {} characters",
            MAX_CONTENT_LEN
        )));
    }
    Ok(())
}

fn validate_room_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_ROOM_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Room name must be 1 to {} characters",
            MAX_ROOM_NAME_LEN
        )));
    }
    Ok(name)
}

fn validate_room_id(room_id: &RoomId) -> Result<(), AppError> {
    let id = room_id.as_str();
    if id.trim().is_empty() || id.chars().count() > MAX_ROOM_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Room id must be 1 to {} characters",
            MAX_ROOM_NAME_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::issue_token;
    use crate::message::ErrorCode;

    fn hub() -> SessionHub {
        SessionHub::new(&Config::default())
    }

    fn connect(hub: &mut SessionHub) -> (ClientId, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(256);
        let id = ClientId::new();
        hub.connect(id, tx);
        (id, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn joined(hub: &mut SessionHub, name: &str) -> (ClientId, mpsc::Receiver<ServerMessage>) {
        let (id, mut rx) = connect(hub);
        hub.handle(
            id,
            ClientMessage::Join {
                username: name.to_string(),
            },
        );
        drain(&mut rx);
        (id, rx)
    }

    fn send(hub: &mut SessionHub, id: ClientId, room: &str, content: &str) {
        hub.handle(
            id,
            ClientMessage::SendMessage {
                content: content.to_string(),
                room_id: Some(RoomId::from(room)),
                file_url: None,
                kind: None,
            },
        );
    }

    fn error_code(msgs: &[ServerMessage]) -> Option<ErrorCode> {
        msgs.iter().find_map(|m| match m {
            ServerMessage::Error { code, .. } => Some(*code),
            _ => None,
        })
    }

    fn general() -> RoomId {
        RoomId::default_room()
    }

    #[test]
    fn test_connect_greets_with_rooms() {
        let mut hub = hub();
        let (id, mut rx) = connect(&mut hub);
        let msgs = drain(&mut rx);

        assert_eq!(
            msgs[0],
            ServerMessage::Connected {
                client_id: id.to_string()
            }
        );
        assert!(matches!(&msgs[1], ServerMessage::RoomsList { rooms } if rooms.len() == 1));
        assert!(!hub.session(id).unwrap().is_joined());
    }

    #[test]
    fn test_join_enters_default_room() {
        let mut hub = hub();
        let (id, mut rx) = connect(&mut hub);
        drain(&mut rx);

        hub.handle(
            id,
            ClientMessage::Join {
                username: "alice".to_string(),
            },
        );
        let msgs = drain(&mut rx);

        assert!(matches!(&msgs[0], ServerMessage::Joined { user } if user.username == "alice"));
        assert!(matches!(&msgs[1], ServerMessage::RoomMessages { room_id, .. } if room_id.is_default()));
        assert!(msgs.iter().any(|m| matches!(m, ServerMessage::UserList { users } if users.len() == 1)));
        assert!(msgs.iter().any(|m| matches!(m, ServerMessage::UserJoined { username, .. } if username == "alice")));
        assert_eq!(hub.rooms().location(id), Some(&general()));
    }

    #[test]
    fn test_alice_sends_hi_then_duplicate_alice_rejected() {
        let mut hub = hub();
        let (alice, _rx) = joined(&mut hub, "alice");
        send(&mut hub, alice, "general", "hi");

        let history = hub.rooms().history(&general());
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sender, "alice");
        assert_eq!(history[0].content, "hi");

        let (imposter, mut rx) = connect(&mut hub);
        drain(&mut rx);
        hub.handle(
            imposter,
            ClientMessage::Join {
                username: "alice".to_string(),
            },
        );

        assert_eq!(error_code(&drain(&mut rx)), Some(ErrorCode::NameTaken));
        assert_eq!(hub.users().list().len(), 1);
        assert!(!hub.session(imposter).unwrap().is_joined());
    }

    #[test]
    fn test_join_twice_rejected() {
        let mut hub = hub();
        let (alice, mut rx) = joined(&mut hub, "alice");
        hub.handle(
            alice,
            ClientMessage::Join {
                username: "alicia".to_string(),
            },
        );

        assert_eq!(error_code(&drain(&mut rx)), Some(ErrorCode::AlreadyJoined));
        assert_eq!(hub.users().get(alice).unwrap().username, "alice");
    }

    #[test]
    fn test_actions_before_join_are_unauthenticated() {
        let mut hub = hub();
        let (id, mut rx) = connect(&mut hub);
        drain(&mut rx);

        send(&mut hub, id, "general", "hi");
        hub.handle(
            id,
            ClientMessage::Typing {
                room_id: None,
                is_typing: true,
            },
        );
        hub.handle(
            id,
            ClientMessage::CreateRoom {
                name: "x".to_string(),
            },
        );

        let codes: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|m| match m {
                ServerMessage::Error { code, .. } => Some(code),
                _ => None,
            })
            .collect();
        assert_eq!(codes, vec![ErrorCode::Unauthenticated; 3]);
        assert!(hub.rooms().history(&general()).is_empty());
        assert_eq!(hub.rooms().len(), 1);
    }

    #[test]
    fn test_send_broadcasts_and_acks() {
        let mut hub = hub();
        let (alice, mut alice_rx) = joined(&mut hub, "alice");
        let (_bob, mut bob_rx) = joined(&mut hub, "bob");
        drain(&mut alice_rx);

        send(&mut hub, alice, "general", "hello");

        let alice_msgs = drain(&mut alice_rx);
        let bob_msgs = drain(&mut bob_rx);
        assert!(matches!(&bob_msgs[0], ServerMessage::ReceiveMessage { message } if message.content == "hello"));
        assert!(matches!(&alice_msgs[0], ServerMessage::ReceiveMessage { .. }));
        assert!(matches!(&alice_msgs[1], ServerMessage::MessageDelivered { .. }));
    }

    #[test]
    fn test_send_validation() {
        let mut hub = hub();
        let (alice, mut rx) = joined(&mut hub, "alice");

        send(&mut hub, alice, "general", "   ");
        assert_eq!(error_code(&drain(&mut rx)), Some(ErrorCode::InvalidInput));

        send(&mut hub, alice, "general", &"x".repeat(MAX_CONTENT_LEN + 1));
        assert_eq!(error_code(&drain(&mut rx)), Some(ErrorCode::InvalidInput));

        send(&mut hub, alice, "nowhere", "hi");
        assert_eq!(error_code(&drain(&mut rx)), Some(ErrorCode::RoomNotFound));

        hub.handle(
            alice,
            ClientMessage::SendMessage {
                content: String::new(),
                room_id: None,
                file_url: None,
                kind: Some(MessageKind::File),
            },
        );
        assert_eq!(error_code(&drain(&mut rx)), Some(ErrorCode::InvalidInput));

        hub.handle(
            alice,
            ClientMessage::SendMessage {
                content: "sys".to_string(),
                room_id: None,
                file_url: None,
                kind: Some(MessageKind::System),
            },
        );
        assert_eq!(error_code(&drain(&mut rx)), Some(ErrorCode::InvalidInput));

        assert!(hub.rooms().history(&general()).is_empty());
    }

    #[test]
    fn test_file_message_keeps_reference() {
        let mut hub = hub();
        let (alice, _rx) = joined(&mut hub, "alice");
        hub.handle(
            alice,
            ClientMessage::SendMessage {
                content: String::new(),
                room_id: None,
                file_url: Some("/uploads/cat.png".to_string()),
                kind: Some(MessageKind::File),
            },
        );

        let history = hub.rooms().history(&general());
        assert_eq!(history[0].kind, MessageKind::File);
        assert_eq!(history[0].file_url.as_deref(), Some("/uploads/cat.png"));
    }

    #[test]
    fn test_101_sends_keep_last_100() {
        let mut hub = hub();
        let (alice, _rx) = joined(&mut hub, "alice");
        for n in 1..=101 {
            send(&mut hub, alice, "general", &format!("m{}", n));
        }

        let history = hub.rooms().history(&general());
        assert_eq!(history.len(), 100);
        assert_eq!(history[0].content, "m2");
        assert_eq!(history[99].content, "m101");
        assert!(history.iter().all(|m| m.content != "m1"));
    }

    #[test]
    fn test_reaction_toggle_off() {
        let mut hub = hub();
        let (alice, mut rx) = joined(&mut hub, "alice");
        hub.handle(alice, ClientMessage::JoinRoom { room_id: general() });
        send(&mut hub, alice, "general", "hi");
        let message_id = hub.rooms().history(&general())[0].id;
        drain(&mut rx);

        for _ in 0..2 {
            hub.handle(
                alice,
                ClientMessage::MessageReaction {
                    room_id: general(),
                    message_id,
                    reaction: "like".to_string(),
                },
            );
        }

        let updates: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|m| match m {
                ServerMessage::MessageUpdated { message } => Some(message.reactions.len()),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec![1, 0]);
        assert!(hub
            .rooms()
            .find_message(&general(), message_id)
            .unwrap()
            .reactions
            .is_empty());
    }

    #[test]
    fn test_reaction_unknown_message() {
        let mut hub = hub();
        let (alice, mut rx) = joined(&mut hub, "alice");
        hub.handle(
            alice,
            ClientMessage::MessageReaction {
                room_id: general(),
                message_id: MessageId::new(),
                reaction: "like".to_string(),
            },
        );

        assert_eq!(error_code(&drain(&mut rx)), Some(ErrorCode::MessageNotFound));
    }

    #[test]
    fn test_mark_read_broadcasts_once() {
        let mut hub = hub();
        let (alice, _alice_rx) = joined(&mut hub, "alice");
        let (bob, mut bob_rx) = joined(&mut hub, "bob");
        send(&mut hub, alice, "general", "hi");
        let message_id = hub.rooms().history(&general())[0].id;
        drain(&mut bob_rx);

        for _ in 0..2 {
            hub.handle(
                bob,
                ClientMessage::MarkRead {
                    room_id: general(),
                    message_id,
                },
            );
        }

        let updates = drain(&mut bob_rx)
            .into_iter()
            .filter(|m| matches!(m, ServerMessage::MessageUpdated { .. }))
            .count();
        assert_eq!(updates, 1);
        let stored = hub.rooms().find_message(&general(), message_id).unwrap();
        assert_eq!(stored.read_by, vec!["bob"]);
    }

    #[test]
    fn test_typing_excludes_sender() {
        let mut hub = hub();
        let (alice, mut alice_rx) = joined(&mut hub, "alice");
        let (_bob, mut bob_rx) = joined(&mut hub, "bob");
        drain(&mut alice_rx);

        hub.handle(
            alice,
            ClientMessage::Typing {
                room_id: None,
                is_typing: true,
            },
        );

        assert!(drain(&mut alice_rx).is_empty());
        assert!(matches!(
            &drain(&mut bob_rx)[0],
            ServerMessage::TypingIndicator(state) if state.username == "alice" && state.is_typing
        ));
        assert_eq!(hub.typing().typing_in(&general()), vec!["alice"]);
    }

    #[test]
    fn test_send_clears_typing() {
        let mut hub = hub();
        let (alice, _alice_rx) = joined(&mut hub, "alice");
        let (_bob, mut bob_rx) = joined(&mut hub, "bob");
        hub.handle(
            alice,
            ClientMessage::Typing {
                room_id: None,
                is_typing: true,
            },
        );
        drain(&mut bob_rx);

        send(&mut hub, alice, "general", "done");

        let msgs = drain(&mut bob_rx);
        assert!(matches!(&msgs[0], ServerMessage::TypingIndicator(state) if !state.is_typing));
        assert!(matches!(&msgs[1], ServerMessage::ReceiveMessage { .. }));
        assert!(hub.typing().typing_in(&general()).is_empty());
    }

    #[test]
    fn test_typing_in_another_room_clears_previous() {
        let mut hub = hub();
        let (alice, _alice_rx) = joined(&mut hub, "alice");
        let (_bob, mut bob_rx) = joined(&mut hub, "bob");
        let (carol, mut carol_rx) = joined(&mut hub, "carol");
        hub.handle(
            carol,
            ClientMessage::JoinRoom {
                room_id: RoomId::from("other"),
            },
        );
        hub.handle(
            alice,
            ClientMessage::Typing {
                room_id: None,
                is_typing: true,
            },
        );
        drain(&mut bob_rx);
        drain(&mut carol_rx);

        hub.handle(
            alice,
            ClientMessage::Typing {
                room_id: Some(RoomId::from("other")),
                is_typing: true,
            },
        );

        let msgs = drain(&mut bob_rx);
        assert_eq!(msgs.len(), 1);
        assert!(matches!(
            &msgs[0],
            ServerMessage::TypingIndicator(state)
                if state.username == "alice" && state.room_id == general() && !state.is_typing
        ));
        assert!(matches!(
            &drain(&mut carol_rx)[0],
            ServerMessage::TypingIndicator(state) if state.room_id.as_str() == "other" && state.is_typing
        ));
        assert!(hub.typing().typing_in(&general()).is_empty());
        assert_eq!(hub.typing().typing_in(&RoomId::from("other")), vec!["alice"]);
    }

    #[test]
    fn test_disconnect_while_typing() {
        let mut hub = hub();
        let (alice, _alice_rx) = joined(&mut hub, "alice");
        let (_bob, mut bob_rx) = joined(&mut hub, "bob");
        hub.handle(
            alice,
            ClientMessage::Typing {
                room_id: Some(general()),
                is_typing: true,
            },
        );
        drain(&mut bob_rx);

        hub.disconnect(alice);

        let msgs = drain(&mut bob_rx);
        assert!(matches!(&msgs[0], ServerMessage::TypingIndicator(state) if !state.is_typing));
        assert!(msgs.iter().any(|m| matches!(m, ServerMessage::UserLeft { username, .. } if username == "alice")));
        let last_list = msgs.iter().rev().find_map(|m| match m {
            ServerMessage::UserList { users } => Some(users.clone()),
            _ => None,
        });
        assert!(last_list.unwrap().iter().all(|u| u.username != "alice"));

        assert!(hub.typing().typing_in(&general()).is_empty());
        assert!(hub.users().get(alice).is_none());
        assert!(!hub.rooms().get(&general()).unwrap().contains(alice));
        assert!(hub.session(alice).is_none());
    }

    #[test]
    fn test_events_after_disconnect_ignored() {
        let mut hub = hub();
        let (alice, _rx) = joined(&mut hub, "alice");
        hub.disconnect(alice);

        send(&mut hub, alice, "general", "ghost");
        assert!(hub.rooms().history(&general()).is_empty());
    }

    #[test]
    fn test_name_free_after_disconnect() {
        let mut hub = hub();
        let (alice, _rx) = joined(&mut hub, "alice");
        hub.disconnect(alice);

        let (_again, _rx) = joined(&mut hub, "alice");
        assert_eq!(hub.users().online_count(), 1);
    }

    #[test]
    fn test_join_room_moves_and_delivers_history() {
        let mut hub = hub();
        let (alice, mut alice_rx) = joined(&mut hub, "alice");
        let (bob, mut bob_rx) = joined(&mut hub, "bob");
        let lobby = RoomId::from("lobby");
        hub.handle(bob, ClientMessage::JoinRoom { room_id: lobby.clone() });
        send(&mut hub, bob, "lobby", "anyone?");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        hub.handle(alice, ClientMessage::JoinRoom { room_id: lobby.clone() });

        let alice_msgs = drain(&mut alice_rx);
        assert!(matches!(
            &alice_msgs[0],
            ServerMessage::RoomMessages { room_id, messages } if room_id == &lobby && messages.len() == 1
        ));
        assert!(matches!(
            &drain(&mut bob_rx)[0],
            ServerMessage::UserJoinedRoom { username, .. } if username == "alice"
        ));
        assert_eq!(hub.rooms().location(alice), Some(&lobby));
        assert_eq!(hub.rooms().get(&general()).unwrap().member_count(), 0);
    }

    #[test]
    fn test_join_unknown_room_creates_it() {
        let mut hub = hub();
        let (alice, _alice_rx) = joined(&mut hub, "alice");
        let (_bob, mut bob_rx) = joined(&mut hub, "bob");
        drain(&mut bob_rx);

        hub.handle(
            alice,
            ClientMessage::JoinRoom {
                room_id: RoomId::from("random"),
            },
        );

        let msgs = drain(&mut bob_rx);
        assert!(msgs.iter().any(|m| matches!(
            m,
            ServerMessage::RoomCreated(room) if room.id == RoomId::from("random") && room.user_count == 1
        )));
        assert!(msgs.iter().any(|m| matches!(m, ServerMessage::UserLeftRoom { username, .. } if username == "alice")));
        assert_eq!(hub.rooms().get(&RoomId::from("random")).unwrap().name, "random");
    }

    #[test]
    fn test_create_room_moves_creator() {
        let mut hub = hub();
        let (alice, mut alice_rx) = joined(&mut hub, "alice");
        let (_bob, mut bob_rx) = joined(&mut hub, "bob");
        drain(&mut alice_rx);

        hub.handle(
            alice,
            ClientMessage::CreateRoom {
                name: " Rustaceans ".to_string(),
            },
        );

        let created = drain(&mut bob_rx)
            .into_iter()
            .find_map(|m| match m {
                ServerMessage::RoomCreated(room) => Some(room),
                _ => None,
            })
            .unwrap();
        assert_eq!(created.name, "Rustaceans");
        assert_eq!(created.created_by.as_deref(), Some("alice"));
        assert_eq!(created.user_count, 1);
        assert_eq!(hub.rooms().location(alice), Some(&created.id));
        assert!(drain(&mut alice_rx)
            .iter()
            .any(|m| matches!(m, ServerMessage::RoomMessages { messages, .. } if messages.is_empty())));
    }

    #[test]
    fn test_create_room_empty_name() {
        let mut hub = hub();
        let (alice, mut rx) = joined(&mut hub, "alice");
        hub.handle(
            alice,
            ClientMessage::CreateRoom {
                name: "  ".to_string(),
            },
        );

        assert_eq!(error_code(&drain(&mut rx)), Some(ErrorCode::InvalidInput));
        assert_eq!(hub.rooms().len(), 1);
    }

    #[test]
    fn test_private_message_delivered_to_both() {
        let mut hub = hub();
        let (alice, mut alice_rx) = joined(&mut hub, "alice");
        let (bob, mut bob_rx) = joined(&mut hub, "bob");
        let (_carol, mut carol_rx) = joined(&mut hub, "carol");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        hub.handle(
            alice,
            ClientMessage::PrivateMessage {
                to: "bob".to_string(),
                content: "psst".to_string(),
            },
        );

        assert!(matches!(&drain(&mut alice_rx)[0], ServerMessage::PrivateMessage { message } if message.recipient_id == Some(bob)));
        assert!(matches!(&drain(&mut bob_rx)[0], ServerMessage::PrivateMessage { message } if message.sender == "alice"));
        assert!(drain(&mut carol_rx).is_empty());
        assert_eq!(hub.private_log().conversation("bob", "alice").len(), 1);
    }

    #[test]
    fn test_private_message_offline_recipient() {
        let mut hub = hub();
        let (alice, mut rx) = joined(&mut hub, "alice");
        hub.handle(
            alice,
            ClientMessage::PrivateMessage {
                to: "nobody".to_string(),
                content: "hello?".to_string(),
            },
        );

        assert_eq!(error_code(&drain(&mut rx)), Some(ErrorCode::RecipientOffline));
        assert!(hub.private_log().conversation("alice", "nobody").is_empty());
    }

    #[test]
    fn test_private_message_to_self_rejected() {
        let mut hub = hub();
        let (alice, mut rx) = joined(&mut hub, "alice");
        hub.handle(
            alice,
            ClientMessage::PrivateMessage {
                to: "alice".to_string(),
                content: "me".to_string(),
            },
        );

        assert_eq!(error_code(&drain(&mut rx)), Some(ErrorCode::InvalidInput));
    }

    #[test]
    fn test_private_history() {
        let mut hub = hub();
        let (alice, mut alice_rx) = joined(&mut hub, "alice");
        let (bob, _bob_rx) = joined(&mut hub, "bob");
        hub.handle(
            bob,
            ClientMessage::PrivateMessage {
                to: "alice".to_string(),
                content: "one".to_string(),
            },
        );
        drain(&mut alice_rx);

        hub.handle(
            alice,
            ClientMessage::PrivateHistory {
                with: "bob".to_string(),
            },
        );

        assert!(matches!(
            &drain(&mut alice_rx)[0],
            ServerMessage::PrivateHistory { with, messages } if with == "bob" && messages.len() == 1
        ));
    }

    #[test]
    fn test_authenticate_with_token() {
        let config = Config {
            jwt_secret: Some("secret".to_string()),
            ..Config::default()
        };
        let mut hub = SessionHub::new(&config);
        let (id, mut rx) = connect(&mut hub);
        drain(&mut rx);

        let token = issue_token("alice", Some("a.png"), "secret").unwrap();
        hub.handle(id, ClientMessage::Authenticate { token });

        assert!(matches!(
            &drain(&mut rx)[0],
            ServerMessage::Joined { user } if user.username == "alice" && user.avatar.as_deref() == Some("a.png")
        ));
    }

    #[test]
    fn test_authenticate_disabled() {
        let mut hub = hub();
        let (id, mut rx) = connect(&mut hub);
        drain(&mut rx);

        hub.handle(
            id,
            ClientMessage::Authenticate {
                token: "anything".to_string(),
            },
        );

        assert_eq!(error_code(&drain(&mut rx)), Some(ErrorCode::AuthFailed));
        assert!(hub.users().list().is_empty());
    }

    #[test]
    fn test_require_auth_blocks_plain_join() {
        let config = Config {
            jwt_secret: Some("secret".to_string()),
            require_auth: true,
            ..Config::default()
        };
        let mut hub = SessionHub::new(&config);
        let (id, mut rx) = connect(&mut hub);
        drain(&mut rx);

        hub.handle(
            id,
            ClientMessage::Join {
                username: "alice".to_string(),
            },
        );

        assert_eq!(error_code(&drain(&mut rx)), Some(ErrorCode::AuthFailed));
        assert!(!hub.session(id).unwrap().is_joined());
    }

    struct FixedVerifier;

    impl IdentityVerifier for FixedVerifier {
        fn verify(&self, token: &str) -> Result<crate::auth::Identity, AppError> {
            match token {
                "good" => Ok(crate::auth::Identity {
                    username: "alice".to_string(),
                    avatar: None,
                }),
                _ => Err(AppError::AuthFailed("unknown token".to_string())),
            }
        }
    }

    #[test]
    fn test_custom_verifier_name_still_unique() {
        let mut hub = hub().with_verifier(Arc::new(FixedVerifier));
        let (_alice, _rx) = joined(&mut hub, "alice");
        let (id, mut rx) = connect(&mut hub);
        drain(&mut rx);

        hub.handle(
            id,
            ClientMessage::Authenticate {
                token: "bad".to_string(),
            },
        );
        assert_eq!(error_code(&drain(&mut rx)), Some(ErrorCode::AuthFailed));

        hub.handle(
            id,
            ClientMessage::Authenticate {
                token: "good".to_string(),
            },
        );
        assert_eq!(error_code(&drain(&mut rx)), Some(ErrorCode::NameTaken));
        assert_eq!(hub.users().online_count(), 1);
    }
}
