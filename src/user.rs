//! User registry
//!
//! Tracks connected identities and enforces unique display names among
//! online users.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::types::ClientId;

/// Maximum display name length (in characters)
pub const MAX_NAME_LEN: usize = 32;

/// A joined user bound to one connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: ClientId,
    pub username: String,
    pub avatar: Option<String>,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    /// Join order, used for stable presence listings
    #[serde(skip)]
    seq: u64,
}

/// Registry of users keyed by connection
#[derive(Debug, Default)]
pub struct UserRegistry {
    users: HashMap<ClientId, User>,
    next_seq: u64,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `client_id` under `requested` name
    ///
    /// The name is trimmed and must be non-empty and at most
    /// `MAX_NAME_LEN` characters. Fails with `NameTaken` if any online user
    /// already has exactly this name.
    pub fn join(
        &mut self,
        client_id: ClientId,
        requested: &str,
        avatar: Option<String>,
    ) -> Result<User, AppError> {
        let username = validate_name(requested)?;

        if self.find_online(&username).is_some() {
            return Err(AppError::NameTaken(username));
        }

        let user = User {
            id: client_id,
            username,
            avatar,
            is_online: true,
            last_seen: Utc::now(),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.users.insert(client_id, user.clone());
        Ok(user)
    }

    /// Mark the user offline and stamp last-seen
    ///
    /// Returns the updated record for broadcasting, or `None` if the
    /// connection never joined.
    pub fn leave(&mut self, client_id: ClientId) -> Option<User> {
        let user = self.users.get_mut(&client_id)?;
        user.is_online = false;
        user.last_seen = Utc::now();
        Some(user.clone())
    }

    /// Drop the record entirely (after departure has been broadcast)
    pub fn remove(&mut self, client_id: ClientId) -> Option<User> {
        self.users.remove(&client_id)
    }

    pub fn get(&self, client_id: ClientId) -> Option<&User> {
        self.users.get(&client_id)
    }

    /// Find an online user by exact display name
    pub fn find_online(&self, username: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.is_online && u.username == username)
    }

    /// Snapshot of all known users in join order
    pub fn list(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.values().cloned().collect();
        users.sort_by_key(|u| u.seq);
        users
    }

    pub fn online_count(&self) -> usize {
        self.users.values().filter(|u| u.is_online).count()
    }
}

/// Trim and bound-check a display name
fn validate_name(requested: &str) -> Result<String, AppError> {
    let name = requested.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Username must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}
