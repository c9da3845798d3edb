//! Runtime configuration
//!
//! Read from the process environment (after `.env` loading in `main`).

use std::env;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::history::DEFAULT_HISTORY_CAPACITY;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:5005";

/// Per-connection outbound buffer size
pub const DEFAULT_CLIENT_BUFFER: usize = 32;

/// Channel buffer size for server commands
pub const DEFAULT_COMMAND_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address
    pub addr: String,
    /// Messages kept per room
    pub history_capacity: usize,
    /// Outbound buffer per connection
    pub client_buffer: usize,
    /// Inbound command buffer of the hub actor
    pub command_buffer: usize,
    /// Shared secret for token verification; `authenticate` is disabled without it
    pub jwt_secret: Option<String>,
    /// Reject plain `join` and accept only verified tokens
    pub require_auth: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            client_buffer: DEFAULT_CLIENT_BUFFER,
            command_buffer: DEFAULT_COMMAND_BUFFER,
            jwt_secret: None,
            require_auth: false,
        }
    }
}

impl Config {
    /// Build a config from `CHAT_*` and `JWT_SECRET` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            addr: lookup("CHAT_ADDR").unwrap_or(defaults.addr),
            history_capacity: parse(&lookup, "CHAT_HISTORY_CAPACITY")?
                .unwrap_or(defaults.history_capacity),
            client_buffer: parse(&lookup, "CHAT_CLIENT_BUFFER")?.unwrap_or(defaults.client_buffer),
            command_buffer: parse(&lookup, "CHAT_COMMAND_BUFFER")?
                .unwrap_or(defaults.command_buffer),
            jwt_secret: lookup("JWT_SECRET").filter(|s| !s.is_empty()),
            require_auth: parse(&lookup, "CHAT_REQUIRE_AUTH")?.unwrap_or(defaults.require_auth),
        })
    }
}

fn parse<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}
