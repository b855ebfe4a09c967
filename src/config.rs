//! Server configuration
//!
//! Read from `ROOM_SERVER_*` environment variables. Unparseable values
//! fall back to the default with a warning.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tracing::warn;

use crate::auth::{AnonymousAuthenticator, Authenticator, TokenAuthenticator};
use crate::types::RoomId;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Default number of messages kept per room
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Default per-connection outbound queue size
pub const DEFAULT_OUTBOUND_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: String,
    /// Deliver a message back to the connection that sent it
    pub echo_to_sender: bool,
    /// token -> user name; `None` admits everyone anonymously
    pub auth_tokens: Option<HashMap<String, String>>,
    pub allow_anonymous: bool,
    /// Per-room history size, 0 disables history
    pub history_limit: usize,
    pub max_room_id_len: usize,
    /// Frames queued per connection before it counts as a failed recipient
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            echo_to_sender: false,
            auth_tokens: None,
            allow_anonymous: true,
            history_limit: DEFAULT_HISTORY_LIMIT,
            max_room_id_len: RoomId::DEFAULT_MAX_LEN,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            addr: lookup("ROOM_SERVER_ADDR").unwrap_or(defaults.addr),
            echo_to_sender: parse_or(
                &lookup,
                "ROOM_SERVER_ECHO_TO_SENDER",
                defaults.echo_to_sender,
            ),
            auth_tokens: lookup("ROOM_SERVER_AUTH_TOKENS").map(|raw| parse_tokens(&raw)),
            allow_anonymous: parse_or(
                &lookup,
                "ROOM_SERVER_ALLOW_ANONYMOUS",
                defaults.allow_anonymous,
            ),
            history_limit: parse_or(&lookup, "ROOM_SERVER_HISTORY_LIMIT", defaults.history_limit),
            max_room_id_len: parse_or(
                &lookup,
                "ROOM_SERVER_MAX_ROOM_ID_LEN",
                defaults.max_room_id_len,
            ),
            // tokio rejects zero-capacity channels
            outbound_buffer: parse_or(
                &lookup,
                "ROOM_SERVER_OUTBOUND_BUFFER",
                defaults.outbound_buffer,
            )
            .max(1),
        }
    }

    /// Authenticator matching this configuration
    pub fn authenticator(&self) -> Arc<dyn Authenticator> {
        match &self.auth_tokens {
            Some(tokens) => Arc::new(TokenAuthenticator::new(
                tokens.clone(),
                self.allow_anonymous,
            )),
            None => Arc::new(AnonymousAuthenticator),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid value {:?} for {}", raw, key);
            default
        }),
        None => default,
    }
}

/// Parse `token=user,token2=user2`
fn parse_tokens(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|entry| {
            let (token, user) = entry.trim().split_once('=')?;
            if token.is_empty() || user.is_empty() {
                warn!("Skipping malformed auth token entry");
                return None;
            }
            Some((token.to_string(), user.to_string()))
        })
        .collect()
}
