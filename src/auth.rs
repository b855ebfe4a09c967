//! Authentication collaborator
//!
//! The server treats authentication as opaque: an [`Authenticator`] turns
//! the credentials presented at connect time into an optional identity, or
//! rejects the connection.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::AuthError;
use crate::types::UserIdentity;

/// Credentials presented during the WebSocket handshake
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: Option<String>,
}

impl Credentials {
    /// Extract `token` from a request query string (`a=b&token=xyz`)
    pub fn from_query(query: Option<&str>) -> Self {
        let token = query.and_then(|q| {
            q.split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == "token")
                .map(|(_, value)| value.to_string())
                .filter(|value| !value.is_empty())
        });
        Self { token }
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `Ok(None)` admits an anonymous connection
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<UserIdentity>, AuthError>;
}

/// Admits every connection as anonymous
#[derive(Debug, Default)]
pub struct AnonymousAuthenticator;

#[async_trait]
impl Authenticator for AnonymousAuthenticator {
    async fn authenticate(
        &self,
        _credentials: &Credentials,
    ) -> Result<Option<UserIdentity>, AuthError> {
        Ok(None)
    }
}

/// Static token table: token -> user name
#[derive(Debug, Default)]
pub struct TokenAuthenticator {
    tokens: HashMap<String, UserIdentity>,
    allow_anonymous: bool,
}

impl TokenAuthenticator {
    pub fn new(tokens: HashMap<String, String>, allow_anonymous: bool) -> Self {
        Self {
            tokens: tokens
                .into_iter()
                .map(|(token, user)| (token, UserIdentity(user)))
                .collect(),
            allow_anonymous,
        }
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<UserIdentity>, AuthError> {
        match &credentials.token {
            Some(token) => self
                .tokens
                .get(token)
                .cloned()
                .map(Some)
                .ok_or(AuthError::InvalidToken),
            None if self.allow_anonymous => Ok(None),
            None => Err(AuthError::MissingCredentials),
        }
    }
}
