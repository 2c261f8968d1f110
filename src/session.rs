//! Conversation session token persistence
//!
//! The conversational service correlates turns by an opaque session id.
//! One id is kept per data directory and reused until the user resets it.

use std::fmt;

use uuid::Uuid;

use crate::Result;
use crate::db::KvStore;

/// Storage key holding the active session token
pub const SESSION_KEY: &str = "lexSessionId";

/// Opaque, globally unique session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh random token
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Token as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Owns the single persisted session token
#[derive(Clone)]
pub struct SessionStore {
    kv: KvStore,
}

impl SessionStore {
    #[must_use]
    pub const fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Read the persisted token without creating one
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read
    pub fn current(&self) -> Result<Option<SessionToken>> {
        Ok(self.kv.get(SESSION_KEY)?.map(SessionToken::from))
    }

    /// Return the persisted token, creating and persisting one on first use
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read or written
    pub fn get_or_create(&self) -> Result<SessionToken> {
        if let Some(token) = self.current()? {
            return Ok(token);
        }

        let token = SessionToken::generate();
        self.kv.set(SESSION_KEY, token.as_str())?;
        tracing::info!(session = %token, "created session");
        Ok(token)
    }

    /// Discard the persisted token and persist a new one
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be written
    pub fn reset(&self) -> Result<SessionToken> {
        let previous = self.current()?;
        self.kv.remove(SESSION_KEY)?;

        let mut token = SessionToken::generate();
        while previous.as_ref() == Some(&token) {
            token = SessionToken::generate();
        }

        self.kv.set(SESSION_KEY, token.as_str())?;
        tracing::info!(session = %token, "session reset");
        Ok(token)
    }
}
