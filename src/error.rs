//! Error types for lexchat

use thiserror::Error;

/// Result type alias for lexchat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a conversation
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Identity pool exchange failed
    #[error("credential error: {0}")]
    Credential(String),

    /// Conversational (understanding) service call failed
    #[error("understanding service error: {0}")]
    Understanding(String),

    /// Both synthesis engine tiers failed
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// A turn is still in flight
    #[error("a turn is already in progress")]
    TurnInFlight,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
