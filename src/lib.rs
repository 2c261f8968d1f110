//! lexchat - Terminal voice chat client for Lex V2 bots
//!
//! This library provides the pieces of a single-user conversation:
//! - Guest credentials from a Cognito identity pool
//! - Signed text turns against a Lex V2 bot alias
//! - Spoken replies through Polly with neural to standard fallback
//! - A persisted conversation session token
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Console                          │
//! │        stdin lines  │  /reset  │  transcript         │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Assistant                         │
//! │   Credentials  │  Lex turn  │  TTS  │  Audio sink    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Remote services                      │
//! │     Cognito Identity  │  Lex V2 Runtime  │  Polly    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod assistant;
pub mod aws;
pub mod config;
pub mod console;
pub mod db;
pub mod error;
pub mod lex;
pub mod session;
pub mod setup;
pub mod transcript;
pub mod voice;

pub use assistant::{Assistant, Controls, TurnOutcome, TurnState};
pub use config::Config;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use session::{SessionStore, SessionToken};
pub use transcript::{Role, Transcript, TranscriptEntry};
