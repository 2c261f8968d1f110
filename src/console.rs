//! Interactive terminal surface
//!
//! Lines from stdin are either commands (`/reset`, `/session`, `/help`,
//! `/quit`) or utterances. A leading `//` sends the rest, one slash kept,
//! as an utterance. A turn runs on its own task so input keeps being
//! read; lines arriving mid-turn see the controls disabled.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use crate::assistant::{Assistant, TurnOutcome};
use crate::{Error, Result};

const HELP: &str = "Type a message and press Enter. /reset starts a new session, /session shows it, /quit exits. Start with // to send a message beginning with /.";

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Text for the bot
    Utterance(String),
    Reset,
    Session,
    Help,
    Quit,
    /// Unrecognized slash command
    Unknown(String),
}

impl Input {
    /// Parse a raw line
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if let Some(text) = trimmed.strip_prefix("//") {
            return Self::Utterance(format!("/{text}"));
        }
        let Some(command) = trimmed.strip_prefix('/') else {
            return Self::Utterance(trimmed.to_string());
        };

        match command.to_ascii_lowercase().as_str() {
            "reset" | "new" => Self::Reset,
            "session" => Self::Session,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            _ => Self::Unknown(trimmed.to_string()),
        }
    }
}

/// Run the chat loop until `/quit` or end of input
///
/// # Errors
///
/// Returns error if stdin cannot be read or the session store fails
pub async fn run(assistant: Arc<Assistant>) -> Result<()> {
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut turn: Option<JoinHandle<()>> = None;

    while let Some(line) = lines.next_line().await? {
        match Input::parse(&line) {
            Input::Quit => break,
            Input::Help => println!("{HELP}"),
            Input::Session => println!("Session ID: {}", assistant.session()),
            Input::Unknown(command) => {
                println!("unknown command {command} (try /help, or /{command} to send it)");
            }
            Input::Reset => match assistant.reset_session() {
                Ok(_) => {}
                Err(Error::TurnInFlight) => {
                    println!("wait for the current reply before starting a new session");
                }
                Err(e) => return Err(e),
            },
            Input::Utterance(text) => {
                if text.is_empty() {
                    continue;
                }
                if !assistant.controls().accepts_input() {
                    println!("still waiting for the last reply");
                    continue;
                }
                turn = Some(spawn_turn(Arc::clone(&assistant), text));
            }
        }
    }

    // Let the last reply finish speaking before exiting
    if let Some(handle) = turn {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "turn task failed");
        }
    }

    Ok(())
}

fn spawn_turn(assistant: Arc<Assistant>, text: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        match assistant.submit(&text).await {
            TurnOutcome::Completed { playback, .. } => playback.finished().await,
            TurnOutcome::Busy => println!("still waiting for the last reply"),
            TurnOutcome::Ignored | TurnOutcome::Failed { .. } => {}
        }
    })
}
