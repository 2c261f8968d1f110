//! Turn orchestration
//!
//! A turn is: refresh credentials, send the utterance, show the reply,
//! synthesize it, start playback. Every step completes before the next one
//! starts. A failure at any step ends the turn with one error line, and the
//! input controls are restored whichever way the turn ends.
//!
//! ```text
//! Idle ──submit──▶ Sending ──refresh ok──▶ AwaitingUnderstanding
//!   ▲                 │                          │ reply shown
//!   │                 ▼                          ▼
//!   └───────────── Failed ◀──────────────── AwaitingSynthesis ──playback started──▶ Idle
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::aws::{CognitoCredentialProvider, CredentialProvider};
use crate::config::Config;
use crate::db::{self, KvStore};
use crate::lex::{ConversationClient, LexClient};
use crate::session::{SessionStore, SessionToken};
use crate::transcript::{Role, Transcript};
use crate::voice::{AudioSink, Playback, PollyClient, TextToSpeech};
use crate::{Error, Result};

/// Error line text when a failure carries no message
pub const FALLBACK_ERROR: &str = "Fallo Lex/Polly";

/// Where the orchestrator is within a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Sending,
    AwaitingUnderstanding,
    AwaitingSynthesis,
    Failed,
}

/// Input surface state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub input_enabled: bool,
    pub send_enabled: bool,
    /// Input has focus and is empty, ready for the next line
    pub input_ready: bool,
}

impl Controls {
    const READY: Self = Self {
        input_enabled: true,
        send_enabled: true,
        input_ready: true,
    };

    const LOCKED: Self = Self {
        input_enabled: false,
        send_enabled: false,
        input_ready: false,
    };

    /// Whether a new line can be submitted
    #[must_use]
    pub const fn accepts_input(&self) -> bool {
        self.input_enabled && self.send_enabled
    }
}

/// Result of [`Assistant::submit`]
#[derive(Debug)]
pub enum TurnOutcome {
    /// Input was empty after trimming; nothing happened
    Ignored,
    /// Another turn is in flight; controls are disabled
    Busy,
    /// The reply was shown and (if voice is on) playback started
    Completed { reply: String, playback: Playback },
    /// A step failed; the error line was appended
    Failed { message: String },
}

#[derive(Debug)]
struct UiState {
    turn: TurnState,
    controls: Controls,
}

/// Restores the controls when a turn ends, however it ends
struct TurnGuard<'a> {
    ui: &'a Mutex<UiState>,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let mut ui = self.ui.lock().unwrap_or_else(PoisonError::into_inner);
        ui.turn = TurnState::Idle;
        ui.controls = Controls::READY;
    }
}

/// Voice output pieces
struct Voice {
    tts: TextToSpeech,
    sink: Arc<dyn AudioSink>,
}

/// Conversation orchestrator
pub struct Assistant {
    credentials: Arc<dyn CredentialProvider>,
    conversation: Arc<dyn ConversationClient>,
    voice: Option<Voice>,
    sessions: SessionStore,
    session: Mutex<SessionToken>,
    transcript: Transcript,
    ui: Mutex<UiState>,
}

impl Assistant {
    /// Create an orchestrator without voice output
    ///
    /// Loads (or creates) the session token and announces it.
    ///
    /// # Errors
    ///
    /// Returns error if the session store cannot be read or written
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        conversation: Arc<dyn ConversationClient>,
        sessions: SessionStore,
        transcript: Transcript,
    ) -> Result<Self> {
        let session = sessions.get_or_create()?;
        transcript.append(Role::System, format!("Session ID: {session}"));

        Ok(Self {
            credentials,
            conversation,
            voice: None,
            sessions,
            session: Mutex::new(session),
            transcript,
            ui: Mutex::new(UiState {
                turn: TurnState::Idle,
                controls: Controls::READY,
            }),
        })
    }

    /// Speak replies with `tts`, playing the audio on `sink`
    #[must_use]
    pub fn with_voice(mut self, tts: TextToSpeech, sink: Arc<dyn AudioSink>) -> Self {
        self.voice = Some(Voice { tts, sink });
        self
    }

    /// Wire the remote clients described by `config`
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or a client cannot be built
    pub fn from_config(
        config: &Config,
        transcript: Transcript,
        sink: Arc<dyn AudioSink>,
    ) -> Result<Self> {
        let pool = db::init(config.db_path())?;
        let sessions = SessionStore::new(KvStore::new(pool));

        let credentials: Arc<dyn CredentialProvider> = Arc::new(CognitoCredentialProvider::new(
            &config.endpoints.cognito,
            &config.aws.identity_pool_id,
        )?);
        let conversation = Arc::new(LexClient::new(
            &config.endpoints.lex,
            &config.aws.region,
            config.bot.clone(),
            Arc::clone(&credentials),
        ));

        let assistant = Self::new(Arc::clone(&credentials), conversation, sessions, transcript)?;
        if !config.voice.enabled {
            tracing::info!("voice output disabled");
            return Ok(assistant);
        }

        let polly = Arc::new(PollyClient::new(
            &config.endpoints.polly,
            &config.aws.region,
            credentials,
        )?);
        let tts = TextToSpeech::new(polly, &config.voice.voice_id)?;
        Ok(assistant.with_voice(tts, sink))
    }

    /// Run one turn for `text`
    pub async fn submit(&self, text: &str) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() {
            return TurnOutcome::Ignored;
        }

        {
            let mut ui = self.lock_ui();
            if ui.turn != TurnState::Idle || !ui.controls.accepts_input() {
                return TurnOutcome::Busy;
            }
            ui.turn = TurnState::Sending;
            ui.controls = Controls::LOCKED;
        }
        let _guard = TurnGuard { ui: &self.ui };

        self.transcript.append(Role::User, text);

        match self.run_turn(text).await {
            Ok((reply, playback)) => TurnOutcome::Completed { reply, playback },
            Err(e) => {
                self.set_turn(TurnState::Failed);
                tracing::error!(error = %e, "turn failed");

                let message = error_message(&e);
                self.transcript.append(Role::Error, message.clone());
                TurnOutcome::Failed { message }
            }
        }
    }

    async fn run_turn(&self, text: &str) -> Result<(String, Playback)> {
        self.credentials.refresh().await?;

        self.set_turn(TurnState::AwaitingUnderstanding);
        let session = self.session();
        let reply = self.conversation.send(text, &session).await?;
        self.transcript.append(Role::Bot, reply.clone());

        let Some(voice) = &self.voice else {
            return Ok((reply, Playback::none()));
        };

        self.set_turn(TurnState::AwaitingSynthesis);
        let audio = voice.tts.synthesize(&reply).await?;
        let playback = voice.sink.play(audio);

        Ok((reply, playback))
    }

    /// Start a new conversation session
    ///
    /// Rejected while a turn is in flight so that a turn never straddles
    /// two sessions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TurnInFlight`] during a turn, or a storage error
    pub fn reset_session(&self) -> Result<SessionToken> {
        // Held for the whole reset so a turn cannot start halfway through
        let ui = self.lock_ui();
        if ui.turn != TurnState::Idle {
            return Err(Error::TurnInFlight);
        }

        if self.credentials.supports_identity_reset() {
            self.credentials.clear_cached_identity();
        }

        let token = self.sessions.reset()?;
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        drop(ui);

        self.transcript
            .append(Role::System, format!("🔄 Nueva sesión: {token}"));
        Ok(token)
    }

    /// Session token attached to the next turn
    #[must_use]
    pub fn session(&self) -> SessionToken {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn state(&self) -> TurnState {
        self.lock_ui().turn
    }

    #[must_use]
    pub fn controls(&self) -> Controls {
        self.lock_ui().controls
    }

    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub const fn voice_enabled(&self) -> bool {
        self.voice.is_some()
    }

    fn set_turn(&self, turn: TurnState) {
        tracing::trace!(?turn, "turn state");
        self.lock_ui().turn = turn;
    }

    fn lock_ui(&self) -> MutexGuard<'_, UiState> {
        self.ui.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Message shown on the error line for `e`
fn error_message(e: &Error) -> String {
    let detail = match e {
        Error::Config(m)
        | Error::Credential(m)
        | Error::Understanding(m)
        | Error::Synthesis(m)
        | Error::Audio(m)
        | Error::Database(m) => Some(m.trim()),
        _ => None,
    };

    match detail {
        Some("") => FALLBACK_ERROR.to_string(),
        _ => e.to_string(),
    }
}
