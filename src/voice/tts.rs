//! Text-to-speech (TTS) with engine fallback

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::{Error, Result};

/// Synthesis quality tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Higher quality; not available for every voice and region
    Neural,
    /// Available everywhere
    Standard,
}

impl Engine {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Neural => "neural",
            Self::Standard => "standard",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded audio format of synthesized speech
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mp3,
}

/// One synthesis call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice_id: String,
    pub engine: Engine,
    pub output_format: OutputFormat,
}

/// Remote speech synthesis backend
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `request`, returning encoded audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if the backend rejects the request or is unreachable
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>>;
}

/// Synthesizes speech from text
///
/// Tries the neural engine first and falls back to the standard engine
/// once. There is no delay between the attempts and no state is carried
/// from one call to the next.
pub struct TextToSpeech {
    backend: Arc<dyn SpeechSynthesizer>,
    voice_id: String,
}

impl TextToSpeech {
    /// Create a TTS instance speaking with `voice_id`
    ///
    /// # Errors
    ///
    /// Returns error if the voice id is empty
    pub fn new(backend: Arc<dyn SpeechSynthesizer>, voice_id: impl Into<String>) -> Result<Self> {
        let voice_id = voice_id.into();
        if voice_id.is_empty() {
            return Err(Error::Config("voice id required for TTS".to_string()));
        }

        Ok(Self { backend, voice_id })
    }

    #[must_use]
    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    /// Synthesize text to speech
    ///
    /// # Returns
    ///
    /// Audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Synthesis`] if both engine tiers fail
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let mut request = SpeechRequest {
            text: text.to_string(),
            voice_id: self.voice_id.clone(),
            engine: Engine::Neural,
            output_format: OutputFormat::Mp3,
        };

        let neural_err = match self.backend.synthesize(&request).await {
            Ok(audio) => return Ok(audio),
            Err(e) => e,
        };

        tracing::warn!(
            voice = %self.voice_id,
            error = %neural_err,
            "neural engine unavailable, using standard"
        );

        request.engine = Engine::Standard;
        self.backend.synthesize(&request).await.map_err(|e| {
            Error::Synthesis(format!("neural: {neural_err}; standard: {e}"))
        })
    }
}
