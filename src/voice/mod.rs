//! Voice output
//!
//! Reply text is synthesized remotely ([`PollyClient`] behind
//! [`TextToSpeech`]) and played on the local output device.

mod playback;
mod polly;
mod tts;

pub use playback::{AudioPlayback, AudioSink, MuteSink, Pcm, Playback, SpeakerSink, decode_mp3};
pub use polly::PollyClient;
pub use tts::{Engine, OutputFormat, SpeechRequest, SpeechSynthesizer, TextToSpeech};
