//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};
use tokio::task::JoinHandle;

use crate::{Error, Result};

/// Decoded mono PCM
#[derive(Debug, Clone, PartialEq)]
pub struct Pcm {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Plays audio to the default output device
pub struct AudioPlayback {
    device: Device,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio playback initialized"
        );

        Ok(Self { device })
    }

    /// Play MP3 bytes, blocking until playback ends
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3_blocking(&self, mp3_data: &[u8]) -> Result<()> {
        let pcm = decode_mp3(mp3_data)?;
        self.play_blocking(&pcm)
    }

    /// Play mono samples, blocking until playback ends
    ///
    /// # Errors
    ///
    /// Returns error if the device has no usable configuration
    pub fn play_blocking(&self, pcm: &Pcm) -> Result<()> {
        if pcm.samples.is_empty() {
            return Ok(());
        }
        if pcm.sample_rate == 0 {
            return Err(Error::Audio("unknown sample rate".to_string()));
        }

        let config = self.output_config(pcm.sample_rate)?;
        let channels = usize::from(config.channels);

        let samples = Arc::new(pcm.samples.clone());
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let samples_cb = Arc::clone(&samples);
        let position_cb = Arc::clone(&position);
        let finished_cb = Arc::clone(&finished);

        let stream = self
            .device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position_cb.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let sample = samples_cb.get(pos).copied().unwrap_or_else(|| {
                            finished_cb.store(true, Ordering::Relaxed);
                            0.0
                        });
                        frame.fill(sample);
                        if pos < samples_cb.len() {
                            pos += 1;
                        }
                    }
                    position_cb.store(pos, Ordering::Relaxed);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        // Poll for completion with a timeout slightly past the clip length
        let duration_ms = (samples.len() as u64 * 1000) / u64::from(pcm.sample_rate);
        let timeout = Duration::from_millis(duration_ms + 500);
        let start = Instant::now();

        while !finished.load(Ordering::Relaxed) {
            if start.elapsed() > timeout {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        // Let the device drain its buffer
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = samples.len(), "playback complete");

        Ok(())
    }

    fn output_config(&self, sample_rate: u32) -> Result<StreamConfig> {
        let rate = SampleRate(sample_rate);
        let supports = |channels: u16| {
            self.device.supported_output_configs().ok()?.find(|c| {
                c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
            })
        };

        let supported = supports(1)
            .or_else(|| supports(2))
            .ok_or_else(|| Error::Audio(format!("no output config for {sample_rate} Hz")))?;

        Ok(supported.with_sample_rate(rate).config())
    }
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if the data is not decodable MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<Pcm> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = u32::try_from(frame.sample_rate).unwrap_or_default();

                if frame.channels == 2 {
                    // Stereo: average channels
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() && !mp3_data.is_empty() {
        return Err(Error::Audio("no MP3 frames found".to_string()));
    }

    Ok(Pcm {
        samples,
        sample_rate,
    })
}

/// Handle to a playback started by an [`AudioSink`]
///
/// Dropping it detaches the playback.
#[derive(Debug, Default)]
pub struct Playback(Option<JoinHandle<()>>);

impl Playback {
    /// A playback that never started
    #[must_use]
    pub const fn none() -> Self {
        Self(None)
    }

    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.0.is_some()
    }

    /// Wait for the playback to end
    pub async fn finished(self) {
        if let Some(handle) = self.0 {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "playback task failed");
            }
        }
    }
}

/// Destination for synthesized speech
pub trait AudioSink: Send + Sync {
    /// Start playing `audio` without waiting for it; empty audio is ignored
    fn play(&self, audio: Vec<u8>) -> Playback;
}

/// Plays MP3 audio on the default output device
///
/// Playback runs on the blocking pool; failures are logged, not returned.
/// Overlapping calls play concurrently.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpeakerSink;

impl AudioSink for SpeakerSink {
    fn play(&self, audio: Vec<u8>) -> Playback {
        if audio.is_empty() {
            return Playback::none();
        }

        let handle = tokio::task::spawn_blocking(move || {
            let result = AudioPlayback::new().and_then(|p| p.play_mp3_blocking(&audio));
            if let Err(e) = result {
                tracing::warn!(error = %e, "audio playback failed");
            }
        });

        Playback(Some(handle))
    }
}

/// Discards audio
#[derive(Debug, Default, Clone, Copy)]
pub struct MuteSink;

impl AudioSink for MuteSink {
    fn play(&self, audio: Vec<u8>) -> Playback {
        tracing::trace!(bytes = audio.len(), "audio muted");
        Playback::none()
    }
}
