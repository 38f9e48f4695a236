//! Provider interfaces for synthesis, playback, and listening.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

/// Error type for speech operations.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),
    #[error("playback failed: {0}")]
    PlaybackFailed(String),
    #[error("listen failed: {0}")]
    ListenFailed(String),
    #[error("dispatcher is closed")]
    Closed,
}

/// Synthesized audio ready for playback. The payload format is an
/// agreement between the synthesizer and the player.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub data: Bytes,
}

/// Interface for a text-to-speech synthesizer.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesizes the text into a playable clip.
    async fn synthesize(&self, text: &str) -> Result<AudioClip, SpeechError>;
}

/// Interface for audio output.
#[async_trait]
pub trait Player: Send + Sync {
    /// Plays the clip, resolving once playback finishes.
    async fn play(&self, clip: &AudioClip) -> Result<(), SpeechError>;

    /// Halts in-flight playback immediately.
    fn stop(&self);
}

/// One round of listening.
///
/// The three no-text outcomes are logged distinctly by callers but treated
/// identically: no text means no action, never an error path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heard {
    /// Recognized text.
    Text(String),
    /// Nothing was said within the timeout.
    Silence,
    /// Speech was detected but could not be transcribed.
    Unintelligible,
}

/// Interface for speech capture and transcription.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Listens for one utterance. `timeout` bounds the wait for speech to
    /// begin and `phrase_limit` bounds the utterance itself, so no single
    /// call can hang the voice loop.
    async fn listen(&self, timeout: Duration, phrase_limit: Duration)
    -> Result<Heard, SpeechError>;
}
