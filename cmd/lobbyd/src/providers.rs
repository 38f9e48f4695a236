//! Bundled demo providers: a scripted camera, a console microphone, and a
//! logging speaker. Real camera and speech backends implement the same
//! traits outside this binary.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use lobby_engine::{FaceSensor, FrameObservation, SensorError};
use lobby_faces::Detection;
use lobby_speech::{AudioClip, Heard, Listener, Player, SpeechError, Synthesizer};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, info};

/// One line of a sensor script.
#[derive(Debug, Deserialize)]
struct ScriptFrame {
    /// Wait before delivering this frame.
    #[serde(default = "default_delay_ms")]
    delay_ms: u64,
    #[serde(default)]
    detections: Vec<Detection>,
    /// Optional file holding the frame's image bytes.
    #[serde(default)]
    image: Option<PathBuf>,
}

fn default_delay_ms() -> u64 {
    200
}

/// Replays frames from a JSONL script, then closes. Blank lines and lines
/// starting with `#` are skipped.
pub struct ScriptedSensor {
    frames: VecDeque<ScriptFrame>,
}

impl ScriptedSensor {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        let mut frames = VecDeque::new();
        for (idx, line) in data.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let frame: ScriptFrame = serde_json::from_str(line)
                .with_context(|| format!("{}:{}", path.display(), idx + 1))?;
            frames.push_back(frame);
        }
        info!(
            frames = frames.len(),
            script = %path.display(),
            "sensor script loaded"
        );
        Ok(Self { frames })
    }
}

#[async_trait]
impl FaceSensor for ScriptedSensor {
    async fn observe(&mut self) -> Result<FrameObservation, SensorError> {
        let Some(frame) = self.frames.pop_front() else {
            return Err(SensorError::Closed);
        };
        tokio::time::sleep(Duration::from_millis(frame.delay_ms)).await;
        let image = match &frame.image {
            Some(path) => Bytes::from(
                std::fs::read(path).map_err(|err| SensorError::Failed(err.to_string()))?,
            ),
            None => Bytes::new(),
        };
        Ok(FrameObservation {
            image,
            detections: frame.detections,
        })
    }
}

/// Camera placeholder when no script is given: empty frames at a fixed
/// pace, so the voice side still runs.
pub struct IdleSensor {
    interval: Duration,
}

impl IdleSensor {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl FaceSensor for IdleSensor {
    async fn observe(&mut self) -> Result<FrameObservation, SensorError> {
        tokio::time::sleep(self.interval).await;
        Ok(FrameObservation {
            image: Bytes::new(),
            detections: Vec::new(),
        })
    }
}

/// Reads utterances from stdin, one line each.
pub struct ConsoleListener {
    lines: tokio::sync::Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsoleListener {
    pub fn new() -> Self {
        Self {
            lines: tokio::sync::Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

#[async_trait]
impl Listener for ConsoleListener {
    async fn listen(
        &self,
        timeout: Duration,
        _phrase_limit: Duration,
    ) -> Result<Heard, SpeechError> {
        let mut lines = self.lines.lock().await;
        match tokio::time::timeout(timeout, lines.next_line()).await {
            Err(_) => Ok(Heard::Silence),
            Ok(Ok(Some(line))) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    Ok(Heard::Silence)
                } else {
                    Ok(Heard::Text(line))
                }
            }
            Ok(Ok(None)) => {
                // Stdin closed; stay quiet without spinning.
                tokio::time::sleep(timeout).await;
                Ok(Heard::Silence)
            }
            Ok(Err(err)) => Err(SpeechError::ListenFailed(err.to_string())),
        }
    }
}

/// Synthesizer that carries the text through as the clip payload.
pub struct LogSynthesizer;

#[async_trait]
impl Synthesizer for LogSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioClip, SpeechError> {
        debug!(text = %text, "synthesizing");
        Ok(AudioClip {
            data: Bytes::from(text.as_bytes().to_vec()),
        })
    }
}

/// Player that prints the phrase and paces itself like real playback, so
/// queueing and interruption behave as they would with audio.
pub struct LogPlayer;

#[async_trait]
impl Player for LogPlayer {
    async fn play(&self, clip: &AudioClip) -> Result<(), SpeechError> {
        let text = String::from_utf8_lossy(&clip.data);
        println!("[speaking] {text}");
        let pace = Duration::from_millis((text.len() as u64 * 30).clamp(300, 3000));
        tokio::time::sleep(pace).await;
        Ok(())
    }

    fn stop(&self) {}
}
