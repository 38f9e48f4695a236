//! lobbyd configuration.
//!
//! Every field has a default, so an empty or missing config file produces a
//! working setup; the YAML file overrides per section and CLI flags
//! override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use lobby_engine::{EngineConfig, Phrases};
use lobby_enroll::EnrollConfig;
use lobby_identity::ResolverConfig;
use lobby_presence::PresenceConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Root of the directory-per-person identity store.
    pub data_dir: PathBuf,
    pub resolver: ResolverSection,
    pub presence: PresenceSection,
    pub enroll: EnrollSection,
    pub speech: SpeechSection,
    pub engine: EngineSection,
    pub phrases: Phrases,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("lobby-data"),
            resolver: ResolverSection::default(),
            presence: PresenceSection::default(),
            enroll: EnrollSection::default(),
            speech: SpeechSection::default(),
            engine: EngineSection::default(),
            phrases: Phrases::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSection {
    pub tolerance: f32,
    pub min_confidence: f32,
    pub margin: f32,
    pub strict_existence: bool,
}

impl Default for ResolverSection {
    fn default() -> Self {
        let cfg = ResolverConfig::default();
        Self {
            tolerance: cfg.tolerance,
            min_confidence: cfg.min_confidence,
            margin: cfg.margin,
            strict_existence: cfg.strict_existence,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceSection {
    pub greet_threshold: f32,
    /// `null` disables the low-confidence override.
    pub recheck_threshold: Option<f32>,
    pub face_change_threshold: f32,
    pub unknown_renotify_secs: u64,
    pub idle_reset_secs: u64,
}

impl Default for PresenceSection {
    fn default() -> Self {
        let cfg = PresenceConfig::default();
        Self {
            greet_threshold: cfg.greet_threshold,
            recheck_threshold: cfg.recheck_threshold,
            face_change_threshold: cfg.face_change_threshold,
            unknown_renotify_secs: cfg.unknown_renotify.as_secs(),
            idle_reset_secs: cfg.idle_reset.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollSection {
    pub max_samples: u32,
    pub min_samples: u32,
    pub capture_cooldown_ms: u64,
    pub timeout_secs: u64,
}

impl Default for EnrollSection {
    fn default() -> Self {
        let cfg = EnrollConfig::default();
        Self {
            max_samples: cfg.max_samples,
            min_samples: cfg.min_samples,
            capture_cooldown_ms: cfg.capture_cooldown.as_millis() as u64,
            timeout_secs: cfg.timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSection {
    pub cache_capacity: usize,
    pub listen_timeout_secs: u64,
    pub phrase_limit_secs: u64,
}

impl Default for SpeechSection {
    fn default() -> Self {
        Self {
            cache_capacity: 40,
            listen_timeout_secs: 5,
            phrase_limit_secs: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub min_face_separation_px: f32,
    pub idle_checkin_secs: u64,
    pub goodbye_grace_secs: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            min_face_separation_px: 100.0,
            idle_checkin_secs: 300,
            goodbye_grace_secs: 5,
        }
    }
}

impl LobbyConfig {
    /// Loads the config file. No path or a missing file means defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            info!(config = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            resolver: ResolverConfig {
                tolerance: self.resolver.tolerance,
                min_confidence: self.resolver.min_confidence,
                margin: self.resolver.margin,
                strict_existence: self.resolver.strict_existence,
            },
            presence: PresenceConfig {
                greet_threshold: self.presence.greet_threshold,
                recheck_threshold: self.presence.recheck_threshold,
                face_change_threshold: self.presence.face_change_threshold,
                unknown_renotify: Duration::from_secs(self.presence.unknown_renotify_secs),
                idle_reset: Duration::from_secs(self.presence.idle_reset_secs),
            },
            enroll: EnrollConfig {
                max_samples: self.enroll.max_samples,
                min_samples: self.enroll.min_samples,
                capture_cooldown: Duration::from_millis(self.enroll.capture_cooldown_ms),
                timeout: Duration::from_secs(self.enroll.timeout_secs),
            },
            min_face_separation_px: self.engine.min_face_separation_px,
            listen_timeout: Duration::from_secs(self.speech.listen_timeout_secs),
            phrase_limit: Duration::from_secs(self.speech.phrase_limit_secs),
            idle_checkin: Duration::from_secs(self.engine.idle_checkin_secs),
            goodbye_grace: Duration::from_secs(self.engine.goodbye_grace_secs),
            phrases: self.phrases.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_component_configs() {
        let cfg = LobbyConfig::default().engine_config();
        assert_eq!(cfg.resolver.tolerance, 0.50);
        assert_eq!(cfg.presence.recheck_threshold, Some(0.60));
        assert_eq!(cfg.enroll.max_samples, 5);
        assert_eq!(cfg.enroll.capture_cooldown, Duration::from_millis(1200));
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let cfg: LobbyConfig = serde_yaml::from_str(
            "data_dir: /var/lib/lobby\nresolver:\n  tolerance: 0.42\npresence:\n  recheck_threshold: null\n",
        )
        .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/lobby"));
        assert_eq!(cfg.resolver.tolerance, 0.42);
        assert_eq!(cfg.resolver.margin, 0.06, "unnamed fields keep defaults");
        assert_eq!(cfg.presence.recheck_threshold, None, "null disables the override");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = LobbyConfig::load(Some(Path::new("/nonexistent/lobby.yaml"))).unwrap();
        assert_eq!(cfg.enroll.min_samples, 3);
    }

    #[test]
    fn phrases_are_configurable() {
        let cfg: LobbyConfig =
            serde_yaml::from_str("phrases:\n  greeting: \"Hi {name}!\"\n").unwrap();
        assert_eq!(cfg.phrases.greeting_for("Ada"), "Hi Ada!");
        assert!(cfg.phrases.goodbye.contains("Goodbye"), "other phrases keep defaults");
    }
}
