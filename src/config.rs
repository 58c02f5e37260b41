//! Configuration management for vidbrief.
//!
//! Loads config from YAML files in standard locations. Every section has
//! full defaults so the binary runs with no config file at all.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, VidbriefError};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Summarization endpoint. POST `{query, tts}` JSON.
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint:
                "https://gamma-youtube-summarizer-734911192367.us-west1.run.app/api/summarize"
                    .into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Identity token; falls back to the `token_env` environment variable.
    pub token: Option<String>,
    pub token_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: None,
            token_env: "VIDBRIEF_USER_TOKEN".into(),
        }
    }
}

impl AuthConfig {
    /// The summarize entry point is gated on a token being present.
    /// No identity logic happens here beyond presence.
    pub fn resolve_token(&self) -> Result<String> {
        if let Some(token) = self.token.as_deref() {
            if !token.is_empty() {
                return Ok(token.to_string());
            }
        }
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| VidbriefError::MissingToken {
                env_var: self.token_env.clone(),
            })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Snapshot file. Defaults to ~/.vidbrief/history.json.
    pub path: Option<PathBuf>,
}

impl HistoryConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".vidbrief").join("history.json"))
                .unwrap_or_else(|| PathBuf::from("vidbrief-history.json"))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechOutputConfig {
    pub enabled: bool,
    /// Synthesizer binary.
    pub engine: String,
    /// Checked in order, case-insensitively, against engine voice names.
    pub preferred_voices: Vec<String>,
    /// espeak pitch, 0-99. Engine default is 50.
    pub pitch: u8,
    /// Words per minute. Engine default is 175.
    pub rate_wpm: u32,
    /// espeak amplitude, 0-200. 100 is full volume.
    pub amplitude: u8,
}

impl Default for SpeechOutputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            engine: "espeak-ng".into(),
            preferred_voices: vec!["female".into(), "en+f3".into()],
            pitch: 60,
            rate_wpm: 160,
            amplitude: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechInputConfig {
    pub enabled: bool,
    pub sample_rate: u32,
    /// Hard cap on a single capture, seconds.
    pub max_duration: f64,
    pub silence_threshold: f32,
    /// Seconds of silence that end the capture.
    pub silence_duration: f64,
    /// Silence is not checked before this much speech has elapsed.
    pub min_speech_duration: f64,
    /// Whisper GGML model name or direct path.
    pub model: String,
}

impl Default for SpeechInputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 16000,
            max_duration: 15.0,
            silence_threshold: 0.01,
            silence_duration: 1.5,
            min_speech_duration: 0.5,
            model: "base".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub notifications: bool,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            notifications: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Where exported documents land. Defaults to the working directory.
    pub directory: Option<PathBuf>,
    /// External share command; receives the share block on stdin.
    /// None means no native share capability.
    pub share_command: Option<String>,
    /// Stands in for the share URL when a result carries the "#" sentinel.
    pub fallback_url: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: None,
            share_command: None,
            fallback_url: "https://gamma-youtube-summarizer-734911192367.us-west1.run.app/"
                .into(),
        }
    }
}

impl ExportConfig {
    pub fn resolved_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub auth: AuthConfig,
    pub history: HistoryConfig,
    pub speech_output: SpeechOutputConfig,
    pub speech_input: SpeechInputConfig,
    pub feedback: FeedbackConfig,
    pub export: ExportConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./vidbrief.yaml
    /// 2. ~/.config/vidbrief/config.yaml
    /// 3. /etc/vidbrief/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("vidbrief.yaml")),
                dirs::home_dir().map(|h| h.join(".config/vidbrief/config.yaml")),
                Some(PathBuf::from("/etc/vidbrief/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match serde_yml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse {}: {e}, using defaults",
                        config_path.display()
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read {}: {e}, using defaults",
                    config_path.display()
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_config_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vidbrief.yaml");
        let mut file = std::fs::File::create(&path).expect("create config");
        writeln!(file, "service:\n  timeout_secs: 5").expect("write config");

        let config = Config::load(Some(&path));
        assert_eq!(config.service.timeout_secs, 5);
        assert!(config.service.endpoint.starts_with("https://"));
        assert_eq!(config.speech_input.sample_rate, 16000);
    }

    #[test]
    fn unparsable_config_degrades_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vidbrief.yaml");
        std::fs::write(&path, ": not yaml : [").expect("write config");

        let config = Config::load(Some(&path));
        assert_eq!(config.service.timeout_secs, 30);
    }

    #[test]
    fn inline_token_wins_over_environment() {
        let auth = AuthConfig {
            token: Some("abc".into()),
            token_env: "VIDBRIEF_TEST_TOKEN_UNSET".into(),
        };
        assert_eq!(auth.resolve_token().expect("token"), "abc");
    }

    #[test]
    fn missing_token_names_the_env_var() {
        let auth = AuthConfig {
            token: None,
            token_env: "VIDBRIEF_TEST_TOKEN_UNSET".into(),
        };
        let err = auth.resolve_token().expect_err("should be missing");
        assert!(err.to_string().contains("VIDBRIEF_TEST_TOKEN_UNSET"));
    }
}
