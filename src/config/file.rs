//! TOML configuration file loading
//!
//! Supports `~/.config/tapvoice/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Capture and endpointing
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Speech recognition service
    #[serde(default)]
    pub recognition: RecognitionFileConfig,

    /// Speech synthesis service
    #[serde(default)]
    pub synthesis: SynthesisFileConfig,

    /// Language generation service for free-form replies
    #[serde(default)]
    pub generation: GenerationFileConfig,

    /// Game-state service
    #[serde(default)]
    pub game_state: GameStateFileConfig,

    /// Proactive narration
    #[serde(default)]
    pub narrator: NarratorFileConfig,

    /// Conversation loop pacing
    #[serde(default)]
    pub conversation: ConversationFileConfig,

    /// Interaction log
    #[serde(default)]
    pub log: LogFileConfig,
}

/// Capture and endpointing configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// RMS threshold in 16-bit sample units
    pub energy_threshold: Option<f32>,
    /// Samples per captured frame
    pub block_size: Option<usize>,
    /// Frames buffered between the device callback and the endpointer
    pub queue_frames: Option<usize>,
    pub min_speech_ms: Option<u64>,
    pub silence_ms: Option<u64>,
    pub max_speech_ms: Option<u64>,
    pub listen_timeout_ms: Option<u64>,
}

/// Speech recognition configuration
#[derive(Debug, Default, Deserialize)]
pub struct RecognitionFileConfig {
    /// Runtime endpoint (e.g. `https://runtime-v2-lex.us-east-1.amazonaws.com`)
    pub endpoint: Option<String>,
    pub bot_id: Option<String>,
    pub bot_alias_id: Option<String>,
    pub locale_id: Option<String>,
    pub session_id: Option<String>,
    pub api_key: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    /// Minimum confidence for slotted intents
    pub min_confidence: Option<f64>,
}

/// Speech synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct SynthesisFileConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Voice identifier (e.g. "Joanna")
    pub voice: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
}

/// Language generation configuration
#[derive(Debug, Default, Deserialize)]
pub struct GenerationFileConfig {
    /// Chat-completions endpoint; generation is disabled when unset
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub timeout_ms: Option<u64>,
}

/// Game-state service configuration
#[derive(Debug, Default, Deserialize)]
pub struct GameStateFileConfig {
    /// Base URL (e.g. `http://127.0.0.1:5050`)
    pub url: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Proactive narration configuration
#[derive(Debug, Default, Deserialize)]
pub struct NarratorFileConfig {
    pub enabled: Option<bool>,
    pub interval_ms: Option<u64>,
    /// Health at or below which the low-health line is spoken
    pub low_hp: Option<i64>,
    /// Remaining enemies at or below which the few-enemies line is spoken
    pub few_enemies: Option<i64>,
}

/// Conversation loop configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConversationFileConfig {
    /// Utterances shorter than this are discarded
    pub min_utterance_ms: Option<u64>,
    /// Pause after each spoken reply
    pub post_reply_pause_ms: Option<u64>,
}

/// Interaction log configuration
#[derive(Debug, Default, Deserialize)]
pub struct LogFileConfig {
    pub path: Option<String>,
}

/// Load the TOML config file from the standard location
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/tapvoice/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("tapvoice").join("config.toml"))
}
