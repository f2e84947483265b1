//! Configuration management for the voice engine
//!
//! Values resolve as env > TOML file > default.

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::Result;
use crate::retry::RetryPolicy;

use self::file::ConfigFile;

/// Voice engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Capture and endpointing
    pub audio: AudioConfig,

    /// Speech recognition service
    pub recognition: RecognitionConfig,

    /// Speech synthesis service
    pub synthesis: SynthesisConfig,

    /// Language generation service
    pub generation: GenerationConfig,

    /// Game-state service
    pub game_state: GameStateConfig,

    /// Proactive narration
    pub narrator: NarratorConfig,

    /// Conversation loop pacing
    pub conversation: ConversationConfig,

    /// Path of the append-only interaction log
    pub log_path: PathBuf,
}

/// Capture and endpointing configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// RMS threshold in 16-bit sample units; a frame above it is voice
    pub energy_threshold: f32,

    /// Samples per captured frame
    pub block_size: usize,

    /// Frames buffered between the device callback and the endpointer
    pub queue_frames: usize,

    /// Shortest speech span that a silence tail may close
    pub min_speech: Duration,

    /// Silence after the last voiced frame that ends an utterance
    pub silence_timeout: Duration,

    /// Hard cap on utterance length
    pub max_speech: Duration,

    /// How long to wait for speech to start before giving up
    pub listen_timeout: Duration,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 50.0,
            block_size: 1024,
            queue_frames: 256,
            min_speech: Duration::from_millis(300),
            silence_timeout: Duration::from_millis(600),
            max_speech: Duration::from_millis(6000),
            listen_timeout: Duration::from_secs(10),
        }
    }
}

/// Speech recognition configuration
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    /// Runtime endpoint base URL
    pub endpoint: String,

    /// Bot identifier
    pub bot_id: String,

    /// Bot alias identifier
    pub bot_alias_id: String,

    /// Locale (e.g. "`en_US`")
    pub locale_id: String,

    /// Conversation session identifier
    pub session_id: String,

    /// Bearer token for an authenticating gateway, if any
    pub api_key: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,

    /// Retry policy
    pub retry: RetryPolicy,

    /// Minimum confidence for slotted intents
    pub min_confidence: f64,
}

/// Speech synthesis configuration
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Speech endpoint URL
    pub endpoint: String,

    /// API key
    pub api_key: Option<String>,

    /// Synthesis model
    pub model: String,

    /// Default voice identifier
    pub voice: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Retry policy
    pub retry: RetryPolicy,
}

/// Language generation configuration
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Chat-completions endpoint; `None` disables generation
    pub endpoint: Option<String>,

    /// API key
    pub api_key: Option<String>,

    /// Model identifier
    pub model: String,

    /// Reply length cap
    pub max_tokens: u32,

    /// Per-request timeout
    pub timeout: Duration,
}

/// Game-state service configuration
#[derive(Debug, Clone)]
pub struct GameStateConfig {
    /// Base URL
    pub url: String,

    /// Per-request timeout
    pub timeout: Duration,
}

/// Proactive narration configuration
#[derive(Debug, Clone)]
pub struct NarratorConfig {
    /// Run the narrator loop
    pub enabled: bool,

    /// Poll interval
    pub interval: Duration,

    /// Health at or below which the low-health line is spoken (while alive)
    pub low_hp: i64,

    /// Remaining enemies at or below which the few-enemies line is spoken
    pub few_enemies: i64,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(3),
            low_hp: 2,
            few_enemies: 5,
        }
    }
}

/// Conversation loop configuration
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Utterances shorter than this never reach the recognizer
    pub min_utterance: Duration,

    /// Pause after each spoken reply
    pub post_reply_pause: Duration,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            min_utterance: Duration::from_millis(500),
            post_reply_pause: Duration::from_millis(200),
        }
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if an environment value is present but malformed
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if an environment value is present but malformed
    #[allow(clippy::too_many_lines)]
    pub fn from_sources(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let audio_defaults = AudioConfig::default();
        let audio = AudioConfig {
            energy_threshold: parsed(&env, "TAPVOICE_ENERGY_THRESHOLD")?
                .or(fc.audio.energy_threshold)
                .unwrap_or(audio_defaults.energy_threshold),
            block_size: parsed(&env, "TAPVOICE_BLOCK_SIZE")?
                .or(fc.audio.block_size)
                .unwrap_or(audio_defaults.block_size),
            queue_frames: parsed(&env, "TAPVOICE_QUEUE_FRAMES")?
                .or(fc.audio.queue_frames)
                .unwrap_or(audio_defaults.queue_frames),
            min_speech: millis_or(
                parsed(&env, "TAPVOICE_MIN_SPEECH_MS")?.or(fc.audio.min_speech_ms),
                audio_defaults.min_speech,
            ),
            silence_timeout: millis_or(
                parsed(&env, "TAPVOICE_SILENCE_MS")?.or(fc.audio.silence_ms),
                audio_defaults.silence_timeout,
            ),
            max_speech: millis_or(
                parsed(&env, "TAPVOICE_MAX_SPEECH_MS")?.or(fc.audio.max_speech_ms),
                audio_defaults.max_speech,
            ),
            listen_timeout: millis_or(
                parsed(&env, "TAPVOICE_LISTEN_TIMEOUT_MS")?.or(fc.audio.listen_timeout_ms),
                audio_defaults.listen_timeout,
            ),
        };

        let region = env("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string());
        let rec = fc.recognition;
        let recognition = RecognitionConfig {
            endpoint: env("TAPVOICE_RECOGNITION_URL")
                .or(rec.endpoint)
                .unwrap_or_else(|| format!("https://runtime-v2-lex.{region}.amazonaws.com")),
            bot_id: env("LEX_BOT_ID").or(rec.bot_id).unwrap_or_default(),
            bot_alias_id: env("LEX_ALIAS_ID").or(rec.bot_alias_id).unwrap_or_default(),
            locale_id: env("LEX_LOCALE_ID")
                .or(rec.locale_id)
                .unwrap_or_else(|| "en_US".to_string()),
            session_id: env("LEX_SESSION_ID")
                .or(rec.session_id)
                .unwrap_or_else(|| format!("tapvoice-{}", uuid::Uuid::new_v4())),
            api_key: env("TAPVOICE_RECOGNITION_API_KEY").or(rec.api_key),
            timeout: millis_or(
                parsed(&env, "TAPVOICE_RECOGNITION_TIMEOUT_MS")?.or(rec.timeout_ms),
                Duration::from_secs(10),
            ),
            retry: retry_policy(
                parsed(&env, "TAPVOICE_RECOGNITION_MAX_ATTEMPTS")?.or(rec.max_attempts),
                parsed(&env, "TAPVOICE_RECOGNITION_BASE_DELAY_MS")?.or(rec.base_delay_ms),
                300,
            ),
            min_confidence: parsed(&env, "TAPVOICE_MIN_CONFIDENCE")?
                .or(rec.min_confidence)
                .unwrap_or(0.6),
        };

        let syn = fc.synthesis;
        let synthesis = SynthesisConfig {
            endpoint: env("TAPVOICE_SYNTHESIS_URL")
                .or(syn.endpoint)
                .unwrap_or_else(|| "https://api.openai.com/v1/audio/speech".to_string()),
            api_key: env("TAPVOICE_SYNTHESIS_API_KEY")
                .or_else(|| env("OPENAI_API_KEY"))
                .or(syn.api_key),
            model: env("TAPVOICE_SYNTHESIS_MODEL")
                .or(syn.model)
                .unwrap_or_else(|| "tts-1".to_string()),
            voice: env("POLLY_VOICE")
                .or_else(|| env("TAPVOICE_VOICE"))
                .or(syn.voice)
                .unwrap_or_else(|| "alloy".to_string()),
            timeout: millis_or(
                parsed(&env, "TAPVOICE_SYNTHESIS_TIMEOUT_MS")?.or(syn.timeout_ms),
                Duration::from_secs(10),
            ),
            retry: retry_policy(
                parsed(&env, "TAPVOICE_SYNTHESIS_MAX_ATTEMPTS")?.or(syn.max_attempts),
                parsed(&env, "TAPVOICE_SYNTHESIS_BASE_DELAY_MS")?.or(syn.base_delay_ms),
                500,
            ),
        };

        let gen_file = fc.generation;
        let generation = GenerationConfig {
            endpoint: env("TAPVOICE_GENERATION_URL").or(gen_file.endpoint),
            api_key: env("TAPVOICE_GENERATION_API_KEY")
                .or_else(|| env("OPENAI_API_KEY"))
                .or(gen_file.api_key),
            model: env("TAPVOICE_GENERATION_MODEL")
                .or(gen_file.model)
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            max_tokens: parsed(&env, "TAPVOICE_GENERATION_MAX_TOKENS")?
                .or(gen_file.max_tokens)
                .unwrap_or(60),
            timeout: millis_or(
                parsed(&env, "TAPVOICE_GENERATION_TIMEOUT_MS")?.or(gen_file.timeout_ms),
                Duration::from_secs(10),
            ),
        };

        let game_state = GameStateConfig {
            url: env("TAPVOICE_GAME_STATE_URL")
                .or(fc.game_state.url)
                .unwrap_or_else(|| "http://127.0.0.1:5050".to_string()),
            timeout: millis_or(
                parsed(&env, "TAPVOICE_GAME_STATE_TIMEOUT_MS")?.or(fc.game_state.timeout_ms),
                Duration::from_millis(500),
            ),
        };

        let narrator_defaults = NarratorConfig::default();
        let narrator = NarratorConfig {
            enabled: parsed_bool(&env, "TAPVOICE_NARRATOR")
                .or(fc.narrator.enabled)
                .unwrap_or(narrator_defaults.enabled),
            interval: millis_or(
                parsed(&env, "TAPVOICE_NARRATOR_INTERVAL_MS")?.or(fc.narrator.interval_ms),
                narrator_defaults.interval,
            ),
            low_hp: parsed(&env, "TAPVOICE_NARRATOR_LOW_HP")?
                .or(fc.narrator.low_hp)
                .unwrap_or(narrator_defaults.low_hp),
            few_enemies: parsed(&env, "TAPVOICE_NARRATOR_FEW_ENEMIES")?
                .or(fc.narrator.few_enemies)
                .unwrap_or(narrator_defaults.few_enemies),
        };

        let conversation_defaults = ConversationConfig::default();
        let conversation = ConversationConfig {
            min_utterance: millis_or(
                parsed(&env, "TAPVOICE_MIN_UTTERANCE_MS")?.or(fc.conversation.min_utterance_ms),
                conversation_defaults.min_utterance,
            ),
            post_reply_pause: millis_or(
                parsed(&env, "TAPVOICE_POST_REPLY_PAUSE_MS")?
                    .or(fc.conversation.post_reply_pause_ms),
                conversation_defaults.post_reply_pause,
            ),
        };

        let log_path = env("TAPVOICE_LOG_PATH")
            .or(fc.log.path)
            .map_or_else(default_log_path, PathBuf::from);

        Ok(Self {
            audio,
            recognition,
            synthesis,
            generation,
            game_state,
            narrator,
            conversation,
            log_path,
        })
    }
}

/// Default interaction log: `~/.local/share/tapvoice/interactions.jsonl` on Linux
fn default_log_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("interactions.jsonl"),
        |d| d.data_dir().join("tapvoice").join("interactions.jsonl"),
    )
}

/// Parse an environment value, failing loudly on malformed input
fn parsed<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    env(key)
        .map(|raw| {
            raw.trim().parse().map_err(|_| {
                crate::Error::Config(format!("{key} has an invalid value: {raw:?}"))
            })
        })
        .transpose()
}

/// Interpret "1"/"true"/"0"/"false" style flags
fn parsed_bool(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    env(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn millis_or(value: Option<u64>, default: Duration) -> Duration {
    value.map_or(default, Duration::from_millis)
}

fn retry_policy(max_attempts: Option<u32>, base_delay_ms: Option<u64>, default_ms: u64) -> RetryPolicy {
    RetryPolicy {
        max_attempts: max_attempts.unwrap_or(3),
        ..RetryPolicy::with_base_delay(Duration::from_millis(base_delay_ms.unwrap_or(default_ms)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_sources() {
        let config = Config::from_sources(ConfigFile::default(), env_from(&[])).unwrap();

        assert!((config.audio.energy_threshold - 50.0).abs() < f32::EPSILON);
        assert_eq!(config.audio.max_speech, Duration::from_millis(6000));
        assert_eq!(config.recognition.locale_id, "en_US");
        assert!(config.recognition.session_id.starts_with("tapvoice-"));
        assert_eq!(config.recognition.retry.base_delay, Duration::from_millis(300));
        assert_eq!(config.synthesis.retry.base_delay, Duration::from_millis(500));
        assert!((config.recognition.min_confidence - 0.6).abs() < f64::EPSILON);
        assert!(config.generation.endpoint.is_none());
        assert_eq!(config.game_state.url, "http://127.0.0.1:5050");
        assert_eq!(config.game_state.timeout, Duration::from_millis(500));
        assert_eq!(config.narrator.interval, Duration::from_secs(3));
        assert_eq!(config.conversation.min_utterance, Duration::from_millis(500));
    }

    #[test]
    fn env_overrides_file() {
        let fc: ConfigFile = toml::from_str(
            r#"
            [recognition]
            bot_id = "FILEBOT"
            locale_id = "en_GB"

            [synthesis]
            voice = "Matthew"
            "#,
        )
        .unwrap();

        let config = Config::from_sources(
            fc,
            env_from(&[
                ("LEX_BOT_ID", "ENVBOT"),
                ("POLLY_VOICE", "Joanna"),
                ("AWS_REGION", "eu-west-1"),
            ]),
        )
        .unwrap();

        assert_eq!(config.recognition.bot_id, "ENVBOT");
        assert_eq!(config.recognition.locale_id, "en_GB");
        assert_eq!(config.synthesis.voice, "Joanna");
        assert_eq!(
            config.recognition.endpoint,
            "https://runtime-v2-lex.eu-west-1.amazonaws.com"
        );
    }

    #[test]
    fn malformed_env_number_is_an_error() {
        let result = Config::from_sources(
            ConfigFile::default(),
            env_from(&[("TAPVOICE_MIN_CONFIDENCE", "high")]),
        );
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn narrator_flag_from_env() {
        let config =
            Config::from_sources(ConfigFile::default(), env_from(&[("TAPVOICE_NARRATOR", "0")]))
                .unwrap();
        assert!(!config.narrator.enabled);
    }

    #[test]
    fn every_tuning_knob_has_an_env_key() {
        let config = Config::from_sources(
            ConfigFile::default(),
            env_from(&[
                ("TAPVOICE_BLOCK_SIZE", "512"),
                ("TAPVOICE_QUEUE_FRAMES", "64"),
                ("TAPVOICE_LISTEN_TIMEOUT_MS", "4000"),
                ("TAPVOICE_RECOGNITION_TIMEOUT_MS", "2500"),
                ("TAPVOICE_RECOGNITION_MAX_ATTEMPTS", "5"),
                ("TAPVOICE_RECOGNITION_BASE_DELAY_MS", "100"),
                ("TAPVOICE_SYNTHESIS_MODEL", "tts-1-hd"),
                ("TAPVOICE_SYNTHESIS_TIMEOUT_MS", "7000"),
                ("TAPVOICE_SYNTHESIS_MAX_ATTEMPTS", "2"),
                ("TAPVOICE_SYNTHESIS_BASE_DELAY_MS", "250"),
                ("TAPVOICE_GENERATION_MAX_TOKENS", "80"),
                ("TAPVOICE_GENERATION_TIMEOUT_MS", "3000"),
                ("TAPVOICE_GAME_STATE_TIMEOUT_MS", "900"),
                ("TAPVOICE_NARRATOR_INTERVAL_MS", "1500"),
                ("TAPVOICE_NARRATOR_LOW_HP", "3"),
                ("TAPVOICE_NARRATOR_FEW_ENEMIES", "4"),
                ("TAPVOICE_MIN_UTTERANCE_MS", "400"),
                ("TAPVOICE_POST_REPLY_PAUSE_MS", "0"),
            ]),
        )
        .unwrap();

        assert_eq!(config.audio.block_size, 512);
        assert_eq!(config.audio.queue_frames, 64);
        assert_eq!(config.audio.listen_timeout, Duration::from_secs(4));
        assert_eq!(config.recognition.timeout, Duration::from_millis(2500));
        assert_eq!(config.recognition.retry.max_attempts, 5);
        assert_eq!(config.recognition.retry.base_delay, Duration::from_millis(100));
        assert_eq!(config.synthesis.model, "tts-1-hd");
        assert_eq!(config.synthesis.timeout, Duration::from_secs(7));
        assert_eq!(config.synthesis.retry.max_attempts, 2);
        assert_eq!(config.synthesis.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.generation.max_tokens, 80);
        assert_eq!(config.generation.timeout, Duration::from_secs(3));
        assert_eq!(config.game_state.timeout, Duration::from_millis(900));
        assert_eq!(config.narrator.interval, Duration::from_millis(1500));
        assert_eq!(config.narrator.low_hp, 3);
        assert_eq!(config.narrator.few_enemies, 4);
        assert_eq!(config.conversation.min_utterance, Duration::from_millis(400));
        assert_eq!(config.conversation.post_reply_pause, Duration::ZERO);
    }
}
