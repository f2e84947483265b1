//! Error types for the voice engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice engine
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or capture error
    #[error("audio error: {0}")]
    Audio(String),

    /// Playback error
    #[error("playback error: {0}")]
    Playback(String),

    /// Speech recognition service error
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Speech synthesis service error
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Language generation service error
    #[error("generation error: {0}")]
    Generation(String),

    /// Game-state service rejected a request
    #[error("state bridge error: {0}")]
    StateBridge(String),

    /// Encoded response metadata could not be decoded
    #[error("metadata decode error: {0}")]
    Metadata(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
