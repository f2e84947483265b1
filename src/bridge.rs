//! Game-state bridge
//!
//! The game process owns the shared snapshot and serves it over a small HTTP
//! API. Every call here is best-effort: transport failures are logged and
//! reported as an absent result, never raised, so a flaky game-state service
//! costs one synchronization cycle rather than the voice loop.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::GameStateConfig;
use crate::{Error, Result};

/// Game difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Normal => "normal",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "normal" => Ok(Self::Normal),
            "hard" => Ok(Self::Hard),
            other => Err(Error::StateBridge(format!("unknown difficulty: {other}"))),
        }
    }
}

/// Game stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Menu,
    Playing,
    Paused,
    GameOver,
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "menu" => Ok(Self::Menu),
            "playing" => Ok(Self::Playing),
            "paused" => Ok(Self::Paused),
            "game_over" => Ok(Self::GameOver),
            other => Err(Error::StateBridge(format!("unknown stage: {other}"))),
        }
    }
}

/// Chat indicator shown by the game while the engine works
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    Listen,
    Think,
    Speak,
}

/// One-shot commands the voice side can raise for the game to consume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Pause,
    Resume,
    Restart,
    Exit,
}

impl Command {
    /// Path segment (the flag on the snapshot is `want_{name}`)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Restart => "restart",
            Self::Exit => "exit",
        }
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start" => Ok(Self::Start),
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "restart" => Ok(Self::Restart),
            "exit" => Ok(Self::Exit),
            other => Err(Error::StateBridge(format!("unknown command: {other}"))),
        }
    }
}

/// Shared game-state record as served by the game-state service
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameStateSnapshot {
    pub difficulty: Difficulty,
    pub volume: u8,
    pub stage: Stage,
    pub want_start: bool,
    pub want_pause: bool,
    pub want_resume: bool,
    pub want_restart: bool,
    pub want_exit: bool,
    pub remaining_enemies: i64,
    pub player_hp: i64,
    pub chat_status: Option<ChatStatus>,
}

impl GameStateSnapshot {
    #[cfg(test)]
    const fn wants(&self, command: Command) -> bool {
        match command {
            Command::Start => self.want_start,
            Command::Pause => self.want_pause,
            Command::Resume => self.want_resume,
            Command::Restart => self.want_restart,
            Command::Exit => self.want_exit,
        }
    }
}

/// Partial snapshot for `PUT /state`; unset fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_enemies: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_hp: Option<i64>,
}

impl StatePatch {
    /// Whether the patch sets nothing
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.difficulty.is_none()
            && self.volume.is_none()
            && self.stage.is_none()
            && self.remaining_enemies.is_none()
            && self.player_hp.is_none()
    }
}

/// A single validated configuration field for `POST /config/{field}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigUpdate {
    Difficulty(Difficulty),
    Volume(u8),
    ChatStatus(Option<ChatStatus>),
}

impl ConfigUpdate {
    /// Path segment naming the field
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::Difficulty(_) => "difficulty",
            Self::Volume(_) => "volume",
            Self::ChatStatus(_) => "chat_status",
        }
    }

    /// Typed request body
    #[must_use]
    pub fn body(&self) -> serde_json::Value {
        match self {
            Self::Difficulty(level) => serde_json::json!({ "level": level }),
            Self::Volume(percent) => serde_json::json!({ "percent": percent }),
            Self::ChatStatus(status) => serde_json::json!({ "status": status }),
        }
    }
}

/// Request/response contract with the game-state service
///
/// Implementations never fail: `None`/`false` means the call did not take
/// effect and has already been logged.
#[async_trait]
pub trait GameStateApi: Send + Sync {
    /// Fetch the full snapshot
    async fn read_snapshot(&self) -> Option<GameStateSnapshot>;

    /// Merge several fields in one remote transaction
    async fn write_fields(&self, patch: &StatePatch) -> Option<GameStateSnapshot>;

    /// Raise a one-shot command flag; true if the service accepted it
    async fn issue_command(&self, command: Command) -> bool;

    /// Clear a one-shot command flag; true if the service accepted it
    async fn clear_command(&self, command: Command) -> bool;

    /// Set one configuration field; true if the service accepted it
    async fn set_config(&self, update: ConfigUpdate) -> bool;
}

/// HTTP client for the game-state service
#[derive(Debug, Clone)]
pub struct StateBridge {
    client: Client,
    base_url: String,
}

impl StateBridge {
    /// Create a bridge with the configured base URL and short timeout
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &GameStateConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    async fn try_read(&self) -> Result<GameStateSnapshot> {
        let response = self
            .client
            .get(format!("{}/state", self.base_url))
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn try_write(&self, patch: &StatePatch) -> Result<GameStateSnapshot> {
        let response = self
            .client
            .put(format!("{}/state", self.base_url))
            .json(patch)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn try_command(&self, command: Command, clear: bool) -> Result<()> {
        let url = format!("{}/command/{}", self.base_url, command.as_str());
        let request = if clear {
            self.client.delete(&url)
        } else {
            self.client.post(&url)
        };

        check_status(request.send().await?).await?;
        Ok(())
    }

    async fn try_set_config(&self, update: ConfigUpdate) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/config/{}", self.base_url, update.field()))
            .json(&update.body())
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl GameStateApi for StateBridge {
    async fn read_snapshot(&self) -> Option<GameStateSnapshot> {
        self.try_read()
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "failed to read game state"))
            .ok()
    }

    async fn write_fields(&self, patch: &StatePatch) -> Option<GameStateSnapshot> {
        self.try_write(patch)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, ?patch, "failed to write game state"))
            .ok()
    }

    async fn issue_command(&self, command: Command) -> bool {
        match self.try_command(command, false).await {
            Ok(()) => {
                tracing::debug!(command = command.as_str(), "command issued");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, command = command.as_str(), "failed to issue command");
                false
            }
        }
    }

    async fn clear_command(&self, command: Command) -> bool {
        match self.try_command(command, true).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, command = command.as_str(), "failed to clear command");
                false
            }
        }
    }

    async fn set_config(&self, update: ConfigUpdate) -> bool {
        match self.try_set_config(update).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, field = update.field(), "failed to set config");
                false
            }
        }
    }
}

/// Turn non-2xx responses into errors carrying the body
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::BAD_REQUEST {
        return Err(Error::StateBridge(format!("rejected: {body}")));
    }
    Err(Error::StateBridge(format!("game-state service error {status}: {body}")))
}
