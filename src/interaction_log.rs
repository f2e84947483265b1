//! Append-only interaction log
//!
//! One JSON object per line, one line per resolved voice interaction.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::Result;

/// How the interaction reached the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Voice,
}

/// One logged interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: DateTime<Utc>,
    pub modality: Modality,
    pub transcript: String,
    pub intent: String,
    pub confidence: Option<f64>,
    pub slots: BTreeMap<String, String>,
    pub action: String,
    pub success: bool,
    pub latency_ms: f64,
}

impl InteractionRecord {
    /// A voice interaction stamped with the current time
    #[must_use]
    pub fn voice(
        transcript: impl Into<String>,
        intent: impl Into<String>,
        confidence: Option<f64>,
        slots: BTreeMap<String, String>,
        action: impl Into<String>,
        success: bool,
        latency: Duration,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            modality: Modality::Voice,
            transcript: transcript.into(),
            intent: intent.into(),
            confidence,
            slots,
            action: action.into(),
            success,
            latency_ms: latency.as_secs_f64() * 1000.0,
        }
    }
}

/// JSON-lines log file
#[derive(Debug, Clone)]
pub struct InteractionLog {
    path: PathBuf,
}

impl InteractionLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record, logging instead of failing
    pub async fn record(&self, record: &InteractionRecord) {
        if let Err(e) = self.append(record).await {
            tracing::warn!(error = %e, path = %self.path.display(), "failed to write interaction log");
        }
    }

    /// Append a record
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written
    pub async fn append(&self, record: &InteractionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        Ok(())
    }

    /// Read every record back
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or a line is malformed
    pub async fn read_all(&self) -> Result<Vec<InteractionRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }
}
