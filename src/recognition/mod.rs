//! Speech recognition
//!
//! A [`SpeechRecognizer`] performs a single remote call. [`RecognitionClient`]
//! wraps one with the retry policy and measures latency of the attempt that
//! succeeded.

mod lex;
pub mod metadata;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::Result;
use crate::retry::{RetryPolicy, retry};
use crate::voice::Utterance;

pub use lex::LexRecognizer;

/// Intent reported when the service names none
pub const FALLBACK_INTENT: &str = "FallbackIntent";

/// Structured result of one recognition call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecognitionResult {
    /// What the service heard, if anything
    pub transcript: Option<String>,

    /// Intent name as reported by the service
    pub intent_name: String,

    /// Confidence of the top interpretation, absent when none was ranked
    pub confidence: Option<f64>,

    /// Slot name to interpreted value
    pub slots: BTreeMap<String, String>,
}

impl RecognitionResult {
    /// Result for a named intent with no transcript, confidence or slots
    #[must_use]
    pub fn intent(name: impl Into<String>) -> Self {
        Self {
            intent_name: name.into(),
            ..Self::default()
        }
    }

    /// Set the transcript
    #[must_use]
    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    /// Set the confidence
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Add a slot value
    #[must_use]
    pub fn with_slot(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.slots.insert(name.into(), value.into());
        self
    }

    /// Transcript with whitespace and surrounding quotes stripped
    ///
    /// `None` when nothing was recognized, including a quoted-empty string.
    #[must_use]
    pub fn heard(&self) -> Option<&str> {
        let text = self.transcript.as_deref()?.trim().trim_matches('"').trim();
        (!text.is_empty()).then_some(text)
    }
}

/// A single remote recognition attempt
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Send one utterance and parse the service's answer
    async fn recognize(&self, utterance: &Utterance) -> Result<RecognitionResult>;
}

/// Recognizer with retry/backoff and latency measurement
pub struct RecognitionClient {
    recognizer: Box<dyn SpeechRecognizer>,
    retry: RetryPolicy,
}

impl RecognitionClient {
    /// Wrap a recognizer with a retry policy
    #[must_use]
    pub fn new(recognizer: Box<dyn SpeechRecognizer>, retry: RetryPolicy) -> Self {
        Self { recognizer, retry }
    }

    /// Recognize an utterance, retrying transient failures
    ///
    /// Latency covers only the attempt that succeeded.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error once every attempt has failed
    pub async fn recognize(&self, utterance: &Utterance) -> Result<(RecognitionResult, Duration)> {
        let (result, latency) = retry(&self.retry, "recognition", move || async move {
            let started = Instant::now();
            let result = self.recognizer.recognize(utterance).await?;
            Ok((result, started.elapsed()))
        })
        .await?;

        tracing::info!(
            intent = %result.intent_name,
            confidence = ?result.confidence,
            transcript = ?result.transcript,
            latency_ms = latency.as_millis(),
            "utterance recognized"
        );

        Ok((result, latency))
    }
}
