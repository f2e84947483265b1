//! Speech synthesis with a process-lifetime cache
//!
//! [`SynthesisClient::speak`] looks the text up in the cache, synthesizes on
//! a miss (with retry), then plays the clip to completion. The map lock only
//! covers lookup and insert of a per-text cell; callers asking for the same
//! line wait on that cell, so a line is synthesized once while other lines
//! proceed independently.

mod http;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};

use crate::Result;
use crate::retry::{RetryPolicy, retry};
use crate::voice::AudioSink;

pub use http::HttpSynthesizer;

/// A single remote synthesis attempt
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice`, returning encoded audio
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>>;
}

/// Cached, retrying synthesizer bound to an audio sink
pub struct SynthesisClient {
    synthesizer: Box<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    retry: RetryPolicy,
    voice: String,
    cache: Mutex<HashMap<String, Arc<OnceCell<Arc<[u8]>>>>>,
}

impl SynthesisClient {
    #[must_use]
    pub fn new(
        synthesizer: Box<dyn SpeechSynthesizer>,
        sink: Arc<dyn AudioSink>,
        retry: RetryPolicy,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            synthesizer,
            sink,
            retry,
            voice: voice.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Speak `text` with the default voice
    pub async fn speak(&self, text: &str) {
        self.speak_with_voice(text, &self.voice).await;
    }

    /// Speak `text`, blocking until playback finishes
    ///
    /// Never fails: synthesis that exhausts its retries and playback errors
    /// are logged and the call returns without sound. Empty text is a no-op.
    pub async fn speak_with_voice(&self, text: &str, voice: &str) {
        if text.trim().is_empty() {
            return;
        }

        let Some(audio) = self.audio_for(text, voice).await else {
            return;
        };

        tracing::debug!(text, bytes = audio.len(), "playing reply");
        if let Err(e) = self.sink.play(&audio).await {
            tracing::warn!(error = %e, "playback failed");
        }
    }

    /// Cached audio for `text`, synthesizing on a miss
    ///
    /// A failed synthesis leaves the cell empty so the next request retries.
    pub async fn audio_for(&self, text: &str, voice: &str) -> Option<Arc<[u8]>> {
        let cell = {
            let mut cache = self.cache.lock().await;
            Arc::clone(cache.entry(text.to_string()).or_default())
        };

        if let Some(audio) = cell.get() {
            tracing::trace!(text, "synthesis cache hit");
            return Some(Arc::clone(audio));
        }

        let synthesized = cell
            .get_or_try_init(|| async {
                retry(&self.retry, "synthesis", move || {
                    self.synthesizer.synthesize(text, voice)
                })
                .await
                .map(Arc::<[u8]>::from)
            })
            .await;

        match synthesized {
            Ok(audio) => Some(Arc::clone(audio)),
            Err(e) => {
                tracing::error!(error = %e, text, "synthesis failed, staying silent");
                None
            }
        }
    }

    #[cfg(test)]
    async fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .await
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }
}
