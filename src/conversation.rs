//! Listen, recognize, resolve, act, speak
//!
//! One cycle per utterance. Nothing inside a cycle is allowed to end the
//! loop: every failure is logged, optionally spoken about, and the next
//! cycle starts from the top.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::bridge::{ChatStatus, Command, ConfigUpdate, GameStateApi};
use crate::config::ConversationConfig;
use crate::generation::FallbackResponder;
use crate::intent::{Intent, IntentResolver, ResolvedIntent};
use crate::interaction_log::{InteractionLog, InteractionRecord};
use crate::persona;
use crate::recognition::{FALLBACK_INTENT, RecognitionClient};
use crate::synthesis::SynthesisClient;
use crate::voice::UtteranceSource;

/// Action label recorded when recognition fails terminally
pub const RECOGNITION_ERROR_ACTION: &str = "recognition_error";

/// Long-lived collaborators of the conversation loop
pub struct VoiceServices {
    pub recognition: RecognitionClient,
    pub resolver: IntentResolver,
    pub responder: FallbackResponder,
    pub synthesis: Arc<SynthesisClient>,
    pub bridge: Arc<dyn GameStateApi>,
    pub log: InteractionLog,
}

/// What a single cycle ended with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing heard before the listen timeout
    NoSpeech,
    /// Utterance shorter than the minimum; never sent anywhere
    TooShort(Duration),
    /// Recognition failed after every retry
    RecognitionFailed,
    /// The recognizer returned no transcript
    NothingRecognized,
    /// A recognized fallback answered conversationally
    Conversed,
    /// An intent was acted on
    Acted { action: String, success: bool },
}

/// The voice-command loop
pub struct ConversationLoop<S> {
    source: S,
    services: VoiceServices,
    config: ConversationConfig,
}

impl<S: UtteranceSource> ConversationLoop<S> {
    #[must_use]
    pub const fn new(source: S, services: VoiceServices, config: ConversationConfig) -> Self {
        Self {
            source,
            services,
            config,
        }
    }

    /// Run cycles forever
    pub async fn run(&mut self) {
        tracing::info!("conversation loop started");
        loop {
            let outcome = self.run_cycle().await;
            tracing::trace!(?outcome, "cycle finished");
        }
    }

    /// Run one listen-to-reply cycle
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.set_status(Some(ChatStatus::Listen)).await;

        let utterance = self.source.next_utterance().await;
        if utterance.is_empty() {
            return CycleOutcome::NoSpeech;
        }

        let duration = utterance.duration();
        if duration < self.config.min_utterance {
            tracing::debug!(duration_ms = duration.as_millis(), "utterance too short, ignoring");
            return CycleOutcome::TooShort(duration);
        }

        self.set_status(Some(ChatStatus::Think)).await;

        let (result, latency) = match self.services.recognition.recognize(&utterance).await {
            Ok(recognized) => recognized,
            Err(e) => {
                tracing::error!(error = %e, "recognition failed after retries");
                self.speak(persona::RECOGNITION_APOLOGY).await;
                self.services
                    .log
                    .record(&InteractionRecord::voice(
                        "",
                        FALLBACK_INTENT,
                        None,
                        BTreeMap::new(),
                        RECOGNITION_ERROR_ACTION,
                        false,
                        Duration::ZERO,
                    ))
                    .await;
                return CycleOutcome::RecognitionFailed;
            }
        };

        let Some(heard) = result.heard().map(str::to_string) else {
            tracing::debug!("empty transcript, ignoring");
            self.set_status(None).await;
            return CycleOutcome::NothingRecognized;
        };

        let resolved = self.services.resolver.resolve(&result);

        if resolved.is_recognized_fallback() {
            let snapshot = self.services.bridge.read_snapshot().await;
            let reply = self.services.responder.respond(&heard, snapshot.as_ref()).await;

            self.services
                .log
                .record(&InteractionRecord::voice(
                    &heard,
                    resolved.name(),
                    result.confidence,
                    resolved.slots(),
                    "fallback",
                    true,
                    latency,
                ))
                .await;

            self.speak(&reply).await;
            return CycleOutcome::Conversed;
        }

        let (action, success) = self.act(&resolved).await;
        tracing::info!(intent = resolved.name(), action = %action, success, "intent handled");

        self.services
            .log
            .record(&InteractionRecord::voice(
                &heard,
                resolved.name(),
                result.confidence,
                resolved.slots(),
                &action,
                success,
                latency,
            ))
            .await;

        self.speak(&persona::reply_for(&resolved.intent)).await;

        CycleOutcome::Acted { action, success }
    }

    /// Apply a resolved intent to the game; returns the action label and
    /// whether the game side acknowledged it
    async fn act(&self, resolved: &ResolvedIntent) -> (String, bool) {
        let bridge = &self.services.bridge;

        let (action, acknowledged) = match &resolved.intent {
            Intent::SetDifficulty(level) => (
                format!("set_difficulty:{level}"),
                bridge.set_config(ConfigUpdate::Difficulty(*level)).await,
            ),
            Intent::SetVolume(percent) => (
                format!("set_volume:{percent}"),
                bridge.set_config(ConfigUpdate::Volume(*percent)).await,
            ),
            Intent::PauseGame => (
                "pause_game".to_string(),
                bridge.issue_command(Command::Pause).await,
            ),
            Intent::ResumeGame => (
                "resume_game".to_string(),
                bridge.issue_command(Command::Resume).await,
            ),
            Intent::ExplainRules => ("explain_rules".to_string(), true),
            Intent::Fallback => ("fallback".to_string(), true),
            Intent::Unsupported(_) => ("noop".to_string(), true),
        };

        if acknowledged {
            (action, true)
        } else {
            tracing::warn!(intent = resolved.name(), "game side did not accept the action");
            (format!("game_error:{}", resolved.name()), false)
        }
    }

    /// Speak a reply with the speaking indicator raised, then pause briefly
    async fn speak(&self, text: &str) {
        self.set_status(Some(ChatStatus::Speak)).await;
        self.services.synthesis.speak(text).await;
        self.set_status(None).await;
        tokio::time::sleep(self.config.post_reply_pause).await;
    }

    async fn set_status(&self, status: Option<ChatStatus>) {
        self.services
            .bridge
            .set_config(ConfigUpdate::ChatStatus(status))
            .await;
    }
}
