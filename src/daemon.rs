//! Daemon - the voice engine process
//!
//! Owns every long-lived component, runs the conversation loop on the
//! current task (the capture stream is not `Send`) and the narrator on the
//! runtime, and stops both on Ctrl-C.

use std::sync::Arc;

use crate::bridge::{ConfigUpdate, GameStateApi, StateBridge};
use crate::config::SynthesisConfig;
use crate::conversation::{ConversationLoop, VoiceServices};
use crate::generation::{ChatCompletionsClient, FallbackResponder, LanguageModel};
use crate::intent::IntentResolver;
use crate::interaction_log::InteractionLog;
use crate::narrator::ProactiveNarrator;
use crate::recognition::{LexRecognizer, RecognitionClient};
use crate::synthesis::{HttpSynthesizer, SynthesisClient};
use crate::voice::{AudioSink, Microphone, PlaybackHandle};
use crate::{Config, Result};

/// The voice engine daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if an audio device or a required remote service cannot
    /// be set up; nothing after startup is fatal
    #[allow(clippy::future_not_send)]
    pub async fn run(self) -> Result<()> {
        let config = self.config;

        let playback = PlaybackHandle::spawn()?;
        let synthesis = Arc::new(build_synthesis(&config.synthesis, Arc::new(playback))?);
        let bridge: Arc<dyn GameStateApi> = Arc::new(StateBridge::new(&config.game_state)?);

        let recognizer = LexRecognizer::new(&config.recognition)?;
        let recognition =
            RecognitionClient::new(Box::new(recognizer), config.recognition.retry.clone());

        let model = ChatCompletionsClient::from_config(&config.generation)?
            .map(|client| Box::new(client) as Box<dyn LanguageModel>);
        if model.is_none() {
            tracing::info!("no generation endpoint configured, open-ended replies disabled");
        }

        let services = VoiceServices {
            recognition,
            resolver: IntentResolver::new(config.recognition.min_confidence),
            responder: FallbackResponder::new(model),
            synthesis: Arc::clone(&synthesis),
            bridge: Arc::clone(&bridge),
            log: InteractionLog::new(config.log_path.clone()),
        };

        let microphone = Microphone::open(config.audio.clone())?;

        let narrator = config.narrator.enabled.then(|| {
            let narrator = ProactiveNarrator::new(
                Arc::clone(&bridge),
                Arc::clone(&synthesis),
                config.narrator.clone(),
            );
            tokio::spawn(narrator.run())
        });

        tracing::info!(
            game_state = %config.game_state.url,
            log = %config.log_path.display(),
            narrator = config.narrator.enabled,
            "voice engine ready"
        );

        let mut conversation =
            ConversationLoop::new(microphone, services, config.conversation.clone());

        tokio::select! {
            () = conversation.run() => {}
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::error!(error = %e, "failed to listen for shutdown signal");
                }
                tracing::info!("shutdown requested");
            }
        }

        if let Some(handle) = narrator {
            handle.abort();
        }
        bridge.set_config(ConfigUpdate::ChatStatus(None)).await;

        Ok(())
    }
}

/// Build the cached synthesis client over the configured HTTP synthesizer
///
/// # Errors
///
/// Returns error if the HTTP client cannot be built
pub fn build_synthesis(config: &SynthesisConfig, sink: Arc<dyn AudioSink>) -> Result<SynthesisClient> {
    let synthesizer = HttpSynthesizer::new(config)?;
    Ok(SynthesisClient::new(
        Box::new(synthesizer),
        sink,
        config.retry.clone(),
        config.voice.clone(),
    ))
}
