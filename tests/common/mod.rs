//! Shared test utilities: in-process fakes for every service seam

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use tapvoice::bridge::{
    ChatStatus, Command, ConfigUpdate, GameStateApi, GameStateSnapshot, StatePatch,
};
use tapvoice::config::ConversationConfig;
use tapvoice::generation::{FallbackResponder, LanguageModel};
use tapvoice::interaction_log::InteractionLog;
use tapvoice::recognition::{RecognitionClient, RecognitionResult, SpeechRecognizer};
use tapvoice::retry::RetryPolicy;
use tapvoice::synthesis::{SpeechSynthesizer, SynthesisClient};
use tapvoice::voice::{AudioSink, SAMPLE_RATE, Utterance, UtteranceSource};
use tapvoice::{ConversationLoop, Error, IntentResolver, Result, VoiceServices};

/// Silent PCM utterance of the given length
#[must_use]
pub fn utterance_of(duration: Duration) -> Utterance {
    let samples = usize::try_from(duration.as_millis()).unwrap() * SAMPLE_RATE as usize / 1000;
    Utterance::from_pcm(vec![0; samples * 2])
}

/// Utterance source replaying a fixed script, then silence
#[derive(Default)]
pub struct ScriptedSource {
    utterances: VecDeque<Utterance>,
}

impl ScriptedSource {
    pub fn new(utterances: impl IntoIterator<Item = Utterance>) -> Self {
        Self {
            utterances: utterances.into_iter().collect(),
        }
    }
}

#[async_trait(?Send)]
impl UtteranceSource for ScriptedSource {
    async fn next_utterance(&mut self) -> Utterance {
        self.utterances.pop_front().unwrap_or_default()
    }
}

/// One scripted recognizer answer
pub enum Answer {
    Ok(RecognitionResult),
    Fail,
    /// Succeed after holding the call for this long
    Slow(RecognitionResult, Duration),
    /// Fail after holding the call for this long
    SlowFail(Duration),
}

/// Recognizer answering from a script and counting calls
#[derive(Clone, Default)]
pub struct ScriptedRecognizer {
    answers: Arc<Mutex<VecDeque<Answer>>>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedRecognizer {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers.into_iter().collect())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn recognize(&self, _utterance: &Utterance) -> Result<RecognitionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answers.lock().unwrap().pop_front();

        match answer {
            Some(Answer::Ok(result)) => Ok(result),
            Some(Answer::Slow(result, delay)) => {
                tokio::time::sleep(delay).await;
                Ok(result)
            }
            Some(Answer::SlowFail(delay)) => {
                tokio::time::sleep(delay).await;
                Err(Error::Recognition("scripted slow failure".to_string()))
            }
            Some(Answer::Fail) | None => Err(Error::Recognition("scripted failure".to_string())),
        }
    }
}

/// Synthesizer that encodes the text itself as the "audio"
#[derive(Clone, Default)]
pub struct EchoSynthesizer {
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl EchoSynthesizer {
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for EchoSynthesizer {
    async fn synthesize(&self, text: &str, _voice: &str) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(text.to_string());
        Ok(text.as_bytes().to_vec())
    }
}

/// Sink recording what was "played" as text
#[derive(Default)]
pub struct RecordingSink {
    played: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play(&self, audio: &[u8]) -> Result<()> {
        self.played
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(audio).into_owned());
        Ok(())
    }
}

/// Game-state service held in memory
#[derive(Default)]
pub struct InMemoryGameState {
    pub(crate) snapshot: Mutex<GameStateSnapshot>,
    pub(crate) statuses: Mutex<Vec<Option<ChatStatus>>>,
    /// Reject every configuration change other than the chat indicator
    pub reject_actions: bool,
    pub unavailable: bool,
}

impl InMemoryGameState {
    pub fn with_snapshot(snapshot: GameStateSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> GameStateSnapshot {
        self.snapshot.lock().unwrap().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut GameStateSnapshot)) {
        f(&mut self.snapshot.lock().unwrap());
    }

    pub fn statuses(&self) -> Vec<Option<ChatStatus>> {
        self.statuses.lock().unwrap().clone()
    }
}

#[async_trait]
impl GameStateApi for InMemoryGameState {
    async fn read_snapshot(&self) -> Option<GameStateSnapshot> {
        (!self.unavailable).then(|| self.snapshot())
    }

    async fn write_fields(&self, patch: &StatePatch) -> Option<GameStateSnapshot> {
        if self.unavailable {
            return None;
        }
        let mut snapshot = self.snapshot.lock().unwrap();
        if let Some(difficulty) = patch.difficulty {
            snapshot.difficulty = difficulty;
        }
        if let Some(volume) = patch.volume {
            snapshot.volume = volume;
        }
        if let Some(stage) = patch.stage {
            snapshot.stage = stage;
        }
        if let Some(hp) = patch.player_hp {
            snapshot.player_hp = hp;
        }
        if let Some(enemies) = patch.remaining_enemies {
            snapshot.remaining_enemies = enemies;
        }
        Some(snapshot.clone())
    }

    async fn issue_command(&self, command: Command) -> bool {
        if self.unavailable || self.reject_actions {
            return false;
        }
        set_flag(&mut self.snapshot.lock().unwrap(), command, true);
        true
    }

    async fn clear_command(&self, command: Command) -> bool {
        if self.unavailable {
            return false;
        }
        set_flag(&mut self.snapshot.lock().unwrap(), command, false);
        true
    }

    async fn set_config(&self, update: ConfigUpdate) -> bool {
        if self.unavailable {
            return false;
        }
        let mut snapshot = self.snapshot.lock().unwrap();
        match update {
            ConfigUpdate::ChatStatus(status) => {
                snapshot.chat_status = status;
                self.statuses.lock().unwrap().push(status);
                true
            }
            _ if self.reject_actions => false,
            ConfigUpdate::Difficulty(level) => {
                snapshot.difficulty = level;
                true
            }
            ConfigUpdate::Volume(percent) => {
                snapshot.volume = percent;
                true
            }
        }
    }
}

fn set_flag(snapshot: &mut GameStateSnapshot, command: Command, value: bool) {
    match command {
        Command::Start => snapshot.want_start = value,
        Command::Pause => snapshot.want_pause = value,
        Command::Resume => snapshot.want_resume = value,
        Command::Restart => snapshot.want_restart = value,
        Command::Exit => snapshot.want_exit = value,
    }
}

/// Language model with a fixed answer
pub struct CannedModel(pub Option<&'static str>);

#[async_trait]
impl LanguageModel for CannedModel {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.0
            .map(str::to_string)
            .ok_or_else(|| Error::Generation("scripted failure".to_string()))
    }
}

/// Recognition policy with the production shape: 3 attempts, 300ms doubling
pub fn recognition_retry() -> RetryPolicy {
    RetryPolicy::with_base_delay(Duration::from_millis(300))
}

/// Everything a conversation test needs to inspect afterwards
pub struct Harness {
    pub conversation: ConversationLoop<ScriptedSource>,
    pub recognizer: ScriptedRecognizer,
    pub synthesizer: EchoSynthesizer,
    pub sink: Arc<RecordingSink>,
    pub game: Arc<InMemoryGameState>,
    pub log: InteractionLog,
}

/// Wire a conversation loop over fakes, logging into `log_dir`
pub fn harness(
    utterances: impl IntoIterator<Item = Utterance>,
    answers: impl IntoIterator<Item = Answer>,
    game: InMemoryGameState,
    model: Option<&'static str>,
    log_dir: &Path,
) -> Harness {
    let recognizer = ScriptedRecognizer::new(answers);
    let synthesizer = EchoSynthesizer::default();
    let sink = Arc::new(RecordingSink::default());
    let game = Arc::new(game);
    let log = InteractionLog::new(log_dir.join("interactions.jsonl"));

    let synthesis = Arc::new(SynthesisClient::new(
        Box::new(synthesizer.clone()),
        Arc::clone(&sink) as Arc<dyn AudioSink>,
        RetryPolicy::default(),
        "alloy",
    ));

    let services = VoiceServices {
        recognition: RecognitionClient::new(Box::new(recognizer.clone()), recognition_retry()),
        resolver: IntentResolver::default(),
        responder: FallbackResponder::new(
            model.map(|reply| Box::new(CannedModel(Some(reply))) as Box<dyn LanguageModel>),
        ),
        synthesis,
        bridge: Arc::clone(&game) as Arc<dyn GameStateApi>,
        log: log.clone(),
    };

    let conversation = ConversationLoop::new(
        ScriptedSource::new(utterances),
        services,
        ConversationConfig::default(),
    );

    Harness {
        conversation,
        recognizer,
        synthesizer,
        sink,
        game,
        log,
    }
}
