//! Tapvoice - voice interaction engine for an arcade game
//!
//! Captures speech from the microphone, segments it into utterances,
//! recognizes and validates an intent, applies it to the game through the
//! game-state service, and answers with synthesized speech. A second loop
//! narrates game milestones on its own schedule.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  frames   ┌─────────────┐ utterance ┌──────────────────┐
//! │ AudioCapture ├──────────►│ Endpointer  ├──────────►│ RecognitionClient│
//! └──────────────┘  (mpsc)   └─────────────┘           └────────┬─────────┘
//!                                                               │ result
//!                        ┌────────────────┐  resolved  ┌────────▼─────────┐
//!                        │ ConversationLoop◄───────────┤  IntentResolver  │
//!                        └──┬──────────┬──┘            └──────────────────┘
//!              setters/flags│          │reply
//!                   ┌───────▼─────┐ ┌──▼──────────────┐   ┌──────────────┐
//!                   │ StateBridge │ │ SynthesisClient ├──►│PlaybackHandle│
//!                   └───────▲─────┘ └──▲──────────────┘   └──────────────┘
//!                     snapshot│        │milestone lines
//!                        ┌────┴────────┴─────┐
//!                        │ ProactiveNarrator │
//!                        └───────────────────┘
//! ```

pub mod bridge;
pub mod config;
pub mod conversation;
pub mod daemon;
pub mod error;
pub mod generation;
pub mod intent;
pub mod interaction_log;
pub mod narrator;
pub mod persona;
pub mod recognition;
pub mod retry;
pub mod synthesis;
pub mod voice;

pub use bridge::{GameStateApi, GameStateSnapshot, StateBridge};
pub use config::Config;
pub use conversation::{ConversationLoop, CycleOutcome, VoiceServices};
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use intent::{Intent, IntentResolver, ResolvedIntent, Validity};
pub use narrator::ProactiveNarrator;
pub use recognition::{RecognitionClient, RecognitionResult};
pub use synthesis::SynthesisClient;
