//! Confidence-gated intent resolution
//!
//! Turns a raw [`RecognitionResult`] into a [`ResolvedIntent`] whose slots are
//! typed and legal. Slotted intents that fail validation or fall under the
//! confidence threshold are downgraded to the fallback intent with no slots.
//! Explain-rules and pause/resume are accepted regardless of confidence.

use std::collections::BTreeMap;

use crate::bridge::Difficulty;
use crate::recognition::{FALLBACK_INTENT, RecognitionResult};

pub const SET_DIFFICULTY: &str = "SetDifficulty";
pub const SET_VOLUME: &str = "SetVolume";
pub const EXPLAIN_RULES: &str = "ExplainRules";
pub const PAUSE_GAME: &str = "PauseGame";
pub const RESUME_GAME: &str = "ResumeGame";

/// Default minimum confidence for slotted intents
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.6;

/// An actionable intent with validated slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SetDifficulty(Difficulty),
    SetVolume(u8),
    ExplainRules,
    PauseGame,
    ResumeGame,
    Fallback,
    /// Recognized but outside the supported table; resolves to a no-op
    Unsupported(String),
}

/// Whether the recognizer's intent survived validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Accepted,
    Downgraded,
}

/// Outcome of resolving one recognition result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIntent {
    pub intent: Intent,
    pub validity: Validity,
}

impl ResolvedIntent {
    const fn accepted(intent: Intent) -> Self {
        Self {
            intent,
            validity: Validity::Accepted,
        }
    }

    const fn downgraded() -> Self {
        Self {
            intent: Intent::Fallback,
            validity: Validity::Downgraded,
        }
    }

    /// Intent name in the recognizer's vocabulary
    #[must_use]
    pub fn name(&self) -> &str {
        match &self.intent {
            Intent::SetDifficulty(_) => SET_DIFFICULTY,
            Intent::SetVolume(_) => SET_VOLUME,
            Intent::ExplainRules => EXPLAIN_RULES,
            Intent::PauseGame => PAUSE_GAME,
            Intent::ResumeGame => RESUME_GAME,
            Intent::Fallback => FALLBACK_INTENT,
            Intent::Unsupported(name) => name,
        }
    }

    /// Validated slots as name to value
    #[must_use]
    pub fn slots(&self) -> BTreeMap<String, String> {
        let mut slots = BTreeMap::new();
        match &self.intent {
            Intent::SetDifficulty(level) => {
                slots.insert("level".to_string(), level.to_string());
            }
            Intent::SetVolume(percent) => {
                slots.insert("percent".to_string(), percent.to_string());
            }
            _ => {}
        }
        slots
    }

    /// Whether this is a fallback the recognizer itself reported
    #[must_use]
    pub fn is_recognized_fallback(&self) -> bool {
        self.intent == Intent::Fallback && self.validity == Validity::Accepted
    }
}

/// Applies slot legality and confidence policy to recognition results
#[derive(Debug, Clone, Copy)]
pub struct IntentResolver {
    min_confidence: f64,
}

impl Default for IntentResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE)
    }
}

impl IntentResolver {
    #[must_use]
    pub const fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    /// Resolve a recognition result; pure and deterministic
    #[must_use]
    pub fn resolve(&self, result: &RecognitionResult) -> ResolvedIntent {
        let resolved = match result.intent_name.as_str() {
            SET_DIFFICULTY => {
                let level = parse_level(result.slots.get("level"));
                self.gate(result, level.map(Intent::SetDifficulty))
            }
            SET_VOLUME => {
                let percent = parse_percent(result.slots.get("percent"));
                self.gate(result, percent.map(Intent::SetVolume))
            }
            EXPLAIN_RULES => ResolvedIntent::accepted(Intent::ExplainRules),
            PAUSE_GAME => ResolvedIntent::accepted(Intent::PauseGame),
            RESUME_GAME => ResolvedIntent::accepted(Intent::ResumeGame),
            FALLBACK_INTENT => ResolvedIntent::accepted(Intent::Fallback),
            other => ResolvedIntent::accepted(Intent::Unsupported(other.to_string())),
        };

        if resolved.validity == Validity::Downgraded {
            tracing::debug!(
                intent = %result.intent_name,
                confidence = ?result.confidence,
                slots = ?result.slots,
                "intent downgraded to fallback"
            );
        }

        resolved
    }

    /// Accept a slotted intent only if its slot parsed and confidence clears the bar
    fn gate(&self, result: &RecognitionResult, intent: Option<Intent>) -> ResolvedIntent {
        let confident = result.confidence.is_none_or(|c| c >= self.min_confidence);
        match intent {
            Some(intent) if confident => ResolvedIntent::accepted(intent),
            _ => ResolvedIntent::downgraded(),
        }
    }
}

/// Slot values must be one of the service's exact lowercase levels
fn parse_level(slot: Option<&String>) -> Option<Difficulty> {
    let slot = slot?;
    [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard]
        .into_iter()
        .find(|level| level.as_str() == slot)
}

fn parse_percent(slot: Option<&String>) -> Option<u8> {
    let value: i64 = slot?.trim().parse().ok()?;
    if (0..=100).contains(&value) {
        u8::try_from(value).ok()
    } else {
        None
    }
}
