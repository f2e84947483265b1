//! The companion's voice: canned replies, narration lines and the
//! generation prompt

use rand::seq::SliceRandom;

use crate::bridge::{Difficulty, GameStateSnapshot};
use crate::intent::Intent;

pub const RULES_REPLY: &str = "Here's the short version: reach the goal without losing all your lives. \
Avoid enemies, grab useful items, and watch your health bar.";

pub const RESUME_REPLY: &str = "Back into the chaos. Try not to embarrass us again.";

pub const FALLBACK_REPLY: &str = "I didn't quite catch that. \
Try saying things like set difficulty to hard or volume forty percent.";

pub const IDLE_REPLY: &str = "I'm ready whenever you are.";

/// Spoken when recognition fails after every retry
pub const RECOGNITION_APOLOGY: &str =
    "I had a problem talking to the server. Please try again in a moment.";

/// Spoken when the language model cannot produce a reply
pub const GENERATION_APOLOGY: &str =
    "I have no idea what you just said, but it sounded questionable.";

const PAUSE_REPLIES: [&str; 3] = [
    "Fine, pausing the chaos. Catch your breath, hero.",
    "Game paused. Try not to forget what you were doing.",
    "Paused. Don't take forever, I do get bored.",
];

pub const MENU_LINE: &str = "Aha! Welcome to the game! What can I help you?";
pub const LOW_HP_LINE: &str =
    "Uh-oh, your HP's looking kinda tragic… maybe try not getting hit?";
pub const DEAD_LINE: &str =
    "Wow. Impressive. You managed to die again. Shall we try that one more time?";
pub const FEW_ENEMIES_LINE: &str = "Only a few enemies left. Don't choke now—I'm watching.";
pub const GAME_OVER_LINE: &str = "Aha! You dead now!";

/// Longest transcript, in characters, that gets the canned short reply
const SHORT_TRANSCRIPT_CHARS: usize = 6;

/// Reply for a resolved intent
#[must_use]
pub fn reply_for(intent: &Intent) -> String {
    match intent {
        Intent::SetDifficulty(Difficulty::Easy) => {
            "Easy mode, got it. I'll go easy on you… for now.".to_string()
        }
        Intent::SetDifficulty(Difficulty::Hard) => {
            "Hard mode locked in. Don't say I didn't warn you.".to_string()
        }
        Intent::SetDifficulty(level) => format!("Okay, difficulty set to {level}."),
        Intent::SetVolume(percent) => format!(
            "Volume adjusted to {} percent. Hope that sounds better.",
            (*percent).min(100)
        ),
        Intent::ExplainRules => RULES_REPLY.to_string(),
        Intent::PauseGame => pause_reply().to_string(),
        Intent::ResumeGame => RESUME_REPLY.to_string(),
        Intent::Fallback => FALLBACK_REPLY.to_string(),
        Intent::Unsupported(_) => IDLE_REPLY.to_string(),
    }
}

fn pause_reply() -> &'static str {
    PAUSE_REPLIES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(PAUSE_REPLIES[0])
}

/// Canned reply for a single short word, or `None` if the transcript
/// deserves a generated answer
#[must_use]
pub fn short_transcript_reply(transcript: &str) -> Option<String> {
    let text = transcript.trim().trim_matches('"');
    (text.chars().count() <= SHORT_TRANSCRIPT_CHARS && !text.contains(' '))
        .then(|| format!("\"{text}\" huh? That's all you've got?"))
}

/// Prompt for a free-form reply to something the recognizer didn't map
#[must_use]
pub fn generation_prompt(utterance: &str, snapshot: Option<&GameStateSnapshot>) -> String {
    let state = snapshot
        .and_then(|s| serde_json::to_string(s).ok())
        .unwrap_or_else(|| "{}".to_string());

    format!(
        "You are a sarcastic, slightly rude, playful AI companion inside a tower-defense game.

Your tone:
- snarky but not evil
- tease the player about their choices
- comment on the game state if useful
- ONE short sentence only
- do NOT be polite or formal

Current game state (JSON):
{state}

User said: \"{utterance}\"

Reply with ONE short, snarky sentence."
    )
}
