//! Proactive narration of game milestones
//!
//! Polls the game-state snapshot on a fixed interval and speaks each
//! milestone line once per round. Returning to the menu from a round
//! (playing or game over) rearms every milestone.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::time::MissedTickBehavior;

use crate::bridge::{ChatStatus, ConfigUpdate, GameStateApi, GameStateSnapshot, Stage};
use crate::config::NarratorConfig;
use crate::persona;
use crate::synthesis::SynthesisClient;

/// A narrated game-state threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Milestone {
    EnteredMenu,
    LowHealth,
    Dead,
    FewEnemies,
    GameOver,
}

impl Milestone {
    /// Line spoken when the milestone is reached
    #[must_use]
    pub const fn line(self) -> &'static str {
        match self {
            Self::EnteredMenu => persona::MENU_LINE,
            Self::LowHealth => persona::LOW_HP_LINE,
            Self::Dead => persona::DEAD_LINE,
            Self::FewEnemies => persona::FEW_ENEMIES_LINE,
            Self::GameOver => persona::GAME_OVER_LINE,
        }
    }
}

/// Per-round milestone tracking; no I/O
#[derive(Debug, Default)]
pub struct MilestoneTracker {
    low_hp: i64,
    few_enemies: i64,
    spoken: HashSet<Milestone>,
    last_stage: Option<Stage>,
}

impl MilestoneTracker {
    #[must_use]
    pub fn new(low_hp: i64, few_enemies: i64) -> Self {
        Self {
            low_hp,
            few_enemies,
            ..Self::default()
        }
    }

    /// Milestones newly reached by `snapshot`, marking them spoken
    pub fn observe(&mut self, snapshot: &GameStateSnapshot) -> Vec<Milestone> {
        let stage = snapshot.stage;

        if self.last_stage != Some(stage) {
            if stage == Stage::Menu
                && matches!(self.last_stage, Some(Stage::GameOver | Stage::Playing))
            {
                tracing::debug!("back at the menu, rearming milestones");
                self.spoken.clear();
            }
            self.last_stage = Some(stage);
        }

        let hp = snapshot.player_hp;
        let candidates = [
            (Milestone::EnteredMenu, stage == Stage::Menu),
            (
                Milestone::LowHealth,
                stage == Stage::Playing && hp > 0 && hp <= self.low_hp,
            ),
            (Milestone::Dead, stage == Stage::Playing && hp <= 0),
            (
                Milestone::FewEnemies,
                stage == Stage::Playing && snapshot.remaining_enemies <= self.few_enemies,
            ),
            (Milestone::GameOver, stage == Stage::GameOver),
        ];

        candidates
            .into_iter()
            .filter(|&(milestone, holds)| holds && self.spoken.insert(milestone))
            .map(|(milestone, _)| milestone)
            .collect()
    }

    /// Whether `milestone` has been spoken this round
    #[must_use]
    pub fn has_spoken(&self, milestone: Milestone) -> bool {
        self.spoken.contains(&milestone)
    }
}

/// Timer-paced loop speaking milestone lines
pub struct ProactiveNarrator {
    bridge: Arc<dyn GameStateApi>,
    synthesis: Arc<SynthesisClient>,
    config: NarratorConfig,
    tracker: MilestoneTracker,
}

impl ProactiveNarrator {
    #[must_use]
    pub fn new(
        bridge: Arc<dyn GameStateApi>,
        synthesis: Arc<SynthesisClient>,
        config: NarratorConfig,
    ) -> Self {
        let tracker = MilestoneTracker::new(config.low_hp, config.few_enemies);
        Self {
            bridge,
            synthesis,
            config,
            tracker,
        }
    }

    /// Read the snapshot once and speak any newly reached milestones
    pub async fn poll_once(&mut self) -> Vec<Milestone> {
        let Some(snapshot) = self.bridge.read_snapshot().await else {
            return Vec::new();
        };

        let reached = self.tracker.observe(&snapshot);
        for milestone in &reached {
            tracing::info!(?milestone, "narrating milestone");
            self.bridge
                .set_config(ConfigUpdate::ChatStatus(Some(ChatStatus::Speak)))
                .await;
            self.synthesis.speak(milestone.line()).await;
            self.bridge.set_config(ConfigUpdate::ChatStatus(None)).await;
        }

        reached
    }

    /// Poll forever on the configured interval
    pub async fn run(mut self) {
        tracing::info!(interval_ms = self.config.interval.as_millis(), "narrator started");

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }
}
