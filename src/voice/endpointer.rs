//! Energy-based utterance endpointing
//!
//! Splits a live stream of PCM frames into utterances. A frame whose RMS
//! exceeds the energy threshold starts an utterance; the utterance ends after
//! a silence tail (once a minimum speech length has elapsed) or at a hard
//! maximum length.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{AudioFrame, Utterance};
use crate::config::AudioConfig;

/// How often the segmentation loop re-checks timers when no frame arrives
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// State of the endpointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Waiting for speech
    Idle,
    /// Speech detected, buffering frames
    Speaking,
}

/// Why a speaking span was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeReason {
    /// Silence tail reached after the minimum speech length
    Silence,
    /// Hard cap on utterance length reached
    MaxDuration,
}

/// Outcome of checking the timers at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep collecting frames
    Continue,
    /// The current utterance is complete
    Finalize(FinalizeReason),
    /// No speech started within the listen timeout
    NoSpeech,
}

/// Segments utterances from a frame stream
#[derive(Debug)]
pub struct Endpointer {
    config: AudioConfig,
    state: EndpointState,
    frames: Vec<AudioFrame>,
    listen_started: Instant,
    speech_started: Instant,
    last_voice: Instant,
}

impl Endpointer {
    /// Create an idle endpointer whose listen window starts now
    #[must_use]
    pub fn new(config: AudioConfig) -> Self {
        let now = Instant::now();
        Self {
            config,
            state: EndpointState::Idle,
            frames: Vec::new(),
            listen_started: now,
            speech_started: now,
            last_voice: now,
        }
    }

    /// Discard any buffered audio and start a new listen window at `now`
    pub fn reset(&mut self, now: Instant) {
        self.state = EndpointState::Idle;
        self.frames.clear();
        self.listen_started = now;
    }

    /// Feed one frame that arrived at `now`
    ///
    /// Returns true if this frame started a new utterance
    pub fn push_frame(&mut self, frame: AudioFrame, now: Instant) -> bool {
        let rms = frame.rms();
        let is_voice = rms > self.config.energy_threshold;

        match self.state {
            EndpointState::Idle => {
                if !is_voice {
                    return false;
                }

                self.state = EndpointState::Speaking;
                self.frames.clear();
                self.frames.push(frame);
                self.speech_started = now;
                self.last_voice = now;
                tracing::debug!(rms, "speech started");
                true
            }
            EndpointState::Speaking => {
                self.frames.push(frame);
                if is_voice {
                    self.last_voice = now;
                }
                tracing::trace!(rms, is_voice, frames = self.frames.len(), "speaking");
                false
            }
        }
    }

    /// Check the timers at `now`
    #[must_use]
    pub fn poll(&self, now: Instant) -> Decision {
        match self.state {
            EndpointState::Idle => {
                if now.saturating_duration_since(self.listen_started) >= self.config.listen_timeout
                {
                    Decision::NoSpeech
                } else {
                    Decision::Continue
                }
            }
            EndpointState::Speaking => {
                let speech = now.saturating_duration_since(self.speech_started);
                let silence = now.saturating_duration_since(self.last_voice);

                if speech >= self.config.max_speech {
                    Decision::Finalize(FinalizeReason::MaxDuration)
                } else if silence >= self.config.silence_timeout
                    && speech >= self.config.min_speech
                {
                    Decision::Finalize(FinalizeReason::Silence)
                } else {
                    Decision::Continue
                }
            }
        }
    }

    /// Take the buffered frames as an utterance and return to idle
    pub fn take_utterance(&mut self) -> Utterance {
        let utterance = Utterance::from_frames(&self.frames);
        self.frames.clear();
        self.state = EndpointState::Idle;
        utterance
    }

    /// Block until one utterance is segmented from `frames`
    ///
    /// Returns an empty utterance when nothing is heard within the listen
    /// timeout. If the stream closes mid-utterance, whatever was buffered is
    /// returned.
    pub async fn segment(&mut self, frames: &mut mpsc::Receiver<AudioFrame>) -> Utterance {
        self.reset(Instant::now());

        loop {
            match tokio::time::timeout(POLL_INTERVAL, frames.recv()).await {
                Ok(Some(frame)) => {
                    self.push_frame(frame, Instant::now());
                }
                Ok(None) => {
                    tracing::debug!("capture stream closed");
                    return self.take_utterance();
                }
                Err(_) => {}
            }

            match self.poll(Instant::now()) {
                Decision::Continue => {}
                Decision::NoSpeech => {
                    tracing::debug!("no speech detected in this window");
                    self.reset(Instant::now());
                    return Utterance::default();
                }
                Decision::Finalize(reason) => {
                    let utterance = self.take_utterance();
                    tracing::debug!(
                        ?reason,
                        duration_ms = utterance.duration().as_millis(),
                        "utterance finalized"
                    );
                    return utterance;
                }
            }
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> EndpointState {
        self.state
    }

    #[cfg(test)]
    fn buffered_frames(&self) -> usize {
        self.frames.len()
    }
}
