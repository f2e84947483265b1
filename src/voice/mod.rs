//! Voice processing module
//!
//! Handles audio capture, utterance endpointing, and playback.

mod capture;
mod endpointer;
mod frame;
mod microphone;
mod playback;

pub use capture::{AudioCapture, samples_to_wav};
pub use endpointer::{Decision, EndpointState, Endpointer, FinalizeReason};
pub use frame::{AudioFrame, SAMPLE_RATE, Utterance};
pub use microphone::{Microphone, UtteranceSource};
pub use playback::{AudioPlayback, AudioSink, PlaybackHandle};
