//! Live utterance source backed by the capture device

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{AudioCapture, AudioFrame, Endpointer, Utterance};
use crate::Result;
use crate::config::AudioConfig;

/// Produces one utterance per call
///
/// Not `Send`: the live implementation owns a capture stream that must stay on
/// the thread that created it.
#[async_trait(?Send)]
pub trait UtteranceSource {
    /// Block until the next utterance is segmented
    ///
    /// An empty utterance means nothing was heard in this listen window.
    async fn next_utterance(&mut self) -> Utterance;
}

/// Microphone capture feeding the endpointer
pub struct Microphone {
    capture: AudioCapture,
    frames: mpsc::Receiver<AudioFrame>,
    endpointer: Endpointer,
}

impl Microphone {
    /// Open the default input device and start capturing
    ///
    /// # Errors
    ///
    /// Returns error if no usable input device exists
    pub fn open(config: AudioConfig) -> Result<Self> {
        let mut capture = AudioCapture::new(config.block_size, config.queue_frames)?;
        let frames = capture.start()?;

        Ok(Self {
            capture,
            frames,
            endpointer: Endpointer::new(config),
        })
    }
}

#[async_trait(?Send)]
impl UtteranceSource for Microphone {
    async fn next_utterance(&mut self) -> Utterance {
        // Frames queued while the engine was busy (or speaking) are stale
        let mut stale = 0usize;
        while self.frames.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            tracing::trace!(frames = stale, "discarded stale frames");
        }

        tracing::debug!("listening for one utterance");
        self.endpointer.segment(&mut self.frames).await
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        self.capture.stop();
    }
}
