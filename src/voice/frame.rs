//! PCM frames and finalized utterances

use std::time::Duration;

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Bytes per 16-bit PCM sample
const BYTES_PER_SAMPLE: usize = 2;

/// A fixed-size block of mono 16-bit PCM samples from the capture device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
}

impl AudioFrame {
    /// Wrap captured samples as a frame
    #[must_use]
    pub const fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// Samples in this frame
    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Root-mean-square amplitude in 16-bit sample units
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let sum_squares: f64 = self
            .samples
            .iter()
            .map(|&s| {
                let s = f64::from(s);
                s * s
            })
            .sum();

        #[allow(clippy::cast_possible_truncation)]
        let rms = (sum_squares / self.samples.len() as f64).sqrt() as f32;
        rms
    }
}

/// One segmented span of speech as little-endian 16-bit PCM bytes
///
/// Immutable once built. An empty utterance means nothing was heard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Utterance {
    pcm: Vec<u8>,
}

impl Utterance {
    /// Concatenate frames in arrival order
    #[must_use]
    pub fn from_frames(frames: &[AudioFrame]) -> Self {
        let total: usize = frames.iter().map(|f| f.samples.len()).sum();
        let mut pcm = Vec::with_capacity(total * BYTES_PER_SAMPLE);

        for frame in frames {
            for sample in &frame.samples {
                pcm.extend_from_slice(&sample.to_le_bytes());
            }
        }

        Self { pcm }
    }

    /// Build from raw little-endian PCM bytes
    #[must_use]
    pub const fn from_pcm(pcm: Vec<u8>) -> Self {
        Self { pcm }
    }

    /// Raw PCM bytes, as sent to the recognizer
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.pcm
    }

    /// Whether nothing was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    /// Decoded samples
    #[must_use]
    pub fn samples(&self) -> Vec<i16> {
        self.pcm
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    /// Playback duration at [`SAMPLE_RATE`]
    #[must_use]
    pub fn duration(&self) -> Duration {
        let samples = (self.pcm.len() / BYTES_PER_SAMPLE) as u64;
        Duration::from_micros(samples * 1_000_000 / u64::from(SAMPLE_RATE))
    }
}
