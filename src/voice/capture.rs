//! Audio capture from microphone

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use tokio::sync::mpsc;

use super::{AudioFrame, SAMPLE_RATE};
use crate::{Error, Result};

/// Captures audio from the default input device
///
/// The device callback slices incoming samples into fixed-size frames and
/// hands them to a bounded channel; the receiving side is the only consumer.
pub struct AudioCapture {
    config: StreamConfig,
    block_size: usize,
    queue_frames: usize,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new(block_size: usize, queue_frames: usize) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            block_size,
            "audio capture initialized"
        );

        Ok(Self {
            config,
            block_size: block_size.max(1),
            queue_frames: queue_frames.max(1),
            stream: None,
        })
    }

    /// Start capturing audio
    ///
    /// Returns the receiving end of the frame queue. Frames that arrive while
    /// the queue is full are dropped.
    ///
    /// # Errors
    ///
    /// Returns error if capture is already running or the stream fails to start
    pub fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.stream.is_some() {
            return Err(Error::Audio("audio capture already started".to_string()));
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device".to_string()))?;

        let (tx, rx) = mpsc::channel(self.queue_frames);
        let block_size = self.block_size;
        let mut pending: Vec<i16> = Vec::with_capacity(block_size);

        let stream = device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        #[allow(clippy::cast_possible_truncation)]
                        let sample = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                        pending.push(sample);

                        if pending.len() == block_size {
                            let frame = AudioFrame::new(std::mem::replace(
                                &mut pending,
                                Vec::with_capacity(block_size),
                            ));
                            if tx.try_send(frame).is_err() {
                                tracing::trace!("frame queue full, dropping frame");
                            }
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(rx)
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }
}

/// Encode 16-bit samples as WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
