//! Audio playback to speakers
//!
//! cpal streams are not `Send`, so the output device lives on a dedicated
//! thread. [`PlaybackHandle`] queues clips to it and waits for each to drain,
//! which also keeps clips from both loops from overlapping.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};
use tokio::sync::oneshot;

use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Plays encoded audio to completion
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Decode and play `audio`, returning once playback has finished
    async fn play(&self, audio: &[u8]) -> Result<()>;
}

/// Plays audio to the default output device
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { device, config })
    }

    /// Play audio from MP3 bytes, blocking until the device drains
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3_blocking(&self, mp3_data: &[u8]) -> Result<()> {
        let (samples, sample_rate) = decode_mp3(mp3_data)?;
        let samples = if sample_rate == 0 || sample_rate == PLAYBACK_SAMPLE_RATE {
            samples
        } else {
            resample(&samples, sample_rate, PLAYBACK_SAMPLE_RATE)?
        };
        self.play_samples_blocking(samples)
    }

    /// Play mono f32 samples at the playback rate, blocking until done
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built or started
    pub fn play_samples_blocking(&self, samples: Vec<f32>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let channels = usize::from(self.config.channels);
        let sample_count = samples.len();
        let finished = Arc::new(AtomicBool::new(false));
        let finished_clone = Arc::clone(&finished);
        let mut position = 0usize;

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(position).copied().unwrap_or_else(|| {
                            finished_clone.store(true, Ordering::Release);
                            0.0
                        });

                        for out in frame.iter_mut() {
                            *out = sample;
                        }

                        if position < samples.len() {
                            position += 1;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Playback(e.to_string()))?;

        stream.play().map_err(|e| Error::Playback(e.to_string()))?;

        // Poll for completion with a timeout slightly past the clip length
        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let timeout = Duration::from_millis(duration_ms + 500);
        let start = Instant::now();

        while !finished.load(Ordering::Acquire) {
            if start.elapsed() > timeout {
                tracing::warn!("playback did not drain before timeout");
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        // Small delay to ensure audio finishes
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");

        Ok(())
    }
}

/// A queued clip and the channel that reports its completion
struct PlaybackJob {
    audio: Vec<u8>,
    done: oneshot::Sender<Result<()>>,
}

/// Cloneable handle to the playback thread
#[derive(Clone)]
pub struct PlaybackHandle {
    jobs: std::sync::mpsc::Sender<PlaybackJob>,
}

impl PlaybackHandle {
    /// Open the output device on a dedicated thread
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot start or no output device exists
    pub fn spawn() -> Result<Self> {
        let (jobs, queue) = std::sync::mpsc::channel::<PlaybackJob>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();

        std::thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || {
                let playback = match AudioPlayback::new() {
                    Ok(p) => {
                        let _ = ready_tx.send(Ok(()));
                        p
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                for job in queue {
                    let result = playback.play_mp3_blocking(&job.audio);
                    let _ = job.done.send(result);
                }

                tracing::debug!("playback thread exiting");
            })?;

        ready_rx
            .recv()
            .map_err(|_| Error::Audio("playback thread exited during startup".to_string()))??;

        Ok(Self { jobs })
    }
}

#[async_trait]
impl AudioSink for PlaybackHandle {
    async fn play(&self, audio: &[u8]) -> Result<()> {
        let (done, finished) = oneshot::channel();
        self.jobs
            .send(PlaybackJob {
                audio: audio.to_vec(),
                done,
            })
            .map_err(|_| Error::Playback("playback thread is gone".to_string()))?;

        finished
            .await
            .map_err(|_| Error::Playback("playback thread dropped the clip".to_string()))?
    }
}

/// Decode MP3 bytes to mono f32 samples and their sample rate
fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = u32::try_from(frame.sample_rate).unwrap_or(0);

                // Convert i16 samples to f32 and mix stereo down to mono
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::SkippedData) => {}
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Playback(format!("MP3 decode error: {e}"))),
        }
    }

    Ok((samples, sample_rate))
}

/// Resample mono audio using rubato
#[allow(clippy::cast_possible_truncation)]
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    let mut resampler = FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, 1024, 2, 1)
        .map_err(|e| Error::Playback(format!("resampler init failed: {e}")))?;
    let chunk_size = resampler.input_frames_next();

    let mut output = Vec::with_capacity(samples.len() * to_rate as usize / from_rate as usize);

    for chunk in samples.chunks(chunk_size) {
        // Zero-pad the tail so the last partial chunk is not lost
        let mut input: Vec<f64> = chunk.iter().map(|&s| f64::from(s)).collect();
        input.resize(chunk_size, 0.0);

        let result = resampler
            .process(&[input], None)
            .map_err(|e| Error::Playback(format!("resample failed: {e}")))?;
        output.extend(result[0].iter().map(|&s| s as f32));
    }

    Ok(output)
}
