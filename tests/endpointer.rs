//! Endpointer segmentation over a timed frame stream
//!
//! Frames are produced at the real capture cadence (1024 samples at 16kHz,
//! 64ms apart) on a paused clock, so timing is exact and instant.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use tapvoice::config::AudioConfig;
use tapvoice::voice::{AudioFrame, Endpointer};

const FRAME: Duration = Duration::from_millis(64);
const LOUD: i16 = 2000;
const QUIET: i16 = 10;

/// Feed `(amplitude, count)` runs at capture cadence, then keep the stream
/// open with silence until `tail` frames have been sent
fn produce(runs: Vec<(i16, usize)>, tail: usize) -> mpsc::Receiver<AudioFrame> {
    let (tx, rx) = mpsc::channel(1024);

    tokio::spawn(async move {
        let frames = runs
            .into_iter()
            .flat_map(|(amplitude, count)| std::iter::repeat_n(amplitude, count))
            .chain(std::iter::repeat_n(QUIET, tail));

        for amplitude in frames {
            if tx.send(AudioFrame::new(vec![amplitude; 1024])).await.is_err() {
                return;
            }
            tokio::time::sleep(FRAME).await;
        }
    });

    rx
}

fn amplitudes(samples: &[i16]) -> Vec<i16> {
    samples.chunks(1024).map(|chunk| chunk[0]).collect()
}

#[tokio::test(start_paused = true)]
async fn utterance_starts_at_first_loud_frame_and_ends_on_silence() {
    let mut frames = produce(vec![(QUIET, 5), (LOUD, 10)], 40);
    let mut endpointer = Endpointer::new(AudioConfig::default());
    let started = Instant::now();

    let utterance = endpointer.segment(&mut frames).await;
    let elapsed = started.elapsed();

    let amps = amplitudes(&utterance.samples());
    assert_eq!(amps.first(), Some(&LOUD), "leading silence must not be buffered");
    assert_eq!(amps.iter().filter(|&&a| a == LOUD).count(), 10);
    assert!(amps[10..].iter().all(|&a| a == QUIET));

    // Last loud frame arrives at 14 * 64ms; the 600ms silence tail follows
    let last_voice = FRAME * 14;
    assert!(elapsed >= last_voice + Duration::from_millis(600));
    assert!(elapsed < last_voice + Duration::from_millis(600) + FRAME);
}

#[tokio::test(start_paused = true)]
async fn continuous_speech_is_cut_at_max_duration() {
    let mut frames = produce(vec![(LOUD, 200)], 0);
    let mut endpointer = Endpointer::new(AudioConfig::default());
    let started = Instant::now();

    let utterance = endpointer.segment(&mut frames).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(6000));
    assert!(elapsed < Duration::from_millis(6000) + FRAME);
    assert!(utterance.duration() <= Duration::from_millis(6000) + FRAME);
    assert!(utterance.duration() >= Duration::from_millis(5900));
}

#[tokio::test(start_paused = true)]
async fn brief_blip_waits_for_min_speech() {
    let config = AudioConfig {
        silence_timeout: Duration::from_millis(100),
        min_speech: Duration::from_millis(500),
        ..AudioConfig::default()
    };
    let mut frames = produce(vec![(LOUD, 1)], 40);
    let mut endpointer = Endpointer::new(config);
    let started = Instant::now();

    let utterance = endpointer.segment(&mut frames).await;

    assert!(started.elapsed() >= Duration::from_millis(500));
    assert!(!utterance.is_empty());
}

#[tokio::test(start_paused = true)]
async fn silence_returns_empty_after_listen_timeout() {
    let mut frames = produce(vec![], 400);
    let mut endpointer = Endpointer::new(AudioConfig::default());
    let started = Instant::now();

    let utterance = endpointer.segment(&mut frames).await;

    assert!(utterance.is_empty());
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert!(started.elapsed() < Duration::from_secs(10) + FRAME);
}

#[tokio::test(start_paused = true)]
async fn closed_stream_returns_what_was_buffered() {
    let (tx, mut rx) = mpsc::channel(8);
    tx.send(AudioFrame::new(vec![LOUD; 1024])).await.unwrap();
    drop(tx);

    let mut endpointer = Endpointer::new(AudioConfig::default());
    let utterance = endpointer.segment(&mut rx).await;

    assert_eq!(utterance.samples().len(), 1024);
}
