use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tapvoice::bridge::{Command as GameCommand, Difficulty, GameStateApi, Stage, StatePatch};
use tapvoice::daemon::build_synthesis;
use tapvoice::voice::{
    AudioFrame, AudioPlayback, Microphone, PlaybackHandle, SAMPLE_RATE, UtteranceSource,
    samples_to_wav,
};
use tapvoice::{Config, Daemon, StateBridge};

/// Tapvoice - talk to your game
#[derive(Parser)]
#[command(name = "tapvoice", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable proactive narration
    #[arg(long)]
    no_narrator: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Segment one utterance from the microphone
    TestMic {
        /// Write the utterance to a WAV file
        #[arg(short, long)]
        wav: Option<PathBuf>,
    },
    /// Test speaker output
    TestSpeaker,
    /// Synthesize and play a line
    Say {
        /// Text to speak
        text: String,
    },
    /// Print the game-state snapshot, optionally patching fields first
    State {
        #[arg(long)]
        difficulty: Option<Difficulty>,
        #[arg(long)]
        volume: Option<u8>,
        #[arg(long)]
        stage: Option<Stage>,
        #[arg(long)]
        hp: Option<i64>,
        #[arg(long)]
        enemies: Option<i64>,
    },
    /// Raise or clear a one-shot game command (start, pause, resume, restart, exit)
    Command {
        name: GameCommand,
        /// Clear the flag instead of raising it
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,tapvoice=info",
        1 => "info,tapvoice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if cli.no_narrator {
        config.narrator.enabled = false;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { wav } => test_mic(&config, wav).await,
            Command::TestSpeaker => test_speaker(),
            Command::Say { text } => say(&config, &text).await,
            Command::State {
                difficulty,
                volume,
                stage,
                hp,
                enemies,
            } => {
                let patch = StatePatch {
                    difficulty,
                    volume,
                    stage,
                    remaining_enemies: enemies,
                    player_hp: hp,
                };
                show_state(&config, &patch).await
            }
            Command::Command { name, clear } => send_command(&config, name, clear).await,
        };
    }

    tracing::debug!(?config, "loaded configuration");
    tracing::info!("starting tapvoice");

    Daemon::new(config).run().await?;

    Ok(())
}

/// Segment one utterance with the live endpointer
#[allow(clippy::future_not_send)]
async fn test_mic(config: &Config, wav: Option<PathBuf>) -> anyhow::Result<()> {
    println!(
        "Listening (threshold {:.0}, up to {}s)... speak now!\n",
        config.audio.energy_threshold,
        config.audio.listen_timeout.as_secs()
    );

    let mut microphone = Microphone::open(config.audio.clone())?;
    let utterance = microphone.next_utterance().await;

    if utterance.is_empty() {
        println!("No speech detected. If that seems wrong, check:");
        println!("  1. Run: arecord -l (to list devices)");
        println!("  2. Try a lower TAPVOICE_ENERGY_THRESHOLD");
        return Ok(());
    }

    let samples = utterance.samples();
    let rms = AudioFrame::new(samples.clone()).rms();
    println!(
        "Captured {:.2}s of speech, RMS {rms:.1}",
        utterance.duration().as_secs_f32()
    );

    if let Some(path) = wav {
        std::fs::write(&path, samples_to_wav(&samples, SAMPLE_RATE)?)?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    // 2 seconds of 440Hz at the 24kHz playback rate
    let sample_rate = 24000_u16;
    let frequency = 440.0_f32;
    let samples: Vec<f32> = (0..u32::from(sample_rate) * 2)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f32 / f32::from(sample_rate);
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    playback.play_samples_blocking(samples)?;

    println!("If you heard the tone, your speakers are working!");
    Ok(())
}

/// Synthesize and play a line through the cache
async fn say(config: &Config, text: &str) -> anyhow::Result<()> {
    let playback = PlaybackHandle::spawn()?;
    let synthesis = build_synthesis(&config.synthesis, Arc::new(playback))?;

    let audio = synthesis
        .audio_for(text, &config.synthesis.voice)
        .await
        .ok_or_else(|| anyhow::anyhow!("synthesis failed"))?;
    println!("Got {} bytes of audio", audio.len());

    synthesis.speak(text).await;
    Ok(())
}

/// Print the snapshot, applying `patch` first if it sets anything
async fn show_state(config: &Config, patch: &StatePatch) -> anyhow::Result<()> {
    let bridge = StateBridge::new(&config.game_state)?;

    let snapshot = if patch.is_empty() {
        bridge.read_snapshot().await
    } else {
        bridge.write_fields(patch).await
    }
    .ok_or_else(|| anyhow::anyhow!("game-state service unavailable at {}", config.game_state.url))?;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Raise or clear a one-shot flag
async fn send_command(config: &Config, command: GameCommand, clear: bool) -> anyhow::Result<()> {
    let bridge = StateBridge::new(&config.game_state)?;

    let accepted = if clear {
        bridge.clear_command(command).await
    } else {
        bridge.issue_command(command).await
    };

    if !accepted {
        anyhow::bail!("game-state service did not accept the command");
    }

    let verb = if clear { "Cleared" } else { "Raised" };
    println!("{verb} want_{}", command.as_str());
    Ok(())
}
