use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lexchat::assistant::TurnOutcome;
use lexchat::aws::{CognitoCredentialProvider, CredentialProvider};
use lexchat::db::{self, KvStore};
use lexchat::voice::{AudioPlayback, AudioSink, MuteSink, Pcm, PollyClient, SpeakerSink, TextToSpeech};
use lexchat::{Assistant, Config, SessionStore, Transcript, config, console};

/// lexchat - Talk to a Lex V2 bot from the terminal, with spoken replies
#[derive(Parser)]
#[command(name = "lexchat", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Don't play replies (they are still synthesized)
    #[arg(long, env = "LEXCHAT_MUTE", value_parser = clap::builder::BoolishValueParser::new())]
    mute: bool,

    /// Directory holding the session database
    #[arg(long, env = "LEXCHAT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Send one message and wait for the spoken reply
    Say {
        /// Message for the bot
        text: String,
    },
    /// Print the current session ID
    Session,
    /// Start a new session
    Reset,
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hola, esta es una prueba de la voz.")]
        text: String,
    },
    /// Interactive first-run setup
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,lexchat=info",
        1 => "info,lexchat=debug",
        2 => "debug",
        _ => "trace",
    };

    // stdout carries the transcript
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Say { text } => say(cli.data_dir, cli.mute, &text).await,
            Command::Session => show_session(cli.data_dir),
            Command::Reset => reset_session(cli.data_dir),
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&text).await,
            Command::Setup => lexchat::setup::run_setup(),
        };
    }

    let config = load_config(cli.data_dir)?;
    tracing::debug!(?config, "loaded configuration");

    let assistant = Assistant::from_config(&config, Transcript::stdout(), sink(cli.mute))?;
    tracing::info!(
        region = %config.aws.region,
        bot = %config.bot.bot_id,
        locale = %config.bot.locale_id,
        voice = assistant.voice_enabled(),
        "lexchat ready"
    );

    console::run(Arc::new(assistant)).await?;

    Ok(())
}

fn load_config(data_dir: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut config = Config::load()?;
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    Ok(config)
}

fn sink(mute: bool) -> Arc<dyn AudioSink> {
    if mute {
        Arc::new(MuteSink)
    } else {
        Arc::new(SpeakerSink)
    }
}

fn session_store(data_dir: Option<PathBuf>) -> anyhow::Result<SessionStore> {
    let dir = data_dir.unwrap_or_else(config::data_dir);
    let pool = db::init(dir.join("lexchat.db"))?;
    Ok(SessionStore::new(KvStore::new(pool)))
}

/// Run a single turn
async fn say(data_dir: Option<PathBuf>, mute: bool, text: &str) -> anyhow::Result<()> {
    let config = load_config(data_dir)?;
    let assistant = Assistant::from_config(&config, Transcript::stdout(), sink(mute))?;

    match assistant.submit(text).await {
        TurnOutcome::Completed { playback, .. } => {
            playback.finished().await;
            Ok(())
        }
        TurnOutcome::Failed { message } => anyhow::bail!("turn failed: {message}"),
        TurnOutcome::Ignored => anyhow::bail!("nothing to send"),
        TurnOutcome::Busy => anyhow::bail!("a turn is already in progress"),
    }
}

/// Print the current session ID
fn show_session(data_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let token = session_store(data_dir)?.get_or_create()?;
    println!("Session ID: {token}");
    Ok(())
}

/// Replace the stored session ID
fn reset_session(data_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let token = session_store(data_dir)?.reset()?;
    println!("🔄 Nueva sesión: {token}");
    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    // 2 seconds of 440Hz at 24kHz
    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    let num_samples = sample_rate * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    let pcm = Pcm {
        samples,
        sample_rate,
    };
    tokio::task::spawn_blocking(move || AudioPlayback::new()?.play_blocking(&pcm)).await??;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Test TTS output via Polly
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;

    let credentials = Arc::new(CognitoCredentialProvider::new(
        &config.endpoints.cognito,
        &config.aws.identity_pool_id,
    )?);
    credentials.refresh().await?;

    let polly = PollyClient::new(&config.endpoints.polly, &config.aws.region, credentials)?;
    let tts = TextToSpeech::new(Arc::new(polly), &config.voice.voice_id)?;

    println!("Synthesizing speech with voice {}...", tts.voice_id());
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    // Check MP3 header
    if let [a, b, c, d, ..] = mp3_data.as_slice() {
        println!("First 4 bytes: {a:02x} {b:02x} {c:02x} {d:02x}");
    }

    println!("Playing audio...");
    tokio::task::spawn_blocking(move || AudioPlayback::new()?.play_mp3_blocking(&mp3_data))
        .await??;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
