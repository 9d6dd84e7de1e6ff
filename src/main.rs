use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use streamscribe::audio::{AudioCapture, CaptureFactory, CaptureStrategy, FileDevice, InputDevice};
use streamscribe::output::{render, Output};
use streamscribe::{
    spawn_pipeline, spawn_relay, AppState, Config, RunningFlag, SessionEvent, SessionFactory,
    SessionMode, TranscriptionSession,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "streamscribe", version, about = "Live speech transcription relay and client")]
struct Cli {
    /// Config file (extension optional); missing files are ignored
    #[arg(long, global = true, default_value = "config/streamscribe")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Accept client WebSockets and relay them to the transcription engine
    Relay(RelayArgs),
    /// Stream audio to a relay and print transcripts
    Client(ClientArgs),
}

#[derive(Args)]
struct RelayArgs {
    #[arg(long)]
    bind: Option<String>,

    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args)]
struct ClientArgs {
    #[arg(long)]
    relay_url: Option<String>,

    /// Scripted transcripts, no network or audio device
    #[arg(long)]
    mock: bool,

    /// Replay a WAV file instead of the microphone
    #[arg(long)]
    file: Option<PathBuf>,

    #[arg(long)]
    no_reconnect: bool,

    /// Prefix transcript lines with the local time
    #[arg(long)]
    timestamps: bool,

    #[arg(long, value_enum, default_value_t = StrategyArg::Streaming)]
    strategy: StrategyArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Streaming,
    Buffered,
}

impl From<StrategyArg> for CaptureStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Streaming => CaptureStrategy::Streaming,
            StrategyArg::Buffered => CaptureStrategy::Buffered,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    match cli.command {
        Command::Relay(args) => run_relay(cfg, args).await,
        Command::Client(args) => run_client(cfg, args).await,
    }
}

async fn run_relay(mut cfg: Config, args: RelayArgs) -> Result<()> {
    if let Some(bind) = args.bind {
        cfg.relay.bind = bind;
    }
    if let Some(port) = args.port {
        cfg.relay.port = port;
    }
    if cfg.upstream.api_key.is_empty() {
        bail!("Missing GEMINI_API_KEY (or upstream.api_key in the config file)");
    }

    info!("Upstream model: {}", cfg.upstream.model);
    if cfg.relay.upstream_idle_timeout_secs.is_none() {
        info!("No upstream idle timeout; silent upstream sessions stay open");
    }

    let state = AppState::new(Arc::new(cfg.connector()), cfg.relay.pairing_config());
    let (_, server) = spawn_relay(&cfg.relay.bind_addr(), state).await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutting down relay"),
        _ = server => warn!("Relay server exited"),
    }

    Ok(())
}

#[cfg(feature = "microphone")]
fn microphone() -> Result<Arc<dyn InputDevice>> {
    Ok(Arc::new(streamscribe::audio::MicrophoneDevice::new()))
}

#[cfg(not(feature = "microphone"))]
fn microphone() -> Result<Arc<dyn InputDevice>> {
    bail!("Built without microphone support; use --file or --mock, or rebuild with --features microphone")
}

fn print_event(event: &SessionEvent, timestamps: bool) {
    let now = chrono::Local::now().time();
    match render(event, timestamps, now) {
        Output::Line(line) => println!("\r{}", line),
        Output::Interim(text) => {
            print!("\r{}", text);
            std::io::stdout().flush().ok();
        }
        Output::Status(status) => info!("Status: {}", status),
        Output::Model(text) => info!("Model: {}", text),
    }
}

async fn run_client(cfg: Config, args: ClientArgs) -> Result<()> {
    let mut session_config = cfg.client.session_config();
    if let Some(url) = args.relay_url {
        session_config.relay_url = url;
    }
    if args.no_reconnect {
        session_config.auto_reconnect = false;
    }

    let mode = if args.mock {
        SessionMode::Mock
    } else {
        SessionMode::Live
    };
    info!("Client mode: {:?}", mode);

    let running = RunningFlag::new(true);
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let session = SessionFactory::create(mode, session_config, running.clone(), events_tx);

    session.connect().await;

    let mut capture = None;
    let mut pipeline = None;

    if mode == SessionMode::Mock {
        session.start().await;
    } else {
        let device: Arc<dyn InputDevice> = match &args.file {
            Some(path) => Arc::new(FileDevice::new(path)),
            None => microphone()?,
        };

        let capture_config = cfg.audio.capture_config();
        match CaptureFactory::start_with_fallback(args.strategy.into(), device, &capture_config)
            .await
        {
            Ok((started, frames)) => {
                info!("Capturing with the {} strategy", started.name());
                pipeline = Some(spawn_pipeline(frames, Arc::clone(&session)));
                capture = Some(started);
            }
            Err(e) => {
                eprintln!("[ERR] {}", e);
                running.set(false);
                session.close().await;
                return Err(e.into());
            }
        }
    }

    let audio_finished = async move {
        match pipeline {
            Some(handle) => handle.await.unwrap_or(0),
            None => std::future::pending().await,
        }
    };
    tokio::pin!(audio_finished);
    let mut audio_done = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            frames = &mut audio_finished, if !audio_done => {
                audio_done = true;
                info!("Audio input ended after {} frames; waiting for final transcripts", frames);
                session.stop().await;
            }
            event = events.recv() => match event {
                Some(event) => print_event(&event, args.timestamps),
                None => break,
            },
        }
    }

    running.set(false);
    if let Some(mut capture) = capture {
        capture.stop().await;
    }
    session.stop().await;
    session.close().await;

    // Let trailing status events reach the terminal
    let drain = tokio::time::sleep(Duration::from_millis(200));
    tokio::pin!(drain);
    loop {
        tokio::select! {
            _ = &mut drain => break,
            event = events.recv() => match event {
                Some(event) => print_event(&event, args.timestamps),
                None => break,
            },
        }
    }

    info!("Stopped");
    Ok(())
}
