//! lobbyd - the lobby kiosk receptionist daemon.

mod config;
mod providers;
mod users;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lobby_engine::{EngineEvent, FaceSensor, Receptionist};
use lobby_faces::DirStore;
use lobby_responder::Responder;
use lobby_speech::Dispatcher;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use config::LobbyConfig;
use providers::{ConsoleListener, IdleSensor, LogPlayer, LogSynthesizer, ScriptedSensor};

/// Lobby kiosk receptionist.
///
/// Watches a face-embedding sensor, greets known visitors by name, walks
/// strangers through a spoken enrollment flow, and answers simple
/// questions. The bundled providers replay a JSONL frame script and read
/// utterances from stdin; real camera and speech backends plug in through
/// the provider traits.
#[derive(Parser)]
#[command(name = "lobbyd")]
#[command(about = "Lobby kiosk receptionist")]
#[command(version)]
struct Cli {
    /// Config file (YAML; a missing file means defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Identity store directory (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the receptionist
    Run {
        /// JSONL frame script to replay instead of a camera
        #[arg(long)]
        script: Option<PathBuf>,
    },
    /// Manage known people
    Users {
        #[command(subcommand)]
        command: users::UsersCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let mut cfg = LobbyConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        cfg.data_dir = dir.clone();
    }

    match &cli.command {
        Commands::Run { script } => run(&cfg, script.as_deref()).await,
        Commands::Users { command } => users::run(command, &cfg.data_dir),
    }
}

async fn run(cfg: &LobbyConfig, script: Option<&Path>) -> Result<()> {
    let store = Arc::new(DirStore::open(&cfg.data_dir)?);
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(LogSynthesizer),
        Arc::new(LogPlayer),
        cfg.speech.cache_capacity,
    ));
    let engine = Arc::new(Receptionist::new(
        store,
        dispatcher,
        Responder::with_defaults(),
        cfg.engine_config(),
    ));

    // Telemetry to the log: per-frame overlay records at debug, the rest
    // at info.
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => match event {
                        EngineEvent::Frame { .. } => debug!(event = %json, "frame"),
                        _ => info!(event = %json, "engine event"),
                    },
                    Err(err) => warn!(error = %err, "event serialization failed"),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let sensor: Box<dyn FaceSensor> = match script {
        Some(path) => Box::new(ScriptedSensor::from_file(path)?),
        None => Box::new(IdleSensor::new(Duration::from_millis(500))),
    };
    let listener = Arc::new(ConsoleListener::new());

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            cancel.cancel();
        }
    });

    engine.run(sensor, listener).await;
    Ok(())
}
