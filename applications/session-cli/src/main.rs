/// Soul Session - terminal host for the playback session coordinator
use clap::Parser;
use soul_session::{
    EngineStatus, ExclusiveOutput, FileSessionStore, PlaybackSession, SessionEvent, SessionHandle,
    SessionServices, TransportCommand,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod catalog;
mod commands;
mod config;
mod simulated;

use commands::Input;
use config::CliConfig;
use simulated::SimulatedEngine;

#[derive(Parser)]
#[command(name = "soul-session")]
#[command(about = "Drive a Soul Player playback session from the terminal", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SOUL_SESSION_CONFIG")]
    config: Option<PathBuf>,

    /// Session file (overrides configuration)
    #[arg(long)]
    session_file: Option<PathBuf>,

    /// JSON catalog (overrides configuration)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Start without restoring the saved session
    #[arg(long)]
    fresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; stdout belongs to the prompt
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soul_session=info,soul_session_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = CliConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.session_file {
        config.session_file = path;
    }
    if let Some(path) = cli.catalog {
        config.catalog = Some(path);
    }
    config.validate()?;

    tracing::info!("Session file: {}", config.session_file.display());
    let resolver = catalog::load(config.catalog.as_deref()).await?;

    let (engine_tx, engine_rx) = mpsc::unbounded_channel();
    let engine = Arc::new(SimulatedEngine::new(
        Duration::from_millis(config.load_latency_ms),
        engine_tx,
    ));

    let session = PlaybackSession::spawn(
        config.session.clone(),
        SessionServices {
            engine: engine.clone(),
            resolver: Arc::new(resolver),
            store: Arc::new(FileSessionStore::new(config.session_file.clone())),
            focus: Arc::new(ExclusiveOutput),
        },
    );

    tokio::spawn(forward_engine_events(engine_rx, session.clone()));
    tokio::spawn(print_events(session.events()));

    if !cli.fresh {
        session.send(TransportCommand::RestoreSavedState).await?;
        if !session.queue().borrow().is_empty() {
            print_queue(&session);
        }
    }

    println!("{}", commands::HELP);
    run_repl(&session, &engine).await?;

    session.shutdown().await?;
    tracing::info!("Bye");
    Ok(())
}

/// Read commands until `quit`, end of input or Ctrl-C
async fn run_repl(session: &SessionHandle, engine: &SimulatedEngine) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            return Ok(());
        };

        let input = match commands::parse(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(e) => {
                println!("! {e}");
                continue;
            }
        };

        match input {
            Input::Command(command) => match session.send(command).await {
                Ok(outcome) => println!("ok: {outcome:?}"),
                Err(e) => println!("! {e}"),
            },
            Input::Focus(event) => session.notify_focus(event).await?,
            Input::ShowQueue => print_queue(session),
            Input::ShowStatus => print_status(session, engine),
            Input::Help => println!("{}", commands::HELP),
            Input::Quit => return Ok(()),
        }
    }
}

async fn forward_engine_events(
    mut events: mpsc::UnboundedReceiver<soul_session::EngineEvent>,
    session: SessionHandle,
) {
    while let Some(event) = events.recv().await {
        if session.notify_engine(event).await.is_err() {
            break;
        }
    }
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::TrackChanged { audio_id, .. }) => println!("> now on {audio_id}"),
            Ok(SessionEvent::StatusChanged(status)) => println!("> {status:?}"),
            Ok(SessionEvent::ModeChanged(mode)) => {
                println!("> shuffle {:?}, repeat {:?}", mode.shuffle, mode.repeat);
            }
            Ok(SessionEvent::FocusChanged(state)) => println!("> focus {state:?}"),
            Ok(SessionEvent::QueueEnded) => println!("> end of queue"),
            Ok(SessionEvent::Error { message }) => println!("> error: {message}"),
            Ok(SessionEvent::QueueChanged { .. } | SessionEvent::CommandRejected { .. }) => {}
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::debug!("Event printer lagged by {}", missed);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_queue(session: &SessionHandle) {
    let queue = session.queue().borrow().clone();
    let title = queue.title.as_deref().unwrap_or("Queue");
    println!("{title} ({}, {} entries)", queue.source, queue.len());
    for (index, audio) in queue.audios.iter().enumerate() {
        let marker = if queue.is_valid && index == queue.current_index {
            '>'
        } else {
            ' '
        };
        println!("{marker} {index:>3}  {:<8} {}", audio.id, audio.title);
    }
}

fn print_status(session: &SessionHandle, engine: &SimulatedEngine) {
    let transport = session.transport().borrow().clone();
    let progress = *session.progress().borrow();
    let mode = *session.mode().borrow();

    let current = transport
        .current
        .as_ref()
        .map_or_else(|| "-".to_string(), ToString::to_string);
    println!(
        "{:?} {} {:.0}s/{:.0}s ({:.0}%) vol {:.0}% shuffle {:?} repeat {:?}{}",
        transport.status,
        current,
        progress.elapsed.as_secs_f64(),
        progress.total.as_secs_f64(),
        progress.progress() * 100.0,
        engine.volume() * 100.0,
        mode.shuffle,
        mode.repeat,
        if transport.awaiting_focus {
            " (waiting for focus)"
        } else {
            ""
        },
    );
    if transport.status == EngineStatus::Error {
        println!("  last load failed; `next` or `play` to retry");
    }
}
