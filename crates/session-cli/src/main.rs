//! rusty-chess - play chess against a bot, or watch bots play, in a terminal.
//!
//! Reads commands from stdin and prints session events to stdout. Logs go to
//! stderr; set `RUST_LOG=debug` to see directives and dropped results.

mod command;
mod render;

use anyhow::Context;
use chess_session::{
    ActiveParty, AutoplayBackend, Session, SessionConfig, SessionEvent, SessionHandle,
};
use clap::Parser;
use command::{Command, CommandError};
use engine_bridge::LocalEngine;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;

/// Play chess from the terminal against a random or UCI bot.
#[derive(Parser)]
#[command(name = "rusty-chess")]
#[command(about = "Play chess against a bot, or watch bots play, from the terminal")]
struct Args {
    /// Config file (defaults to rusty-chess.toml in the working directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Let the engine play White
    #[arg(long)]
    white_bot: bool,

    /// Let the engine play Black
    #[arg(long)]
    black_bot: bool,

    /// Use the UCI engine at this path for bot moves
    #[arg(long, value_name = "PATH")]
    uci: Option<PathBuf>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SessionConfig::load_from(path),
        None => SessionConfig::load(),
    }
    .context("loading config")?;
    config.white_autonomous |= args.white_bot;
    config.black_autonomous |= args.black_bot;
    if let Some(path) = args.uci {
        config.autoplay.backend = AutoplayBackend::Uci;
        config.autoplay.engine_path = path;
    }
    tracing::debug!(?config, "configuration");

    let engine = LocalEngine::from_config(&config.autoplay)
        .await
        .with_context(|| format!("starting {:?} engine", config.autoplay.backend))?;
    let session = Session::new(Arc::new(engine), &config);
    let events = session.subscribe();
    let handle = session.spawn();
    tracing::info!(session = %handle.id(), "session ready");

    let printer = tokio::spawn(print_events(events, args.json));
    if !args.json {
        println!("{}", render::view(&handle.view().await?));
        println!("type 'help' for commands");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut quit = false;
    while let Some(line) = lines.next_line().await? {
        match line.parse::<Command>() {
            Ok(Command::Quit) => {
                quit = true;
                break;
            }
            Ok(command) => {
                if let Err(err) = run(&handle, command, args.json).await {
                    eprintln!("error: {}", err);
                }
            }
            Err(CommandError::Empty) => {}
            Err(err) => eprintln!("{}; type 'help' for commands", err),
        }
    }

    if !quit {
        wait_for_bots(&handle).await?;
    }
    drop(handle);
    printer.await?;
    Ok(())
}

async fn run(handle: &SessionHandle, command: Command, json: bool) -> anyhow::Result<()> {
    match command {
        Command::Move(attempt) => handle.attempt_move(attempt).await?,
        Command::Promote(piece) => handle.choose_promotion(piece).await?,
        Command::Toggle(side) => handle.toggle_autonomy(side).await?,
        Command::Bot(side) => handle.set_autonomous(side).await?,
        Command::Manual(side) => handle.set_manual(side).await?,
        Command::Resign => {
            let view = handle.view().await?;
            if let Some(side) = view.party.side() {
                let message = format!("{} resigns; {} wins", side, side.opponent());
                handle.end_game(message).await?;
            }
        }
        Command::Restart => handle.request_restart().await?,
        Command::Resume => handle.resume().await?,
        Command::Board => {
            let view = handle.view().await?;
            if json {
                println!("{}", serde_json::to_string(&view)?);
            } else {
                print!("{}", render::view(&view));
            }
        }
        Command::Help => println!("{}", command::HELP),
        Command::Quit => {}
    }
    Ok(())
}

/// With stdin closed, keeps running while bots still play each other.
async fn wait_for_bots(handle: &SessionHandle) -> anyhow::Result<()> {
    let mut events = handle.subscribe();
    let view = handle.view().await?;
    let bots_only = view.white.is_on() && view.black.is_on();
    if !bots_only || matches!(view.party, ActiveParty::GameOver(_)) {
        return Ok(());
    }
    loop {
        match events.recv().await {
            Ok(SessionEvent::GameOver { .. } | SessionEvent::AutoplayStalled { .. }) => break,
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }
    }
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>, json: bool) {
    loop {
        match events.recv().await {
            Ok(event) if json => match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(err) => tracing::error!(%err, "failed to encode event"),
            },
            Ok(event) => println!("{}", render::event(&event)),
            Err(RecvError::Lagged(missed)) => tracing::warn!(missed, "event printer fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}
