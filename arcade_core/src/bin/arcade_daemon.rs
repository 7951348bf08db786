use std::{path::PathBuf, thread};

use anyhow::{Context, Result};
use arcade_core::{
    load_arcade_config_from_env, ArcadeConfig, ArcadeSession, ConsoleSink, JsonResultStore,
    LoggingConsole, StaticLeaderboard,
};
use chrono::Utc;
use clap::Parser;
use remote_console::{ConsoleCommand, ConsoleError, RemoteConsole};

#[derive(Parser, Debug)]
#[command(author, version, about = "IL-2 arcade minigame daemon", long_about = None)]
struct Cli {
    /// Arcade config JSON. Falls back to ARCADE_CONFIG_PATH, then the builtin table.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single poll cycle and exit.
    #[arg(long)]
    once: bool,

    /// Log console traffic instead of connecting to the server.
    #[arg(long)]
    dry_run: bool,
}

enum DaemonConsole {
    Remote(RemoteConsole),
    DryRun(LoggingConsole),
}

impl ConsoleSink for DaemonConsole {
    fn send_command(&mut self, command: &ConsoleCommand) -> Result<(), ConsoleError> {
        match self {
            DaemonConsole::Remote(console) => console.send_command(command),
            DaemonConsole::DryRun(console) => console.send_command(command),
        }
    }

    fn broadcast(&mut self, message: &str) -> Result<(), ConsoleError> {
        match self {
            DaemonConsole::Remote(console) => ConsoleSink::broadcast(console, message),
            DaemonConsole::DryRun(console) => console.broadcast(message),
        }
    }

    fn reset(&mut self) {
        if let DaemonConsole::Remote(console) = self {
            ConsoleSink::reset(console);
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ArcadeConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => load_arcade_config_from_env().0,
    };

    let console = if cli.dry_run {
        DaemonConsole::DryRun(LoggingConsole)
    } else {
        DaemonConsole::Remote(RemoteConsole::new(config.console.clone()))
    };
    let store = JsonResultStore::new(&config.paths.scores_db);
    let publisher = StaticLeaderboard::new(
        &config.paths.leaderboard_output,
        config.rules.arcade_planes.clone(),
        config.leaderboard.clone(),
    );
    let poll_interval = config.timing.poll_interval();

    let mut session = ArcadeSession::new(config, console, store, publisher);
    session
        .load_mission()
        .context("failed to load arcade scenario")?;

    tracing::info!(
        target: "arcade::session",
        arcade = session.is_arcade(),
        logs = %session.config().paths.mission_logs,
        dry_run = cli.dry_run,
        "daemon.ready"
    );

    loop {
        match session.poll(Utc::now()) {
            Ok(report) => {
                if report.console_down {
                    tracing::warn!(target: "arcade::session", "daemon.console_reset");
                    session.console_mut().reset();
                }
            }
            Err(err) => {
                tracing::error!(target: "arcade::session", error = %err, "daemon.poll_failed");
            }
        }
        if cli.once {
            break;
        }
        thread::sleep(poll_interval);
    }
    Ok(())
}
