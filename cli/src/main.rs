// walletnotify - background notification service simulator
//
// Plays the host process: feeds push triggers and wallet events from a
// script into the coordinator and stays alive until it shuts itself down.

mod config;
mod console;
mod simulator;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use console::{ConsoleBridge, ConsoleLogSink};
use simulator::{NwcDemoFactory, ScriptLine, SimulatedSdk, SimulatedSession};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;
use walletnotify_core::{
    Coordinator, PluginRegistry, ShutdownReason, Trigger, TriggerMessage,
};

#[derive(Parser)]
#[command(name = "walletnotify")]
#[command(about = "Wallet push notification service simulator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the service against a script of triggers and events
    Run {
        /// JSON-lines script (stdin when omitted)
        #[arg(short, long)]
        script: Option<PathBuf>,
        #[arg(long)]
        service_timeout_ms: Option<u64>,
        #[arg(long)]
        empty_delay_ms: Option<u64>,
        /// Write logs to daily rolling files instead of stderr
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Decode a trigger message without running it
    Decode { json: String },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    Init,
    Get { key: String },
    Set { key: String, value: String },
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            script,
            service_timeout_ms,
            empty_delay_ms,
            log_dir,
        } => {
            let _guard = init_tracing(log_dir.as_deref())?;
            cmd_run(script, service_timeout_ms, empty_delay_ms).await
        }
        Commands::Decode { json } => {
            walletnotify_core::init_logging(None, "warn");
            cmd_decode(&json)
        }
        Commands::Config { action } => {
            walletnotify_core::init_logging(None, "warn");
            cmd_config(action)
        }
    }
}

fn init_tracing(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let Some(dir) = log_dir else {
        walletnotify_core::init_logging(Some(Arc::new(ConsoleLogSink)), "info");
        return Ok(None);
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(dir, "walletnotify.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(Some(guard))
}

// ============================================================================
// RUN
// ============================================================================

async fn cmd_run(
    script: Option<PathBuf>,
    service_timeout_ms: Option<u64>,
    empty_delay_ms: Option<u64>,
) -> Result<()> {
    let mut config = config::Config::load()?;
    if let Some(ms) = service_timeout_ms {
        config.service.timeouts.service_timeout_ms = ms;
    }
    if let Some(ms) = empty_delay_ms {
        config.service.timeouts.empty_delay_ms = ms;
    }

    let session = SimulatedSession::new(config.simulator.clone());
    let coordinator = Coordinator::new(
        config.service.clone(),
        Arc::new(SimulatedSdk::new(session.clone())),
        Arc::new(config.credential_store()),
        Arc::new(ConsoleBridge::new()),
        PluginRegistry::new().with_factory(Arc::new(NwcDemoFactory)),
    )
    .context("Failed to start service")?;

    println!("{}", "walletnotify service started".bold());
    println!(
        "  Service timeout: {}",
        format!("{:?}", config.service.timeouts.service_timeout()).bright_cyan()
    );
    println!(
        "  Empty delay:     {}",
        format!("{:?}", config.service.timeouts.empty_delay()).bright_cyan()
    );
    println!();

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &script {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open script {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let mut lines = reader.lines();
    let mut script_done = false;

    let terminated = coordinator.terminated();
    tokio::pin!(terminated);

    let reason = loop {
        tokio::select! {
            reason = &mut terminated => break reason,
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "Interrupted, shutting down".yellow());
                coordinator.shutdown().await;
            }
            line = lines.next_line(), if !script_done => {
                match line.context("Failed to read script")? {
                    Some(line) => run_line(&coordinator, &session, &line).await,
                    None => {
                        script_done = true;
                        println!("{}", "Script finished, waiting for the service to stop".dimmed());
                    }
                }
            }
        }
    };

    print_summary(reason, coordinator.events_dispatched());
    Ok(())
}

async fn run_line(coordinator: &Coordinator, session: &SimulatedSession, line: &str) {
    let parsed = match ScriptLine::parse(line) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => return,
        Err(e) => {
            println!("{} {:#}", "✗".red(), e);
            return;
        }
    };

    match parsed {
        ScriptLine::Sleep { sleep_ms } => {
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
        }
        ScriptLine::Event { event } => {
            let delivered = session.emit(event.clone());
            println!(
                "{} {:?} {}",
                "⚡".bright_blue(),
                event,
                format!("({} listener(s))", delivered).dimmed()
            );
        }
        ScriptLine::Trigger(message) => match coordinator.on_trigger(&message).await {
            Ok(id) => println!(
                "{} {} → job {}",
                "✓".green(),
                message.kind.bright_cyan(),
                id.to_string().dimmed()
            ),
            Err(e) => println!("{} {}: {}", "✗".red(), message.kind, e),
        },
    }
}

fn print_summary(reason: ShutdownReason, events: u64) {
    println!();
    let reason = match reason {
        ShutdownReason::ServiceTimeout => "service timeout reached".bright_red(),
        ShutdownReason::EmptyDelay => "no more work".bright_green(),
        ShutdownReason::Requested => "requested".yellow(),
    };
    println!("{} {}", "Service stopped:".bold(), reason);
    println!("  Connection events: {}", events.to_string().bright_cyan());
}

// ============================================================================
// DECODE
// ============================================================================

fn cmd_decode(json: &str) -> Result<()> {
    let message = TriggerMessage::from_json(json)?;
    let trigger = Trigger::decode(&message)?;

    println!("{}", "Trigger".bold());
    println!("  Kind:    {}", trigger.kind().to_string().bright_cyan());
    println!("  Summary: {}", trigger);
    println!("  Request: {:?}", trigger);
    Ok(())
}

// ============================================================================
// CONFIG
// ============================================================================

fn cmd_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = config::Config::load()?;
            println!("{}", "Configuration".bold());
            for (key, value) in config.list() {
                println!("  {:20} {}", key, value.bright_cyan());
            }
        }
        ConfigAction::Init => {
            let path = config::Config::config_file()?;
            if path.exists() {
                println!("{} Config already exists: {}", "•".yellow(), path.display());
            } else {
                config::Config::default().save()?;
                println!("{} Config written: {}", "✓".green(), path.display());
            }
        }
        ConfigAction::Get { key } => {
            let config = config::Config::load()?;
            match config.get(&key) {
                Some(value) => println!("{}", value),
                None => anyhow::bail!("Unknown or unset config key: {}", key),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = config::Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            println!("{} {} updated", "✓".green(), key.bright_cyan());
        }
        ConfigAction::Path => {
            println!("{}", config::Config::config_file()?.display());
        }
    }
    Ok(())
}
