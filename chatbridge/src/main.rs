// ChatBridge command-line driver

use anyhow::{Context, Result};
use chatbridge::{DeviceMonitor, TransferEvent, TransferOrchestrator};
use chatbridge_common::{ChatbridgeConfig, DeviceSnapshot, DeviceStatus, format_percent};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(name = "chatbridge")]
#[command(about = "Transfer chat history from an Android device to an iOS device")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.config/chatbridge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect both devices once and print their status
    Status {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keep polling and report devices as they connect and disconnect
    Watch {
        /// Seconds between polls (overrides the configuration)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Run a transfer between the connected devices
    Transfer {
        /// Print progress events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => ChatbridgeConfig::with_file(path)?,
        None => ChatbridgeConfig::new()?,
    };

    match cli.command {
        Commands::Status { json } => status(&config, json).await,
        Commands::Watch { interval } => watch(&config, interval).await,
        Commands::Transfer { json } => transfer(&config, json).await,
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn describe(status: &DeviceStatus) -> String {
    match (status.connected, status.info.as_deref()) {
        (true, Some(info)) => info.to_string(),
        (true, None) => "connected".to_string(),
        (false, Some(hint)) => format!("not connected ({hint})"),
        (false, None) => "not connected".to_string(),
    }
}

fn print_snapshot(snapshot: &DeviceSnapshot) {
    println!("Source (Android): {}", describe(&snapshot.source));
    println!("Target (iOS):     {}", describe(&snapshot.target));
}

async fn status(config: &ChatbridgeConfig, json: bool) -> Result<ExitCode> {
    let monitor = DeviceMonitor::from_config(config);
    let snapshot = monitor.refresh().await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?
        );
    } else {
        print_snapshot(&snapshot);
    }

    Ok(ExitCode::SUCCESS)
}

async fn watch(config: &ChatbridgeConfig, interval: Option<u64>) -> Result<ExitCode> {
    let interval = interval
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| config.poll_interval());

    let monitor = DeviceMonitor::from_config(config);
    let mut updates = monitor.subscribe();
    monitor.start_monitoring(interval);

    let mut ready = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if snapshot.ready_for_transfer() != ready {
                    ready = snapshot.ready_for_transfer();
                    if ready {
                        log::info!("Both devices connected, ready to transfer");
                    } else {
                        log::info!("Waiting for both devices");
                    }
                }
            }
        }
    }

    monitor.stop_monitoring();
    Ok(ExitCode::SUCCESS)
}

async fn transfer(config: &ChatbridgeConfig, json: bool) -> Result<ExitCode> {
    let monitor = DeviceMonitor::from_config(config);
    let snapshot = monitor.refresh().await;

    let orchestrator = TransferOrchestrator::from_config(config);
    let mut events = orchestrator.subscribe_events();

    orchestrator
        .start_from_snapshot(&snapshot)
        .context("Cannot start transfer")?;
    log::info!("Staging in {}", orchestrator.staging_root().display());

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Missed {} progress events", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            print_event(&event);
        }

        match event {
            TransferEvent::Completed { .. } => break,
            TransferEvent::Failed { .. } => return Ok(ExitCode::FAILURE),
            _ => {}
        }
    }

    // Let the completed state settle before exiting
    let mut state = orchestrator.subscribe();
    state
        .wait_for(|s| !s.running)
        .await
        .context("Transfer state channel closed")?;

    Ok(ExitCode::SUCCESS)
}

fn print_event(event: &TransferEvent) {
    match event {
        TransferEvent::Started { source, target } => {
            println!("Transferring from {source} to {target}");
        }
        TransferEvent::Progress {
            progress, step, status, ..
        } => {
            println!("[{:>4}] {} {}", format_percent(*progress), step, status);
        }
        TransferEvent::Completed { elapsed_secs } => {
            println!(
                "Done in {}",
                chatbridge_common::format_elapsed_time(Duration::from_secs_f64(*elapsed_secs))
            );
        }
        TransferEvent::Failed { message, .. } => {
            eprintln!("Transfer failed: {message}");
        }
    }
}
