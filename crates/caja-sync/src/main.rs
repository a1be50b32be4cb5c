//! # caja-sync
//!
//! Command-line driver for the sync engine.
//!
//! ## Usage
//! ```bash
//! # One full pass, report printed as JSON (exit code 1 if any unit failed)
//! caja-sync once --config ./sync.toml
//!
//! # Keep syncing every `sync.interval_secs` until Ctrl-C
//! caja-sync watch
//!
//! # Print the stored sync state of every doc type
//! caja-sync status
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use caja_core::{CatalogCache, SystemClock};
use caja_db::{Database, DbConfig};
use caja_sync::{ErpHttpClient, SyncAgent, SyncConfig, SyncContext, SyncOrchestrator};

enum Command {
    Once,
    Watch,
    Status,
}

fn print_help() {
    println!("Caja Sync");
    println!();
    println!("Usage: caja-sync [once|watch|status] [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  once     Run one full sync pass (default)");
    println!("  watch    Sync on an interval until Ctrl-C");
    println!("  status   Print the sync state of every doc type");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>   Config file (default: platform config dir/sync.toml)");
    println!("  -h, --help            Show this help message");
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut command = Command::Once;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "once" => command = Command::Once,
            "watch" => command = Command::Watch,
            "status" => command = Command::Status,
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                return ExitCode::from(2);
            }
        }
        i += 1;
    }

    match run(command, config_path).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "caja-sync failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    command: Command,
    config_path: Option<PathBuf>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = SyncConfig::load(config_path)?;
    info!(
        remote = %config.remote.base_url,
        company = %config.company(),
        db = ?config.database.path,
        "Configuration loaded"
    );

    let db = Database::new(DbConfig::new(config.database.path.clone())).await?;
    let remote = Arc::new(ErpHttpClient::new(&config.remote)?);
    let ctx = SyncContext::new(db, remote, Arc::new(SystemClock), &config);
    let orchestrator = Arc::new(SyncOrchestrator::new(ctx, Arc::new(CatalogCache::new())));

    match command {
        Command::Once => {
            let report = orchestrator.run_pass().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Watch => {
            let handle = SyncAgent::spawn(orchestrator, config.interval());
            tokio::signal::ctrl_c().await?;
            info!("Ctrl-C received");
            handle.shutdown().await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            let states = orchestrator.states().await?;
            println!("{}", serde_json::to_string_pretty(&states)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
