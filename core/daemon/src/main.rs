//! doorstate-daemon: HTTP service tracking a single door's opening periods.
//!
//! Sensors POST authenticated state claims; readers get the current status
//! summary, the public space document, and the period history. State lives
//! in a small SQLite database owned exclusively by this process.

mod db;
mod door_store;
mod server;
mod space;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use doorstate_core::ClaimValidator;
use doorstate_protocol::DEFAULT_PORT;

use crate::db::Db;
use crate::server::{AppState, ServerConfig};

const DB_CONNECT_RETRIES: u32 = 20;

#[derive(Parser)]
#[command(name = "doorstate-daemon")]
#[command(about = "Door state tracking service")]
#[command(version)]
struct Cli {
    /// Path to the HMAC key file shared with the door sensor
    #[arg(long, value_name = "PATH")]
    key: PathBuf,

    /// SQLite database path (defaults to ~/.doorstate/doorstate.db)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// TOML file describing the space document served at /
    #[arg(long, value_name = "PATH")]
    space_config: Option<PathBuf>,

    /// Force debug logging
    #[arg(long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(err) = run(cli) {
        error!(error = %err, "doorstate daemon failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run(cli: Cli) -> Result<(), String> {
    let validator = ClaimValidator::from_key_file(&cli.key)?;
    let space = space::load_space_config(cli.space_config)?;
    let db_path = match cli.db {
        Some(path) => path,
        None => default_db_path()?,
    };
    let db = open_db_with_retry(db_path).await?;

    let state = Arc::new(AppState::new(db, validator, space));
    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
    };
    let (_addr, shutdown_tx) = server::run(config, state).await?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|err| format!("Failed to wait for shutdown signal: {}", err))?;
    info!("Shutting down");
    let _ = shutdown_tx.send(());
    Ok(())
}

fn init_logging(debug: bool) {
    let force_debug = debug
        || std::env::var("DOORSTATE_DEBUG_LOG")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
            .unwrap_or(false);

    let filter = if force_debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn default_db_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(".doorstate").join("doorstate.db"))
}

/// The database may live on storage that attaches after boot; retry a
/// bounded number of times before giving up.
async fn open_db_with_retry(path: PathBuf) -> Result<Db, String> {
    let mut last_err = String::new();
    for attempt in 1..=DB_CONNECT_RETRIES {
        match Db::new(path.clone()) {
            Ok(db) => return Ok(db),
            Err(err) => {
                warn!(
                    error = %err,
                    attempt,
                    retries = DB_CONNECT_RETRIES,
                    "Failed to connect to database"
                );
                last_err = err;
            }
        }
        if attempt < DB_CONNECT_RETRIES {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
    Err(format!(
        "Failed to connect to database after {} attempts: {}",
        DB_CONNECT_RETRIES, last_err
    ))
}
