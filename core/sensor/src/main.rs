//! doorstate-sensor: command-line client for the doorstate daemon.
//!
//! Submits signed door state claims and inspects the recorded history:
//! current status, raw opening periods, and per-day or per-week open
//! time summaries.

mod client;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use doorstate_core::{open_hours_by_week, open_segments_by_day, ClaimValidator, DoorState};
use doorstate_protocol::StatusReply;

use crate::client::ApiClient;

#[derive(Parser)]
#[command(name = "doorstate-sensor")]
#[command(about = "Door state sensor and query client")]
#[command(version)]
struct Cli {
    /// Base URL of the doorstate daemon
    #[arg(long, global = true, default_value = "http://127.0.0.1:8888")]
    url: String,

    /// Force debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign and submit a door state claim
    Update {
        /// Claimed door state (opened or closed)
        #[arg(long, value_parser = parse_door_state)]
        state: DoorState,

        /// Path to the shared HMAC key file
        #[arg(long, value_name = "PATH")]
        key: PathBuf,

        /// Claim time as a UTC epoch timestamp, defaults to now
        #[arg(long)]
        time: Option<i64>,
    },
    /// Show the current door status
    Status,
    /// List recorded opening periods
    History {
        /// Range start as a UTC epoch timestamp
        #[arg(long)]
        from: Option<i64>,

        /// Range end as a UTC epoch timestamp
        #[arg(long)]
        to: Option<i64>,
    },
    /// Summarize open time per local calendar day
    ByHour {
        /// Range start as a UTC epoch timestamp
        #[arg(long)]
        from: Option<i64>,

        /// Range end as a UTC epoch timestamp
        #[arg(long)]
        to: Option<i64>,

        /// IANA timezone for day boundaries
        #[arg(long, default_value = "UTC")]
        timezone: String,
    },
    /// Summarize open time per calendar week
    ByWeek {
        /// Range start as a UTC epoch timestamp
        #[arg(long)]
        from: Option<i64>,

        /// Range end as a UTC epoch timestamp
        #[arg(long)]
        to: Option<i64>,

        /// IANA timezone for week boundaries
        #[arg(long, default_value = "UTC")]
        timezone: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(err) = run(cli) {
        error!(error = %err, "doorstate-sensor failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run(cli: Cli) -> Result<(), String> {
    let client = ApiClient::new(&cli.url);
    match cli.command {
        Commands::Update { state, key, time } => update(&client, state, &key, time).await,
        Commands::Status => status(&client).await,
        Commands::History { from, to } => history(&client, from, to).await,
        Commands::ByHour { from, to, timezone } => by_hour(&client, from, to, &timezone).await,
        Commands::ByWeek { from, to, timezone } => by_week(&client, from, to, &timezone).await,
    }
}

async fn update(
    client: &ApiClient,
    state: DoorState,
    key_path: &Path,
    time: Option<i64>,
) -> Result<(), String> {
    let validator = ClaimValidator::from_key_file(key_path)?;
    let time = time.unwrap_or_else(|| Utc::now().timestamp());

    let reply = client.submit_claim(&validator, time, state).await?;
    if !reply_matches(&reply, time, state) {
        return Err(format!(
            "Daemon answered a different claim: state {} at {}",
            reply.state, reply.time
        ));
    }
    println!("{}", reply.text);
    Ok(())
}

async fn status(client: &ApiClient) -> Result<(), String> {
    let reply = client.status().await?;
    println!("state: {}", reply.state);
    println!("last change: {}", format_ts(reply.time));
    println!("{}", reply.text);
    Ok(())
}

async fn history(client: &ApiClient, from: Option<i64>, to: Option<i64>) -> Result<(), String> {
    let periods = client.history(from, to).await?;
    for period in &periods {
        match period.closed {
            Some(closed) => println!("{}  {}", format_ts(period.opened), format_ts(closed)),
            None => println!("{}  still open", format_ts(period.opened)),
        }
    }
    Ok(())
}

async fn by_hour(
    client: &ApiClient,
    from: Option<i64>,
    to: Option<i64>,
    timezone: &str,
) -> Result<(), String> {
    let tz = parse_timezone(timezone)?;
    let periods = client.history(from, to).await?;
    let now = Utc::now().timestamp();

    for segment in open_segments_by_day(&periods, now, tz) {
        println!(
            "{}  {:>5.2} - {:>5.2}",
            segment.date, segment.start_hour, segment.end_hour
        );
    }
    Ok(())
}

async fn by_week(
    client: &ApiClient,
    from: Option<i64>,
    to: Option<i64>,
    timezone: &str,
) -> Result<(), String> {
    let tz = parse_timezone(timezone)?;
    let periods = client.history(from, to).await?;
    let now = Utc::now().timestamp();

    for (week, hours) in open_hours_by_week(&periods, now, tz) {
        println!("{}  {:>8.2} h", week, hours);
    }
    Ok(())
}

/// The daemon echoes the claim it applied. A different state, or a
/// newer time than ours, means it acted on somebody else's claim.
fn reply_matches(reply: &StatusReply, time: i64, state: DoorState) -> bool {
    reply.state == state.as_str() && reply.time <= time
}

fn parse_door_state(value: &str) -> Result<DoorState, String> {
    DoorState::from_str(value)
        .ok_or_else(|| format!("state has to be one of opened, closed, got {}", value))
}

fn parse_timezone(name: &str) -> Result<Tz, String> {
    name.parse::<Tz>()
        .map_err(|_| format!("Unknown timezone: {}", name))
}

fn format_ts(timestamp: i64) -> String {
    match DateTime::from_timestamp(timestamp, 0) {
        Some(moment) => moment.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => timestamp.to_string(),
    }
}

fn init_logging(force_debug: bool) {
    let debug_env = std::env::var("DOORSTATE_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);

    let filter = if force_debug || debug_env {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
