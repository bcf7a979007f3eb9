//! SB Analytics pipeline server
//!
//! One binary, three long-lived components plus a one-shot migration:
//!
//! ```bash
//! sb-server migrate    # apply the schema and exit
//! sb-server ingest     # HTTP front-end (owns the schema migration on boot)
//! sb-server publish    # outbox publisher
//! sb-server process    # event processor
//! ```
//!
//! All configuration comes from `SB_*` environment variables, read here and
//! nowhere else.

mod cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sb_config::Config;

/// SB Analytics pipeline server
#[derive(Parser, Debug)]
#[command(name = "sb-server")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply the database schema and exit
    Migrate,

    /// Run the HTTP ingest front-end
    Ingest,

    /// Run the outbox publisher
    Publish,

    /// Run the event processor
    Process,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(level)?;

    match cli.command {
        Command::Migrate => cmd::migrate::run(config).await,
        Command::Ingest => cmd::ingest::run(config).await,
        Command::Publish => cmd::publish::run(config).await,
        Command::Process => cmd::process::run(config).await,
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}
