//! schoolctl CLI - school registration API
//!
//! Entry point for the `schoolctl` binary:
//! - `serve`: run the HTTP API over Postgres
//! - `migrate`: create missing tables and indexes

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod tracing_setup;

use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "schoolctl",
    author,
    version,
    about = "School registration API: students, parents, addresses and birthplaces",
    long_about = "Serve the school registration REST API. Student and parent writes are \
                  transactional: the student row, its address, birthplace and parent link \
                  are committed together or not at all."
)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Create missing tables and indexes
    Migrate(commands::migrate::MigrateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    tracing_setup::init(&TracingConfig { debug: cli.debug }).ok();

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await?,
        Commands::Migrate(args) => commands::run_migrate(args).await?,
    }
    Ok(())
}
