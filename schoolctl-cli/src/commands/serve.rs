//! HTTP server command
//!
//! Connects the Postgres pool, applies migrations unless told not to, and
//! serves the registration API until Ctrl+C or SIGTERM.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use schoolctl_server::db::{create_pool_with_options, migrations, PgStore};
use schoolctl_server::http::{run_server, ServerConfig};

use super::DatabaseArgs;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Host address to bind to
    #[arg(long, short = 'b', default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(long, short = 'p', env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Skip creating missing tables on startup
    #[arg(long)]
    pub skip_migrations: bool,

    #[command(flatten)]
    pub database: DatabaseArgs,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let db = args.database.resolve()?;
    tracing::info!(database = %db.redacted_url(), "Connecting to database");

    let pool = create_pool_with_options(&db.url, db.max_connections)
        .await
        .context("Failed to create database pool")?;

    if !args.skip_migrations {
        migrations::run(&pool)
            .await
            .context("Failed to run migrations")?;
    }

    let config = ServerConfig {
        bind_addr: SocketAddr::new(args.bind, args.port),
        cors_permissive: args.cors_permissive,
    };
    tracing::info!("Starting schoolctl server on {}", config.bind_addr);

    // Blocks until shutdown
    run_server(Arc::new(PgStore::new(pool)), config)
        .await
        .context("Server error")?;

    Ok(())
}
