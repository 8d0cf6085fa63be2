//! Schema migration command

use anyhow::{Context, Result};
use clap::Parser;

use schoolctl_server::db::{create_pool_with_options, migrations};

use super::DatabaseArgs;

/// Arguments for the migrate command
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,
}

/// Create any missing tables and indexes, then exit
pub async fn run_migrate(args: MigrateArgs) -> Result<()> {
    let db = args.database.resolve()?;
    tracing::info!(database = %db.redacted_url(), "Connecting to database");

    let pool = create_pool_with_options(&db.url, 1)
        .await
        .context("Failed to create database pool")?;

    migrations::run(&pool)
        .await
        .context("Failed to run migrations")?;

    pool.close().await;
    println!("Schema is up to date");
    Ok(())
}
