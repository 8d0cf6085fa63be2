//! Command implementations for schoolctl CLI

pub mod migrate;
pub mod serve;

use anyhow::{Context, Result};
use clap::Args;

use schoolctl_server::DatabaseConfig;

// Re-export dispatcher functions for flat access from main.rs
pub use migrate::run_migrate;
pub use serve::run_serve;

/// Database connection arguments shared by every command that needs one
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Database URL (overrides DB_HOST/DB_PORT/DB_USER/DB_PASSWORD/DB_NAME)
    #[arg(long)]
    pub database_url: Option<String>,
}

impl DatabaseArgs {
    /// Flag first, then environment
    pub fn resolve(&self) -> Result<DatabaseConfig> {
        DatabaseConfig::from_lookup(|key| match key {
            "DATABASE_URL" => self
                .database_url
                .clone()
                .or_else(|| std::env::var(key).ok()),
            _ => std::env::var(key).ok(),
        })
        .context("Database not configured. Set --database-url, DATABASE_URL, or DB_* in .env")
    }
}
