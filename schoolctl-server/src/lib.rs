//! schoolctl-server: school registration API
//!
//! Students, parents, addresses, birthplaces and occupations over
//! Postgres. Student and parent writes run through [`registry::Registrar`],
//! which keeps each registration and its dependent rows in one transaction.

pub mod config;
pub mod db;
pub mod http;
pub mod models;
pub mod registry;

pub use config::{ConfigError, DatabaseConfig};
pub use db::{DbError, MemoryStore, PgStore, RegistryStore, RegistryTx};
pub use http::{build_router, run_server, AppState, ServerConfig, ServerError};
pub use registry::Registrar;
