//! Database layer - storage seam, Postgres and in-memory stores
//!
//! # Design Principles
//!
//! - Connection pool (max 10 connections) - no Arc<Mutex<Connection>>
//! - List operations use JOINs - no N+1 queries
//! - Rely on DB constraints, handle conflicts - no check-then-insert for
//!   reference rows
//! - Every registration runs in one transaction

pub mod error;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod postgres;
pub mod store;

pub use error::DbError;
pub use memory::{MemoryStore, TableCounts};
pub use pool::{create_pool, create_pool_with_options, DEFAULT_MAX_CONNECTIONS};
pub use postgres::PgStore;
pub use store::{AddressLink, RegistryStore, RegistryTx};
