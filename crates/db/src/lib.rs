//! PostgreSQL persistence for the Quire ledger.
//!
//! This crate provides:
//! - `SeaORM` entity definitions for the ledger schema
//! - [`PgLedgerStore`], the database implementation of the core's store seam
//! - Database migrations

pub mod entities;
pub mod migration;
pub mod store;

mod convert;

pub use store::PgLedgerStore;

use std::time::Duration;

use quire_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a pooled connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "connecting to database"
    );
    Database::connect(options).await
}
