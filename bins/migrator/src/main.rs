//! Database migration runner for Quire.
//!
//! Usage:
//!   migrator up      - Run all pending migrations
//!   migrator down    - Rollback last migration
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop all tables and re-run migrations
//!
//! Connection settings come from the application configuration
//! (`config/*.toml`, then `QUIRE__*` environment variables).

use anyhow::{Context, bail};
use quire_db::migration::Migrator;
use quire_shared::AppConfig;
use quire_shared::telemetry::init_tracing;
use sea_orm_migration::prelude::*;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let command = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.logging);

    let db = quire_db::connect(&config.database)
        .await
        .context("failed to connect to database")?;

    match command.as_str() {
        "up" => Migrator::up(&db, None).await?,
        "down" => Migrator::down(&db, Some(1)).await?,
        "status" => Migrator::status(&db).await?,
        "fresh" => Migrator::fresh(&db).await?,
        other => bail!("unknown command '{other}', expected up, down, status or fresh"),
    }

    info!(%command, "migrator finished");
    Ok(())
}
