//! Connection pools, embedded migrations, and database bootstrap.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

use crate::config::DbConfig;
use crate::queries::{nodes, projects};

/// Migrations embedded at compile time from `crates/weaver-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Open a pool sized by [`DbConfig::max_connections`].
///
/// Every concurrently running plan step holds one connection for the length
/// of its transaction, so the pool must be at least as wide as the executor.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.database_url))
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;
    info!("migrations applied");
    Ok(())
}

/// Create the configured database if it does not exist yet.
///
/// Returns `true` when the database was created by this call.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<bool> {
    let db_name = creatable_database_name(config)?;
    let maintenance_url = config.maintenance_url();
    let maint = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(&maintenance_url)
        .await
        .with_context(|| format!("failed to connect to maintenance database at {maintenance_url}"))?;

    let result = create_if_missing(&maint, db_name).await;
    maint.close().await;
    result
}

async fn create_if_missing(maint: &PgPool, db_name: &str) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(maint)
            .await
            .context("failed to query pg_database")?;
    if exists {
        info!(db = db_name, "database already exists");
        return Ok(false);
    }

    maint
        .execute(format!("CREATE DATABASE \"{db_name}\"").as_str())
        .await
        .with_context(|| format!("failed to create database {db_name}"))?;
    info!(db = db_name, "database created");
    Ok(true)
}

/// The database name, restricted to characters that are safe to splice
/// into `CREATE DATABASE` (which takes no bind parameters).
fn creatable_database_name(config: &DbConfig) -> Result<&str> {
    let name = config
        .database_name()
        .with_context(|| format!("no database name in URL {}", config.database_url))?;
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        anyhow::bail!("database name {name:?} contains invalid characters");
    }
    Ok(name)
}

/// Row totals reported after `weaver db-init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSummary {
    pub projects: i64,
    pub nodes: i64,
}

pub async fn store_summary(pool: &PgPool) -> Result<StoreSummary> {
    let projects = projects::count_projects(pool).await?;
    let nodes = nodes::count_all_nodes(pool)
        .await
        .context("failed to count nodes")?;
    Ok(StoreSummary { projects, nodes })
}
