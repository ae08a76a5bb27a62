use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::config;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Open the shared connection pool from `DATABASE_URL`.
///
/// One pool serves every tenant. Isolation happens per connection at
/// acquisition time (`db::router`), never at pool construction.
pub async fn connect_from_env() -> Result<PgPool, PoolError> {
    let raw = std::env::var("DATABASE_URL")
        .map_err(|_| PoolError::ConfigMissing("DATABASE_URL"))?;
    let url = url::Url::parse(&raw).map_err(|_| PoolError::InvalidDatabaseUrl)?;
    connect(url.as_str()).await
}

pub async fn connect(database_url: &str) -> Result<PgPool, PoolError> {
    let db = &config().database;

    let pool = PgPoolOptions::new()
        .max_connections(db.max_connections)
        .acquire_timeout(Duration::from_secs(db.acquire_timeout_secs))
        .connect(database_url)
        .await?;

    info!(max_connections = db.max_connections, "Created shared database pool");
    Ok(pool)
}

/// Pings the pool to ensure connectivity
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
