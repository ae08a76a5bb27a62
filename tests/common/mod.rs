// Shared helpers for integration tests.
//
// Tests that need Postgres read TEST_DATABASE_URL and return early when it is
// not set, so the suite stays green on machines without a database. Every
// test works with uniquely named tenants and schemas; the suite can run in
// parallel against one shared database.

#![allow(dead_code)]

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connection string for Postgres-backed tests, when one is configured.
pub fn test_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok()
}

pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await?;
    Ok(pool)
}

/// Pool that never opens a connection. Good enough for routes that do no IO.
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .connect_lazy("postgres://postgres@127.0.0.1:1/never_connected")
        .expect("lazy pool")
}

/// Unique lowercase identifier so parallel tests never collide.
pub fn unique(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &suffix[..12])
}

pub async fn drop_schema(pool: &PgPool, schema: &str) -> Result<()> {
    sqlx::query(&format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", schema))
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn remove_tenant(pool: &PgPool, tenant_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM public.tenants WHERE tenant_id = $1")
        .bind(tenant_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Read an axum response body as JSON.
pub async fn body_json(response: axum::response::Response) -> Result<serde_json::Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
