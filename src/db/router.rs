use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres};
use std::ops::{Deref, DerefMut};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::config;
use crate::tenancy::context;
use crate::tenancy::schema_name::SchemaName;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Connection acquire failed: {0}")]
    Pool(#[source] sqlx::Error),

    /// The connection could not be bound to the target schema. The schema may
    /// have been dropped since it was registered; the request must fail
    /// rather than fall through to another schema.
    #[error("Could not switch connection to schema {schema}: {detail}")]
    SchemaSwitch { schema: SchemaName, detail: String },

    #[error("Could not reset connection to the default schema: {0}")]
    Reset(#[source] sqlx::Error),
}

/// Pool connection bound to one schema, held exclusively between acquire and
/// release. Dropping the guard without releasing discards the underlying
/// connection so the pool never hands a schema-bound connection to the next
/// borrower.
pub struct RoutedConnection {
    conn: Option<PoolConnection<Postgres>>,
    schema: SchemaName,
}

impl RoutedConnection {
    /// Schema this connection is currently bound to.
    pub fn schema(&self) -> &SchemaName {
        &self.schema
    }
}

impl Deref for RoutedConnection {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        // Invariant: `conn` is Some until release() or Drop consumes the guard.
        self.conn.as_deref().expect("routed connection already released")
    }
}

impl DerefMut for RoutedConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_deref_mut().expect("routed connection already released")
    }
}

impl Drop for RoutedConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!(schema = %self.schema, "Connection guard dropped without release, discarding connection");
            conn.detach();
        }
    }
}

fn switch_statement(schema: &SchemaName) -> String {
    format!("SET search_path TO {}", schema.quoted())
}

fn reset_statement() -> String {
    format!("SET search_path TO {}", SchemaName::default_schema().quoted())
}

/// Routes pool connections to the active tenant's schema.
///
/// Wraps the shared [`PgPool`]; business code acquires through the router and
/// runs ordinary unqualified SQL, which Postgres resolves against the bound
/// schema's `search_path`.
#[derive(Debug, Clone)]
pub struct SchemaRouter {
    pool: PgPool,
}

impl SchemaRouter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Acquire a connection bound to the schema of the calling task's tenant
    /// scope (the default schema when unscoped).
    ///
    /// The switch is verified: Postgres accepts a `search_path` naming a
    /// missing schema without error, so `current_schema()` is read back and
    /// compared. A mismatch fails the acquire and discards the connection,
    /// never silently downgrades to the default schema.
    pub async fn acquire(&self) -> Result<RoutedConnection, RoutingError> {
        let schema = context::current_schema();
        let started = Instant::now();

        let mut conn = self.pool.acquire().await.map_err(RoutingError::Pool)?;

        if let Err(err) = sqlx::query(&switch_statement(&schema))
            .execute(&mut *conn)
            .await
        {
            conn.detach();
            return Err(RoutingError::SchemaSwitch {
                schema,
                detail: err.to_string(),
            });
        }

        let current: Option<String> = match sqlx::query_scalar("SELECT current_schema()::text")
            .fetch_one(&mut *conn)
            .await
        {
            Ok(value) => value,
            Err(err) => {
                conn.detach();
                return Err(RoutingError::SchemaSwitch {
                    schema,
                    detail: err.to_string(),
                });
            }
        };

        if current.as_deref() != Some(schema.as_str()) {
            conn.detach();
            return Err(RoutingError::SchemaSwitch {
                schema,
                detail: format!(
                    "schema is not visible, current_schema() = {}",
                    current.as_deref().unwrap_or("NULL")
                ),
            });
        }

        let db = &config().database;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if db.enable_slow_query_warning && elapsed_ms > db.slow_query_threshold_ms {
            warn!(schema = %schema, elapsed_ms, "Slow connection routing");
        }

        debug!(schema = %schema, "Connection routed");
        Ok(RoutedConnection {
            conn: Some(conn),
            schema,
        })
    }

    /// Return a routed connection to the pool.
    ///
    /// Resets `search_path` to the default schema first; when the reset fails
    /// the connection is discarded instead of returned.
    pub async fn release(&self, mut routed: RoutedConnection) -> Result<(), RoutingError> {
        let mut conn = match routed.conn.take() {
            Some(conn) => conn,
            None => return Ok(()),
        };

        match sqlx::query(&reset_statement()).execute(&mut *conn).await {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(schema = %routed.schema, "search_path reset failed, discarding connection: {}", err);
                conn.detach();
                Err(RoutingError::Reset(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_statement_quotes_schema() {
        let schema = SchemaName::parse("tenant_demo").unwrap();
        assert_eq!(switch_statement(&schema), "SET search_path TO \"tenant_demo\"");
    }

    #[test]
    fn reset_statement_targets_default_schema() {
        assert_eq!(reset_statement(), "SET search_path TO \"public\"");
    }
}
