use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::config;
use crate::db::router::SchemaRouter;
use crate::migrate::MigrationOrchestrator;
use crate::tenancy::context::TenantHandoff;
use crate::tenancy::registry::{is_valid_tenant_id, RegistryError, TenantRecord, TenantRegistry};
use crate::tenancy::schema_name::SchemaName;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Invalid tenant name: {0}")]
    InvalidName(String),

    #[error("Reserved schema name: {0}")]
    Reserved(String),

    #[error("Tenant already exists: {0}")]
    AlreadyExists(String),

    /// Another process holds the provisioning lock for this schema.
    #[error("Tenant is being provisioned elsewhere: {0}")]
    Busy(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Schema setup failed: {0}")]
    Schema(String),

    #[error("Admin seed failed: {0}")]
    Seed(String),
}

/// Request to provision a tenant.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTenant {
    pub tenant_id: String,
    pub display_name: String,
    /// Explicit schema name; derived from the tenant id when absent.
    #[serde(default)]
    pub schema_name: Option<String>,
    /// Initial admin login; `admin@<tenant_id>.local` when absent.
    #[serde(default)]
    pub admin_email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedTenant {
    pub tenant: TenantRecord,
    pub admin_email: String,
    /// Generated admin password, returned exactly once at provisioning time.
    pub admin_password: String,
}

fn digest_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn schema_lock_key(schema: &SchemaName) -> i64 {
    const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET_BASIS;
    for byte in schema.as_str().as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    // Advisory lock keys are signed; clamp into the positive range.
    (hash & 0x7FFF_FFFF_FFFF_FFFF) as i64
}

fn resolve_schema(
    tenant_id: &str,
    schema_name: Option<&str>,
) -> Result<SchemaName, ProvisionError> {
    let schema = match schema_name {
        Some(raw) => {
            SchemaName::parse(raw).map_err(|err| ProvisionError::InvalidName(err.to_string()))?
        }
        None => SchemaName::derive_for_tenant(tenant_id),
    };
    if schema.is_default() {
        return Err(ProvisionError::Reserved(format!(
            "Schema name {} is reserved for the control plane",
            schema
        )));
    }
    Ok(schema)
}

/// Guard for a per-schema advisory lock, holding the pool connection the lock
/// was taken on. Advisory locks are session scoped: dropping the guard
/// without unlocking discards the connection, so the lock dies with its
/// session instead of returning to the pool still held.
struct SchemaLock {
    conn: Option<PoolConnection<Postgres>>,
    key: i64,
}

impl Drop for SchemaLock {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!(key = self.key, "Advisory lock guard dropped without unlock, discarding connection");
            conn.detach();
        }
    }
}

/// Creates tenants end to end: registry row, schema, canonical structure,
/// initial admin account.
///
/// The registry row is written before the schema exists, so a crash mid-way
/// leaves a tenant the next migration sweep completes rather than an orphan
/// schema nothing routes to. The whole flow runs under a per-schema advisory
/// lock; concurrent provisioning of the same schema serializes.
#[derive(Debug, Clone)]
pub struct TenantProvisioner {
    pool: PgPool,
    registry: TenantRegistry,
    orchestrator: MigrationOrchestrator,
    router: SchemaRouter,
}

impl TenantProvisioner {
    pub fn new(pool: PgPool) -> Self {
        let registry = TenantRegistry::new(pool.clone());
        let orchestrator = MigrationOrchestrator::new(pool.clone());
        let router = SchemaRouter::new(pool.clone());
        Self {
            pool,
            registry,
            orchestrator,
            router,
        }
    }

    pub async fn provision(&self, input: &NewTenant) -> Result<ProvisionedTenant, ProvisionError> {
        let tenant_id = input.tenant_id.trim();
        let display_name = input.display_name.trim();

        if !is_valid_tenant_id(tenant_id) {
            return Err(ProvisionError::InvalidName(
                "Tenant id must be 2-100 characters of letters, numbers, hyphens, and underscores"
                    .to_string(),
            ));
        }
        if display_name.is_empty() {
            return Err(ProvisionError::InvalidName(
                "Display name must not be empty".to_string(),
            ));
        }

        let schema = resolve_schema(tenant_id, input.schema_name.as_deref())?;

        let lock = self.lock_schema(&schema).await?;
        let result = self
            .provision_locked(tenant_id, display_name, &schema, input.admin_email.as_deref())
            .await;
        self.unlock(lock).await;
        result
    }

    async fn provision_locked(
        &self,
        tenant_id: &str,
        display_name: &str,
        schema: &SchemaName,
        admin_email: Option<&str>,
    ) -> Result<ProvisionedTenant, ProvisionError> {
        // Uniqueness is checked under the lock so two racing provisions of
        // the same tenant cannot both pass.
        if self.registry.find_by_external_id(tenant_id).await?.is_some() {
            return Err(ProvisionError::AlreadyExists(format!(
                "Tenant already exists: {}",
                tenant_id
            )));
        }
        if self
            .registry
            .find_by_schema_name(schema.as_str())
            .await?
            .is_some()
        {
            return Err(ProvisionError::AlreadyExists(format!(
                "Schema already in use: {}",
                schema
            )));
        }

        // The advisory lock is per schema, so two racing provisions of the
        // same external id under different explicit schema names both reach
        // this insert; the unique index decides and the loser conflicts.
        let record = match self
            .registry
            .insert(tenant_id, display_name, schema.as_str())
            .await
        {
            Ok(record) => record,
            Err(err) if err.is_unique_violation() => {
                return Err(ProvisionError::AlreadyExists(format!(
                    "Tenant already exists: {}",
                    tenant_id
                )));
            }
            Err(err) => return Err(err.into()),
        };
        info!(tenant_id, schema = %schema, "Registered tenant");

        self.orchestrator
            .run_for_schema(schema)
            .await
            .map_err(|err| ProvisionError::Schema(err.to_string()))?;

        let admin_email = admin_email
            .map(str::to_string)
            .unwrap_or_else(|| format!("admin@{}.local", tenant_id));
        let admin_password = Uuid::new_v4().simple().to_string();
        self.seed_admin(schema, &admin_email, &admin_password).await?;

        info!(tenant_id, schema = %schema, "Tenant provisioned");
        Ok(ProvisionedTenant {
            tenant: record,
            admin_email,
            admin_password,
        })
    }

    /// Seed the ADMIN role and initial admin user inside the new schema.
    ///
    /// Runs through the schema router with unqualified SQL: the first real
    /// traffic the schema sees goes down the same path request handlers use.
    async fn seed_admin(
        &self,
        schema: &SchemaName,
        email: &str,
        password: &str,
    ) -> Result<(), ProvisionError> {
        let digest = digest_password(password);

        TenantHandoff::for_schema(schema.clone())
            .run(async {
                let mut conn = self
                    .router
                    .acquire()
                    .await
                    .map_err(|err| ProvisionError::Seed(err.to_string()))?;

                sqlx::query(
                    "INSERT INTO roles (name) VALUES ('ADMIN') ON CONFLICT (name) DO NOTHING",
                )
                .execute(&mut *conn)
                .await
                .map_err(|err| ProvisionError::Seed(err.to_string()))?;

                let role_id: i64 = sqlx::query_scalar("SELECT id FROM roles WHERE name = 'ADMIN'")
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(|err| ProvisionError::Seed(err.to_string()))?;

                sqlx::query(
                    "INSERT INTO app_users (email, username, password, first_name, last_name, role_id, is_active) \
                     VALUES ($1, $1, $2, $3, $4, $5, true)",
                )
                .bind(email)
                .bind(&digest)
                .bind("Admin")
                .bind("User")
                .bind(role_id)
                .execute(&mut *conn)
                .await
                .map_err(|err| ProvisionError::Seed(err.to_string()))?;

                let _ = self.router.release(conn).await;
                Ok(())
            })
            .await
    }

    async fn lock_schema(&self, schema: &SchemaName) -> Result<SchemaLock, ProvisionError> {
        let migration = &config().migration;
        let key = schema_lock_key(schema);
        let mut backoff = Duration::from_millis(migration.advisory_lock_backoff_ms.max(1));
        let mut attempts = 0;

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|err| ProvisionError::Schema(err.to_string()))?;

        loop {
            let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
                .bind(key)
                .fetch_one(&mut *conn)
                .await
                .map_err(|err| ProvisionError::Schema(err.to_string()))?;

            if acquired {
                return Ok(SchemaLock {
                    conn: Some(conn),
                    key,
                });
            }

            if attempts >= migration.advisory_lock_retries {
                return Err(ProvisionError::Busy(schema.to_string()));
            }
            attempts += 1;

            // Free the pool slot while waiting.
            drop(conn);
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(Duration::from_secs(2));
            conn = self
                .pool
                .acquire()
                .await
                .map_err(|err| ProvisionError::Schema(err.to_string()))?;
        }
    }

    async fn unlock(&self, mut lock: SchemaLock) {
        let mut conn = match lock.conn.take() {
            Some(conn) => conn,
            None => return,
        };
        let result = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(lock.key)
            .execute(&mut *conn)
            .await;
        if let Err(err) = result {
            // Closing the session releases its advisory locks server-side.
            warn!("Advisory unlock failed, discarding connection: {}", err);
            conn.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[test]
    fn derives_schema_when_not_given() {
        let schema = resolve_schema("T-Demo", None).unwrap();
        assert_eq!(schema.as_str(), "tenant_t_demo");
    }

    #[test]
    fn accepts_explicit_schema() {
        let schema = resolve_schema("t-demo", Some("tenant_custom")).unwrap();
        assert_eq!(schema.as_str(), "tenant_custom");
    }

    #[test]
    fn rejects_reserved_schema() {
        assert!(matches!(
            resolve_schema("t-demo", Some("public")),
            Err(ProvisionError::Reserved(_))
        ));
    }

    #[test]
    fn rejects_invalid_schema() {
        assert!(matches!(
            resolve_schema("t-demo", Some("Tenant Demo")),
            Err(ProvisionError::InvalidName(_))
        ));
        assert!(matches!(
            resolve_schema("t-demo", Some("pg_temp")),
            Err(ProvisionError::InvalidName(_))
        ));
    }

    #[test]
    fn password_digest_is_stable_hex() {
        let digest = digest_password("hunter2");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, digest_password("hunter2"));
        assert_ne!(digest, digest_password("hunter3"));
    }

    #[test]
    fn lock_keys_are_positive_and_distinct() {
        let a = schema_lock_key(&SchemaName::parse("tenant_a").unwrap());
        let b = schema_lock_key(&SchemaName::parse("tenant_b").unwrap());
        assert!(a > 0);
        assert!(b > 0);
        assert_ne!(a, b);
        assert_eq!(a, schema_lock_key(&SchemaName::parse("tenant_a").unwrap()));
    }

    #[tokio::test]
    async fn dropped_lock_guard_releases_the_lock_with_its_session() -> anyhow::Result<()> {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            return Ok(());
        };
        // Two pools, two sessions. A guard dropped without unlock must not
        // leave the lock on a pooled connection another borrower inherits.
        let pool_a = PgPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await?;
        let pool_b = PgPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await?;

        let suffix = Uuid::new_v4().simple().to_string();
        let schema = SchemaName::parse(&format!("tenant_lockdrop_{}", &suffix[..12]))?;

        let holder = TenantProvisioner::new(pool_a);
        let lock = holder.lock_schema(&schema).await?;
        drop(lock);

        let contender = TenantProvisioner::new(pool_b);
        let relock = contender.lock_schema(&schema).await?;
        contender.unlock(relock).await;
        Ok(())
    }
}
