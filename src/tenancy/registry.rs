use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Control-plane row describing one tenant. Lives in `public.tenants` and
/// nowhere else; tenant schemas never see this table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantRecord {
    pub tenant_id: String,
    pub display_name: String,
    pub schema_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RegistryError {
    /// True when the underlying database error is a unique constraint
    /// violation (SQLSTATE 23505).
    pub fn is_unique_violation(&self) -> bool {
        if let RegistryError::Database(sqlx::Error::Database(db_err)) = self {
            return db_err.code().map(|code| code == "23505").unwrap_or(false);
        }
        false
    }
}

/// Validate an external tenant identifier before it is used in a lookup or
/// stored. Letters, digits, hyphens and underscores only.
pub fn is_valid_tenant_id(id: &str) -> bool {
    id.len() >= 2
        && id.len() <= 100
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Reads and writes on the control-plane `tenants` table.
///
/// Every query is schema-qualified with `public` so registry access works on
/// any connection regardless of its current `search_path`.
#[derive(Debug, Clone)]
pub struct TenantRegistry {
    pool: PgPool,
}

impl TenantRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All registered tenants, active or not, ordered by external id.
    pub async fn all(&self) -> Result<Vec<TenantRecord>, RegistryError> {
        let rows = sqlx::query_as::<_, TenantRecord>(
            r#"
            SELECT tenant_id, display_name, schema_name, is_active, created_at, updated_at
            FROM public.tenants
            ORDER BY tenant_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_external_id(
        &self,
        tenant_id: &str,
    ) -> Result<Option<TenantRecord>, RegistryError> {
        let row = sqlx::query_as::<_, TenantRecord>(
            r#"
            SELECT tenant_id, display_name, schema_name, is_active, created_at, updated_at
            FROM public.tenants
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_by_schema_name(
        &self,
        schema_name: &str,
    ) -> Result<Option<TenantRecord>, RegistryError> {
        let row = sqlx::query_as::<_, TenantRecord>(
            r#"
            SELECT tenant_id, display_name, schema_name, is_active, created_at, updated_at
            FROM public.tenants
            WHERE schema_name = $1
            "#,
        )
        .bind(schema_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Insert a new tenant row. Uniqueness conflicts surface as
    /// `sqlx::Error::Database`; provisioning checks first and maps the
    /// residual race to a conflict error.
    pub async fn insert(
        &self,
        tenant_id: &str,
        display_name: &str,
        schema_name: &str,
    ) -> Result<TenantRecord, RegistryError> {
        let row = sqlx::query_as::<_, TenantRecord>(
            r#"
            INSERT INTO public.tenants (tenant_id, display_name, schema_name, is_active)
            VALUES ($1, $2, $3, true)
            RETURNING tenant_id, display_name, schema_name, is_active, created_at, updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(display_name)
        .bind(schema_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Soft-deactivate a tenant. The row stays and the migration sweep still
    /// covers its schema; the directory just stops routing to it.
    pub async fn deactivate(
        &self,
        tenant_id: &str,
    ) -> Result<Option<TenantRecord>, RegistryError> {
        let row = sqlx::query_as::<_, TenantRecord>(
            r#"
            UPDATE public.tenants
            SET is_active = false, updated_at = now()
            WHERE tenant_id = $1
            RETURNING tenant_id, display_name, schema_name, is_active, created_at, updated_at
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
