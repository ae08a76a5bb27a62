pub mod canonical;

use std::collections::HashSet;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::migrate::canonical::SchemaAction;
use crate::tenancy::registry::{RegistryError, TenantRegistry};
use crate::tenancy::schema_name::SchemaName;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Tenant registry unavailable: {0}")]
    Registry(#[from] RegistryError),

    /// The control-plane schema could not be migrated. Startup must not
    /// proceed past this.
    #[error("Default schema migration failed: {0}")]
    DefaultSchema(String),
}

/// Outcome of migrating one schema.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaOutcome {
    /// External tenant id, absent for the default schema.
    pub tenant_id: Option<String>,
    pub schema: String,
    /// DDL statements actually applied (0 = schema was already current).
    pub applied: usize,
    pub error: Option<String>,
}

impl SchemaOutcome {
    fn succeeded(tenant_id: Option<String>, schema: &str, applied: usize) -> Self {
        Self {
            tenant_id,
            schema: schema.to_string(),
            applied,
            error: None,
        }
    }

    fn failed(tenant_id: Option<String>, schema: &str, error: String) -> Self {
        Self {
            tenant_id,
            schema: schema.to_string(),
            applied: 0,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate result of one migration sweep.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub applied: usize,
    pub outcomes: Vec<SchemaOutcome>,
}

impl MigrationReport {
    pub fn from_outcomes(outcomes: Vec<SchemaOutcome>) -> Self {
        let total = outcomes.len();
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let applied = outcomes.iter().map(|o| o.applied).sum();
        Self {
            total,
            succeeded,
            failed: total - succeeded,
            applied,
            outcomes,
        }
    }

    /// External ids of tenants whose schema failed to migrate.
    pub fn failed_tenants(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .filter_map(|o| o.tenant_id.as_deref())
            .collect()
    }
}

/// Applies the canonical schema definition across the default schema and all
/// registered tenant schemas.
///
/// The default schema is migrated first and its failure is fatal; each tenant
/// schema is then migrated independently, one failure never aborting the
/// sweep.
#[derive(Debug, Clone)]
pub struct MigrationOrchestrator {
    pool: PgPool,
    registry: TenantRegistry,
}

impl MigrationOrchestrator {
    pub fn new(pool: PgPool) -> Self {
        let registry = TenantRegistry::new(pool.clone());
        Self { pool, registry }
    }

    /// Run the full sweep: default schema first, then every registered
    /// tenant schema ordered by tenant id.
    pub async fn run_all(&self) -> Result<MigrationReport, MigrationError> {
        let default = SchemaName::default_schema();
        let default_outcome = match self.run_for_schema(&default).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("Default schema migration failed: {}", err);
                return Err(MigrationError::DefaultSchema(err.to_string()));
            }
        };

        let mut outcomes = vec![default_outcome];

        for tenant in self.registry.all().await? {
            let schema = match SchemaName::parse(&tenant.schema_name) {
                Ok(schema) => schema,
                Err(err) => {
                    warn!(tenant_id = %tenant.tenant_id, "Registry row has invalid schema name: {}", err);
                    outcomes.push(SchemaOutcome::failed(
                        Some(tenant.tenant_id),
                        &tenant.schema_name,
                        err.to_string(),
                    ));
                    continue;
                }
            };

            // A tenant row must never claim the default schema; skip rather
            // than run tenant DDL against the control plane.
            if schema.is_default() {
                warn!(tenant_id = %tenant.tenant_id, "Registry maps tenant to the default schema, skipping");
                continue;
            }

            match self.run_for_schema(&schema).await {
                Ok(mut outcome) => {
                    outcome.tenant_id = Some(tenant.tenant_id);
                    outcomes.push(outcome);
                }
                Err(err) => {
                    error!(tenant_id = %tenant.tenant_id, schema = %schema, "Tenant migration failed: {}", err);
                    outcomes.push(SchemaOutcome::failed(
                        Some(tenant.tenant_id),
                        schema.as_str(),
                        err.to_string(),
                    ));
                }
            }
        }

        let report = MigrationReport::from_outcomes(outcomes);
        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            applied = report.applied,
            "Migration sweep finished"
        );
        Ok(report)
    }

    /// Migrate exactly one schema: introspect, plan the missing DDL, apply it
    /// inside a single transaction.
    pub async fn run_for_schema(
        &self,
        schema: &SchemaName,
    ) -> Result<SchemaOutcome, MigrationError> {
        let plan = self.plan_for_schema(schema).await?;

        if plan.is_empty() {
            return Ok(SchemaOutcome::succeeded(None, schema.as_str(), 0));
        }

        self.apply(schema, &plan).await?;
        Ok(SchemaOutcome::succeeded(None, schema.as_str(), plan.len()))
    }

    async fn plan_for_schema(
        &self,
        schema: &SchemaName,
    ) -> Result<Vec<SchemaAction>, MigrationError> {
        let schema_exists = self.schema_exists(schema).await?;

        let (existing_tables, existing_indexes) = if schema_exists {
            (
                self.existing_tables(schema).await?,
                self.existing_indexes(schema).await?,
            )
        } else {
            (HashSet::new(), HashSet::new())
        };

        Ok(canonical::plan_actions(
            schema,
            schema_exists,
            &existing_tables,
            &existing_indexes,
        ))
    }

    async fn apply(
        &self,
        schema: &SchemaName,
        plan: &[SchemaAction],
    ) -> Result<(), MigrationError> {
        let mut tx = self.pool.begin().await?;
        for action in plan {
            info!(schema = %schema, "Applying: {}", action.description());
            sqlx::query(action.sql()).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn schema_exists(&self, schema: &SchemaName) -> Result<bool, MigrationError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.schemata WHERE schema_name = $1",
        )
        .bind(schema.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn existing_tables(&self, schema: &SchemaName) -> Result<HashSet<String>, MigrationError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = $1 AND table_type = 'BASE TABLE'",
        )
        .bind(schema.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn existing_indexes(&self, schema: &SchemaName) -> Result<HashSet<String>, MigrationError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT indexname FROM pg_indexes WHERE schemaname = $1",
        )
        .bind(schema.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(tenant: Option<&str>, schema: &str, applied: usize) -> SchemaOutcome {
        SchemaOutcome::succeeded(tenant.map(String::from), schema, applied)
    }

    fn err(tenant: Option<&str>, schema: &str) -> SchemaOutcome {
        SchemaOutcome::failed(tenant.map(String::from), schema, "boom".to_string())
    }

    #[test]
    fn report_aggregates_counts() {
        let report = MigrationReport::from_outcomes(vec![
            ok(None, "public", 6),
            ok(Some("t-a"), "tenant_a", 10),
            err(Some("t-b"), "tenant_b"),
            ok(Some("t-c"), "tenant_c", 0),
        ]);

        assert_eq!(report.total, 4);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.applied, 16);
        assert_eq!(report.failed_tenants(), vec!["t-b"]);
    }

    #[test]
    fn empty_sweep_reports_zeroes() {
        let report = MigrationReport::from_outcomes(Vec::new());
        assert_eq!(report.total, 0);
        assert_eq!(report.failed, 0);
        assert!(report.failed_tenants().is_empty());
    }

    #[test]
    fn report_serializes_for_api_and_cli() {
        let report = MigrationReport::from_outcomes(vec![err(Some("t-b"), "tenant_b")]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failed"], 1);
        assert_eq!(json["outcomes"][0]["tenant_id"], "t-b");
        assert_eq!(json["outcomes"][0]["error"], "boom");
    }
}
