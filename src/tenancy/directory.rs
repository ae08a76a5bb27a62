use tracing::warn;

use crate::tenancy::registry::{is_valid_tenant_id, RegistryError, TenantRegistry};
use crate::tenancy::schema_name::SchemaName;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The control plane could not be queried. Distinct from "tenant not
    /// found": an unknown tenant falls back to the default schema, an
    /// unanswerable lookup must not.
    #[error("Tenant lookup failed: {0}")]
    Lookup(#[from] RegistryError),
}

/// Maps inbound tenant hints to schema names via the registry.
///
/// Hints are untrusted request data. A hint only ever selects among schema
/// names that provisioning stored; it is never turned into an identifier
/// itself.
#[derive(Debug, Clone)]
pub struct TenantDirectory {
    registry: TenantRegistry,
}

impl TenantDirectory {
    pub fn new(registry: TenantRegistry) -> Self {
        Self { registry }
    }

    /// Resolve a tenant hint to a schema name.
    ///
    /// Malformed, unknown, and deactivated hints all resolve to the default
    /// schema with a warning (requests proceed untenanted rather than fail).
    /// Only a registry that cannot answer is an error.
    pub async fn resolve(&self, hint: &str) -> Result<SchemaName, DirectoryError> {
        if !is_valid_tenant_id(hint) {
            warn!("Malformed tenant hint, using default schema");
            return Ok(SchemaName::default_schema());
        }

        let record = self.registry.find_by_external_id(hint).await?;
        match record {
            Some(tenant) if tenant.is_active => match SchemaName::parse(&tenant.schema_name) {
                Ok(schema) => Ok(schema),
                Err(err) => {
                    // A registry row with a bad schema name is corrupt data,
                    // not a routable tenant.
                    warn!(tenant_id = %tenant.tenant_id, %err, "Registry row has invalid schema name, using default schema");
                    Ok(SchemaName::default_schema())
                }
            },
            Some(tenant) => {
                warn!(tenant_id = %tenant.tenant_id, "Tenant is deactivated, using default schema");
                Ok(SchemaName::default_schema())
            }
            None => {
                warn!(tenant_hint = %hint, "Unknown tenant, using default schema");
                Ok(SchemaName::default_schema())
            }
        }
    }
}
