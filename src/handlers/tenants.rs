use axum::extract::{Path, State};
use axum::Json;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::migrate::SchemaOutcome;
use crate::provision::{NewTenant, ProvisionedTenant};
use crate::server::AppState;
use crate::tenancy::{SchemaName, TenantRecord};

/// GET /api/tenants - List every registered tenant, active or not
pub async fn tenants_get(State(state): State<AppState>) -> ApiResult<Vec<TenantRecord>> {
    let tenants = state.registry().all().await?;
    Ok(ApiResponse::success(tenants))
}

/// POST /api/tenants - Provision a new tenant
///
/// Creates the registry row, the schema, its canonical structure, and the
/// initial admin account. The response carries the generated admin password;
/// it is not retrievable afterwards.
pub async fn tenants_post(
    State(state): State<AppState>,
    Json(payload): Json<NewTenant>,
) -> ApiResult<ProvisionedTenant> {
    let provisioned = state.provisioner().provision(&payload).await?;
    Ok(ApiResponse::created(provisioned))
}

/// GET /api/tenants/:id - Fetch one tenant by external id
pub async fn tenant_get(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<TenantRecord> {
    let tenant = state
        .registry()
        .find_by_external_id(&tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Tenant '{}' not found", tenant_id)))?;

    Ok(ApiResponse::success(tenant))
}

/// DELETE /api/tenants/:id - Soft-deactivate a tenant
///
/// The registry row and the schema both stay. The directory just stops
/// resolving the tenant, so its traffic falls back to the default schema.
pub async fn tenant_delete(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<TenantRecord> {
    let tenant = state
        .registry()
        .deactivate(&tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Tenant '{}' not found", tenant_id)))?;

    Ok(ApiResponse::success(tenant))
}

/// POST /api/tenants/:id/migrate - Bring one tenant's schema up to date
pub async fn tenant_migrate_post(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<SchemaOutcome> {
    let tenant = state
        .registry()
        .find_by_external_id(&tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Tenant '{}' not found", tenant_id)))?;

    let schema = SchemaName::parse(&tenant.schema_name).map_err(|err| {
        tracing::error!(tenant_id = %tenant.tenant_id, "Registry row has invalid schema name: {}", err);
        ApiError::internal_server_error("Tenant schema entry is invalid")
    })?;
    if schema.is_default() {
        tracing::error!(tenant_id = %tenant.tenant_id, "Registry maps tenant to the default schema");
        return Err(ApiError::internal_server_error("Tenant schema entry is invalid"));
    }

    let mut outcome = state.orchestrator().run_for_schema(&schema).await?;
    outcome.tenant_id = Some(tenant.tenant_id);

    Ok(ApiResponse::success(outcome))
}
