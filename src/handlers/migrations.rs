use axum::extract::State;

use crate::middleware::{ApiResponse, ApiResult};
use crate::migrate::MigrationReport;
use crate::server::AppState;

/// POST /api/migrations/run - Run the migration sweep across every schema
///
/// Default schema first, then each registered tenant schema. Per-tenant
/// failures land in the report instead of failing the request; only a default
/// schema failure or an unreadable registry surfaces as an error.
pub async fn migrations_run_post(State(state): State<AppState>) -> ApiResult<MigrationReport> {
    let report = state.orchestrator().run_all().await?;
    Ok(ApiResponse::success(report))
}
