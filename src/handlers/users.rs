use axum::extract::State;
use serde::Serialize;

use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
}

/// GET /api/users - List users in the schema this request resolved to
///
/// The query is unqualified on purpose. Which rows come back is decided
/// entirely by the connection the schema router hands out, which is the whole
/// point of routing at the connection layer.
pub async fn users_get(State(state): State<AppState>) -> ApiResult<Vec<UserSummary>> {
    let router = state.router();
    let mut conn = router.acquire().await?;

    let result = sqlx::query_as::<_, UserSummary>(
        "SELECT id, email, username, first_name, last_name, is_active FROM app_users ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await;

    // Hand the connection back before surfacing any query error.
    let _ = router.release(conn).await;

    Ok(ApiResponse::success(result?))
}
