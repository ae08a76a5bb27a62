use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult};
use crate::tenancy;

/// GET /api/context - Schema binding of the current request
///
/// Echoes what the tenant resolution middleware decided, so clients and tests
/// can verify which schema their hint landed on without touching any data.
pub async fn context_get() -> ApiResult<Value> {
    let schema = tenancy::current_schema();

    Ok(ApiResponse::success(json!({
        "schema": schema.as_str(),
        "is_default": schema.is_default(),
    })))
}
