use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::config::config;
use crate::error::ApiError;
use crate::server::AppState;
use crate::tenancy::context;
use crate::tenancy::schema_name::SchemaName;

/// Pull the tenant hint off a request: configured header first, query
/// parameter fallback. Whitespace-only values count as absent.
pub fn extract_hint(request: &Request) -> Option<String> {
    let tenancy = &config().tenancy;

    if let Some(value) = request.headers().get(tenancy.header_name.as_str()) {
        if let Ok(value) = value.to_str() {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    let query = request.uri().query().unwrap_or("");
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key == tenancy.query_param.as_str() {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}

/// Resolve the request's tenant and run the rest of the stack inside that
/// tenant's schema scope.
///
/// No hint means the default schema; health checks and control-plane
/// endpoints work without any tenant header. The scope is bound around
/// `next.run`, so handler panics and client disconnects unwind it with the
/// request - nothing survives into the next request on the same worker.
pub async fn resolve_tenant_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let schema = match extract_hint(&request) {
        Some(hint) => state.directory().resolve(&hint).await?,
        None => SchemaName::default_schema(),
    };

    debug!(schema = %schema, "Request scoped to schema");
    Ok(context::with_schema(schema, next.run(request)).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(uri: &str, header: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = header {
            builder = builder.header("X-Tenant-ID", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn no_hint_on_bare_request() {
        assert_eq!(extract_hint(&request("/api/users", None)), None);
    }

    #[test]
    fn header_hint_wins() {
        let req = request("/api/users?tenant=t-query", Some("t-header"));
        assert_eq!(extract_hint(&req), Some("t-header".to_string()));
    }

    #[test]
    fn query_hint_is_fallback() {
        let req = request("/api/users?tenant=t-query", None);
        assert_eq!(extract_hint(&req), Some("t-query".to_string()));
    }

    #[test]
    fn blank_values_count_as_absent() {
        assert_eq!(extract_hint(&request("/api/users?tenant=", None)), None);
        assert_eq!(extract_hint(&request("/api/users?tenant=%20%20", None)), None);
        assert_eq!(extract_hint(&request("/api/users", Some("   "))), None);
    }

    #[test]
    fn other_query_params_are_ignored() {
        let req = request("/api/users?team=t-demo&limit=5", None);
        assert_eq!(extract_hint(&req), None);
    }
}
