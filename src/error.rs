// HTTP API Error Types
use axum::{response::IntoResponse, http::StatusCode, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>
    },

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError { message, field_errors } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });

                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }

                response
            }
            _ => {
                json!({
                    "error": true,
                    "message": self.message(),
                    "code": self.error_code()
                })
            }
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<crate::tenancy::directory::DirectoryError> for ApiError {
    fn from(err: crate::tenancy::directory::DirectoryError) -> Self {
        // Log the real error but return generic message
        tracing::error!("Tenant directory error: {}", err);
        ApiError::internal_server_error("Tenant resolution failed")
    }
}

impl From<crate::tenancy::registry::RegistryError> for ApiError {
    fn from(err: crate::tenancy::registry::RegistryError) -> Self {
        tracing::error!("Tenant registry error: {}", err);
        ApiError::internal_server_error("Database error occurred")
    }
}

impl From<crate::db::router::RoutingError> for ApiError {
    fn from(err: crate::db::router::RoutingError) -> Self {
        match err {
            crate::db::router::RoutingError::Pool(e) => {
                tracing::error!("Connection acquire failed: {}", e);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            crate::db::router::RoutingError::SchemaSwitch { ref schema, .. } => {
                tracing::error!(%schema, "Schema switch failed: {}", err);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            crate::db::router::RoutingError::Reset(e) => {
                tracing::error!("search_path reset failed: {}", e);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<crate::migrate::MigrationError> for ApiError {
    fn from(err: crate::migrate::MigrationError) -> Self {
        tracing::error!("Migration error: {}", err);
        ApiError::service_unavailable("Service is being updated, please try again later")
    }
}

impl From<crate::provision::ProvisionError> for ApiError {
    fn from(err: crate::provision::ProvisionError) -> Self {
        match err {
            crate::provision::ProvisionError::InvalidName(msg) => {
                let mut field_errors = HashMap::new();
                field_errors.insert("tenant_id".to_string(), msg);
                ApiError::validation_error("Invalid tenant identifier", Some(field_errors))
            }
            crate::provision::ProvisionError::Reserved(msg) => {
                ApiError::bad_request(msg)
            }
            crate::provision::ProvisionError::AlreadyExists(msg) => {
                ApiError::conflict(msg)
            }
            crate::provision::ProvisionError::Busy(schema) => {
                tracing::warn!(%schema, "Provisioning lock contention");
                ApiError::conflict("Tenant is currently being provisioned, please retry")
            }
            other => {
                tracing::error!("Provisioning error: {}", other);
                ApiError::internal_server_error("Tenant provisioning failed")
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        // Log the real error but return generic message
        tracing::error!("SQLx error: {}", err);
        ApiError::internal_server_error("Database error occurred")
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_status_codes() {
        assert_eq!(ApiError::bad_request("nope").status_code(), 400);
        assert_eq!(ApiError::validation_error("nope", None).status_code(), 400);
        assert_eq!(ApiError::not_found("missing").status_code(), 404);
        assert_eq!(ApiError::conflict("taken").status_code(), 409);
        assert_eq!(ApiError::internal_server_error("boom").status_code(), 500);
        assert_eq!(ApiError::service_unavailable("later").status_code(), 503);
    }

    #[test]
    fn json_body_carries_code_and_message() {
        let body = ApiError::conflict("Tenant already exists: t-demo").to_json();
        assert_eq!(body["error"], json!(true));
        assert_eq!(body["code"], json!("CONFLICT"));
        assert_eq!(body["message"], json!("Tenant already exists: t-demo"));
    }

    #[test]
    fn validation_error_includes_field_errors() {
        let mut fields = HashMap::new();
        fields.insert("tenant_id".to_string(), "too short".to_string());
        let body = ApiError::validation_error("Invalid tenant identifier", Some(fields)).to_json();
        assert_eq!(body["code"], json!("VALIDATION_ERROR"));
        assert_eq!(body["field_errors"]["tenant_id"], json!("too short"));
    }
}
