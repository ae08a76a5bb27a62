// server.rs - Router assembly and HTTP entry point

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::config;
use crate::db::SchemaRouter;
use crate::handlers;
use crate::middleware::resolve_tenant_middleware;
use crate::migrate::MigrationOrchestrator;
use crate::provision::TenantProvisioner;
use crate::tenancy::directory::TenantDirectory;
use crate::tenancy::registry::TenantRegistry;

/// Shared handler state: one pool, services constructed on demand.
///
/// Every service is a thin wrapper around the pool, so building one per
/// request costs a pool handle clone and nothing else.
#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn registry(&self) -> TenantRegistry {
        TenantRegistry::new(self.pool.clone())
    }

    pub fn directory(&self) -> TenantDirectory {
        TenantDirectory::new(self.registry())
    }

    pub fn router(&self) -> SchemaRouter {
        SchemaRouter::new(self.pool.clone())
    }

    pub fn orchestrator(&self) -> MigrationOrchestrator {
        MigrationOrchestrator::new(self.pool.clone())
    }

    pub fn provisioner(&self) -> TenantProvisioner {
        TenantProvisioner::new(self.pool.clone())
    }
}

/// Build the full router over a shared pool.
///
/// Tests drive this directly with `tower::ServiceExt::oneshot`; `serve` binds
/// it to a listener.
pub fn app(pool: PgPool) -> Router {
    let state = AppState::new(pool);

    Router::new()
        // Public, tenant-agnostic
        .route("/", get(root))
        .route("/health", get(handlers::health::health_get))
        // Tenant-scoped API
        .merge(api_routes(state.clone()))
        // Global middleware
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes(state: AppState) -> Router<AppState> {
    use axum::middleware::from_fn_with_state;
    use handlers::{context, migrations, tenants, users};

    Router::new()
        .route("/api/context", get(context::context_get))
        .route("/api/users", get(users::users_get))
        // Control plane
        .route(
            "/api/tenants",
            get(tenants::tenants_get).post(tenants::tenants_post),
        )
        .route(
            "/api/tenants/:id",
            get(tenants::tenant_get).delete(tenants::tenant_delete),
        )
        .route("/api/tenants/:id/migrate", post(tenants::tenant_migrate_post))
        .route("/api/migrations/run", post(migrations::migrations_run_post))
        // Every /api request gets its schema binding before the handler runs
        .layer(from_fn_with_state(state, resolve_tenant_middleware))
}

fn cors_layer() -> CorsLayer {
    let security = &config().security;
    if !security.enable_cors {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Bind and serve until the process is stopped.
pub async fn serve(pool: PgPool) -> Result<(), std::io::Error> {
    let app = app(pool);

    // Allow tests or deployments to override port via env
    let port = std::env::var("CAMPUS_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    println!("🚀 Campus API server listening on http://{}", bind_addr);

    axum::serve(listener, app).await
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Campus API",
            "version": version,
            "description": "Multi-tenant campus backend with schema-per-tenant isolation",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "context": "/api/context (tenant-scoped)",
                "users": "/api/users (tenant-scoped)",
                "tenants": "/api/tenants[/:id] (control plane)",
                "migrations": "/api/migrations/run, /api/tenants/:id/migrate (control plane)",
            }
        }
    }))
}
