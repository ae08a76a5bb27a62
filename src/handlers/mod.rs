// handlers/mod.rs - HTTP handler tree
//
// Handlers stay thin: extract, call into the tenancy and migration services,
// wrap the result in the response envelope. Schema binding already happened
// in the tenant resolution middleware by the time any /api handler runs.

pub mod context; // GET /api/context
pub mod health; // GET /health
pub mod migrations; // POST /api/migrations/run
pub mod tenants; // /api/tenants CRUD + per-tenant migrate
pub mod users; // GET /api/users
