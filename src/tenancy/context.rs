use std::future::Future;

use crate::tenancy::schema_name::SchemaName;

tokio::task_local! {
    /// Active schema for the current unit of work. Set by scope, never by
    /// assignment: the value exists exactly for the duration of the future
    /// passed to [`with_schema`] and is unwound with it, including on panic
    /// and cancellation.
    static ACTIVE_SCHEMA: SchemaName;
}

/// Schema the current task should run queries against. Falls back to the
/// default schema when no tenant scope is active, so control-plane work and
/// background tasks resolve without ceremony.
pub fn current_schema() -> SchemaName {
    ACTIVE_SCHEMA
        .try_with(|schema| schema.clone())
        .unwrap_or_else(|_| SchemaName::default_schema())
}

/// Active schema if one was explicitly set, `None` otherwise. Lets callers
/// distinguish "scoped to public" from "never scoped".
pub fn active_schema() -> Option<SchemaName> {
    ACTIVE_SCHEMA.try_with(|schema| schema.clone()).ok()
}

/// Run `fut` with `schema` as the active schema. Scopes nest; the innermost
/// value wins and the outer value is restored when the inner future ends.
pub async fn with_schema<F>(schema: SchemaName, fut: F) -> F::Output
where
    F: Future,
{
    ACTIVE_SCHEMA.scope(schema, fut).await
}

/// Captured tenant scope for handing off work to a spawned task.
///
/// Task-local state does not cross `tokio::spawn`, so a request handler that
/// fans out work captures a handoff first and the worker re-enters the scope
/// with [`TenantHandoff::run`].
#[derive(Debug, Clone)]
pub struct TenantHandoff {
    schema: SchemaName,
}

impl TenantHandoff {
    /// Capture the calling task's active schema (default when unscoped).
    pub fn capture() -> Self {
        Self {
            schema: current_schema(),
        }
    }

    /// Build a handoff for an explicit schema, for work that originates
    /// outside any request (sweeps, provisioning).
    pub fn for_schema(schema: SchemaName) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &SchemaName {
        &self.schema
    }

    /// Run `fut` inside the captured scope.
    pub async fn run<F>(self, fut: F) -> F::Output
    where
        F: Future,
    {
        with_schema(self.schema, fut).await
    }
}
