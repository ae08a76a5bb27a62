use crate::config::config;
use crate::db;
use crate::migrate::MigrationOrchestrator;
use crate::server;

pub async fn handle() -> anyhow::Result<()> {
    let pool = db::connect_from_env().await?;

    // Optional startup sweep. A default schema failure aborts startup; tenant
    // failures are logged and served degraded until the next sweep.
    if config().migration.run_on_startup {
        let report = MigrationOrchestrator::new(pool.clone()).run_all().await?;
        if report.failed > 0 {
            tracing::warn!(
                failed = report.failed,
                tenants = ?report.failed_tenants(),
                "Startup migration sweep left schemas behind"
            );
        }
    }

    server::serve(pool).await?;
    Ok(())
}
