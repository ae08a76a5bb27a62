use crate::cli::OutputFormat;
use crate::db;
use crate::migrate::MigrationOrchestrator;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = db::connect_from_env().await?;
    let report = MigrationOrchestrator::new(pool).run_all().await?;

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("{:<20} {:<25} {:<8} {}", "TENANT", "SCHEMA", "APPLIED", "STATUS");
            println!("{}", "-".repeat(70));

            for outcome in &report.outcomes {
                let tenant = outcome.tenant_id.as_deref().unwrap_or("-");
                let status = match &outcome.error {
                    None => "ok".to_string(),
                    Some(err) => format!("failed: {}", err),
                };
                println!(
                    "{:<20} {:<25} {:<8} {}",
                    tenant, outcome.schema, outcome.applied, status
                );
            }

            println!();
            println!(
                "{} schema(s), {} succeeded, {} failed, {} statement(s) applied",
                report.total, report.succeeded, report.failed, report.applied
            );
        }
    }

    if report.failed > 0 {
        return Err(anyhow::anyhow!("{} schema(s) failed to migrate", report.failed));
    }

    Ok(())
}
