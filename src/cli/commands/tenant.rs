use clap::Subcommand;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::db;
use crate::provision::{NewTenant, TenantProvisioner};
use crate::tenancy::TenantRegistry;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "Provision a new tenant (registry row, schema, admin account)")]
    Create {
        #[arg(help = "External tenant id, e.g. acme-university")]
        tenant_id: String,

        #[arg(help = "Human-readable tenant name")]
        display_name: String,

        #[arg(long, help = "Explicit schema name (derived from the tenant id when omitted)")]
        schema: Option<String>,

        #[arg(long, help = "Initial admin email (admin@<tenant_id>.local when omitted)")]
        admin_email: Option<String>,
    },

    #[command(about = "List registered tenants")]
    List,

    #[command(about = "Deactivate a tenant (keeps the registry row and schema)")]
    Deactivate {
        #[arg(help = "External tenant id")]
        tenant_id: String,
    },
}

pub async fn handle(cmd: TenantCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TenantCommands::Create {
            tenant_id,
            display_name,
            schema,
            admin_email,
        } => {
            let pool = db::connect_from_env().await?;
            let provisioner = TenantProvisioner::new(pool);

            let input = NewTenant {
                tenant_id,
                display_name,
                schema_name: schema,
                admin_email,
            };
            let provisioned = provisioner.provision(&input).await?;

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&provisioned)?);
                }
                OutputFormat::Text => {
                    println!("Tenant '{}' provisioned", provisioned.tenant.tenant_id);
                    println!("Schema: {}", provisioned.tenant.schema_name);
                    println!("Admin email: {}", provisioned.admin_email);
                    println!("Admin password: {}", provisioned.admin_password);
                    println!();
                    println!("The password is shown once; store it now.");
                }
            }

            Ok(())
        }
        TenantCommands::List => {
            let pool = db::connect_from_env().await?;
            let tenants = TenantRegistry::new(pool).all().await?;

            if tenants.is_empty() {
                match output_format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&json!({ "tenants": [] }))?)
                    }
                    OutputFormat::Text => println!("No tenants registered"),
                }
                return Ok(());
            }

            match output_format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({ "tenants": tenants }))?
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "{:<20} {:<30} {:<25} {:<8} {}",
                        "TENANT", "DISPLAY NAME", "SCHEMA", "ACTIVE", "CREATED"
                    );
                    println!("{}", "-".repeat(100));

                    for tenant in &tenants {
                        println!(
                            "{:<20} {:<30} {:<25} {:<8} {}",
                            tenant.tenant_id,
                            tenant.display_name,
                            tenant.schema_name,
                            tenant.is_active,
                            tenant.created_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
            }

            Ok(())
        }
        TenantCommands::Deactivate { tenant_id } => {
            let pool = db::connect_from_env().await?;
            let registry = TenantRegistry::new(pool);

            match registry.deactivate(&tenant_id).await? {
                Some(tenant) => {
                    match output_format {
                        OutputFormat::Json => {
                            println!("{}", serde_json::to_string_pretty(&tenant)?)
                        }
                        OutputFormat::Text => println!(
                            "Tenant '{}' deactivated; its traffic now falls back to the default schema",
                            tenant.tenant_id
                        ),
                    }
                    Ok(())
                }
                None => Err(anyhow::anyhow!("Tenant '{}' not found", tenant_id)),
            }
        }
    }
}
