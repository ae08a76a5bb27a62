mod common;

use anyhow::Result;
use campus_api::migrate::MigrationOrchestrator;
use campus_api::provision::{NewTenant, ProvisionError, TenantProvisioner};
use campus_api::tenancy::{SchemaName, TenantRegistry};

fn new_tenant(tenant_id: &str) -> NewTenant {
    NewTenant {
        tenant_id: tenant_id.to_string(),
        display_name: "Provisioning Test".to_string(),
        schema_name: None,
        admin_email: None,
    }
}

#[tokio::test]
async fn rejects_invalid_input_before_touching_the_database() -> Result<()> {
    // The dead pool proves validation happens before any IO.
    let provisioner = TenantProvisioner::new(common::lazy_pool());

    let result = provisioner.provision(&new_tenant("x")).await;
    assert!(matches!(result, Err(ProvisionError::InvalidName(_))));

    let result = provisioner.provision(&new_tenant("t;drop")).await;
    assert!(matches!(result, Err(ProvisionError::InvalidName(_))));

    let mut input = new_tenant("t-demo");
    input.display_name = "   ".to_string();
    let result = provisioner.provision(&input).await;
    assert!(matches!(result, Err(ProvisionError::InvalidName(_))));

    let mut input = new_tenant("t-demo");
    input.schema_name = Some("public".to_string());
    let result = provisioner.provision(&input).await;
    assert!(matches!(result, Err(ProvisionError::Reserved(_))));

    let mut input = new_tenant("t-demo");
    input.schema_name = Some("Tenant Demo".to_string());
    let result = provisioner.provision(&input).await;
    assert!(matches!(result, Err(ProvisionError::InvalidName(_))));

    Ok(())
}

#[tokio::test]
async fn provisions_registry_row_schema_and_admin() -> Result<()> {
    let Some(url) = common::test_database_url() else {
        return Ok(());
    };
    let pool = common::connect(&url).await?;
    MigrationOrchestrator::new(pool.clone())
        .run_for_schema(&SchemaName::default_schema())
        .await?;

    let tenant_id = common::unique("t_prov");
    let provisioner = TenantProvisioner::new(pool.clone());
    let provisioned = provisioner.provision(&new_tenant(&tenant_id)).await?;

    let schema_name = provisioned.tenant.schema_name.clone();
    assert_eq!(schema_name, format!("tenant_{}", tenant_id));
    assert_eq!(
        provisioned.admin_email,
        format!("admin@{}.local", tenant_id)
    );
    assert_eq!(provisioned.admin_password.len(), 32);

    let record = TenantRegistry::new(pool.clone())
        .find_by_external_id(&tenant_id)
        .await?
        .expect("registry row");
    assert!(record.is_active);
    assert_eq!(record.schema_name, schema_name);

    // The admin account lives inside the tenant schema and stores a digest,
    // never the raw password.
    let (email, stored): (String, String) = sqlx::query_as(&format!(
        "SELECT email, password FROM \"{}\".app_users LIMIT 1",
        schema_name
    ))
    .fetch_one(&pool)
    .await?;
    assert_eq!(email, provisioned.admin_email);
    assert_ne!(stored, provisioned.admin_password);
    assert_eq!(stored.len(), 64);

    let admin_roles: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM \"{}\".roles WHERE name = 'ADMIN'",
        schema_name
    ))
    .fetch_one(&pool)
    .await?;
    assert_eq!(admin_roles, 1);

    common::drop_schema(&pool, &schema_name).await?;
    common::remove_tenant(&pool, &tenant_id).await?;
    Ok(())
}

#[tokio::test]
async fn duplicate_tenants_and_schemas_conflict() -> Result<()> {
    let Some(url) = common::test_database_url() else {
        return Ok(());
    };
    let pool = common::connect(&url).await?;
    MigrationOrchestrator::new(pool.clone())
        .run_for_schema(&SchemaName::default_schema())
        .await?;

    let tenant_id = common::unique("t_dup");
    let provisioner = TenantProvisioner::new(pool.clone());
    let provisioned = provisioner.provision(&new_tenant(&tenant_id)).await?;
    let schema_name = provisioned.tenant.schema_name.clone();

    // Same external id again.
    let result = provisioner.provision(&new_tenant(&tenant_id)).await;
    assert!(matches!(result, Err(ProvisionError::AlreadyExists(_))));

    // Different id, same schema.
    let other_id = common::unique("t_dup_other");
    let mut input = new_tenant(&other_id);
    input.schema_name = Some(schema_name.clone());
    let result = provisioner.provision(&input).await;
    assert!(matches!(result, Err(ProvisionError::AlreadyExists(_))));

    common::drop_schema(&pool, &schema_name).await?;
    common::remove_tenant(&pool, &tenant_id).await?;
    Ok(())
}

#[tokio::test]
async fn duplicate_registry_insert_is_a_unique_violation() -> Result<()> {
    let Some(url) = common::test_database_url() else {
        return Ok(());
    };
    let pool = common::connect(&url).await?;
    MigrationOrchestrator::new(pool.clone())
        .run_for_schema(&SchemaName::default_schema())
        .await?;

    let tenant_id = common::unique("t_unique");
    let schema_name = format!("tenant_{}", tenant_id);
    let registry = TenantRegistry::new(pool.clone());
    registry.insert(&tenant_id, "First", &schema_name).await?;

    let err = registry
        .insert(&tenant_id, "Second", &schema_name)
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());

    common::remove_tenant(&pool, &tenant_id).await?;
    Ok(())
}

#[tokio::test]
async fn racing_provisions_of_one_tenant_conflict_cleanly() -> Result<()> {
    let Some(url) = common::test_database_url() else {
        return Ok(());
    };
    let pool = common::connect(&url).await?;
    MigrationOrchestrator::new(pool.clone())
        .run_for_schema(&SchemaName::default_schema())
        .await?;

    // Explicit schema names give the two runs different advisory locks, so
    // neither serializes behind the other and the registry insert is the
    // only arbiter.
    let tenant_id = common::unique("t_race");
    let mut first = new_tenant(&tenant_id);
    first.schema_name = Some(format!("{}_one", tenant_id));
    let mut second = new_tenant(&tenant_id);
    second.schema_name = Some(format!("{}_two", tenant_id));

    let provisioner = TenantProvisioner::new(pool.clone());
    let (a, b) = tokio::join!(provisioner.provision(&first), provisioner.provision(&second));

    let (winner, loser) = match (a, b) {
        (Ok(win), Err(err)) => (win, err),
        (Err(err), Ok(win)) => (win, err),
        (a, b) => panic!("expected exactly one winner: {:?} / {:?}", a, b),
    };
    assert_eq!(winner.tenant.tenant_id, tenant_id);
    // Whichever side loses the insert must surface a conflict, never an
    // internal error.
    assert!(
        matches!(loser, ProvisionError::AlreadyExists(_)),
        "unexpected loser error: {:?}",
        loser
    );

    common::drop_schema(&pool, &format!("{}_one", tenant_id)).await?;
    common::drop_schema(&pool, &format!("{}_two", tenant_id)).await?;
    common::remove_tenant(&pool, &tenant_id).await?;
    Ok(())
}

#[tokio::test]
async fn explicit_schema_and_admin_email_are_honored() -> Result<()> {
    let Some(url) = common::test_database_url() else {
        return Ok(());
    };
    let pool = common::connect(&url).await?;
    MigrationOrchestrator::new(pool.clone())
        .run_for_schema(&SchemaName::default_schema())
        .await?;

    let tenant_id = common::unique("t_explicit");
    let schema_name = common::unique("tenant_named");
    let mut input = new_tenant(&tenant_id);
    input.schema_name = Some(schema_name.clone());
    input.admin_email = Some("principal@example.edu".to_string());

    let provisioned = TenantProvisioner::new(pool.clone()).provision(&input).await?;
    assert_eq!(provisioned.tenant.schema_name, schema_name);
    assert_eq!(provisioned.admin_email, "principal@example.edu");

    let (email,): (String,) = sqlx::query_as(&format!(
        "SELECT email FROM \"{}\".app_users LIMIT 1",
        schema_name
    ))
    .fetch_one(&pool)
    .await?;
    assert_eq!(email, "principal@example.edu");

    common::drop_schema(&pool, &schema_name).await?;
    common::remove_tenant(&pool, &tenant_id).await?;
    Ok(())
}
