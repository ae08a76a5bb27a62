// Canonical schema definition shared by every tenant schema.
//
// The planner is pure: given what already exists it emits only the missing
// DDL, every statement guarded with IF NOT EXISTS. Drifted schemas converge
// toward the canonical structure on the next sweep.
use std::collections::HashSet;

use crate::tenancy::schema_name::SchemaName;

/// One DDL statement with a human-readable label.
#[derive(Debug, Clone)]
pub struct SchemaAction {
    description: String,
    sql: String,
}

impl SchemaAction {
    fn new(description: String, sql: String) -> Self {
        Self { description, sql }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

fn qualified(schema: &SchemaName, ident: &str) -> String {
    format!("{}.\"{}\"", schema.quoted(), ident)
}

fn ensure_table(
    actions: &mut Vec<SchemaAction>,
    schema: &SchemaName,
    existing_tables: &HashSet<String>,
    table: &str,
    build_sql: fn(&SchemaName) -> String,
) {
    if !existing_tables.contains(table) {
        actions.push(SchemaAction::new(
            format!("create table {}", qualified(schema, table)),
            build_sql(schema),
        ));
    }
}

fn ensure_index(
    actions: &mut Vec<SchemaAction>,
    schema: &SchemaName,
    existing_indexes: &HashSet<String>,
    index: &str,
    build_sql: fn(&SchemaName) -> String,
) {
    if !existing_indexes.contains(index) {
        actions.push(SchemaAction::new(
            format!("create index {}", qualified(schema, index)),
            build_sql(schema),
        ));
    }
}

/// Emit the DDL actions that bring `schema` up to the canonical structure.
///
/// Tables are ordered so foreign key targets are created before their
/// referrers. The control-plane `tenants` table is part of the default
/// schema's canonical set only.
pub fn plan_actions(
    schema: &SchemaName,
    schema_exists: bool,
    existing_tables: &HashSet<String>,
    existing_indexes: &HashSet<String>,
) -> Vec<SchemaAction> {
    let mut actions = Vec::new();

    if !schema_exists {
        actions.push(SchemaAction::new(
            format!("create schema {}", schema.quoted()),
            format!("CREATE SCHEMA IF NOT EXISTS {}", schema.quoted()),
        ));
    }

    if schema.is_default() {
        ensure_table(&mut actions, schema, existing_tables, "tenants", build_tenants_table_sql);
    }

    ensure_table(&mut actions, schema, existing_tables, "roles", build_roles_table_sql);
    ensure_table(&mut actions, schema, existing_tables, "app_users", build_app_users_table_sql);
    ensure_table(&mut actions, schema, existing_tables, "courses", build_courses_table_sql);
    ensure_table(&mut actions, schema, existing_tables, "enrollments", build_enrollments_table_sql);

    ensure_index(
        &mut actions,
        schema,
        existing_indexes,
        "app_users_email_key",
        build_app_users_email_index_sql,
    );
    ensure_index(
        &mut actions,
        schema,
        existing_indexes,
        "app_users_username_key",
        build_app_users_username_index_sql,
    );
    ensure_index(
        &mut actions,
        schema,
        existing_indexes,
        "courses_course_code_key",
        build_courses_course_code_index_sql,
    );
    ensure_index(
        &mut actions,
        schema,
        existing_indexes,
        "enrollments_course_user_key",
        build_enrollments_course_user_index_sql,
    );
    ensure_index(
        &mut actions,
        schema,
        existing_indexes,
        "enrollments_user_id_idx",
        build_enrollments_user_index_sql,
    );

    actions
}

fn build_tenants_table_sql(schema: &SchemaName) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            tenant_id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            schema_name TEXT NOT NULL UNIQUE,
            is_active BOOLEAN NOT NULL DEFAULT true,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        table = qualified(schema, "tenants"),
    )
}

fn build_roles_table_sql(schema: &SchemaName) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )
        "#,
        table = qualified(schema, "roles"),
    )
}

fn build_app_users_table_sql(schema: &SchemaName) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id BIGSERIAL PRIMARY KEY,
            email TEXT NOT NULL,
            username TEXT NOT NULL,
            password TEXT NOT NULL,
            first_name TEXT,
            last_name TEXT,
            role_id BIGINT REFERENCES {roles}(id),
            is_active BOOLEAN NOT NULL DEFAULT true,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        table = qualified(schema, "app_users"),
        roles = qualified(schema, "roles"),
    )
}

fn build_courses_table_sql(schema: &SchemaName) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            course_code TEXT,
            description TEXT,
            teacher_id BIGINT REFERENCES {app_users}(id),
            is_open BOOLEAN NOT NULL DEFAULT true,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        table = qualified(schema, "courses"),
        app_users = qualified(schema, "app_users"),
    )
}

fn build_enrollments_table_sql(schema: &SchemaName) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id BIGSERIAL PRIMARY KEY,
            course_id BIGINT NOT NULL REFERENCES {courses}(id),
            user_id BIGINT NOT NULL REFERENCES {app_users}(id),
            enrolled_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        table = qualified(schema, "enrollments"),
        courses = qualified(schema, "courses"),
        app_users = qualified(schema, "app_users"),
    )
}

fn build_app_users_email_index_sql(schema: &SchemaName) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS \"app_users_email_key\" ON {} (email)",
        qualified(schema, "app_users"),
    )
}

fn build_app_users_username_index_sql(schema: &SchemaName) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS \"app_users_username_key\" ON {} (username)",
        qualified(schema, "app_users"),
    )
}

fn build_courses_course_code_index_sql(schema: &SchemaName) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS \"courses_course_code_key\" ON {} (course_code)",
        qualified(schema, "courses"),
    )
}

fn build_enrollments_course_user_index_sql(schema: &SchemaName) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS \"enrollments_course_user_key\" ON {} (course_id, user_id)",
        qualified(schema, "enrollments"),
    )
}

fn build_enrollments_user_index_sql(schema: &SchemaName) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS \"enrollments_user_id_idx\" ON {} (user_id)",
        qualified(schema, "enrollments"),
    )
}
