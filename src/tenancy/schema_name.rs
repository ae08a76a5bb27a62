use std::fmt;

use thiserror::Error;

/// Reserved name of the default schema. Control-plane tables live here and
/// tenant-less requests run against it; it can never be assigned to a tenant.
pub const DEFAULT_SCHEMA: &str = "public";

/// Postgres truncates identifiers beyond this length, which would silently
/// alias two distinct schema names.
const MAX_IDENT_LEN: usize = 63;

#[derive(Debug, Error)]
#[error("invalid schema name: {0}")]
pub struct InvalidSchemaName(pub String);

/// A validated Postgres schema identifier.
///
/// Every schema name that reaches SQL passes through this type first: it is
/// the controlled vocabulary that makes identifier interpolation safe. Raw
/// request data never becomes a `SchemaName` directly - it is mapped through
/// the tenant directory, which only hands out names stored by provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaName(String);

impl SchemaName {
    /// Validate a raw string as a schema name. Accepts lowercase snake-case
    /// identifiers only; rejects the `pg_` namespace Postgres reserves for
    /// itself. The default schema name is valid (it is a real schema).
    pub fn parse(raw: &str) -> Result<Self, InvalidSchemaName> {
        if raw.is_empty() || raw.len() > MAX_IDENT_LEN {
            return Err(InvalidSchemaName(raw.to_string()));
        }
        let mut chars = raw.chars();
        let first = chars.next().unwrap_or('_');
        if !(first.is_ascii_lowercase() || first == '_') {
            return Err(InvalidSchemaName(raw.to_string()));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(InvalidSchemaName(raw.to_string()));
        }
        if raw.starts_with("pg_") {
            return Err(InvalidSchemaName(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// The reserved default schema.
    pub fn default_schema() -> Self {
        Self(DEFAULT_SCHEMA.to_string())
    }

    /// Derive a schema name for a tenant from its external identifier:
    /// lowercase, non-identifier characters folded to `_`, `tenant_` prefix.
    pub fn derive_for_tenant(external_id: &str) -> Self {
        let mut normalized = String::with_capacity(external_id.len());
        for ch in external_id.chars() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                normalized.push(ch.to_ascii_lowercase());
            } else {
                normalized.push('_');
            }
        }
        if normalized.is_empty() {
            normalized.push('_');
        }
        let mut name = format!("tenant_{}", normalized);
        name.truncate(MAX_IDENT_LEN);
        Self(name)
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_SCHEMA
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quoted form for interpolation into SQL identifier position.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0.replace('"', "\"\""))
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SchemaName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_names() {
        assert!(SchemaName::parse("tenant_demo").is_ok());
        assert!(SchemaName::parse("t1").is_ok());
        assert!(SchemaName::parse("_staging").is_ok());
        assert!(SchemaName::parse("public").unwrap().is_default());
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(SchemaName::parse("").is_err());
        assert!(SchemaName::parse("Tenant").is_err());
        assert!(SchemaName::parse("1tenant").is_err());
        assert!(SchemaName::parse("tenant-demo").is_err());
        assert!(SchemaName::parse("tenant demo").is_err());
        assert!(SchemaName::parse("tenant\"; drop schema public").is_err());
        assert!(SchemaName::parse("pg_catalog").is_err());
        assert!(SchemaName::parse(&"a".repeat(64)).is_err());
    }

    #[test]
    fn derives_from_external_ids() {
        assert_eq!(
            SchemaName::derive_for_tenant("T-Demo").as_str(),
            "tenant_t_demo"
        );
        assert_eq!(
            SchemaName::derive_for_tenant("acme42").as_str(),
            "tenant_acme42"
        );
        let long = SchemaName::derive_for_tenant(&"x".repeat(100));
        assert!(long.as_str().len() <= 63);
        assert!(SchemaName::parse(long.as_str()).is_ok());
    }

    #[test]
    fn quotes_identifier() {
        assert_eq!(SchemaName::parse("tenant_demo").unwrap().quoted(), "\"tenant_demo\"");
        assert_eq!(SchemaName::default_schema().quoted(), "\"public\"");
    }
}
