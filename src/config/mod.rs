use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub tenancy: TenancyConfig,
    pub database: DatabaseConfig,
    pub migration: MigrationConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    pub header_name: String,
    pub query_param: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub enable_slow_query_warning: bool,
    pub slow_query_threshold_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub run_on_startup: bool,
    pub advisory_lock_retries: u32,
    pub advisory_lock_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Tenancy overrides
        if let Ok(v) = env::var("TENANT_HEADER_NAME") {
            if !v.trim().is_empty() {
                self.tenancy.header_name = v.trim().to_string();
            }
        }
        if let Ok(v) = env::var("TENANT_QUERY_PARAM") {
            if !v.trim().is_empty() {
                self.tenancy.query_param = v.trim().to_string();
            }
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_ACQUIRE_TIMEOUT_SECS") {
            self.database.acquire_timeout_secs = v.parse().unwrap_or(self.database.acquire_timeout_secs);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_SLOW_QUERY_WARNING") {
            self.database.enable_slow_query_warning = v.parse().unwrap_or(self.database.enable_slow_query_warning);
        }
        if let Ok(v) = env::var("DATABASE_SLOW_QUERY_THRESHOLD_MS") {
            self.database.slow_query_threshold_ms = v.parse().unwrap_or(self.database.slow_query_threshold_ms);
        }

        // Migration overrides
        if let Ok(v) = env::var("MIGRATE_ON_STARTUP") {
            self.migration.run_on_startup = v.parse().unwrap_or(self.migration.run_on_startup);
        }
        if let Ok(v) = env::var("MIGRATE_LOCK_RETRIES") {
            self.migration.advisory_lock_retries = v.parse().unwrap_or(self.migration.advisory_lock_retries);
        }
        if let Ok(v) = env::var("MIGRATE_LOCK_BACKOFF_MS") {
            self.migration.advisory_lock_backoff_ms = v.parse().unwrap_or(self.migration.advisory_lock_backoff_ms);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            tenancy: TenancyConfig {
                header_name: "X-Tenant-ID".to_string(),
                query_param: "tenant".to_string(),
            },
            database: DatabaseConfig {
                max_connections: 10,
                acquire_timeout_secs: 30,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 100,
            },
            migration: MigrationConfig {
                run_on_startup: true,
                advisory_lock_retries: 10,
                advisory_lock_backoff_ms: 100,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            tenancy: TenancyConfig {
                header_name: "X-Tenant-ID".to_string(),
                query_param: "tenant".to_string(),
            },
            database: DatabaseConfig {
                max_connections: 20,
                acquire_timeout_secs: 10,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 500,
            },
            migration: MigrationConfig {
                run_on_startup: true,
                advisory_lock_retries: 30,
                advisory_lock_backoff_ms: 250,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            tenancy: TenancyConfig {
                header_name: "X-Tenant-ID".to_string(),
                query_param: "tenant".to_string(),
            },
            database: DatabaseConfig {
                max_connections: 50,
                acquire_timeout_secs: 5,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 1000,
            },
            migration: MigrationConfig {
                run_on_startup: true,
                advisory_lock_retries: 60,
                advisory_lock_backoff_ms: 500,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

// Helper macros for common checks
#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.tenancy.header_name, "X-Tenant-ID");
        assert_eq!(config.tenancy.query_param, "tenant");
        assert!(config.migration.run_on_startup);
        assert!(config.security.enable_cors);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.database.max_connections, 50);
        assert_eq!(config.migration.advisory_lock_retries, 60);
        assert!(config.migration.run_on_startup);
    }
}
