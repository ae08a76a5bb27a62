pub mod context;
pub mod directory;
pub mod registry;
pub mod schema_name;

pub use context::{active_schema, current_schema, with_schema, TenantHandoff};
pub use directory::{DirectoryError, TenantDirectory};
pub use registry::{TenantRecord, TenantRegistry};
pub use schema_name::{SchemaName, DEFAULT_SCHEMA};
