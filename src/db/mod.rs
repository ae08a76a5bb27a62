pub mod pool;
pub mod router;

pub use pool::{connect, connect_from_env, health_check, PoolError};
pub use router::{RoutedConnection, RoutingError, SchemaRouter};
