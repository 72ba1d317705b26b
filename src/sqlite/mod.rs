// SQLite module - the default database backend
//
// This module is split into several sub-modules:
// - config: Connector options and connection setup
// - connection: The pooled connection and its liveness/reset handling
// - params: Parameter conversion between middleware and SQLite types
// - query: Result extraction and building

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

// Re-export the public API
pub use config::{SqliteConnector, SqliteOptions};
pub use connection::SqliteConnection;
pub use query::build_result_set;
