//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::backend::{Connection, Connector, LoginParams, PreparedStatement};
pub use crate::config::{ConfigSource, ExtensionConfig};
pub use crate::dispatch::{MultiPoll, ResultStore, SinglePoll, WorkerPool};
pub use crate::error::ExtDbError;
pub use crate::extension::{BoundedWrite, DEFAULT_OUTPUT_SIZE, Extension, ExtensionBuilder};
pub use crate::pool::{ConnectionPool, DatabasePools, PoolSettings, PooledSession, Session};
pub use crate::protocol::{Protocol, ProtocolKind, ProtocolRegistry};
pub use crate::results::ResultSet;
pub use crate::template::{CallDefinitions, LoadReport, QueryTemplateEngine, load_definitions};
pub use crate::types::{BoundParam, ColumnInfo, ColumnKind, RowValues};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteConnector, SqliteOptions};
