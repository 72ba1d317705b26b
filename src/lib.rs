//! Database middleware for hosts that talk in short text commands.
//!
//! A host hands [`Extension`] commands such as `0:game:getUser:42` and receives array-literal
//! replies such as `[1,[["alice"]]]`. Calls run inline or on worker threads; large or delayed
//! results are parked in a result store and polled by handle. Named calls come from TOML
//! definition sets and run against pooled sessions with bounded retry.
//!
//! ```no_run
//! use std::sync::Arc;
//! use extdb::prelude::*;
//!
//! # fn main() -> Result<(), ExtDbError> {
//! let config = ExtensionConfig::load(std::path::Path::new("extdb.toml"))?;
//! let ext = Extension::builder(Arc::new(config)).build()?;
//! assert_eq!(ext.call("9:ADD_DATABASE:Database"), "[1]");
//! assert_eq!(ext.call("9:ADD_DATABASE_PROTOCOL:Database:SQL_CUSTOM:game:game"), "[1]");
//! let reply = ext.call("0:game:getUser:42");
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extension;
pub mod literal;
pub mod pool;
pub mod prelude;
pub mod protocol;
pub mod reply;
pub mod results;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod template;
pub mod types;

pub use error::ExtDbError;
pub use extension::{BoundedWrite, Extension, ExtensionBuilder};
