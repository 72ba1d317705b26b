//! Named protocol handlers reachable through the call grammar.
//!
//! A protocol is registered once under a unique name and lives until reset or shutdown. The
//! set of handler kinds is closed, so dispatch is a plain `match`.

mod log;
mod sql;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::ExtDbError;
use crate::template::QueryTemplateEngine;

pub use log::{LOG_TARGET, LogForwarder};
pub use sql::{SqlOptions, SqlPassThrough, TextQuoting};

/// Handler kinds accepted by `ADD_PROTOCOL` / `ADD_DATABASE_PROTOCOL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    SqlCustom,
    Sql,
    Log,
}

impl ProtocolKind {
    /// Whether the kind must be bound to a database id.
    #[must_use]
    pub fn needs_database(self) -> bool {
        !matches!(self, ProtocolKind::Log)
    }
}

impl FromStr for ProtocolKind {
    type Err = ExtDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SQL_CUSTOM" => Ok(ProtocolKind::SqlCustom),
            "SQL" => Ok(ProtocolKind::Sql),
            "LOG" => Ok(ProtocolKind::Log),
            _ => Err(ExtDbError::ConfigError(format!("unknown protocol type {s}"))),
        }
    }
}

/// A registered protocol instance.
#[derive(Debug)]
pub enum Protocol {
    Custom(QueryTemplateEngine),
    Sql(SqlPassThrough),
    Log(LogForwarder),
}

impl Protocol {
    #[must_use]
    pub fn kind(&self) -> ProtocolKind {
        match self {
            Protocol::Custom(_) => ProtocolKind::SqlCustom,
            Protocol::Sql(_) => ProtocolKind::Sql,
            Protocol::Log(_) => ProtocolKind::Log,
        }
    }

    /// Run `input` and produce its reply.
    #[must_use]
    pub fn call(&self, input: &str) -> String {
        match self {
            Protocol::Custom(engine) => engine.execute(input),
            Protocol::Sql(sql) => sql.execute(input),
            Protocol::Log(log) => log.forward(input),
        }
    }
}

/// Name → protocol table. Names are case-sensitive.
#[derive(Debug, Default)]
pub struct ProtocolRegistry {
    protocols: RwLock<HashMap<String, Arc<Protocol>>>,
}

impl ProtocolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Protocol>>> {
        match self.protocols.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Protocol>>> {
        match self.protocols.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register `protocol` under `name`.
    ///
    /// # Errors
    /// Returns `ExtDbError::ConfigError` when the name is taken.
    pub fn add(&self, name: &str, protocol: Protocol) -> Result<(), ExtDbError> {
        let mut protocols = self.write();
        if protocols.contains_key(name) {
            return Err(ExtDbError::ConfigError(format!(
                "protocol name {name} already taken"
            )));
        }
        debug!(protocol = name, kind = ?protocol.kind(), "protocol registered");
        protocols.insert(name.to_string(), Arc::new(protocol));
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Protocol>> {
        self.read().get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop every registration. In-flight calls keep their handler alive until they finish.
    pub fn clear(&self) {
        self.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_case_insensitively() {
        assert_eq!("sql_custom".parse::<ProtocolKind>().unwrap(), ProtocolKind::SqlCustom);
        assert_eq!("Sql".parse::<ProtocolKind>().unwrap(), ProtocolKind::Sql);
        assert_eq!("LOG".parse::<ProtocolKind>().unwrap(), ProtocolKind::Log);
        assert!("MISC".parse::<ProtocolKind>().is_err());
        assert!(!ProtocolKind::Log.needs_database());
        assert!(ProtocolKind::Sql.needs_database());
    }

    #[test]
    fn registry_rejects_duplicate_names() {
        let registry = ProtocolRegistry::new();
        registry
            .add("log", Protocol::Log(LogForwarder::new(None)))
            .unwrap();
        let err = registry
            .add("log", Protocol::Log(LogForwarder::new(None)))
            .unwrap_err();
        assert!(matches!(err, ExtDbError::ConfigError(_)));
        assert!(registry.contains("log"));
        assert!(!registry.contains("LOG"));
        let log = registry.get("log").unwrap();
        assert_eq!(log.kind(), ProtocolKind::Log);
        assert_eq!(log.call("hello"), "[1]");
        registry.clear();
        assert!(registry.is_empty());
    }
}
