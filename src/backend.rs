//! Seam between the middleware and a database client library.
//!
//! A [`Connector`] opens [`Connection`]s from [`LoginParams`]; the pool owns the connections and
//! the template engine drives them. The `sqlite` feature provides the default implementation.

use std::fmt;
use std::sync::Arc;

use crate::error::ExtDbError;
use crate::results::ResultSet;
use crate::types::BoundParam;

/// Parameters needed to open a new connection for a logical database.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct LoginParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Schema name, or the database file for file-backed engines.
    pub database: String,
}

impl LoginParams {
    #[must_use]
    pub fn for_database(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }
}

/// A statement prepared on a [`Connection`].
///
/// The handle is only meaningful to the connection that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    pub sql: Arc<str>,
    pub param_count: usize,
}

/// Opens connections for a pool.
pub trait Connector: Send + Sync + fmt::Debug {
    /// Open and validate a new connection.
    ///
    /// # Errors
    ///
    /// Returns `ExtDbError::ConnectionError` (or a backend error) when the database is unreachable.
    fn connect(&self, login: &LoginParams) -> Result<Box<dyn Connection>, ExtDbError>;
}

/// One live database connection.
pub trait Connection: Send {
    /// Identifier of the server-side connection. Changes when the client silently reconnects.
    fn connection_id(&self) -> u64;

    /// Check liveness, reconnecting transparently if the client supports it.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection is dead and could not be re-established.
    fn ping(&mut self) -> Result<(), ExtDbError>;

    /// Return the connection to a clean state (no open transaction, no cached statements).
    ///
    /// # Errors
    ///
    /// Returns an error when the reset itself fails.
    fn reset(&mut self) -> Result<(), ExtDbError>;

    /// Run literal SQL text and collect the rows of its result.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails to parse or execute.
    fn query(&mut self, sql: &str) -> Result<ResultSet, ExtDbError>;

    /// Prepare a statement for repeated execution.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails to prepare.
    fn prepare(&mut self, sql: &str) -> Result<PreparedStatement, ExtDbError>;

    /// Execute a statement previously returned by [`Connection::prepare`].
    ///
    /// # Errors
    ///
    /// Returns `ExtDbError::ParameterError` when `params` does not match the statement, or an
    /// execution error from the backend.
    fn execute_prepared(
        &mut self,
        statement: &PreparedStatement,
        params: &[BoundParam],
    ) -> Result<ResultSet, ExtDbError>;

    /// Drop every statement prepared on this connection.
    fn clear_statements(&mut self);

    /// Escape `value` for inclusion inside a single-quoted SQL string literal.
    fn escape_string(&self, value: &str) -> String {
        value.replace('\'', "''")
    }
}
