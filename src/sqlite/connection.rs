use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::backend::{Connection, PreparedStatement};
use crate::error::ExtDbError;
use crate::results::ResultSet;
use crate::types::BoundParam;

use super::config::SqliteConnector;
use super::params::convert_params;
use super::query::build_result_set;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> u64 {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// A pooled `SQLite` connection.
///
/// A failed ping reopens the database file under a new connection id, which is how the pool
/// learns that cached statements belong to a connection that no longer exists.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    path: String,
    id: u64,
    connector: SqliteConnector,
}

impl SqliteConnection {
    pub(super) fn new(conn: rusqlite::Connection, path: String, connector: SqliteConnector) -> Self {
        Self {
            conn,
            path,
            id: next_connection_id(),
            connector,
        }
    }

    fn reconnect(&mut self) -> Result<(), ExtDbError> {
        let conn = self.connector.open(&self.path)?;
        self.conn = conn;
        self.id = next_connection_id();
        debug!(path = %self.path, connection_id = self.id, "reopened SQLite connection");
        Ok(())
    }
}

impl Connection for SqliteConnection {
    fn connection_id(&self) -> u64 {
        self.id
    }

    fn ping(&mut self) -> Result<(), ExtDbError> {
        match self
            .conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(path = %self.path, error = %err, "SQLite ping failed, reconnecting");
                self.reconnect()
            }
        }
    }

    fn reset(&mut self) -> Result<(), ExtDbError> {
        self.conn.flush_prepared_statement_cache();
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn query(&mut self, sql: &str) -> Result<ResultSet, ExtDbError> {
        let mut result_set = {
            let mut stmt = self.conn.prepare(sql)?;
            build_result_set(&mut stmt, &[], true)?
        };
        result_set.insert_id = self.conn.last_insert_rowid();
        Ok(result_set)
    }

    fn prepare(&mut self, sql: &str) -> Result<PreparedStatement, ExtDbError> {
        let stmt = self.conn.prepare_cached(sql)?;
        Ok(PreparedStatement {
            sql: Arc::from(sql),
            param_count: stmt.parameter_count(),
        })
    }

    fn execute_prepared(
        &mut self,
        statement: &PreparedStatement,
        params: &[BoundParam],
    ) -> Result<ResultSet, ExtDbError> {
        if params.len() != statement.param_count {
            return Err(ExtDbError::ParameterError(format!(
                "statement expects {} parameters, got {}",
                statement.param_count,
                params.len()
            )));
        }
        let values = convert_params(params);
        let mut result_set = {
            let mut stmt = self.conn.prepare_cached(&statement.sql)?;
            build_result_set(&mut stmt, &values, false)?
        };
        result_set.insert_id = self.conn.last_insert_rowid();
        Ok(result_set)
    }

    fn clear_statements(&mut self) {
        self.conn.flush_prepared_statement_cache();
    }
}
