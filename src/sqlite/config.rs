use std::time::Duration;

use tracing::debug;

use crate::backend::{Connection, Connector, LoginParams};
use crate::error::ExtDbError;

use super::connection::SqliteConnection;

/// Options for opening `SQLite` connections.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub busy_timeout: Duration,
    pub statement_cache_capacity: usize,
    pub wal: bool,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            statement_cache_capacity: 128,
            wal: true,
        }
    }
}

/// Opens file-backed `SQLite` connections. `LoginParams::database` is the file path; the
/// network fields are ignored.
#[derive(Debug, Clone, Default)]
pub struct SqliteConnector {
    options: SqliteOptions,
}

impl SqliteConnector {
    #[must_use]
    pub fn new(options: SqliteOptions) -> Self {
        Self { options }
    }

    /// Open a raw connection and apply the configured pragmas.
    ///
    /// # Errors
    /// Returns `ExtDbError::SqliteError` if the file cannot be opened or configured.
    pub(super) fn open(&self, path: &str) -> Result<rusqlite::Connection, ExtDbError> {
        let conn = rusqlite::Connection::open(path)?;
        conn.busy_timeout(self.options.busy_timeout)?;
        conn.set_prepared_statement_cache_capacity(self.options.statement_cache_capacity);
        if self.options.wal {
            conn.execute_batch(
                "
                    PRAGMA journal_mode = WAL;
                ",
            )?;
        }
        Ok(conn)
    }
}

impl Connector for SqliteConnector {
    fn connect(&self, login: &LoginParams) -> Result<Box<dyn Connection>, ExtDbError> {
        if login.database.is_empty() {
            return Err(ExtDbError::ConfigError(
                "SQLite database path is empty".into(),
            ));
        }
        if !login.host.is_empty() {
            debug!(host = %login.host, "host is ignored for SQLite connections");
        }
        let conn = self.open(&login.database)?;
        Ok(Box::new(SqliteConnection::new(
            conn,
            login.database.clone(),
            self.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowValues;

    fn journal_mode(connector: &SqliteConnector, dir: &tempfile::TempDir) -> RowValues {
        let login = LoginParams::for_database(dir.path().join("j.sqlite").to_string_lossy());
        let mut conn = connector.connect(&login).unwrap();
        let rows = conn.query("PRAGMA journal_mode").unwrap();
        rows.results[0][0].clone()
    }

    #[test]
    fn wal_follows_options() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            journal_mode(&SqliteConnector::default(), &dir),
            RowValues::Text("wal".into())
        );

        let dir = tempfile::tempdir().unwrap();
        let options = SqliteOptions {
            busy_timeout: Duration::from_millis(250),
            wal: false,
            ..SqliteOptions::default()
        };
        assert_eq!(
            journal_mode(&SqliteConnector::new(options), &dir),
            RowValues::Text("delete".into())
        );
    }

    #[test]
    fn empty_database_path_is_a_config_error() {
        let err = SqliteConnector::default()
            .connect(&LoginParams::default())
            .err().unwrap();
        assert!(matches!(err, ExtDbError::ConfigError(_)));
    }
}
