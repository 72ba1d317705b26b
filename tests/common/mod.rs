//! Scripted in-memory backend shared by the integration suites.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use extdb::backend::{Connection, Connector, LoginParams, PreparedStatement};
use extdb::error::ExtDbError;
use extdb::results::ResultSet;
use extdb::types::{BoundParam, ColumnInfo, ColumnKind, RowValues};

/// Knobs and counters for every connection a [`FakeConnector`] opens.
#[derive(Debug, Default)]
pub struct Script {
    /// Upcoming `connect` calls that fail.
    pub connect_failures: AtomicUsize,
    /// Upcoming query/execute calls that fail.
    pub query_failures: AtomicUsize,
    /// Whether scripted query failures are retryable.
    pub failures_retryable: AtomicBool,
    /// The next ping answers under a fresh connection id.
    pub reconnect_on_ping: AtomicBool,
    /// Pings fail outright.
    pub ping_fails: AtomicBool,

    pub connects: AtomicUsize,
    pub prepares: AtomicUsize,
    pub executions: AtomicUsize,
    pub resets: AtomicUsize,
    /// Every statement executed, with bound parameters appended as ` | a, b`.
    pub log: Mutex<Vec<String>>,
    pub rows: Mutex<ResultSet>,
}

impl Script {
    pub fn new() -> Arc<Self> {
        let script = Arc::new(Self::default());
        script.failures_retryable.store(true, Ordering::SeqCst);
        script
    }

    pub fn fail_next_queries(&self, count: usize, retryable: bool) {
        self.failures_retryable.store(retryable, Ordering::SeqCst);
        self.query_failures.store(count, Ordering::SeqCst);
    }

    pub fn set_rows(&self, columns: Vec<ColumnInfo>, rows: Vec<Vec<RowValues>>) {
        let mut result = ResultSet::with_capacity(rows.len());
        result.set_columns(Arc::new(columns));
        for row in rows {
            result.add_row_values(row);
        }
        *self.rows.lock().unwrap() = result;
    }

    pub fn set_insert_id(&self, insert_id: i64) {
        self.rows.lock().unwrap().insert_id = insert_id;
    }

    pub fn executed(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct FakeConnector {
    pub script: Arc<Script>,
}

impl FakeConnector {
    pub fn new(script: Arc<Script>) -> Arc<Self> {
        Arc::new(Self { script })
    }
}

impl Connector for FakeConnector {
    fn connect(&self, login: &LoginParams) -> Result<Box<dyn Connection>, ExtDbError> {
        if Script::take(&self.script.connect_failures) {
            return Err(ExtDbError::ConnectionError(format!(
                "scripted connect failure for {}",
                login.database
            )));
        }
        self.script.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::SeqCst),
            script: Arc::clone(&self.script),
        }))
    }
}

pub struct FakeConnection {
    id: u64,
    script: Arc<Script>,
}

impl FakeConnection {
    fn run(&self, entry: String) -> Result<ResultSet, ExtDbError> {
        self.script.executions.fetch_add(1, Ordering::SeqCst);
        self.script.log.lock().unwrap().push(entry);
        if Script::take(&self.script.query_failures) {
            return if self.script.failures_retryable.load(Ordering::SeqCst) {
                Err(ExtDbError::ExecutionError("scripted failure".into()))
            } else {
                Err(ExtDbError::Unsupported("scripted failure".into()))
            };
        }
        Ok(self.script.rows.lock().unwrap().clone())
    }
}

fn render(param: &BoundParam) -> String {
    match param {
        BoundParam::Text(text) => text.clone(),
        BoundParam::DateTime(at) => at.format("%F %T").to_string(),
        BoundParam::Null => "NULL".to_string(),
    }
}

impl Connection for FakeConnection {
    fn connection_id(&self) -> u64 {
        self.id
    }

    fn ping(&mut self) -> Result<(), ExtDbError> {
        if self.script.ping_fails.load(Ordering::SeqCst) {
            return Err(ExtDbError::ConnectionError("scripted ping failure".into()));
        }
        if self.script.reconnect_on_ping.swap(false, Ordering::SeqCst) {
            self.id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ExtDbError> {
        self.script.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn query(&mut self, sql: &str) -> Result<ResultSet, ExtDbError> {
        self.run(sql.to_string())
    }

    fn prepare(&mut self, sql: &str) -> Result<PreparedStatement, ExtDbError> {
        self.script.prepares.fetch_add(1, Ordering::SeqCst);
        Ok(PreparedStatement {
            sql: Arc::from(sql),
            param_count: sql.matches('?').count(),
        })
    }

    fn execute_prepared(
        &mut self,
        statement: &PreparedStatement,
        params: &[BoundParam],
    ) -> Result<ResultSet, ExtDbError> {
        if params.len() != statement.param_count {
            return Err(ExtDbError::ParameterError(format!(
                "expected {} parameters, got {}",
                statement.param_count,
                params.len()
            )));
        }
        let rendered: Vec<String> = params.iter().map(render).collect();
        self.run(format!("{} | {}", statement.sql, rendered.join(", ")))
    }

    fn clear_statements(&mut self) {}
}

pub fn text(value: &str) -> RowValues {
    RowValues::Text(value.to_string())
}

pub fn column(name: &str) -> ColumnInfo {
    ColumnInfo::new(name, ColumnKind::Value)
}
