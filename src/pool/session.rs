use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::backend::{Connection, PreparedStatement};
use crate::error::ExtDbError;
use crate::results::ResultSet;
use crate::types::BoundParam;

use super::ConnectionPool;

/// Outcome of a liveness probe on an idle session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    /// The connection answered under a new id; cached statements were dropped.
    Reconnected,
}

/// One live connection plus the statements prepared on it.
///
/// Prepared statements are cached per call name, one entry per statement index.
pub struct Session {
    id: u64,
    conn: Box<dyn Connection>,
    statements: HashMap<String, Vec<PreparedStatement>>,
    last_used: Instant,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("connection_id", &self.conn.connection_id())
            .field("cached_calls", &self.statements.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(id: u64, conn: Box<dyn Connection>) -> Self {
        Self {
            id,
            conn,
            statements: HashMap::new(),
            last_used: Instant::now(),
        }
    }

    /// Pool-unique session id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.conn.connection_id()
    }

    #[must_use]
    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    pub(crate) fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    /// Number of statements currently cached for `call`.
    #[must_use]
    pub fn cached_statements(&self, call: &str) -> usize {
        self.statements.get(call).map_or(0, Vec::len)
    }

    /// Run literal SQL text.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub fn query(&mut self, sql: &str) -> Result<ResultSet, ExtDbError> {
        self.conn.query(sql)
    }

    #[must_use]
    pub fn escape_string(&self, value: &str) -> String {
        self.conn.escape_string(value)
    }

    /// Execute statement `index` of `call`, preparing and caching it on first use.
    ///
    /// # Errors
    /// Propagates preparation, parameter and execution errors.
    pub fn execute_prepared(
        &mut self,
        call: &str,
        index: usize,
        sql: &str,
        params: &[BoundParam],
    ) -> Result<ResultSet, ExtDbError> {
        let statement = self.prepared(call, index, sql)?;
        self.conn.execute_prepared(&statement, params)
    }

    fn prepared(
        &mut self,
        call: &str,
        index: usize,
        sql: &str,
    ) -> Result<PreparedStatement, ExtDbError> {
        if let Some(statement) = self.statements.get(call).and_then(|set| set.get(index)) {
            return Ok(statement.clone());
        }
        let statement = self.conn.prepare(sql)?;
        let set = self.statements.entry(call.to_string()).or_default();
        if set.len() == index {
            set.push(statement.clone());
        }
        Ok(statement)
    }

    /// Drop cached statements and soft-reset the connection.
    ///
    /// # Errors
    /// Returns the backend error if the connection could not be reset.
    pub fn reset(&mut self) -> Result<(), ExtDbError> {
        self.statements.clear();
        self.conn.clear_statements();
        self.conn.reset()
    }

    /// Ping the connection; a changed connection id means the client reconnected underneath us.
    pub(crate) fn check_liveness(&mut self) -> Result<Liveness, ExtDbError> {
        let before = self.conn.connection_id();
        self.conn.ping()?;
        if self.conn.connection_id() == before {
            return Ok(Liveness::Alive);
        }
        debug!(
            session_id = self.id,
            old_connection_id = before,
            new_connection_id = self.conn.connection_id(),
            "connection reassigned, dropping prepared statements"
        );
        self.reset()?;
        Ok(Liveness::Reconnected)
    }
}

/// A session checked out of a [`ConnectionPool`].
///
/// The session goes back to the pool when the guard is dropped or [`PooledSession::release`]d.
pub struct PooledSession {
    session: Option<Session>,
    pool: Arc<ConnectionPool>,
}

impl PooledSession {
    pub(super) fn new(session: Session, pool: Arc<ConnectionPool>) -> Self {
        Self {
            session: Some(session),
            pool,
        }
    }

    /// Return the session to its pool now.
    pub fn release(mut self) {
        if let Some(session) = self.session.take() {
            self.pool.release(session);
        }
    }

    /// Take the session out of pool management; it will not be returned.
    #[must_use]
    pub fn detach(mut self) -> Option<Session> {
        self.session.take()
    }
}

impl Deref for PooledSession {
    type Target = Session;

    fn deref(&self) -> &Session {
        // Only `release`/`detach` take the session, and both consume the guard.
        match self.session.as_ref() {
            Some(session) => session,
            None => unreachable!("pooled session used after release"),
        }
    }
}

impl DerefMut for PooledSession {
    fn deref_mut(&mut self) -> &mut Session {
        match self.session.as_mut() {
            Some(session) => session,
            None => unreachable!("pooled session used after release"),
        }
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.release(session);
        }
    }
}
