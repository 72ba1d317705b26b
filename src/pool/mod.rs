//! Per-database session pools.
//!
//! Each logical database id owns a [`ConnectionPool`]: an ordered idle list (most recently
//! returned last) plus the login parameters used to open more sessions on demand. The idle
//! list is never locked across a connect or a liveness probe.

mod session;
mod sweep;
mod types;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::backend::{Connector, LoginParams};
use crate::error::ExtDbError;

pub use session::{Liveness, PooledSession, Session};
pub use sweep::Sweeper;
pub use types::{PoolSettings, SweepReport};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        // Clear the poison and continue with the recovered data
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Idle sessions for one logical database.
pub struct ConnectionPool {
    db_id: String,
    login: LoginParams,
    connector: Arc<dyn Connector>,
    settings: PoolSettings,
    idle: Mutex<VecDeque<Session>>,
    next_session_id: AtomicU64,
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("db_id", &self.db_id)
            .field("idle", &self.idle_count())
            .finish_non_exhaustive()
    }
}

impl ConnectionPool {
    /// Create a pool and eagerly open its first session.
    ///
    /// # Errors
    /// Returns the connector's error when the first session cannot be opened.
    pub fn connect(
        db_id: impl Into<String>,
        login: LoginParams,
        connector: Arc<dyn Connector>,
        settings: PoolSettings,
    ) -> Result<Arc<Self>, ExtDbError> {
        let pool = Arc::new(Self {
            db_id: db_id.into(),
            login,
            connector,
            settings,
            idle: Mutex::new(VecDeque::new()),
            next_session_id: AtomicU64::new(1),
        });
        let first = pool.open_session()?;
        pool.release(first);
        info!(db_id = %pool.db_id, "database pool ready");
        Ok(pool)
    }

    #[must_use]
    pub fn db_id(&self) -> &str {
        &self.db_id
    }

    #[must_use]
    pub fn settings(&self) -> PoolSettings {
        self.settings
    }

    fn open_session(&self) -> Result<Session, ExtDbError> {
        let conn = self.connector.connect(&self.login)?;
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        debug!(db_id = %self.db_id, session_id = id, "opened session");
        Ok(Session::new(id, conn))
    }

    /// Check out the oldest idle session, or open a new one when none is idle.
    ///
    /// # Errors
    /// Returns the connector's error when a new session is needed and cannot be opened.
    pub fn acquire(self: &Arc<Self>) -> Result<PooledSession, ExtDbError> {
        let reused = lock(&self.idle).pop_front();
        let session = match reused {
            Some(session) => session,
            None => self.open_session()?,
        };
        Ok(PooledSession::new(session, Arc::clone(self)))
    }

    /// Return a session to the idle list.
    ///
    /// A session id that is already idle is ignored.
    pub fn release(&self, mut session: Session) {
        session.touch();
        let mut idle = lock(&self.idle);
        if idle.iter().any(|s| s.id() == session.id()) {
            warn!(db_id = %self.db_id, session_id = session.id(), "session released twice");
            return;
        }
        idle.push_back(session);
    }

    #[must_use]
    pub fn idle_count(&self) -> usize {
        lock(&self.idle).len()
    }

    /// Ids of idle sessions, oldest first.
    #[must_use]
    pub fn idle_session_ids(&self) -> Vec<u64> {
        lock(&self.idle).iter().map(Session::id).collect()
    }

    /// Evict stale idle sessions and probe the rest.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Instant::now())
    }

    /// Sweep as if the current time were `now`.
    ///
    /// Sessions idle longer than the idle timeout are evicted as one oldest-first prefix.
    /// Survivors are probed outside the lock: a reconnected session has its statements
    /// dropped and is kept, a session whose probe fails is closed. Survivors go back ahead
    /// of anything released while the probe ran.
    pub fn sweep_at(&self, now: Instant) -> SweepReport {
        let timeout = self.settings.idle_timeout;
        let mut report = SweepReport::default();
        let (evicted, survivors): (Vec<Session>, Vec<Session>) = {
            let mut idle = lock(&self.idle);
            let keep_from = idle
                .iter()
                .position(|s| now.saturating_duration_since(s.last_used()) <= timeout)
                .unwrap_or(idle.len());
            let evicted = idle.drain(..keep_from).collect();
            (evicted, idle.drain(..).collect())
        };
        report.evicted = evicted.len();
        drop(evicted);

        let mut kept = Vec::with_capacity(survivors.len());
        for mut session in survivors {
            report.probed += 1;
            match session.check_liveness() {
                Ok(Liveness::Alive) => kept.push(session),
                Ok(Liveness::Reconnected) => {
                    report.reconnected += 1;
                    kept.push(session);
                }
                Err(err) => {
                    warn!(
                        db_id = %self.db_id,
                        session_id = session.id(),
                        error = %err,
                        "dropping session that failed its liveness probe"
                    );
                    report.dropped += 1;
                }
            }
        }

        let mut idle = lock(&self.idle);
        for session in kept.into_iter().rev() {
            idle.push_front(session);
        }
        drop(idle);

        if report.evicted > 0 || report.dropped > 0 {
            debug!(db_id = %self.db_id, ?report, "swept idle sessions");
        }
        report
    }

    /// Close every idle session.
    pub fn close_idle(&self) {
        let drained: Vec<Session> = lock(&self.idle).drain(..).collect();
        drop(drained);
    }
}

/// Database id → pool map shared by protocols, the sweeper and administrative commands.
#[derive(Debug, Default)]
pub struct DatabasePools {
    pools: RwLock<HashMap<String, Arc<ConnectionPool>>>,
    sweep_gate: Mutex<()>,
}

impl DatabasePools {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<ConnectionPool>>> {
        match self.pools.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<ConnectionPool>>> {
        match self.pools.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[must_use]
    pub fn contains(&self, db_id: &str) -> bool {
        self.read().contains_key(db_id)
    }

    #[must_use]
    pub fn get(&self, db_id: &str) -> Option<Arc<ConnectionPool>> {
        self.read().get(db_id).cloned()
    }

    /// Register a pool under its database id.
    ///
    /// # Errors
    /// Returns `ExtDbError::ConfigError` when the id is already registered.
    pub fn insert(&self, pool: Arc<ConnectionPool>) -> Result<(), ExtDbError> {
        let mut pools = self.write();
        if pools.contains_key(pool.db_id()) {
            return Err(ExtDbError::ConfigError(format!(
                "database id {} already connected",
                pool.db_id()
            )));
        }
        pools.insert(pool.db_id().to_string(), pool);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Sweep every pool. Returns `None` when another sweep is already running.
    pub fn sweep_all(&self) -> Option<SweepReport> {
        let _gate = match self.sweep_gate.try_lock() {
            Ok(gate) => gate,
            Err(std::sync::TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(std::sync::TryLockError::WouldBlock) => return None,
        };
        let pools: Vec<Arc<ConnectionPool>> = self.read().values().cloned().collect();
        let mut report = SweepReport::default();
        for pool in pools {
            report.merge(pool.sweep());
        }
        Some(report)
    }

    /// Forget every pool and close its idle sessions.
    pub fn clear(&self) {
        let pools: Vec<Arc<ConnectionPool>> = self.write().drain().map(|(_, pool)| pool).collect();
        for pool in pools {
            pool.close_idle();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Connection, PreparedStatement};
    use crate::results::ResultSet;
    use crate::types::BoundParam;

    #[derive(Debug)]
    struct StubConnector;

    struct StubConnection;

    impl Connector for StubConnector {
        fn connect(&self, _login: &LoginParams) -> Result<Box<dyn Connection>, ExtDbError> {
            Ok(Box::new(StubConnection))
        }
    }

    impl Connection for StubConnection {
        fn connection_id(&self) -> u64 {
            1
        }

        fn ping(&mut self) -> Result<(), ExtDbError> {
            Ok(())
        }

        fn reset(&mut self) -> Result<(), ExtDbError> {
            Ok(())
        }

        fn query(&mut self, _sql: &str) -> Result<ResultSet, ExtDbError> {
            Ok(ResultSet::default())
        }

        fn prepare(&mut self, sql: &str) -> Result<PreparedStatement, ExtDbError> {
            Ok(PreparedStatement {
                sql: Arc::from(sql),
                param_count: 0,
            })
        }

        fn execute_prepared(
            &mut self,
            _statement: &PreparedStatement,
            _params: &[BoundParam],
        ) -> Result<ResultSet, ExtDbError> {
            Ok(ResultSet::default())
        }

        fn clear_statements(&mut self) {}
    }

    fn pool() -> Arc<ConnectionPool> {
        ConnectionPool::connect(
            "Database",
            LoginParams::default(),
            Arc::new(StubConnector),
            PoolSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn releasing_the_same_session_id_twice_keeps_one_idle_entry() {
        let pool = pool();
        let idle_before = pool.idle_count();
        pool.release(Session::new(42, Box::new(StubConnection)));
        pool.release(Session::new(42, Box::new(StubConnection)));
        assert_eq!(pool.idle_count(), idle_before + 1);
        assert_eq!(pool.idle_session_ids().iter().filter(|id| **id == 42).count(), 1);
    }

    #[test]
    fn a_fresh_pool_holds_exactly_its_first_session() {
        let pool = pool();
        assert_eq!(pool.idle_count(), 1);
        pool.release(Session::new(7, Box::new(StubConnection)));
        pool.release(Session::new(7, Box::new(StubConnection)));
        assert_eq!(pool.idle_count(), 2);
    }
}
