//! The application-state object behind the host boundary.
//!
//! [`Extension`] owns the database pools, the protocol registry, the result store, the worker
//! pool and the sweeper. Host commands use the grammar `<mode>:<rest>`:
//!
//! | mode | meaning |
//! |---|---|
//! | `0` | synchronous call, `<protocol>:<payload>` |
//! | `1` | fire-and-forget call on a worker |
//! | `2` | call on a worker, result stored under a handle |
//! | `4` | poll a handle, single part |
//! | `5` | poll a handle, multi part |
//! | `9` | administrative command |

mod admin;
pub mod clock;

use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::backend::Connector;
use crate::config::ConfigSource;
use crate::dispatch::{ResultStore, WorkerPool, resolve_thread_count};
use crate::error::ExtDbError;
use crate::pool::{DatabasePools, PoolSettings, Sweeper};
use crate::protocol::{Protocol, ProtocolRegistry};
use crate::reply;

/// Output size used by [`Extension::call`] unless configured otherwise.
pub const DEFAULT_OUTPUT_SIZE: usize = 10_240;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        // Clear the poison and continue with the recovered data
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Result of [`Extension::call_into`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedWrite {
    /// Bytes written, excluding the terminating NUL.
    pub written: usize,
    /// The reply did not fit and was cut at a character boundary.
    pub truncated: bool,
}

#[derive(Debug, Default)]
struct LockState {
    locked: bool,
    code: Option<String>,
}

/// Builder for [`Extension`].
pub struct ExtensionBuilder {
    config: Arc<dyn ConfigSource>,
    connector: Option<Arc<dyn Connector>>,
    pool_settings: PoolSettings,
    output_size: usize,
}

impl ExtensionBuilder {
    /// Backend used to open database connections.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    #[must_use]
    pub fn pool_settings(mut self, settings: PoolSettings) -> Self {
        self.pool_settings = settings;
        self
    }

    /// Host output buffer size, in bytes.
    #[must_use]
    pub fn output_size(mut self, output_size: usize) -> Self {
        self.output_size = output_size;
        self
    }

    /// Start the worker pool and produce a ready extension.
    ///
    /// # Errors
    /// Returns `ExtDbError::ConfigError` when no connector is available, or an error if the
    /// worker threads cannot be spawned.
    pub fn build(self) -> Result<Extension, ExtDbError> {
        let connector = match self.connector {
            Some(connector) => connector,
            None => default_connector()?,
        };
        let threads = resolve_thread_count(self.config.worker_threads());
        let workers = WorkerPool::new(threads)?;
        info!(
            version = env!("CARGO_PKG_VERSION"),
            threads,
            output_size = self.output_size,
            "extension started"
        );
        Ok(Extension {
            config: self.config,
            connector,
            pool_settings: self.pool_settings,
            output_size: self.output_size,
            pools: Arc::new(DatabasePools::new()),
            protocols: Arc::new(ProtocolRegistry::new()),
            results: Arc::new(ResultStore::new()),
            workers: RwLock::new(Arc::new(workers)),
            sweeper: Mutex::new(None),
            lock_state: Mutex::new(LockState::default()),
            started: Instant::now(),
        })
    }
}

#[cfg(feature = "sqlite")]
fn default_connector() -> Result<Arc<dyn Connector>, ExtDbError> {
    Ok(Arc::new(crate::sqlite::SqliteConnector::default()))
}

#[cfg(not(feature = "sqlite"))]
fn default_connector() -> Result<Arc<dyn Connector>, ExtDbError> {
    Err(ExtDbError::ConfigError(
        "no database backend compiled in and no connector supplied".into(),
    ))
}

/// Database middleware state shared by every host command.
pub struct Extension {
    config: Arc<dyn ConfigSource>,
    connector: Arc<dyn Connector>,
    pool_settings: PoolSettings,
    output_size: usize,
    pools: Arc<DatabasePools>,
    protocols: Arc<ProtocolRegistry>,
    results: Arc<ResultStore>,
    workers: RwLock<Arc<WorkerPool>>,
    sweeper: Mutex<Option<Sweeper>>,
    lock_state: Mutex<LockState>,
    started: Instant,
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("output_size", &self.output_size)
            .field("databases", &self.pools.len())
            .field("protocols", &self.protocols.len())
            .field("stored_results", &self.results.len())
            .finish_non_exhaustive()
    }
}

impl Extension {
    #[must_use]
    pub fn builder(config: Arc<dyn ConfigSource>) -> ExtensionBuilder {
        ExtensionBuilder {
            config,
            connector: None,
            pool_settings: PoolSettings::default(),
            output_size: DEFAULT_OUTPUT_SIZE,
        }
    }

    #[must_use]
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    #[must_use]
    pub fn protocols(&self) -> &ProtocolRegistry {
        &self.protocols
    }

    #[must_use]
    pub fn databases(&self) -> &DatabasePools {
        &self.pools
    }

    #[must_use]
    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    /// Handle one host command with the configured output size.
    #[must_use]
    pub fn call(&self, input: &str) -> String {
        self.call_with_limit(input, self.output_size)
    }

    /// Handle one host command and write its reply into `output`, NUL-terminated.
    ///
    /// The usable size is `output.len() - 1`; an empty buffer receives nothing.
    pub fn call_into(&self, input: &str, output: &mut [u8]) -> BoundedWrite {
        let Some(limit) = output.len().checked_sub(1) else {
            return BoundedWrite {
                written: 0,
                truncated: true,
            };
        };
        let reply = self.call_with_limit(input, limit);
        let mut written = reply.len().min(limit);
        while !reply.is_char_boundary(written) {
            written -= 1;
        }
        output[..written].copy_from_slice(&reply.as_bytes()[..written]);
        output[written] = 0;
        BoundedWrite {
            written,
            truncated: written < reply.len(),
        }
    }

    fn call_with_limit(&self, input: &str, limit: usize) -> String {
        debug!(input, "host command");
        let rest = match input.get(2..) {
            Some(rest) if input.len() > 2 && input.as_bytes()[1] == b':' => rest,
            _ => {
                warn!(input, "invalid message");
                return reply::INVALID_MESSAGE.to_string();
            }
        };
        match input.as_bytes()[0] {
            b'0' => self.call_sync(input, rest, limit),
            b'1' => self.call_detached(input, rest),
            b'2' => self.call_stored(input, rest),
            b'4' => self.results.poll_single(parse_handle(rest), limit).into_reply(),
            b'5' => self.results.poll_multi(parse_handle(rest), limit).into_reply(),
            b'9' => self.admin(input, limit),
            _ => {
                warn!(input, "invalid message");
                reply::INVALID_MESSAGE.to_string()
            }
        }
    }

    /// Split `<protocol>:<payload>` and resolve the protocol.
    fn resolve<'a>(&self, input: &str, rest: &'a str) -> Result<(Arc<Protocol>, &'a str), String> {
        let (name, payload) = match rest.split_once(':') {
            Some((name, payload)) if !payload.is_empty() => (name, payload),
            _ => {
                error!(input, "invalid format");
                return Err(reply::INVALID_FORMAT.to_string());
            }
        };
        match self.protocols.get(name) {
            Some(protocol) => Ok((protocol, payload)),
            None => {
                error!(protocol = name, input, "unknown protocol");
                Err(reply::UNKNOWN_PROTOCOL.to_string())
            }
        }
    }

    fn call_sync(&self, input: &str, rest: &str, limit: usize) -> String {
        let (protocol, payload) = match self.resolve(input, rest) {
            Ok(resolved) => resolved,
            Err(failure) => return failure,
        };
        let message = protocol.call(payload);
        if message.len() <= limit {
            message
        } else {
            let handle = self.results.store(message);
            debug!(handle, limit, "sync reply stored for polling");
            reply::stored(handle)
        }
    }

    fn call_detached(&self, input: &str, rest: &str) -> String {
        let (protocol, payload) = match self.resolve(input, rest) {
            Ok(resolved) => resolved,
            Err(failure) => return failure,
        };
        let payload = payload.to_string();
        let posted = self.post(Box::new(move || {
            let message = protocol.call(&payload);
            if reply::is_failure(&message) {
                warn!(payload = %payload, reply = %message, "detached call failed");
            } else {
                debug!(reply_len = message.len(), "detached call finished");
            }
        }));
        match posted {
            Ok(()) => String::new(),
            Err(err) => {
                error!(error = %err, "failed to queue call");
                reply::FAILED.to_string()
            }
        }
    }

    fn call_stored(&self, input: &str, rest: &str) -> String {
        let (protocol, payload) = match self.resolve(input, rest) {
            Ok(resolved) => resolved,
            Err(failure) => return failure,
        };
        let handle = self.results.allocate_handle();
        let payload = payload.to_string();
        let results = Arc::clone(&self.results);
        let posted = self.post(Box::new(move || {
            let message = protocol.call(&payload);
            results.complete(handle, message);
        }));
        match posted {
            Ok(()) => reply::stored(handle),
            Err(err) => {
                error!(handle, error = %err, "failed to queue call");
                self.results.complete(handle, reply::FAILED.to_string());
                reply::stored(handle)
            }
        }
    }

    fn post(&self, job: crate::dispatch::Job) -> Result<(), ExtDbError> {
        let workers = match self.workers.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        };
        workers.post(job)
    }

    fn ensure_sweeper(&self) -> Result<(), ExtDbError> {
        let mut sweeper = lock(&self.sweeper);
        if sweeper.is_none() {
            *sweeper = Some(Sweeper::spawn(Arc::clone(&self.pools), self.pool_settings)?);
            debug!("pool sweeper started");
        }
        Ok(())
    }

    /// Drop every protocol and database and restart the worker pool.
    ///
    /// # Errors
    /// Returns an error if the new worker threads cannot be spawned; the old pool keeps serving.
    pub fn reset(&self) -> Result<(), ExtDbError> {
        let fresh = Arc::new(WorkerPool::new(resolve_thread_count(
            self.config.worker_threads(),
        ))?);
        let threads = fresh.threads();
        if let Some(mut sweeper) = lock(&self.sweeper).take() {
            sweeper.stop();
        }
        let previous = match self.workers.write() {
            Ok(mut guard) => std::mem::replace(&mut *guard, fresh),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), fresh),
        };
        previous.shutdown();
        self.protocols.clear();
        self.pools.clear();
        info!(threads, "extension reset");
        Ok(())
    }

    /// Stop intake, drain the workers, stop the sweeper and close every pooled connection.
    pub fn shutdown(&self) {
        let workers = match self.workers.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        };
        workers.shutdown();
        if let Some(mut sweeper) = lock(&self.sweeper).take() {
            sweeper.stop();
        }
        self.protocols.clear();
        self.pools.clear();
        debug!("extension shut down");
    }
}

impl Drop for Extension {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn parse_handle(text: &str) -> u64 {
    text.trim().parse().unwrap_or(0)
}
