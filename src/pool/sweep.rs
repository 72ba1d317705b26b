use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::error::{ExtDbError, connection_error};

use super::{DatabasePools, PoolSettings};

/// Background thread that periodically sweeps every registered pool.
#[derive(Debug)]
pub struct Sweeper {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Start sweeping `pools` on the schedule in `settings`.
    ///
    /// # Errors
    /// Returns `ExtDbError::ConnectionError` if the thread cannot be spawned.
    pub fn spawn(pools: Arc<DatabasePools>, settings: PoolSettings) -> Result<Self, ExtDbError> {
        let (shutdown, receiver) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("extdb-pool-sweeper".into())
            .spawn(move || run_sweeper(&pools, settings, &receiver))
            .map_err(|err| connection_error(format!("failed to spawn pool sweeper: {err}")))?;
        Ok(Self {
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for an in-flight sweep to finish.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_sweeper(pools: &DatabasePools, settings: PoolSettings, receiver: &Receiver<()>) {
    let mut delay = settings.sweep_initial_delay;
    loop {
        match receiver.recv_timeout(delay) {
            Err(RecvTimeoutError::Timeout) => {
                match pools.sweep_all() {
                    Some(report) => debug!(?report, "pool sweep finished"),
                    None => debug!("pool sweep skipped, another sweep is running"),
                }
                delay = settings.sweep_interval;
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
