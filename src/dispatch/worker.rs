use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::error::{ExtDbError, connection_error};

/// Upper bound on worker threads.
pub const MAX_WORKER_THREADS: usize = 8;
/// Lower bound on auto-detected worker threads.
pub const MIN_AUTO_WORKER_THREADS: usize = 2;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Resolve the configured worker count: `<= 0` auto-detects from the CPU count.
#[must_use]
pub fn resolve_thread_count(configured: i64) -> usize {
    if configured <= 0 {
        thread::available_parallelism()
            .map_or(MIN_AUTO_WORKER_THREADS, std::num::NonZeroUsize::get)
            .clamp(MIN_AUTO_WORKER_THREADS, MAX_WORKER_THREADS)
    } else {
        usize::try_from(configured)
            .unwrap_or(MAX_WORKER_THREADS)
            .min(MAX_WORKER_THREADS)
    }
}

/// Fixed-size pool of named worker threads fed from one queue.
///
/// Every accepted job runs exactly once. Shutdown stops intake, lets the workers drain what is
/// already queued, and joins them.
#[derive(Debug)]
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    threads: usize,
}

impl WorkerPool {
    /// Spawn `threads` workers.
    ///
    /// # Errors
    /// Returns `ExtDbError::ConnectionError` if a thread cannot be spawned; workers already
    /// started are shut down.
    pub fn new(threads: usize) -> Result<Self, ExtDbError> {
        let threads = threads.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let pool = Self {
            sender: Mutex::new(Some(sender)),
            handles: Mutex::new(Vec::with_capacity(threads)),
            threads,
        };
        for id in 0..threads {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("extdb-worker-{id}"))
                .spawn(move || run_worker(id, &receiver))
                .map_err(|err| connection_error(format!("failed to spawn worker thread: {err}")))?;
            lock(&pool.handles).push(handle);
        }
        debug!(threads, "worker pool started");
        Ok(pool)
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Queue `job` for execution.
    ///
    /// # Errors
    /// Returns `ExtDbError::Other` once the pool has been shut down.
    pub fn post(&self, job: Job) -> Result<(), ExtDbError> {
        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            return Err(ExtDbError::Other("worker pool is shut down".into()));
        };
        sender
            .send(job)
            .map_err(|_| ExtDbError::Other("worker pool is shut down".into()))
    }

    /// Stop accepting jobs, drain the queue and join every worker.
    pub fn shutdown(&self) {
        drop(lock(&self.sender).take());
        let handles: Vec<JoinHandle<()>> = lock(&self.handles).drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                error!("worker thread exited abnormally");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(id: usize, receiver: &Mutex<Receiver<Job>>) {
    loop {
        let job = lock(receiver).recv();
        let Ok(job) = job else {
            break;
        };
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!(worker = id, "job panicked");
        }
    }
    debug!(worker = id, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn every_posted_job_runs_once_before_shutdown_returns() {
        let pool = WorkerPool::new(3).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.post(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }
        assert_eq!(pool.threads(), 3);
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 100);
        assert!(pool.post(Box::new(|| {})).is_err());
    }

    #[test]
    fn panicking_jobs_do_not_kill_workers() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.threads(), 1);
        let counter = Arc::new(AtomicUsize::new(0));
        pool.post(Box::new(|| panic!("boom"))).unwrap();
        let after = Arc::clone(&counter);
        pool.post(Box::new(move || {
            after.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn thread_counts_are_clamped() {
        assert_eq!(resolve_thread_count(20), MAX_WORKER_THREADS);
        assert_eq!(resolve_thread_count(3), 3);
        let auto = resolve_thread_count(0);
        assert!((MIN_AUTO_WORKER_THREADS..=MAX_WORKER_THREADS).contains(&auto));
    }
}
