//! Worker threads and the polled result store behind asynchronous calls.

mod results;
mod worker;

pub use results::{FIRST_HANDLE, MultiPoll, ResultStore, SinglePoll};
pub use worker::{
    Job, MAX_WORKER_THREADS, MIN_AUTO_WORKER_THREADS, WorkerPool, resolve_thread_count,
};
