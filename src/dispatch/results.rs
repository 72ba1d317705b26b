use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::error;

use crate::reply;

/// Handles below this value are reserved.
pub const FIRST_HANDLE: u64 = 100;

#[derive(Debug)]
struct Entry {
    computing: bool,
    message: String,
}

#[derive(Debug)]
struct Inner {
    next_handle: u64,
    entries: HashMap<u64, Entry>,
}

/// Outcome of a single-part poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinglePoll {
    /// Unknown handle, or already consumed.
    Absent,
    Computing,
    /// The message exceeds the limit; it stays stored for multi-part polling.
    TooLarge,
    Ready(String),
}

impl SinglePoll {
    #[must_use]
    pub fn into_reply(self) -> String {
        match self {
            SinglePoll::Absent => String::new(),
            SinglePoll::Computing => reply::COMPUTING.to_string(),
            SinglePoll::TooLarge => reply::TOO_LARGE.to_string(),
            SinglePoll::Ready(message) => message,
        }
    }
}

/// Outcome of a multi-part poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiPoll {
    /// Unknown handle, or already consumed.
    Absent,
    Computing,
    Chunk(String),
    /// The message has been fully drained; the entry is gone.
    Done,
}

impl MultiPoll {
    #[must_use]
    pub fn into_reply(self) -> String {
        match self {
            MultiPoll::Absent | MultiPoll::Done => String::new(),
            MultiPoll::Computing => reply::COMPUTING.to_string(),
            MultiPoll::Chunk(chunk) => chunk,
        }
    }
}

/// Handle-keyed results of asynchronous calls.
///
/// A handle is allocated on the calling thread before its job is queued, completed exactly
/// once by the worker, then consumed by polling.
#[derive(Debug)]
pub struct ResultStore {
    inner: Mutex<Inner>,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_handle: FIRST_HANDLE,
                entries: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            // Clear the poison and continue with the recovered data
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn insert(&self, computing: bool, message: String) -> u64 {
        let mut inner = self.lock();
        let handle = inner.next_handle;
        inner.next_handle += 1;
        inner.entries.insert(handle, Entry { computing, message });
        handle
    }

    /// Reserve a handle whose entry reads as computing until [`ResultStore::complete`].
    pub fn allocate_handle(&self) -> u64 {
        self.insert(true, String::new())
    }

    /// Store an already finished message under a new handle.
    pub fn store(&self, message: String) -> u64 {
        self.insert(false, message)
    }

    /// Publish the final message for `handle`.
    ///
    /// # Panics
    /// Panics if `handle` was already completed.
    pub fn complete(&self, handle: u64, message: String) {
        let mut inner = self.lock();
        match inner.entries.get_mut(&handle) {
            Some(entry) => {
                assert!(entry.computing, "result handle {handle} completed twice");
                entry.computing = false;
                entry.message = message;
            }
            None => error!(handle, "completed a result handle that was never allocated"),
        }
    }

    /// Take the whole message if it fits in `limit` bytes.
    pub fn poll_single(&self, handle: u64, limit: usize) -> SinglePoll {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get(&handle) else {
            return SinglePoll::Absent;
        };
        if entry.computing {
            return SinglePoll::Computing;
        }
        if entry.message.len() > limit {
            return SinglePoll::TooLarge;
        }
        match inner.entries.remove(&handle) {
            Some(entry) => SinglePoll::Ready(entry.message),
            None => SinglePoll::Absent,
        }
    }

    /// Take the next chunk of at most `limit` bytes, never splitting a character.
    ///
    /// When not even one character fits, one character is returned so draining always
    /// progresses.
    pub fn poll_multi(&self, handle: u64, limit: usize) -> MultiPoll {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(&handle) else {
            return MultiPoll::Absent;
        };
        if entry.computing {
            return MultiPoll::Computing;
        }
        if entry.message.is_empty() {
            inner.entries.remove(&handle);
            return MultiPoll::Done;
        }
        let cut = chunk_boundary(&entry.message, limit);
        let rest = entry.message.split_off(cut);
        MultiPoll::Chunk(std::mem::replace(&mut entry.message, rest))
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

fn chunk_boundary(message: &str, limit: usize) -> usize {
    if limit >= message.len() {
        return message.len();
    }
    let mut cut = limit;
    while cut > 0 && !message.is_char_boundary(cut) {
        cut -= 1;
    }
    if cut == 0 {
        message
            .char_indices()
            .nth(1)
            .map_or(message.len(), |(idx, _)| idx)
    } else {
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_start_above_reserved_range() {
        let store = ResultStore::new();
        assert_eq!(store.allocate_handle(), FIRST_HANDLE);
        assert_eq!(store.store("x".into()), FIRST_HANDLE + 1);
    }

    #[test]
    fn single_poll_consumes_fitting_messages() {
        let store = ResultStore::new();
        let handle = store.allocate_handle();
        assert_eq!(store.poll_single(handle, 10), SinglePoll::Computing);
        store.complete(handle, "[1,[]]".into());
        assert_eq!(store.poll_single(handle, 3), SinglePoll::TooLarge);
        assert_eq!(store.poll_single(handle, 10), SinglePoll::Ready("[1,[]]".into()));
        assert_eq!(store.poll_single(handle, 10), SinglePoll::Absent);
    }

    #[test]
    fn multi_poll_never_splits_characters() {
        let store = ResultStore::new();
        let handle = store.store("aé b".into());
        assert_eq!(store.poll_multi(handle, 2), MultiPoll::Chunk("a".into()));
        assert_eq!(store.poll_multi(handle, 2), MultiPoll::Chunk("é".into()));
        assert_eq!(store.poll_multi(handle, 1), MultiPoll::Chunk(" ".into()));
        assert_eq!(store.poll_multi(handle, 8), MultiPoll::Chunk("b".into()));
        assert_eq!(store.poll_multi(handle, 8), MultiPoll::Done);
        assert_eq!(store.poll_multi(handle, 8), MultiPoll::Absent);
    }

    #[test]
    #[should_panic(expected = "completed twice")]
    fn double_completion_panics() {
        let store = ResultStore::new();
        let handle = store.allocate_handle();
        store.complete(handle, "a".into());
        store.complete(handle, "b".into());
    }
}
