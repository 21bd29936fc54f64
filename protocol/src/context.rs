//! # Transaction Context
//!
//! The interface a contract invocation sees of the outside world: who is
//! calling, which transaction this is, and read/write access to the
//! versioned state. One context exists per invocation and nothing
//! survives it, so contract code is a pure function of (request,
//! context snapshot) to (writes, events, result).
//!
//! Range scans and history lookups hand out iterators that hold an open
//! handle on the context. The handle is released when the iterator is
//! dropped, which covers every exit path including `?` returns from the
//! middle of a loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Caller;
use crate::storage::{KeyModification, StoreResult};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A notification published by an invocation, delivered only if the
/// transaction commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// A key/value pair yielded by a range scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry {
    pub key: String,
    pub value: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Handle tracking
// ---------------------------------------------------------------------------

/// Counts iteration handles that are currently open.
#[derive(Debug, Clone, Default)]
pub struct HandleTracker {
    open: Arc<AtomicUsize>,
}

impl HandleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles acquired and not yet released.
    pub fn open_handles(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> HandleGuard {
        self.open.fetch_add(1, Ordering::SeqCst);
        HandleGuard {
            open: Arc::clone(&self.open),
        }
    }
}

#[derive(Debug)]
struct HandleGuard {
    open: Arc<AtomicUsize>,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An iterator over a context query that releases its handle on drop.
#[derive(Debug)]
pub struct ResultIterator<T> {
    items: std::vec::IntoIter<StoreResult<T>>,
    _handle: HandleGuard,
}

impl<T> ResultIterator<T> {
    /// Wraps `items`, registering an open handle with `tracker`.
    pub fn new(items: Vec<StoreResult<T>>, tracker: &HandleTracker) -> Self {
        Self {
            items: items.into_iter(),
            _handle: tracker.acquire(),
        }
    }

    /// Explicitly releases the handle. Equivalent to dropping.
    pub fn close(self) {}
}

impl<T> Iterator for ResultIterator<T> {
    type Item = StoreResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

/// Iterator over a prefix scan.
pub type StateIterator = ResultIterator<StateEntry>;

/// Iterator over a key's version history.
pub type HistoryIterator = ResultIterator<KeyModification>;

// ---------------------------------------------------------------------------
// TxContext
// ---------------------------------------------------------------------------

/// Everything a contract invocation may do to the world.
///
/// Reads observe the committed snapshot the invocation started from; they
/// do not see the invocation's own buffered writes.
pub trait TxContext {
    /// The resolved submitter identity.
    fn caller(&self) -> &Caller;

    /// Identifier of the current transaction.
    fn tx_id(&self) -> &str;

    /// Timestamp assigned to the current transaction by its submitter.
    fn tx_timestamp(&self) -> DateTime<Utc>;

    /// Reads `key`; `None` when absent.
    fn get_state(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Buffers a write of `value` to `key`.
    fn put_state(&mut self, key: &str, value: Vec<u8>) -> StoreResult<()>;

    /// Buffers a deletion of `key`.
    fn delete_state(&mut self, key: &str) -> StoreResult<()>;

    /// Scans every live key under `prefix` (see [`crate::keys::partial_key`]).
    fn state_by_prefix(&mut self, prefix: &str) -> StoreResult<StateIterator>;

    /// Committed versions of `key` in the order the store keeps them.
    fn history_for_key(&mut self, key: &str) -> StoreResult<HistoryIterator>;

    /// Publishes a notification on `topic`, delivered on commit.
    fn set_event(&mut self, topic: &str, payload: Vec<u8>) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreError;

    #[test]
    fn handle_released_on_drop() {
        let tracker = HandleTracker::new();
        {
            let it: ResultIterator<u32> = ResultIterator::new(vec![Ok(1), Ok(2)], &tracker);
            assert_eq!(tracker.open_handles(), 1);
            assert_eq!(it.count(), 2);
        }
        assert_eq!(tracker.open_handles(), 0);
    }

    #[test]
    fn handle_released_on_early_return() {
        fn first_error(tracker: &HandleTracker) -> StoreResult<u32> {
            let it = ResultIterator::new(
                vec![Ok(1), Err(StoreError::Backend("boom".into())), Ok(3)],
                tracker,
            );
            let mut sum = 0;
            for item in it {
                sum += item?;
            }
            Ok(sum)
        }

        let tracker = HandleTracker::new();
        assert!(first_error(&tracker).is_err());
        assert_eq!(tracker.open_handles(), 0);
    }

    #[test]
    fn explicit_close() {
        let tracker = HandleTracker::new();
        let it: ResultIterator<u8> = ResultIterator::new(vec![], &tracker);
        let other: ResultIterator<u8> = ResultIterator::new(vec![], &tracker);
        assert_eq!(tracker.open_handles(), 2);
        it.close();
        assert_eq!(tracker.open_handles(), 1);
        drop(other);
        assert_eq!(tracker.open_handles(), 0);
    }
}
