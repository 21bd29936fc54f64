//! # Storage Module
//!
//! The versioned world state the ledger contract runs against, and the
//! optimistic commit protocol that keeps concurrent invocations honest.
//!
//! ## Architecture
//!
//! ```text
//! memory.rs    : in-memory VersionedStore (tests, benches)
//! db.rs        : sled-backed VersionedStore (the node)
//! simulator.rs : per-invocation TxContext: records reads, buffers writes
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! contract ──► TxSimulator ──finish()──► TxOutcome ──commit()──► VersionedStore
//!                 │ reads                                  │ validate read set
//!                 └──────────── committed snapshot ◄───────┘ apply write set
//! ```
//!
//! An invocation never writes to the store directly. Its reads are
//! recorded with the version they observed; at commit every recorded
//! version (and every scanned range) is checked against the store's
//! current state, and a single mismatch rejects the whole transaction.
//! Accepted write sets land atomically together with one history record
//! per written key.

pub mod db;
pub mod memory;
pub mod simulator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use db::LedgerDb;
pub use memory::MemoryStore;
pub use simulator::{KeyRead, KeyWrite, RangeRead, TxOutcome, TxSimulator};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors raised by stores, iterators and the commit protocol.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A key read during simulation changed before commit.
    #[error("mvcc read conflict on key {key:?}: read version {read:?}, current {current:?}")]
    MvccConflict {
        key: String,
        read: Option<u64>,
        current: Option<u64>,
    },

    /// The set of keys under a scanned prefix changed before commit.
    #[error("phantom read conflict under prefix {prefix:?}")]
    PhantomConflict { prefix: String },

    /// The invocation finished while iteration handles were still open.
    #[error("{count} iterator(s) left open at end of transaction")]
    IteratorLeak { count: usize },

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A committed value and the commit sequence number that wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedValue {
    pub value: Vec<u8>,
    pub version: u64,
}

/// One entry of a key's version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyModification {
    /// Transaction that produced this version.
    pub tx_id: String,
    /// The value written; `None` for a deletion.
    pub value: Option<Vec<u8>>,
    /// Transaction timestamp.
    pub timestamp: DateTime<Utc>,
    pub is_delete: bool,
}

// ---------------------------------------------------------------------------
// VersionedStore
// ---------------------------------------------------------------------------

/// Committed world state with per-key versions and history.
///
/// Implementations must make [`commit`](VersionedStore::commit) atomic:
/// either the whole write set and its history records become visible, or
/// nothing does.
pub trait VersionedStore: Send + Sync {
    /// Current value and version of `key`.
    fn get(&self, key: &str) -> StoreResult<Option<VersionedValue>>;

    /// All live keys starting with `prefix`, in ascending key order.
    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, VersionedValue)>>;

    /// Every committed version of `key`, oldest first. Individual records
    /// that cannot be decoded are returned as errors in place.
    fn history(&self, key: &str) -> StoreResult<Vec<StoreResult<KeyModification>>>;

    /// Validates `outcome`'s read set and applies its write set. Returns
    /// the commit sequence number assigned to the transaction.
    fn commit(&self, outcome: &TxOutcome) -> StoreResult<u64>;

    /// Sequence number of the latest commit (0 for an empty store).
    fn last_sequence(&self) -> StoreResult<u64>;
}

/// Checks every recorded read and range read against the current state.
///
/// `version_of` returns the current version of a key; `scan` returns the
/// current `(key, version)` pairs under a prefix. Callers hold whatever
/// lock makes validate-then-apply atomic for their backend.
pub(crate) fn validate_read_set<G, S>(
    outcome: &TxOutcome,
    mut version_of: G,
    mut scan: S,
) -> StoreResult<()>
where
    G: FnMut(&str) -> StoreResult<Option<u64>>,
    S: FnMut(&str) -> StoreResult<Vec<(String, u64)>>,
{
    for read in &outcome.reads {
        let current = version_of(&read.key)?;
        if current != read.version {
            return Err(StoreError::MvccConflict {
                key: read.key.clone(),
                read: read.version,
                current,
            });
        }
    }

    for range in &outcome.range_reads {
        let current = scan(&range.prefix)?;
        let unchanged = current.len() == range.observed.len()
            && current
                .iter()
                .zip(&range.observed)
                .all(|((key, version), seen)| *key == seen.key && Some(*version) == seen.version);
        if !unchanged {
            return Err(StoreError::PhantomConflict {
                prefix: range.prefix.clone(),
            });
        }
    }

    Ok(())
}
