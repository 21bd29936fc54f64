//! # LedgerDb: Persistent World State
//!
//! The node's [`VersionedStore`], built on sled's embedded key-value
//! store.
//!
//! ## Tree Layout
//!
//! | Tree      | Key                                    | Value                       |
//! |-----------|----------------------------------------|-----------------------------|
//! | `state`   | composite key (UTF-8)                  | `bincode(VersionedValue)`   |
//! | `history` | composite key ‖ `0xFF` ‖ seq (8B BE)   | `bincode(KeyModification)`  |
//! | `meta`    | key (UTF-8)                            | value (bytes)               |
//!
//! `0xFF` never occurs in UTF-8, so the history prefix of one key can
//! never match the history of a longer key. Sequence numbers are stored
//! big-endian so that sled's lexicographic order is commit order.
//!
//! ## Atomicity
//!
//! A commit validates the read set and then writes the state updates,
//! history records and new sequence number in one multi-tree sled
//! transaction. A mutex serializes validate-and-apply across threads.

use std::path::Path;

use parking_lot::Mutex;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use tracing::{debug, info};

use super::{
    validate_read_set, KeyModification, StoreError, StoreResult, TxOutcome, VersionedStore,
    VersionedValue,
};

/// Well-known key in the `meta` tree for the last commit sequence.
const META_SEQUENCE: &[u8] = b"commit_sequence";

/// Separator between a state key and the sequence in history keys.
const HISTORY_SEPARATOR: u8 = 0xFF;

fn history_prefix(key: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(key.len() + 1);
    prefix.extend_from_slice(key.as_bytes());
    prefix.push(HISTORY_SEPARATOR);
    prefix
}

fn encode<T: serde::Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_sequence(bytes: &[u8]) -> StoreResult<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Serialization("invalid sequence bytes".to_string()))?;
    Ok(u64::from_be_bytes(raw))
}

/// sled-backed world state.
///
/// sled trees support concurrent lock-free reads, so simulations running
/// on several threads never block each other; only commits serialize.
#[derive(Debug)]
pub struct LedgerDb {
    db: Db,
    state: Tree,
    history: Tree,
    meta: Tree,
    commit_lock: Mutex<()>,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let state = db.open_tree("state")?;
        let history = db.open_tree("history")?;
        let meta = db.open_tree("meta")?;
        info!(keys = state.len(), "ledger database opened");

        Ok(Self {
            db,
            state,
            history,
            meta,
            commit_lock: Mutex::new(()),
        })
    }

    /// Open a named sled tree from the underlying database.
    pub fn open_tree(&self, name: &str) -> StoreResult<Tree> {
        Ok(self.db.open_tree(name)?)
    }

    /// Number of live keys.
    pub fn key_count(&self) -> usize {
        self.state.len()
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn current_version(&self, key: &str) -> StoreResult<Option<u64>> {
        Ok(self.get(key)?.map(|v| v.version))
    }

    fn current_range(&self, prefix: &str) -> StoreResult<Vec<(String, u64)>> {
        Ok(self
            .scan_prefix(prefix)?
            .into_iter()
            .map(|(key, v)| (key, v.version))
            .collect())
    }
}

impl VersionedStore for LedgerDb {
    fn get(&self, key: &str) -> StoreResult<Option<VersionedValue>> {
        match self.state.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, VersionedValue)>> {
        let mut entries = Vec::new();
        for result in self.state.scan_prefix(prefix.as_bytes()) {
            let (key, value) = result?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            entries.push((key, decode(&value)?));
        }
        Ok(entries)
    }

    fn history(&self, key: &str) -> StoreResult<Vec<StoreResult<KeyModification>>> {
        let mut records = Vec::new();
        for result in self.history.scan_prefix(history_prefix(key)) {
            let (_key, value) = result?;
            records.push(decode(&value));
        }
        Ok(records)
    }

    fn commit(&self, outcome: &TxOutcome) -> StoreResult<u64> {
        let _guard = self.commit_lock.lock();

        validate_read_set(
            outcome,
            |key| self.current_version(key),
            |prefix| self.current_range(prefix),
        )?;

        let last = self.last_sequence()?;
        if outcome.is_read_only() {
            return Ok(last);
        }
        let sequence = last + 1;

        let mut state_ops = Vec::with_capacity(outcome.writes.len());
        let mut history_ops = Vec::with_capacity(outcome.writes.len());
        for write in &outcome.writes {
            let state_value = match &write.value {
                Some(value) => Some(encode(&VersionedValue {
                    value: value.clone(),
                    version: sequence,
                })?),
                None => None,
            };
            state_ops.push((write.key.as_bytes().to_vec(), state_value));

            let mut history_key = history_prefix(&write.key);
            history_key.extend_from_slice(&sequence.to_be_bytes());
            history_ops.push((
                history_key,
                encode(&KeyModification {
                    tx_id: outcome.tx_id.clone(),
                    value: write.value.clone(),
                    timestamp: outcome.timestamp,
                    is_delete: write.value.is_none(),
                })?,
            ));
        }

        let applied: Result<(), TransactionError<()>> = (&self.state, &self.history, &self.meta)
            .transaction(|(state, history, meta)| {
                for (key, value) in &state_ops {
                    match value {
                        Some(bytes) => {
                            state.insert(key.as_slice(), bytes.as_slice())?;
                        }
                        None => {
                            state.remove(key.as_slice())?;
                        }
                    }
                }
                for (key, value) in &history_ops {
                    history.insert(key.as_slice(), value.as_slice())?;
                }
                meta.insert(META_SEQUENCE, &sequence.to_be_bytes()[..])?;
                Ok::<(), ConflictableTransactionError<()>>(())
            });

        applied.map_err(|e| match e {
            TransactionError::Abort(()) => StoreError::Backend("commit aborted".to_string()),
            TransactionError::Storage(e) => StoreError::Sled(e),
        })?;
        self.db.flush()?;

        debug!(tx_id = %outcome.tx_id, sequence, writes = outcome.writes.len(), "committed");
        Ok(sequence)
    }

    fn last_sequence(&self) -> StoreResult<u64> {
        match self.meta.get(META_SEQUENCE)? {
            Some(bytes) => decode_sequence(&bytes),
            None => Ok(0),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
