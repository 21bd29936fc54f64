//! # Transaction Simulator
//!
//! [`TxSimulator`] is the [`TxContext`] handed to one contract invocation.
//! It reads from a committed [`VersionedStore`] snapshot, records the
//! version of everything it reads, and buffers writes and events. When
//! the invocation returns, [`TxSimulator::finish`] packages the read and
//! write sets into a [`TxOutcome`] that the store validates and commits
//! as one unit, or discards.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use super::{StoreError, StoreResult, VersionedStore};
use crate::context::{
    Event, HandleTracker, HistoryIterator, ResultIterator, StateEntry, StateIterator, TxContext,
};
use crate::identity::Caller;

// ---------------------------------------------------------------------------
// Read / write sets
// ---------------------------------------------------------------------------

/// A key observed during simulation and the version it had.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRead {
    pub key: String,
    /// `None` if the key was absent.
    pub version: Option<u64>,
}

/// A prefix scan and every key it returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRead {
    pub prefix: String,
    pub observed: Vec<KeyRead>,
}

/// A buffered write; `value == None` deletes the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyWrite {
    pub key: String,
    pub value: Option<Vec<u8>>,
}

/// Everything an invocation did, ready for validation and commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutcome {
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
    pub reads: Vec<KeyRead>,
    pub range_reads: Vec<RangeRead>,
    pub writes: Vec<KeyWrite>,
    pub events: Vec<Event>,
}

impl TxOutcome {
    /// `true` if the invocation wrote nothing.
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TxSimulator
// ---------------------------------------------------------------------------

/// Per-invocation transaction context over a committed store.
pub struct TxSimulator<'a> {
    store: &'a dyn VersionedStore,
    caller: Caller,
    tx_id: String,
    timestamp: DateTime<Utc>,
    reads: BTreeMap<String, Option<u64>>,
    range_reads: Vec<RangeRead>,
    writes: BTreeMap<String, Option<Vec<u8>>>,
    events: Vec<Event>,
    handles: HandleTracker,
}

impl<'a> TxSimulator<'a> {
    pub fn new(
        store: &'a dyn VersionedStore,
        caller: Caller,
        tx_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            caller,
            tx_id: tx_id.into(),
            timestamp,
            reads: BTreeMap::new(),
            range_reads: Vec::new(),
            writes: BTreeMap::new(),
            events: Vec::new(),
            handles: HandleTracker::new(),
        }
    }

    /// Derives a transaction ID: hex SHA-256 over the submitter, the
    /// invoked function, its arguments and a fresh random nonce.
    pub fn generate_tx_id(caller: &Caller, function: &str, args: &[String]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(caller.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(function.as_bytes());
        for arg in args {
            hasher.update([0u8]);
            hasher.update(arg.as_bytes());
        }
        hasher.update(Uuid::new_v4().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Number of iteration handles currently open.
    pub fn open_handles(&self) -> usize {
        self.handles.open_handles()
    }

    /// Closes the simulation and returns its read/write sets.
    ///
    /// # Errors
    ///
    /// [`StoreError::IteratorLeak`] if an iterator outlived the invocation.
    pub fn finish(self) -> StoreResult<TxOutcome> {
        let open = self.handles.open_handles();
        if open > 0 {
            return Err(StoreError::IteratorLeak { count: open });
        }

        debug!(
            tx_id = %self.tx_id,
            reads = self.reads.len(),
            ranges = self.range_reads.len(),
            writes = self.writes.len(),
            "simulation finished"
        );

        Ok(TxOutcome {
            tx_id: self.tx_id,
            timestamp: self.timestamp,
            reads: self
                .reads
                .into_iter()
                .map(|(key, version)| KeyRead { key, version })
                .collect(),
            range_reads: self.range_reads,
            writes: self
                .writes
                .into_iter()
                .map(|(key, value)| KeyWrite { key, value })
                .collect(),
            events: self.events,
        })
    }
}

impl TxContext for TxSimulator<'_> {
    fn caller(&self) -> &Caller {
        &self.caller
    }

    fn tx_id(&self) -> &str {
        &self.tx_id
    }

    fn tx_timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn get_state(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let current = self.store.get(key)?;
        self.reads
            .entry(key.to_string())
            .or_insert_with(|| current.as_ref().map(|v| v.version));
        Ok(current.map(|v| v.value))
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::Backend("empty key".into()));
        }
        self.writes.insert(key.to_string(), Some(value));
        Ok(())
    }

    fn delete_state(&mut self, key: &str) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::Backend("empty key".into()));
        }
        self.writes.insert(key.to_string(), None);
        Ok(())
    }

    fn state_by_prefix(&mut self, prefix: &str) -> StoreResult<StateIterator> {
        let entries = self.store.scan_prefix(prefix)?;
        self.range_reads.push(RangeRead {
            prefix: prefix.to_string(),
            observed: entries
                .iter()
                .map(|(key, v)| KeyRead {
                    key: key.clone(),
                    version: Some(v.version),
                })
                .collect(),
        });

        let items = entries
            .into_iter()
            .map(|(key, v)| Ok(StateEntry { key, value: v.value }))
            .collect();
        Ok(ResultIterator::new(items, &self.handles))
    }

    fn history_for_key(&mut self, key: &str) -> StoreResult<HistoryIterator> {
        let records = self.store.history(key)?;
        Ok(ResultIterator::new(records, &self.handles))
    }

    fn set_event(&mut self, topic: &str, payload: Vec<u8>) -> StoreResult<()> {
        if topic.is_empty() {
            return Err(StoreError::Backend("event topic must not be empty".into()));
        }
        self.events.push(Event {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn commit_value(store: &MemoryStore, key: &str, value: &[u8]) {
        let mut sim = TxSimulator::new(store, Caller::user("seed"), "seed-tx", Utc::now());
        sim.put_state(key, value.to_vec()).unwrap();
        store.commit(&sim.finish().unwrap()).unwrap();
    }

    #[test]
    fn reads_record_versions_and_absences() {
        let store = MemoryStore::new();
        commit_value(&store, "a", b"1");

        let mut sim = TxSimulator::new(&store, Caller::user("u"), "tx", Utc::now());
        assert_eq!(sim.get_state("a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(sim.get_state("missing").unwrap(), None);

        let outcome = sim.finish().unwrap();
        assert!(outcome.is_read_only());
        assert_eq!(
            outcome.reads,
            vec![
                KeyRead { key: "a".into(), version: Some(1) },
                KeyRead { key: "missing".into(), version: None },
            ]
        );
    }

    #[test]
    fn writes_are_buffered_not_visible() {
        let store = MemoryStore::new();
        let mut sim = TxSimulator::new(&store, Caller::user("u"), "tx", Utc::now());
        sim.put_state("k", b"v".to_vec()).unwrap();
        assert_eq!(sim.get_state("k").unwrap(), None);
        assert_eq!(store.get("k").unwrap(), None);

        let outcome = sim.finish().unwrap();
        assert_eq!(outcome.writes.len(), 1);
    }

    #[test]
    fn leaked_iterator_fails_finish() {
        let store = MemoryStore::new();
        commit_value(&store, "p/1", b"x");

        let mut sim = TxSimulator::new(&store, Caller::user("u"), "tx", Utc::now());
        let iter = sim.state_by_prefix("p/").unwrap();
        assert_eq!(sim.open_handles(), 1);
        // Never release the handle.
        std::mem::forget(iter);
        assert!(matches!(
            sim.finish(),
            Err(StoreError::IteratorLeak { count: 1 })
        ));
    }

    #[test]
    fn events_and_empty_topic() {
        let store = MemoryStore::new();
        let mut sim = TxSimulator::new(&store, Caller::user("u"), "tx", Utc::now());
        assert!(sim.set_event("", vec![]).is_err());
        sim.set_event("payment.bob", b"{}".to_vec()).unwrap();
        let outcome = sim.finish().unwrap();
        assert_eq!(outcome.events[0].topic, "payment.bob");
    }

    #[test]
    fn tx_ids_are_unique_hex() {
        let caller = Caller::user("alice");
        let a = TxSimulator::generate_tx_id(&caller, "transfer", &["{}".into()]);
        let b = TxSimulator::generate_tx_id(&caller, "transfer", &["{}".into()]);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
