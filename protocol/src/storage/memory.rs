//! In-memory [`VersionedStore`].
//!
//! A `BTreeMap` of live values plus an append-only history per key,
//! behind a single `RwLock`. Simulations take read locks; commits take
//! the write lock for validate-and-apply, so two commits can never
//! interleave.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use tracing::debug;

use super::{
    validate_read_set, KeyModification, StoreResult, TxOutcome, VersionedStore, VersionedValue,
};

#[derive(Debug, Default)]
struct Inner {
    state: BTreeMap<String, VersionedValue>,
    history: HashMap<String, Vec<KeyModification>>,
    sequence: u64,
}

/// Volatile world state for tests and benchmarks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.inner.read().state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().state.is_empty()
    }
}

impl VersionedStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<VersionedValue>> {
        Ok(self.inner.read().state.get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, VersionedValue)>> {
        let inner = self.inner.read();
        Ok(inner
            .state
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn history(&self, key: &str) -> StoreResult<Vec<StoreResult<KeyModification>>> {
        Ok(self
            .inner
            .read()
            .history
            .get(key)
            .map(|records| records.iter().cloned().map(Ok).collect())
            .unwrap_or_default())
    }

    fn commit(&self, outcome: &TxOutcome) -> StoreResult<u64> {
        let mut inner = self.inner.write();

        {
            let snapshot = &*inner;
            validate_read_set(
                outcome,
                |key| Ok(snapshot.state.get(key).map(|v| v.version)),
                |prefix| {
                    Ok(snapshot
                        .state
                        .range(prefix.to_string()..)
                        .take_while(|(key, _)| key.starts_with(prefix))
                        .map(|(key, v)| (key.clone(), v.version))
                        .collect())
                },
            )?;
        }

        if outcome.is_read_only() {
            return Ok(inner.sequence);
        }

        inner.sequence += 1;
        let sequence = inner.sequence;

        for write in &outcome.writes {
            match &write.value {
                Some(value) => {
                    inner.state.insert(
                        write.key.clone(),
                        VersionedValue {
                            value: value.clone(),
                            version: sequence,
                        },
                    );
                }
                None => {
                    inner.state.remove(&write.key);
                }
            }
            inner
                .history
                .entry(write.key.clone())
                .or_default()
                .push(KeyModification {
                    tx_id: outcome.tx_id.clone(),
                    value: write.value.clone(),
                    timestamp: outcome.timestamp,
                    is_delete: write.value.is_none(),
                });
        }

        debug!(tx_id = %outcome.tx_id, sequence, writes = outcome.writes.len(), "committed");
        Ok(sequence)
    }

    fn last_sequence(&self) -> StoreResult<u64> {
        Ok(self.inner.read().sequence)
    }
}
