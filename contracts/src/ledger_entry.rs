//! # Ledger Entries
//!
//! One balance record per `(token, holder)`, stored as PascalCase JSON
//! under [`keys::ledger_key`]. All reads and writes go through the
//! transaction context so they land in the invocation's read/write sets.

use ledger_protocol::context::TxContext;
use ledger_protocol::keys;
use ledger_protocol::Amount;
use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;

/// Persisted balance of one holder for one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LedgerEntry {
    pub holder: String,
    pub token: String,
    pub amount: Amount,
    /// Audit note left by the last operation that touched the entry.
    pub desc: String,
}

impl LedgerEntry {
    pub fn new(token: impl Into<String>, holder: impl Into<String>, amount: Amount) -> Self {
        Self {
            holder: holder.into(),
            token: token.into(),
            amount,
            desc: String::new(),
        }
    }

    /// Storage key of the entry for `(token, holder)`.
    pub fn key(token: &str, holder: &str) -> LedgerResult<String> {
        Ok(keys::ledger_key(token, holder)?)
    }

    /// Raw stored bytes at `key`, exactly as written.
    pub fn load_raw(ctx: &mut dyn TxContext, key: &str) -> LedgerResult<Option<Vec<u8>>> {
        Ok(ctx.get_state(key)?)
    }

    /// Decoded entry at `key`, `None` if absent.
    pub fn load(ctx: &mut dyn TxContext, key: &str) -> LedgerResult<Option<Self>> {
        match Self::load_raw(ctx, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Buffers a write of this entry to `key`.
    pub fn save(&self, ctx: &mut dyn TxContext, key: &str) -> LedgerResult<()> {
        let bytes = serde_json::to_vec(self)?;
        ctx.put_state(key, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledger_protocol::storage::{MemoryStore, TxSimulator, VersionedStore};
    use ledger_protocol::Caller;

    #[test]
    fn wire_format_is_pascal_case() {
        let mut entry = LedgerEntry::new("GLD", "alice", Amount::from_whole(100).unwrap());
        entry.desc = "minted".into();
        let json: serde_json::Value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"Holder": "alice", "Token": "GLD", "Amount": 100, "Desc": "minted"})
        );
    }

    #[test]
    fn save_then_load_through_store() {
        let store = MemoryStore::new();
        let key = LedgerEntry::key("gld", "alice").unwrap();
        let entry = LedgerEntry::new("GLD", "alice", Amount::from_f64(12.34).unwrap());

        let mut tx = TxSimulator::new(&store, Caller::user("alice"), "w", Utc::now());
        entry.save(&mut tx, &key).unwrap();
        store.commit(&tx.finish().unwrap()).unwrap();

        let mut tx = TxSimulator::new(&store, Caller::user("alice"), "r", Utc::now());
        let loaded = LedgerEntry::load(&mut tx, &LedgerEntry::key("GLD", "ALICE").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(loaded, entry);
        assert!(LedgerEntry::load(&mut tx, "missing").unwrap().is_none());
    }

    #[test]
    fn corrupt_record_is_a_serialization_error() {
        let store = MemoryStore::new();
        let mut tx = TxSimulator::new(&store, Caller::user("x"), "w", Utc::now());
        tx.put_state("k", b"{oops".to_vec()).unwrap();
        store.commit(&tx.finish().unwrap()).unwrap();

        let mut tx = TxSimulator::new(&store, Caller::user("x"), "r", Utc::now());
        let err = LedgerEntry::load(&mut tx, "k").unwrap_err();
        assert_eq!(err.code(), "SERIALIZATION_ERROR");
    }
}
