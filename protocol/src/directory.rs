//! # Master Data Directory
//!
//! Tokens and accounts are owned by other parts of the system; the ledger
//! only reads them. [`Directory`] is that read interface. The
//! [`StateDirectory`] implementation keeps the records in world state
//! under their own composite keys, so lookups go through the invocation's
//! read set and a token disabled concurrently with a transfer is caught
//! at commit.
//!
//! Pending sign requests live here too: they belong to the multi-party
//! signing workflow, and the ledger only rescales them.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::amount::Amount;
use crate::context::TxContext;
use crate::keys::{self, KeyError};
use crate::storage::StoreError;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("token not found: {0}")]
    TokenNotFound(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed directory record: {0}")]
    Serialization(String),
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Token master data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Token {
    pub name: String,
    /// Identity allowed to issue the token.
    pub issuer: String,
    /// `false` when the token is administratively locked.
    pub status: bool,
}

/// Account master data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Account {
    /// Canonical identifier of the account holder.
    pub did_name: String,
    /// `false` when the account is disabled.
    pub status: bool,
}

/// Lifecycle of a multi-signature transfer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignStatus {
    Pending,
    Signed,
    Rejected,
    /// Any status this ledger does not act on. Requests carrying it are
    /// left untouched.
    #[serde(other)]
    Unknown,
}

/// A transfer awaiting additional signatures before settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignRequest {
    pub id: String,
    pub from: String,
    pub to: String,
    pub token: String,
    pub amount: Amount,
    pub desc: String,
    pub status: SignStatus,
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Read access to token and account master data.
pub trait Directory {
    fn token(&self, ctx: &mut dyn TxContext, name: &str) -> Result<Token, DirectoryError>;

    fn account(&self, ctx: &mut dyn TxContext, name: &str) -> Result<Account, DirectoryError>;
}

/// [`Directory`] backed by records in world state.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateDirectory;

fn read_record<T: serde::de::DeserializeOwned>(
    ctx: &mut dyn TxContext,
    key: &str,
) -> Result<Option<T>, DirectoryError> {
    match ctx.get_state(key)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| DirectoryError::Serialization(e.to_string())),
        None => Ok(None),
    }
}

fn write_record<T: Serialize>(
    ctx: &mut dyn TxContext,
    key: &str,
    record: &T,
) -> Result<(), DirectoryError> {
    let bytes =
        serde_json::to_vec(record).map_err(|e| DirectoryError::Serialization(e.to_string()))?;
    ctx.put_state(key, bytes)?;
    Ok(())
}

impl Directory for StateDirectory {
    fn token(&self, ctx: &mut dyn TxContext, name: &str) -> Result<Token, DirectoryError> {
        let key = keys::token_key(name)?;
        read_record(ctx, &key)?.ok_or_else(|| DirectoryError::TokenNotFound(name.to_string()))
    }

    fn account(&self, ctx: &mut dyn TxContext, name: &str) -> Result<Account, DirectoryError> {
        let key = keys::account_key(name)?;
        read_record(ctx, &key)?.ok_or_else(|| DirectoryError::AccountNotFound(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

/// Creates or replaces a token record.
pub fn register_token(ctx: &mut dyn TxContext, token: &Token) -> Result<(), DirectoryError> {
    write_record(ctx, &keys::token_key(&token.name)?, token)?;
    info!(token = %token.name, issuer = %token.issuer, "token registered");
    Ok(())
}

/// Creates or replaces an account record.
pub fn register_account(ctx: &mut dyn TxContext, account: &Account) -> Result<(), DirectoryError> {
    write_record(ctx, &keys::account_key(&account.did_name)?, account)?;
    info!(account = %account.did_name, "account registered");
    Ok(())
}

/// Enables or locks an existing token.
pub fn set_token_status(
    ctx: &mut dyn TxContext,
    name: &str,
    enabled: bool,
) -> Result<(), DirectoryError> {
    let mut token = StateDirectory.token(ctx, name)?;
    token.status = enabled;
    write_record(ctx, &keys::token_key(name)?, &token)
}

/// Enables or disables an existing account.
pub fn set_account_status(
    ctx: &mut dyn TxContext,
    name: &str,
    enabled: bool,
) -> Result<(), DirectoryError> {
    let mut account = StateDirectory.account(ctx, name)?;
    account.status = enabled;
    write_record(ctx, &keys::account_key(name)?, &account)
}

/// Stores a sign request under `(SIGN, token, id)`.
pub fn put_sign_request(
    ctx: &mut dyn TxContext,
    request: &SignRequest,
) -> Result<(), DirectoryError> {
    write_record(ctx, &keys::sign_request_key(&request.token, &request.id)?, request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Caller;
    use crate::storage::{MemoryStore, TxSimulator, VersionedStore};
    use chrono::Utc;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let mut tx = TxSimulator::new(&store, Caller::super_admin("root"), "seed", Utc::now());
        register_token(
            &mut tx,
            &Token {
                name: "GLD".into(),
                issuer: "mint".into(),
                status: true,
            },
        )
        .unwrap();
        register_account(
            &mut tx,
            &Account {
                did_name: "alice".into(),
                status: true,
            },
        )
        .unwrap();
        store.commit(&tx.finish().unwrap()).unwrap();
        store
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let store = seeded();
        let mut tx = TxSimulator::new(&store, Caller::user("x"), "q", Utc::now());
        assert_eq!(StateDirectory.token(&mut tx, "gld").unwrap().issuer, "mint");
        assert_eq!(
            StateDirectory.account(&mut tx, "ALICE").unwrap().did_name,
            "alice"
        );
    }

    #[test]
    fn missing_records() {
        let store = seeded();
        let mut tx = TxSimulator::new(&store, Caller::user("x"), "q", Utc::now());
        assert!(matches!(
            StateDirectory.token(&mut tx, "SLV"),
            Err(DirectoryError::TokenNotFound(_))
        ));
        assert!(matches!(
            StateDirectory.account(&mut tx, "bob"),
            Err(DirectoryError::AccountNotFound(_))
        ));
    }

    #[test]
    fn status_toggles() {
        let store = seeded();
        let mut tx = TxSimulator::new(&store, Caller::super_admin("root"), "t", Utc::now());
        set_token_status(&mut tx, "GLD", false).unwrap();
        set_account_status(&mut tx, "alice", false).unwrap();
        store.commit(&tx.finish().unwrap()).unwrap();

        let mut tx = TxSimulator::new(&store, Caller::user("x"), "q", Utc::now());
        assert!(!StateDirectory.token(&mut tx, "GLD").unwrap().status);
        assert!(!StateDirectory.account(&mut tx, "alice").unwrap().status);
    }

    #[test]
    fn sign_request_wire_format() {
        let request = SignRequest {
            id: "r1".into(),
            from: "alice".into(),
            to: "bob".into(),
            token: "GLD".into(),
            amount: Amount::from_f64(12.5).unwrap(),
            desc: String::new(),
            status: SignStatus::Pending,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["Status"], "PENDING");
        assert_eq!(json["Amount"], 12.5);
        assert_eq!(json["Token"], "GLD");
    }

    #[test]
    fn unrecognized_sign_status_still_decodes() {
        let raw = br#"{"Id":"r9","From":"alice","To":"bob","Token":"GLD","Amount":1,"Desc":"","Status":"CANCELLED"}"#;
        let request: SignRequest = serde_json::from_slice(raw).unwrap();
        assert_eq!(request.status, SignStatus::Unknown);
        assert_eq!(request.amount, Amount::from_whole(1).unwrap());
    }
}
