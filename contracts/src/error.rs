//! # Ledger Errors
//!
//! One error enum for every failure a ledger operation can report, each
//! variant mapped onto a coarse [`ErrorKind`] and a stable wire code.
//! Callers branch on the kind; clients match on the code.

use ledger_protocol::amount::AmountError;
use ledger_protocol::directory::DirectoryError;
use ledger_protocol::keys::KeyError;
use ledger_protocol::storage::StoreError;
use ledger_protocol::Amount;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MalformedRequest,
    NotFound,
    Disabled,
    PermissionDenied,
    InsufficientBalance,
    KeyDerivationError,
    StoreError,
}

/// Errors returned by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Wrong arity, undecodable payload or an invalid field value.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("token not found: {0}")]
    TokenNotFound(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// The holder has no balance record for the token.
    #[error("no {token} ledger entry for {holder}")]
    LedgerEntryNotFound { token: String, holder: String },

    #[error("{0} token not enabled")]
    TokenLocked(String),

    #[error("account {0} is disabled")]
    AccountDisabled(String),

    #[error("account {0} is locked")]
    AccountLocked(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("the {token} balance of {holder} is not enough: has {balance}, needs {requested}")]
    InsufficientBalance {
        holder: String,
        token: String,
        balance: Amount,
        requested: Amount,
    },

    #[error(transparent)]
    KeyDerivation(#[from] KeyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("amount overflow: {0}")]
    AmountOverflow(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::MalformedRequest(_) | LedgerError::AmountOverflow(_) => {
                ErrorKind::MalformedRequest
            }
            LedgerError::TokenNotFound(_)
            | LedgerError::AccountNotFound(_)
            | LedgerError::LedgerEntryNotFound { .. } => ErrorKind::NotFound,
            LedgerError::TokenLocked(_)
            | LedgerError::AccountDisabled(_)
            | LedgerError::AccountLocked(_) => ErrorKind::Disabled,
            LedgerError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            LedgerError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            LedgerError::KeyDerivation(_) => ErrorKind::KeyDerivationError,
            LedgerError::Store(_) | LedgerError::Serialization(_) => ErrorKind::StoreError,
        }
    }

    /// Stable code reported to clients.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::MalformedRequest(_) => "PARAM_ERROR",
            LedgerError::TokenNotFound(_) => "TOKEN_NOT_FOUND",
            LedgerError::AccountNotFound(_) => "ACCOUNT_NOT_EXIST",
            LedgerError::LedgerEntryNotFound { .. } => "LEDGER_NOT_FOUND",
            LedgerError::TokenLocked(_) => "TOKEN_LOCKED",
            LedgerError::AccountDisabled(_) => "ACCOUNT_DISABLED",
            LedgerError::AccountLocked(_) => "ACCOUNT_LOCKED",
            LedgerError::PermissionDenied(_) => "PERMISSION_DENIED",
            LedgerError::InsufficientBalance { .. } => "BALANCE_NOT_ENOUGH",
            LedgerError::KeyDerivation(_) => "KEY_DERIVATION_ERROR",
            LedgerError::Store(_) => "STORE_ERROR",
            LedgerError::Serialization(_) => "SERIALIZATION_ERROR",
            LedgerError::AmountOverflow(_) => "AMOUNT_OVERFLOW",
        }
    }

    /// `true` if the store rejected the commit because a read went stale.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            LedgerError::Store(StoreError::MvccConflict { .. } | StoreError::PhantomConflict { .. })
        )
    }
}

impl From<DirectoryError> for LedgerError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::TokenNotFound(name) => LedgerError::TokenNotFound(name),
            DirectoryError::AccountNotFound(name) => LedgerError::AccountNotFound(name),
            DirectoryError::Key(e) => LedgerError::KeyDerivation(e),
            DirectoryError::Store(e) => LedgerError::Store(e),
            DirectoryError::Serialization(msg) => LedgerError::Serialization(msg),
        }
    }
}

impl From<AmountError> for LedgerError {
    fn from(err: AmountError) -> Self {
        match err {
            AmountError::Invalid(msg) => LedgerError::MalformedRequest(msg),
            other => LedgerError::AmountOverflow(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_errors_keep_their_meaning() {
        let err: LedgerError = DirectoryError::TokenNotFound("GLD".into()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.code(), "TOKEN_NOT_FOUND");

        let err: LedgerError = DirectoryError::AccountNotFound("bob".into()).into();
        assert_eq!(err.code(), "ACCOUNT_NOT_EXIST");
    }

    #[test]
    fn amount_errors_map_to_request_errors() {
        let err: LedgerError = AmountError::Invalid("-1".into()).into();
        assert_eq!(err.code(), "PARAM_ERROR");

        let err: LedgerError = AmountError::Overflow("huge".into()).into();
        assert_eq!(err.kind(), ErrorKind::MalformedRequest);
        assert_eq!(err.code(), "AMOUNT_OVERFLOW");
    }

    #[test]
    fn store_conflicts_are_detected() {
        let err = LedgerError::Store(StoreError::PhantomConflict {
            prefix: "p".into(),
        });
        assert!(err.is_conflict());
        assert_eq!(err.kind(), ErrorKind::StoreError);
        assert!(!LedgerError::Serialization("x".into()).is_conflict());
    }

    #[test]
    fn disabled_variants_share_a_kind() {
        for err in [
            LedgerError::TokenLocked("GLD".into()),
            LedgerError::AccountDisabled("a".into()),
            LedgerError::AccountLocked("a".into()),
        ] {
            assert_eq!(err.kind(), ErrorKind::Disabled);
        }
    }
}
