//! # Caller Identity & Roles
//!
//! The host resolves who submitted a transaction before the contract
//! runs; the contract only ever sees a [`Caller`]. Authorization is
//! expressed as a [`Role`] resolved per operation plus small capability
//! predicates, never as string comparisons scattered through the
//! operations.

use serde::{Deserialize, Serialize};

/// The resolved identity of the transaction submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Common name from the submitter's credential.
    pub name: String,
    /// Whether the host recognized the submitter as a super-administrator.
    pub privileged: bool,
}

impl Caller {
    pub fn new(name: impl Into<String>, privileged: bool) -> Self {
        Self {
            name: name.into(),
            privileged,
        }
    }

    /// An ordinary, unprivileged caller.
    pub fn user(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }

    /// A super-administrator.
    pub fn super_admin(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    /// Case-insensitive, whitespace-trimmed identity comparison.
    pub fn is(&self, other: &str) -> bool {
        same_identity(&self.name, other)
    }
}

/// Compares two identifiers the way the ledger does everywhere: trimmed
/// and case-folded.
pub fn same_identity(a: &str, b: &str) -> bool {
    a.trim().to_uppercase() == b.trim().to_uppercase()
}

/// What a caller is with respect to one token and, optionally, one holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Host-designated administrator; may act on any token.
    SuperAdmin,
    /// The registered issuer of the token.
    Issuer,
    /// The holder whose balance is being acted on.
    Holder,
    /// None of the above.
    Other,
}

impl Role {
    /// Resolves the caller's role. Precedence is
    /// `SuperAdmin > Issuer > Holder > Other`.
    pub fn resolve(caller: &Caller, issuer: Option<&str>, holder: Option<&str>) -> Role {
        if caller.privileged {
            Role::SuperAdmin
        } else if issuer.is_some_and(|i| caller.is(i)) {
            Role::Issuer
        } else if holder.is_some_and(|h| caller.is(h)) {
            Role::Holder
        } else {
            Role::Other
        }
    }

    /// Issuance is open to administrators and the token's issuer.
    pub fn can_issue(self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Issuer)
    }

    /// Splits and merges are administrator-only.
    pub fn can_rescale(self) -> bool {
        self == Role::SuperAdmin
    }
}
