//! # Token Ledger Contract
//!
//! The business rules of the ledger, written as plain functions over a
//! transaction context:
//!
//! - **Issuance**: issuer- or administrator-gated balance issuance.
//! - **Transfer**: atomic debit/credit between holders with a payment
//!   notification to the recipient.
//! - **Queries**: current balance and full version history of one entry.
//! - **Rescale**: token splits and merges across every balance and every
//!   pending sign request.
//!
//! ## Design Principles
//!
//! 1. Amounts are fixed-point integers and all arithmetic is checked.
//! 2. Operations never touch storage directly; every read and write goes
//!    through [`ledger_protocol::TxContext`] so the commit layer can
//!    validate it.
//! 3. Requests are decoded into typed structs before any rule runs, and
//!    anything that does not decode is rejected.
//! 4. Every failure carries an [`ErrorKind`] and a stable code.

pub mod dispatch;
pub mod error;
pub mod issuance;
pub mod ledger_entry;
pub mod query;
pub mod request;
pub mod rescale;
pub mod transfer;

pub use dispatch::{ErrorBody, LedgerContract, Receipt, Response};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use ledger_entry::LedgerEntry;
pub use request::{LedgerFunction, LedgerRequest};
pub use transfer::LedgerEvent;
