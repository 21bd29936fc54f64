// Copyright (c) 2026 Ledger Core Contributors. MIT License.
// See LICENSE for details.

//! # Ledger Protocol: Core Library
//!
//! Everything the ledger contract needs from the world around it, and
//! nothing it decides for itself. The contract crate holds the business
//! rules; this crate holds the plumbing those rules run on.
//!
//! ## Architecture
//!
//! - **config**: Index names, key prefixes, event topics, precision.
//! - **amount**: Fixed-point token quantities and rescale factors.
//! - **keys**: Composite key codec for world-state records.
//! - **identity**: Caller identity and per-operation roles.
//! - **context**: The per-invocation transaction context trait.
//! - **storage**: Versioned stores, simulation and optimistic commit.
//! - **directory**: Token and account master data.
//!
//! ## Invocation Model
//!
//! A contract invocation is a pure function of its request and a
//! committed snapshot. It reads through a [`context::TxContext`], which
//! records what it saw, and buffers what it wants to write. The store
//! accepts or rejects the whole write set at commit by checking that
//! nothing it read has changed since. There are no locks held across an
//! invocation and no state carried between them.

pub mod amount;
pub mod config;
pub mod context;
pub mod directory;
pub mod identity;
pub mod keys;
pub mod storage;

pub use amount::{Amount, AmountError, Scale};
pub use context::{Event, TxContext};
pub use directory::{Account, Directory, DirectoryError, SignRequest, SignStatus, StateDirectory, Token};
pub use identity::{Caller, Role};
pub use storage::{LedgerDb, MemoryStore, StoreError, TxOutcome, TxSimulator, VersionedStore};
