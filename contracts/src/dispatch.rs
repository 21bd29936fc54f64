//! # Invocation Dispatch
//!
//! [`LedgerContract`] is the single entry point a host calls. It decodes
//! the function name and argument, runs the matching operation against a
//! transaction context, and folds the result into a [`Response`].
//!
//! [`LedgerContract::submit`] and [`LedgerContract::evaluate`] wrap one
//! invocation in a [`TxSimulator`] over a [`VersionedStore`]: `submit`
//! commits the write set when the operation succeeds, `evaluate` never
//! commits.

use chrono::{DateTime, Utc};
use ledger_protocol::context::{Event, TxContext};
use ledger_protocol::directory::{Directory, StateDirectory};
use ledger_protocol::identity::Caller;
use ledger_protocol::storage::{TxSimulator, VersionedStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::request::LedgerRequest;
use crate::{issuance, query, rescale, transfer};

/// Status of a successful invocation.
pub const STATUS_OK: u16 = 200;

/// Status of a failed invocation.
pub const STATUS_ERROR: u16 = 500;

/// Machine-readable failure attached to a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl From<&LedgerError> for ErrorBody {
    fn from(err: &LedgerError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub payload: Vec<u8>,
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn success(payload: Vec<u8>) -> Self {
        Self {
            status: STATUS_OK,
            payload,
            error: None,
        }
    }

    pub fn failure(err: &LedgerError) -> Self {
        Self {
            status: STATUS_ERROR,
            payload: Vec::new(),
            error: Some(err.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Outcome of a simulated (and possibly committed) transaction.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub tx_id: String,
    pub response: Response,
    /// Events of a committed transaction; empty otherwise.
    pub events: Vec<Event>,
    /// Commit sequence number, `None` when nothing was committed.
    pub sequence: Option<u64>,
    /// Whether the failure was a stale-read rejection at commit.
    pub conflict: bool,
}

/// The token ledger contract.
#[derive(Debug, Clone, Default)]
pub struct LedgerContract<D = StateDirectory> {
    directory: D,
}

impl<D: Directory> LedgerContract<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    /// Runs a decoded request.
    pub fn execute(
        &self,
        ctx: &mut dyn TxContext,
        request: &LedgerRequest,
    ) -> LedgerResult<Vec<u8>> {
        match request {
            LedgerRequest::Issue(req) => issuance::issue(ctx, &self.directory, req),
            LedgerRequest::GetBalance(req) => query::balance(ctx, &self.directory, req),
            LedgerRequest::GetHistory(req) => query::history(ctx, &self.directory, req),
            LedgerRequest::Transfer(req) => transfer::transfer(ctx, &self.directory, req),
            LedgerRequest::Rescale(req) => rescale::rescale(ctx, &self.directory, req),
        }
    }

    /// Decodes and runs `function(args)`, reporting failures in the
    /// response rather than as an error.
    pub fn invoke(&self, ctx: &mut dyn TxContext, function: &str, args: &[String]) -> Response {
        let result =
            LedgerRequest::decode(function, args).and_then(|request| self.execute(ctx, &request));
        match result {
            Ok(payload) => {
                info!(function, tx_id = %ctx.tx_id(), caller = %ctx.caller().name, "invocation succeeded");
                Response::success(payload)
            }
            Err(err) => {
                warn!(
                    function,
                    tx_id = %ctx.tx_id(),
                    caller = %ctx.caller().name,
                    code = err.code(),
                    error = %err,
                    "invocation failed"
                );
                Response::failure(&err)
            }
        }
    }

    /// Simulates `function(args)` and commits the write set on success.
    /// Queries are never committed.
    pub fn submit(
        &self,
        store: &dyn VersionedStore,
        caller: Caller,
        function: &str,
        args: &[String],
        timestamp: DateTime<Utc>,
    ) -> Receipt {
        self.run(store, caller, function, args, timestamp, true)
    }

    /// Simulates `function(args)` without committing anything.
    pub fn evaluate(
        &self,
        store: &dyn VersionedStore,
        caller: Caller,
        function: &str,
        args: &[String],
        timestamp: DateTime<Utc>,
    ) -> Receipt {
        self.run(store, caller, function, args, timestamp, false)
    }

    fn run(
        &self,
        store: &dyn VersionedStore,
        caller: Caller,
        function: &str,
        args: &[String],
        timestamp: DateTime<Utc>,
        commit: bool,
    ) -> Receipt {
        let tx_id = TxSimulator::generate_tx_id(&caller, function, args);
        let mut sim = TxSimulator::new(store, caller, tx_id.clone(), timestamp);
        let response = self.invoke(&mut sim, function, args);

        let fail = |err: LedgerError| Receipt {
            tx_id: tx_id.clone(),
            response: Response::failure(&err),
            events: Vec::new(),
            sequence: None,
            conflict: err.is_conflict(),
        };

        let outcome = match sim.finish() {
            Ok(outcome) => outcome,
            Err(e) => return fail(e.into()),
        };
        if !response.is_ok() || !commit || outcome.is_read_only() {
            return Receipt {
                tx_id: tx_id.clone(),
                response,
                events: Vec::new(),
                sequence: None,
                conflict: false,
            };
        }

        match store.commit(&outcome) {
            Ok(sequence) => Receipt {
                tx_id: tx_id.clone(),
                response,
                events: outcome.events,
                sequence: Some(sequence),
                conflict: false,
            },
            Err(e) => {
                warn!(%tx_id, error = %e, "commit rejected");
                fail(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_protocol::storage::MemoryStore;

    #[test]
    fn decode_failures_become_error_responses() {
        let store = MemoryStore::new();
        let contract = LedgerContract::new(StateDirectory);
        let receipt = contract.submit(&store, Caller::user("alice"), "issue", &[], Utc::now());

        assert_eq!(receipt.response.status, STATUS_ERROR);
        assert_eq!(receipt.response.error.unwrap().code, "PARAM_ERROR");
        assert!(receipt.sequence.is_none());
        assert_eq!(store.last_sequence().unwrap(), 0);
    }

    #[test]
    fn unknown_token_reported_as_not_found() {
        let store = MemoryStore::new();
        let contract = LedgerContract::new(StateDirectory);
        let receipt = contract.submit(
            &store,
            Caller::user("alice"),
            "issue",
            &[r#"{"token":"NOPE","amount":1}"#.to_string()],
            Utc::now(),
        );
        let error = receipt.response.error.unwrap();
        assert_eq!(error.code, "TOKEN_NOT_FOUND");
        assert!(error.message.contains("NOPE"));
    }
}
