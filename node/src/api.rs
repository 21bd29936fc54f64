//! # Invoke / Query API
//!
//! Builds the axum router that exposes the ledger contract over HTTP.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path      | Description                                   |
//! |--------|-----------|-----------------------------------------------|
//! | GET    | `/health` | Liveness check                                |
//! | POST   | `/invoke` | Simulate, then commit on success              |
//! | POST   | `/query`  | Simulate only; nothing is written             |
//!
//! Contract failures are not HTTP failures: every decodable request gets
//! `200 OK` with the invocation envelope, and the envelope's `status` and
//! `error` fields carry the outcome.
//!
//! ## Caller identity
//!
//! The `caller` field of a request body is taken at face value, and
//! naming one of the configured super admins grants full rights. The node
//! performs no authentication of its own. Bind the API to a private
//! interface and put it behind a proxy that authenticates the submitter
//! and sets `caller` itself.

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use ledger_contracts::{ErrorBody, LedgerContract, LedgerFunction, Receipt};
use ledger_protocol::identity::same_identity;
use ledger_protocol::storage::LedgerDb;
use ledger_protocol::Caller;

use crate::metrics::{SharedMetrics, OUTCOME_CONFLICT, OUTCOME_ERROR, OUTCOME_OK};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Persistent world state.
    pub db: Arc<LedgerDb>,
    pub contract: Arc<LedgerContract>,
    /// Identities granted super-administrator rights.
    pub super_admins: Arc<Vec<String>>,
    pub metrics: SharedMetrics,
}

/// Maps a submitter name to a [`Caller`], privileged when it matches one
/// of `super_admins`.
///
/// `name` must already be authenticated upstream; it is trusted as given.
pub fn resolve_caller(name: &str, super_admins: &[String]) -> Caller {
    let privileged = super_admins.iter().any(|admin| same_identity(admin, name));
    Caller::new(name.trim(), privileged)
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/invoke", post(invoke_handler))
        .route("/query", post(query_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /invoke` and `POST /query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    /// Identity submitting the call.
    pub caller: String,
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventView {
    pub topic: String,
    pub payload: String,
}

/// Invocation envelope returned by both endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub tx_id: String,
    /// 200 on success, 500 on any contract failure.
    pub status: u16,
    /// Payload bytes as UTF-8 (lossy).
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub events: Vec<EventView>,
    /// Commit sequence, present only when something was committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

impl From<Receipt> for InvokeResponse {
    fn from(receipt: Receipt) -> Self {
        Self {
            tx_id: receipt.tx_id,
            status: receipt.response.status,
            payload: String::from_utf8_lossy(&receipt.response.payload).into_owned(),
            error: receipt.response.error,
            events: receipt
                .events
                .into_iter()
                .map(|event| EventView {
                    topic: event.topic,
                    payload: String::from_utf8_lossy(&event.payload).into_owned(),
                })
                .collect(),
            sequence: receipt.sequence,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: liveness check.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "version": state.version })),
    )
}

/// `POST /invoke`: simulate and commit.
async fn invoke_handler(
    State(state): State<AppState>,
    Json(request): Json<InvokeRequest>,
) -> Response {
    run_invocation(state, request, true).await
}

/// `POST /query`: simulate without committing.
async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<InvokeRequest>,
) -> Response {
    run_invocation(state, request, false).await
}

/// Runs the contract on the blocking pool and records metrics.
async fn run_invocation(state: AppState, request: InvokeRequest, commit: bool) -> Response {
    let label = LedgerFunction::parse(&request.function)
        .map(LedgerFunction::as_str)
        .unwrap_or("unknown");
    let caller = resolve_caller(&request.caller, &state.super_admins);
    let timer = state.metrics.invocation_latency_seconds.start_timer();

    let db = Arc::clone(&state.db);
    let contract = Arc::clone(&state.contract);
    let joined = tokio::task::spawn_blocking(move || {
        let InvokeRequest { function, args, .. } = request;
        if commit {
            contract.submit(db.as_ref(), caller, &function, &args, Utc::now())
        } else {
            contract.evaluate(db.as_ref(), caller, &function, &args, Utc::now())
        }
    })
    .await;
    timer.observe_duration();

    let receipt = match joined {
        Ok(receipt) => receipt,
        Err(e) => {
            error!(function = label, error = %e, "invocation task failed");
            state.metrics.record_invocation(label, OUTCOME_ERROR);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "invocation aborted" })),
            )
                .into_response();
        }
    };

    let outcome = if receipt.conflict {
        state.metrics.commit_conflicts_total.inc();
        OUTCOME_CONFLICT
    } else if receipt.response.is_ok() {
        OUTCOME_OK
    } else {
        OUTCOME_ERROR
    };
    state.metrics.record_invocation(label, outcome);
    state
        .metrics
        .events_emitted_total
        .inc_by(receipt.events.len() as u64);
    debug!(function = label, tx_id = %receipt.tx_id, outcome, "invocation handled");

    (StatusCode::OK, Json(InvokeResponse::from(receipt))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use ledger_protocol::directory::{register_account, register_token, Account, Token};
    use ledger_protocol::storage::{TxSimulator, VersionedStore};
    use tower::ServiceExt;

    use crate::metrics::LedgerMetrics;

    /// State over a temporary database with token GLD (issuer alice) and
    /// accounts alice and bob. `root` is the only administrator.
    fn test_app_state() -> AppState {
        let db = Arc::new(LedgerDb::open_temporary().expect("temp db"));
        let mut tx = TxSimulator::new(db.as_ref(), Caller::super_admin("root"), "seed", Utc::now());
        register_token(
            &mut tx,
            &Token {
                name: "GLD".into(),
                issuer: "alice".into(),
                status: true,
            },
        )
        .unwrap();
        for name in ["alice", "bob"] {
            register_account(
                &mut tx,
                &Account {
                    did_name: name.into(),
                    status: true,
                },
            )
            .unwrap();
        }
        db.commit(&tx.finish().unwrap()).unwrap();

        AppState {
            version: "0.1.0-test".into(),
            db,
            contract: Arc::new(LedgerContract::default()),
            super_admins: Arc::new(vec!["root".into()]),
            metrics: Arc::new(LedgerMetrics::new()),
        }
    }

    /// Sends a GET request and returns the (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    /// Sends a POST request with JSON body and returns (status, body_bytes).
    async fn post_json(
        router: &Router,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    async fn call(router: &Router, path: &str, caller: &str, function: &str, arg: serde_json::Value) -> InvokeResponse {
        let (status, body) = post_json(
            router,
            path,
            serde_json::json!({
                "caller": caller,
                "function": function,
                "args": [arg.to_string()],
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn admins_matched_case_insensitively() {
        let admins = vec!["Root".to_string()];
        assert!(resolve_caller(" ROOT ", &admins).privileged);
        assert_eq!(resolve_caller(" ROOT ", &admins).name, "ROOT");
        assert!(!resolve_caller("alice", &admins).privileged);
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], "0.1.0-test");
    }

    #[tokio::test]
    async fn issue_then_transfer_emits_payment_event() {
        let router = create_router(test_app_state());

        let issued = call(&router, "/invoke", "alice", "issue", serde_json::json!({"token": "GLD", "amount": 100})).await;
        assert_eq!(issued.status, 200, "{:?}", issued.error);
        assert!(issued.sequence.is_some());

        let sent = call(
            &router,
            "/invoke",
            "alice",
            "transfer",
            serde_json::json!({"from": "alice", "to": "bob", "token": "GLD", "amount": 30}),
        )
        .await;
        assert_eq!(sent.status, 200, "{:?}", sent.error);
        assert_eq!(sent.events.len(), 1);
        assert_eq!(sent.events[0].topic, "payment.bob");

        let payload: serde_json::Value = serde_json::from_str(&sent.events[0].payload).unwrap();
        assert_eq!(payload["Type"], "payment");
        assert_eq!(payload["Amount"], "30.00");
        assert_eq!(payload["TxId"], sent.tx_id);
    }

    #[tokio::test]
    async fn query_reads_balance_without_committing() {
        let state = test_app_state();
        let router = create_router(state.clone());
        call(&router, "/invoke", "alice", "issue", serde_json::json!({"token": "GLD", "amount": 12.5})).await;
        let before = state.db.last_sequence().unwrap();

        let balance = call(&router, "/query", "bob", "getBalance", serde_json::json!({"token": "GLD", "holder": "alice"})).await;
        assert_eq!(balance.status, 200);
        assert!(balance.sequence.is_none());
        let entry: serde_json::Value = serde_json::from_str(&balance.payload).unwrap();
        assert_eq!(entry["Amount"], 12.5);
        assert_eq!(state.db.last_sequence().unwrap(), before);
    }

    #[tokio::test]
    async fn query_never_commits_writes() {
        let state = test_app_state();
        let router = create_router(state.clone());

        let issued = call(&router, "/query", "alice", "issue", serde_json::json!({"token": "GLD", "amount": 5})).await;
        assert_eq!(issued.status, 200);

        let balance = call(&router, "/query", "alice", "getBalance", serde_json::json!({"token": "GLD", "holder": "alice"})).await;
        assert_eq!(balance.payload, "");
    }

    #[tokio::test]
    async fn contract_failures_use_the_envelope() {
        let router = create_router(test_app_state());

        let denied = call(&router, "/invoke", "bob", "issue", serde_json::json!({"token": "GLD", "amount": 1})).await;
        assert_eq!(denied.status, 500);
        assert_eq!(denied.error.unwrap().code, "PERMISSION_DENIED");
        assert!(denied.events.is_empty());

        let unknown = call(&router, "/invoke", "bob", "burn", serde_json::json!({})).await;
        assert_eq!(unknown.error.unwrap().code, "PARAM_ERROR");
    }

    #[tokio::test]
    async fn admin_rights_come_only_from_the_configured_list() {
        let router = create_router(test_app_state());
        let rescale = serde_json::json!({"token": "GLD", "scale": 2});

        let denied = call(&router, "/invoke", "bob", "rescale", rescale.clone()).await;
        assert_eq!(denied.error.unwrap().code, "PERMISSION_DENIED");

        let granted = call(&router, "/invoke", " ROOT ", "rescale", rescale).await;
        assert!(granted.error.is_none(), "{:?}", granted.error);
        assert!(granted.sequence.is_some());
    }

    #[tokio::test]
    async fn malformed_body_is_a_client_error() {
        let router = create_router(test_app_state());
        let req = Request::builder()
            .method("POST")
            .uri("/invoke")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());

        let (status, _) = post_json(&router, "/query", serde_json::json!({"function": "issue"})).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn invocations_are_counted() {
        let state = test_app_state();
        let router = create_router(state.clone());
        call(&router, "/invoke", "alice", "LedgerIssue", serde_json::json!({"token": "GLD", "amount": 1})).await;
        call(&router, "/invoke", "bob", "mint", serde_json::json!({})).await;

        let text = state.metrics.encode().unwrap();
        assert!(text.contains(r#"ledger_invocations_total{function="issue",outcome="ok"} 1"#));
        assert!(text.contains(r#"ledger_invocations_total{function="unknown",outcome="error"} 1"#));
        assert!(text.contains("ledger_invocation_latency_seconds_count 2"));
    }
}
