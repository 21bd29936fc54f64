//! # Prometheus Metrics
//!
//! Operational metrics for the ledger node, scraped at `/metrics` on the
//! configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] with
//! the `ledger` prefix so they do not collide with the default registry.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Outcome label values.
pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_ERROR: &str = "error";
pub const OUTCOME_CONFLICT: &str = "conflict";

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct LedgerMetrics {
    registry: Registry,
    /// Invocations by `function` and `outcome` (ok, error, conflict).
    pub invocations_total: IntCounterVec,
    /// Transactions rejected at commit because a read went stale.
    pub commit_conflicts_total: IntCounter,
    /// Payment notifications emitted by committed transactions.
    pub events_emitted_total: IntCounter,
    /// Wall time from request to response, simulation and commit included.
    pub invocation_latency_seconds: Histogram,
}

impl LedgerMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("ledger".into()), None)
            .expect("failed to create prometheus registry");

        let invocations_total = IntCounterVec::new(
            Opts::new("invocations_total", "Contract invocations by function and outcome"),
            &["function", "outcome"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(invocations_total.clone()))
            .expect("metric registration");

        let commit_conflicts_total = IntCounter::new(
            "commit_conflicts_total",
            "Transactions rejected by read-set validation at commit",
        )
        .expect("metric creation");
        registry
            .register(Box::new(commit_conflicts_total.clone()))
            .expect("metric registration");

        let events_emitted_total =
            IntCounter::new("events_emitted_total", "Events emitted by committed transactions")
                .expect("metric creation");
        registry
            .register(Box::new(events_emitted_total.clone()))
            .expect("metric registration");

        let invocation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "invocation_latency_seconds",
                "Invocation latency in seconds, simulation and commit included",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(invocation_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            invocations_total,
            commit_conflicts_total,
            events_emitted_total,
            invocation_latency_seconds,
        }
    }

    /// Counts one invocation of `function` with `outcome`.
    pub fn record_invocation(&self, function: &str, outcome: &str) {
        self.invocations_total
            .with_label_values(&[function, outcome])
            .inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for LedgerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<LedgerMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_labelled_counters() {
        let metrics = LedgerMetrics::new();
        metrics.record_invocation("transfer", OUTCOME_OK);
        metrics.record_invocation("transfer", OUTCOME_CONFLICT);
        metrics.commit_conflicts_total.inc();

        let text = metrics.encode().unwrap();
        assert!(text.contains(r#"ledger_invocations_total{function="transfer",outcome="ok"} 1"#));
        assert!(text.contains("ledger_commit_conflicts_total 1"));
    }
}
