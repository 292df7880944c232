//! # Prometheus Metrics
//!
//! Exposes settlement metrics for the node. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use prosynergy_protocol::types::Amount;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are `Arc`s internally) so it can be
/// shared across request handlers.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Transfers that settled, exempt or authorized.
    pub transfers_settled_total: IntCounter,
    /// Transfers rejected, labelled by error code.
    pub transfers_rejected_total: IntCounterVec,
    /// Time spent inside `transfer_by_partition`, lock wait included.
    pub settlement_latency_seconds: Histogram,
    /// Total supply of the hosted token. A gauge because prometheus has no
    /// 128-bit integer type; precision loss above 2^53 is acceptable here.
    pub total_supply: Gauge,
    /// Number of records in the settlement event log.
    pub events_recorded: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    ///
    /// # Errors
    ///
    /// Fails only if a metric definition is invalid or registered twice.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("prosynergy".into()), None)?;

        let transfers_settled_total = IntCounter::new(
            "transfers_settled_total",
            "Total number of transfers settled",
        )?;
        registry.register(Box::new(transfers_settled_total.clone()))?;

        let transfers_rejected_total = IntCounterVec::new(
            Opts::new(
                "transfers_rejected_total",
                "Total number of transfers rejected, by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(transfers_rejected_total.clone()))?;

        let settlement_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "settlement_latency_seconds",
                "Settlement latency in seconds, including lock wait",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5,
            ]),
        )?;
        registry.register(Box::new(settlement_latency_seconds.clone()))?;

        let total_supply = Gauge::new("total_supply", "Total supply of the hosted token")?;
        registry.register(Box::new(total_supply.clone()))?;

        let events_recorded = IntGauge::new(
            "events_recorded",
            "Number of records in the settlement event log",
        )?;
        registry.register(Box::new(events_recorded.clone()))?;

        Ok(Self {
            registry,
            transfers_settled_total,
            transfers_rejected_total,
            settlement_latency_seconds,
            total_supply,
            events_recorded,
        })
    }

    /// Records a successful settlement.
    pub fn record_settled(&self, elapsed: Duration, supply: Amount, events: usize) {
        self.transfers_settled_total.inc();
        self.settlement_latency_seconds
            .observe(elapsed.as_secs_f64());
        self.observe_ledger(supply, events);
    }

    /// Records a rejection under its error code.
    pub fn record_rejected(&self, reason: &str, elapsed: Duration) {
        self.transfers_rejected_total
            .with_label_values(&[reason])
            .inc();
        self.settlement_latency_seconds
            .observe(elapsed.as_secs_f64());
    }

    /// Refreshes the ledger-level gauges.
    pub fn observe_ledger(&self, supply: Amount, events: usize) {
        self.total_supply.set(supply as f64);
        self.events_recorded
            .set(i64::try_from(events).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
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
