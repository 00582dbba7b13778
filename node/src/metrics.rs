//! # Prometheus Metrics
//!
//! Operational counters for the charge service, scraped at `/metrics` on the
//! metrics port.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] under the `qris`
//! namespace so they do not collide with anything on the default registry.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the service.
///
/// The handles are cheap clones over shared atomics, so one instance behind
/// an `Arc` serves every request handler.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Charge links minted through `POST /charges`.
    pub charges_created_total: IntCounter,
    /// Links that decoded to a valid charge.
    pub links_resolved_total: IntCounter,
    /// Links that failed to decode and were answered with "not valid".
    pub links_rejected_total: IntCounter,
    /// Dynamic payloads built, on any route.
    pub payloads_generated_total: IntCounter,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("qris".into()), None)?;

        let charges_created_total = counter(
            &registry,
            "charges_created_total",
            "Total number of charge links minted",
        )?;
        let links_resolved_total = counter(
            &registry,
            "links_resolved_total",
            "Total number of charge links resolved successfully",
        )?;
        let links_rejected_total = counter(
            &registry,
            "links_rejected_total",
            "Total number of charge links rejected as invalid",
        )?;
        let payloads_generated_total = counter(
            &registry,
            "payloads_generated_total",
            "Total number of dynamic payloads generated",
        )?;

        Ok(Self {
            registry,
            charges_created_total,
            links_resolved_total,
            links_rejected_total,
            payloads_generated_total,
        })
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

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
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

/// Router for the metrics port.
pub fn metrics_router(metrics: SharedMetrics) -> axum::Router {
    axum::Router::new()
        .route("/metrics", axum::routing::get(metrics_handler))
        .with_state(metrics)
}
