//! Prometheus exporter for the enrichment pipeline.

use anyhow::Context;
use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Enrichment rounds are bounded by the HTTP request timeout (10 s default).
const DURATION_BUCKETS_MS: &[f64] = &[
    50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0, 20_000.0,
];

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full("enrich_duration_ms".to_string()),
                DURATION_BUCKETS_MS,
            )
            .context("prometheus: duration buckets")?
            .install_recorder()
            .context("prometheus: install recorder")?;

        // Scrapes before the first annotation still see the series.
        gauge!("annotations_live").set(0.0);

        Ok(Self { handle })
    }

    /// `/metrics` in the Prometheus text format, for merging into the API router.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    }
}
