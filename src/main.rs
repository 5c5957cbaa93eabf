//! Map annotator: binary entrypoint
//! Boots the Axum HTTP server: loads service config, wires the enrichment
//! orchestrator, and exposes the annotation API plus `/metrics`.

use map_annotator::api::{self, AppState};
use map_annotator::config;
use map_annotator::metrics::Metrics;
use map_annotator::EnrichmentOrchestrator;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Structured logs; `LOG_FORMAT=json` switches to JSON lines.
/// Leaves an already-installed global subscriber in place.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("map_annotator=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = config::load_config_default()?;
    let orchestrator = EnrichmentOrchestrator::from_config(&cfg).map_err(anyhow::Error::from)?;
    let metrics = Metrics::init()?;

    tracing::info!(
        weather_mode = %cfg.weather.mode,
        probe = cfg.connectivity.probe_url.as_deref().unwrap_or("none"),
        "map annotator starting"
    );

    let router = api::router_with(AppState::new(orchestrator), metrics.router());
    Ok(router.into())
}
