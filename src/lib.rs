// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod annotation;
pub mod api;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod fetch;
pub mod geocode;
pub mod metrics;
pub mod orchestrator;
pub mod place;
pub mod render;
pub mod store;
pub mod units;
pub mod weather;
pub mod weather_codes;

// ---- Re-exports for stable public API ----
pub use crate::annotation::{Annotation, AnnotationId, Coordinate, Status};
pub use crate::api::router;
pub use crate::orchestrator::{Confirmed, EnrichmentOrchestrator, Lookups};
pub use crate::store::{AnnotationStore, StoreEvent};

use tracing::info;

/// Build the application router from on-disk/env configuration, without the
/// `/metrics` route (the recorder is process-global; the binary installs it).
pub fn app() -> anyhow::Result<axum::Router> {
    let cfg = config::load_config_default()?;
    let orchestrator = EnrichmentOrchestrator::from_config(&cfg)?;
    info!(
        weather_mode = %cfg.weather.mode,
        "map annotator ready"
    );
    Ok(api::router(api::AppState::new(orchestrator)))
}
