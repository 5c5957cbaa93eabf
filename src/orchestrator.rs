//! # Enrichment orchestrator
//! Owns the annotation lifecycle: optimistic insert of a Pending record, one
//! background enrichment round per annotation, and the single by-id patch
//! that moves it to Ready or Failed.
//!
//! Interaction is two-phase: [`select_coordinate`](EnrichmentOrchestrator::select_coordinate)
//! records where the user clicked, [`submit_caption`](EnrichmentOrchestrator::submit_caption)
//! confirms it. [`confirm`](EnrichmentOrchestrator::confirm) does both at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::annotation::{
    normalize_caption, Annotation, AnnotationId, Coordinate, EnrichmentPatch, PlaceOrigin,
};
use crate::config::ServiceConfig;
use crate::connectivity::{probe_from_config, ConnectivityProbe, OFFLINE_MESSAGE};
use crate::error::{AnnotateError, EnrichError};
use crate::fetch::HttpFetcher;
use crate::geocode::{GeocodeClient, GeocodeLookup};
use crate::place::{PlaceEnrichmentClient, PlaceLookup};
use crate::store::{AnnotationStore, StoreEvent};
use crate::weather::{WeatherClient, WeatherLookup, WeatherStrategy};

/// Failure reason when both weather and place lookups came back with their
/// error sentinels.
pub const ENRICHMENT_UNAVAILABLE: &str = "Weather and place services are unavailable.";

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("enrich_annotations_total", "Annotations confirmed.");
        describe_counter!(
            "enrich_offline_total",
            "Annotations failed by the connectivity pre-check."
        );
        describe_counter!(
            "enrich_failed_total",
            "Enrichment rounds that ended in the Failed state."
        );
        describe_counter!(
            "enrich_lookup_errors_total",
            "Leaf lookups that fell back to sentinel values."
        );
        describe_histogram!(
            "enrich_duration_ms",
            "Weather + place enrichment round time in milliseconds."
        );
        describe_gauge!("annotations_live", "Annotations currently held.");
    });
}

/// The collaborators the orchestrator calls out to.
#[derive(Clone)]
pub struct Lookups {
    pub geocode: Arc<dyn GeocodeLookup>,
    pub weather: Arc<dyn WeatherLookup>,
    pub place: Arc<dyn PlaceLookup>,
    pub connectivity: Arc<dyn ConnectivityProbe>,
}

impl Lookups {
    /// Production wiring against the configured public services.
    pub fn from_config(cfg: &ServiceConfig) -> Result<Self, EnrichError> {
        let http = HttpFetcher::new(&cfg.http)?;
        let client = http.client().clone();
        let fetcher = Arc::new(http);

        Ok(Self {
            geocode: Arc::new(GeocodeClient::new(
                fetcher.clone(),
                cfg.endpoints.nominatim_url.clone(),
            )),
            weather: Arc::new(WeatherClient::new(
                fetcher.clone(),
                WeatherStrategy::from_config(&cfg.weather, &cfg.endpoints),
            )),
            place: Arc::new(PlaceEnrichmentClient::new(
                fetcher,
                cfg.endpoints.wikidata_sparql_url.clone(),
                cfg.endpoints.wikipedia_summary_url.clone(),
                cfg.place.radius_km,
            )),
            connectivity: Arc::from(probe_from_config(&cfg.connectivity, client)),
        })
    }
}

/// Handle for a freshly confirmed annotation.
#[derive(Debug)]
pub struct Confirmed {
    pub id: AnnotationId,
    /// Background enrichment round; `None` when the annotation failed up front.
    pub task: Option<JoinHandle<()>>,
}

impl Confirmed {
    /// Wait for the enrichment round (if any) to finish.
    pub async fn settled(self) -> AnnotationId {
        if let Some(task) = self.task {
            if let Err(e) = task.await {
                warn!(target: "enrich", id = %self.id, error = %e, "enrichment task did not complete");
            }
        }
        self.id
    }
}

pub struct EnrichmentOrchestrator {
    store: Arc<AnnotationStore>,
    lookups: Lookups,
    selection: Mutex<Option<Coordinate>>,
    finished: AtomicBool,
}

impl EnrichmentOrchestrator {
    pub fn new(lookups: Lookups) -> Self {
        Self::with_store(Arc::new(AnnotationStore::new()), lookups)
    }

    pub fn with_store(store: Arc<AnnotationStore>, lookups: Lookups) -> Self {
        ensure_metrics_described();
        Self {
            store,
            lookups,
            selection: Mutex::new(None),
            finished: AtomicBool::new(false),
        }
    }

    pub fn from_config(cfg: &ServiceConfig) -> Result<Self, EnrichError> {
        info!(
            target: "enrich",
            weather_mode = %cfg.weather.mode,
            radius_km = cfg.place.radius_km,
            probe = cfg.connectivity.probe_url.is_some(),
            "orchestrator configured"
        );
        Ok(Self::new(Lookups::from_config(cfg)?))
    }

    pub fn store(&self) -> &Arc<AnnotationStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    /* ----------------------------
    Session switch
    ---------------------------- */

    /// Stop accepting new annotations. Edit/delete/reset keep working.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
        self.clear_selection();
    }

    pub fn reopen(&self) {
        self.finished.store(false, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /* ----------------------------
    Two-phase confirmation
    ---------------------------- */

    /// Phase one: remember the clicked coordinate. A later click replaces it.
    pub fn select_coordinate(&self, coord: Coordinate) -> Result<(), AnnotateError> {
        if self.is_finished() {
            return Err(AnnotateError::SessionFinished);
        }
        *self.selection.lock().expect("selection mutex poisoned") = Some(coord);
        Ok(())
    }

    pub fn selection(&self) -> Option<Coordinate> {
        *self.selection.lock().expect("selection mutex poisoned")
    }

    pub fn clear_selection(&self) {
        *self.selection.lock().expect("selection mutex poisoned") = None;
    }

    /// Phase two: confirm the selected coordinate with a caption. The selection
    /// is consumed only when an annotation is actually created.
    pub async fn submit_caption(&self, caption: &str) -> Result<Confirmed, AnnotateError> {
        let coord = self.selection().ok_or(AnnotateError::NoSelection)?;
        let confirmed = self.confirm(coord, caption).await?;
        {
            let mut sel = self.selection.lock().expect("selection mutex poisoned");
            if *sel == Some(coord) {
                *sel = None;
            }
        }
        Ok(confirmed)
    }

    /// Create one annotation for `coord` + `caption` and start its enrichment.
    ///
    /// The annotation is in the store (Pending, or already Failed when offline)
    /// by the time this returns; weather and place data arrive later through a
    /// single patch.
    pub async fn confirm(
        &self,
        coord: Coordinate,
        caption: &str,
    ) -> Result<Confirmed, AnnotateError> {
        if self.is_finished() {
            return Err(AnnotateError::SessionFinished);
        }
        let caption = normalize_caption(caption).ok_or(AnnotateError::EmptyCaption)?;
        counter!("enrich_annotations_total").increment(1);
        let id = self.store.allocate_id();

        let online = self.lookups.connectivity.is_online().await;
        // `finish()` may land while the pre-check or geocode call is in flight.
        if self.is_finished() {
            return Err(AnnotateError::SessionFinished);
        }
        if !online {
            let reason = EnrichError::Offline(OFFLINE_MESSAGE.to_string()).to_string();
            self.store
                .insert(Annotation::pending(id, coord, caption, None));
            self.store
                .patch_by_id(id, EnrichmentPatch::Failed { reason });
            counter!("enrich_offline_total").increment(1);
            counter!("enrich_failed_total").increment(1);
            warn!(target: "enrich", %id, "offline; enrichment skipped");
            return Ok(Confirmed { id, task: None });
        }

        // Location summary is the fast baseline shown with the marker.
        let summary = self.lookups.geocode.resolve(coord).await;
        if self.is_finished() {
            debug!(target: "enrich", %id, "session finished during geocode; nothing inserted");
            return Err(AnnotateError::SessionFinished);
        }
        self.store
            .insert(Annotation::pending(id, coord, caption, Some(summary)));
        debug!(target: "enrich", %id, lat = coord.lat, lon = coord.lon, "annotation pending");

        let task = tokio::spawn(run_enrichment(
            self.store.clone(),
            self.lookups.weather.clone(),
            self.lookups.place.clone(),
            id,
            coord,
        ));
        Ok(Confirmed {
            id,
            task: Some(task),
        })
    }

    /* ----------------------------
    Plain collection mutations
    ---------------------------- */

    pub fn edit_caption(&self, id: AnnotationId, caption: &str) -> bool {
        self.store.edit_caption(id, caption)
    }

    pub fn delete(&self, id: AnnotationId) -> bool {
        self.store.delete_by_id(id)
    }

    pub fn reset(&self) -> usize {
        self.store.reset()
    }
}

/// Fan out weather + place lookups as two tasks, join them, patch once by id.
async fn run_enrichment(
    store: Arc<AnnotationStore>,
    weather: Arc<dyn WeatherLookup>,
    place: Arc<dyn PlaceLookup>,
    id: AnnotationId,
    coord: Coordinate,
) {
    let t0 = Instant::now();
    let weather_task = tokio::spawn(async move { weather.resolve(coord).await });
    let place_task = tokio::spawn(async move { place.resolve(coord).await });
    let (weather_res, place_res) = tokio::join!(weather_task, place_task);

    let patch = match (weather_res, place_res) {
        (Ok(weather), Ok(place_info))
            if weather.is_unavailable() && place_info.origin == PlaceOrigin::Error =>
        {
            EnrichmentPatch::Failed {
                reason: ENRICHMENT_UNAVAILABLE.to_string(),
            }
        }
        (Ok(weather), Ok(place_info)) => EnrichmentPatch::Ready {
            weather,
            place_info,
        },
        (Err(e), _) | (_, Err(e)) => {
            warn!(target: "enrich", %id, error = %e, "error loading the extra info");
            EnrichmentPatch::Failed {
                reason: format!("Enrichment failed: {e}"),
            }
        }
    };

    let failed = matches!(patch, EnrichmentPatch::Failed { .. });
    histogram!("enrich_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    if store.patch_by_id(id, patch) {
        if failed {
            counter!("enrich_failed_total").increment(1);
        }
        info!(target: "enrich", %id, failed, "annotation enriched");
    } else {
        debug!(target: "enrich", %id, "annotation gone before enrichment settled; patch dropped");
    }
}
