// tests/pipeline_mock.rs
//
// End-to-end enrichment with the real clients over a canned MockFetcher.
// Checks the request fan-out and the merged annotation, no network.

use std::sync::Arc;

use serde_json::json;

use map_annotator::annotation::{PlaceOrigin, WeatherReport};
use map_annotator::connectivity::AssumeOnline;
use map_annotator::fetch::{MockFetcher, SharedFetcher};
use map_annotator::geocode::GeocodeClient;
use map_annotator::orchestrator::ENRICHMENT_UNAVAILABLE;
use map_annotator::place::PlaceEnrichmentClient;
use map_annotator::weather::{WeatherClient, WeatherStrategy};
use map_annotator::weather_codes;
use map_annotator::{Coordinate, EnrichmentOrchestrator, Lookups, Status};

const GEO: &str = "http://geo.test/reverse";
const METEO: &str = "http://meteo.test/v1/forecast";
const SPARQL: &str = "http://wikidata.test/sparql";
const SUMMARY: &str = "http://wiki.test/page/summary";

fn lookups(fetcher: Arc<MockFetcher>) -> Lookups {
    let shared: SharedFetcher = fetcher;
    Lookups {
        geocode: Arc::new(GeocodeClient::new(shared.clone(), GEO)),
        weather: Arc::new(WeatherClient::new(
            shared.clone(),
            WeatherStrategy::Current {
                base_url: METEO.to_string(),
            },
        )),
        place: Arc::new(PlaceEnrichmentClient::new(shared, SPARQL, SUMMARY, 20.0)),
        connectivity: Arc::new(AssumeOnline),
    }
}

fn nashua() -> Coordinate {
    Coordinate::new(42.7654, -71.4676).unwrap()
}

#[tokio::test]
async fn full_round_with_wikipedia_fallback() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .route(
                GEO,
                json!({"address": {
                    "town": "Nashua",
                    "state": "New Hampshire",
                    "country": "United States",
                    "postcode": "03060"
                }}),
            )
            .route(
                METEO,
                json!({"current_weather": {"temperature": 21.3, "windspeed": 9.4, "weathercode": 3}}),
            )
            .route(
                SPARQL,
                json!({"results": {"bindings": [{
                    "placeLabel": {"value": "Nashua"},
                    "population": {"value": "91322"},
                    "wikiTitle": {"value": "Nashua, New Hampshire"},
                    "distance": {"value": "0.84"}
                }]}}),
            )
            .route(SUMMARY, json!({"extract": "Nashua is a city in southern New Hampshire."})),
    );
    let o = EnrichmentOrchestrator::new(lookups(fetcher.clone()));

    let id = o.confirm(nashua(), "Martha's Exchange").await.unwrap().settled().await;
    let a = o.store().get(id).unwrap();

    assert_eq!(a.status, Status::Ready);
    let loc = a.location_summary.unwrap();
    assert_eq!(loc.city, "Nashua");
    assert_eq!(loc.postcode, "03060");

    assert_eq!(
        a.weather,
        Some(WeatherReport::Current {
            temperature_c: 21.3,
            wind_speed_kph: 9.4,
            description: weather_codes::describe(3).to_string(),
        })
    );

    let place = a.place_info.unwrap();
    assert_eq!(place.title, "Nashua");
    assert_eq!(place.population, "91,322");
    assert_eq!(place.description, "Nashua is a city in southern New Hampshire.");
    assert_eq!(place.distance_km, Some(0.84));

    assert_eq!(fetcher.calls_to(GEO), 1);
    assert_eq!(fetcher.calls_to(METEO), 1);
    assert_eq!(fetcher.calls_to(SPARQL), 1);
    assert_eq!(fetcher.calls_to(SUMMARY), 1);
}

#[tokio::test]
async fn description_present_skips_secondary_lookup() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .route(GEO, json!({"address": {"city": "Keene"}}))
            .route(
                METEO,
                json!({"current_weather": {"temperature": 1.0, "windspeed": 2.0, "weathercode": 0}}),
            )
            .route(
                SPARQL,
                json!({"results": {"bindings": [{
                    "placeLabel": {"value": "Keene"},
                    "description": {"value": "city in New Hampshire"},
                    "wikiTitle": {"value": "Keene, New Hampshire"}
                }]}}),
            ),
    );
    let o = EnrichmentOrchestrator::new(lookups(fetcher.clone()));
    let id = o.confirm(nashua(), "Diner").await.unwrap().settled().await;

    let place = o.store().get(id).unwrap().place_info.unwrap();
    assert_eq!(place.description, "city in New Hampshire");
    assert_eq!(place.population, "Unknown");
    assert_eq!(fetcher.calls_to(SUMMARY), 0);
}

#[tokio::test]
async fn swallowed_fallback_and_partial_failures_stay_ready() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .fail(GEO, "connection reset")
            .fail(METEO, "timeout")
            .route(
                SPARQL,
                json!({"results": {"bindings": [{
                    "placeLabel": {"value": "Hudson"},
                    "wikiTitle": {"value": "Hudson, New Hampshire"}
                }]}}),
            )
            .fail(SUMMARY, "502"),
    );
    let o = EnrichmentOrchestrator::new(lookups(fetcher.clone()));
    let id = o.confirm(nashua(), "Diner").await.unwrap().settled().await;
    let a = o.store().get(id).unwrap();

    assert_eq!(a.status, Status::Ready);
    assert_eq!(a.location_summary.unwrap().city, "Unknown");
    assert_eq!(a.weather, Some(WeatherReport::Unavailable));
    let place = a.place_info.unwrap();
    assert_eq!(place.origin, PlaceOrigin::Matched);
    assert_eq!(place.description, "No description available");
    assert_eq!(fetcher.calls_to(SUMMARY), 1);
}

#[tokio::test]
async fn every_service_down_marks_failed() {
    // No routes: every call is a transport error.
    let fetcher = Arc::new(MockFetcher::new());
    let o = EnrichmentOrchestrator::new(lookups(fetcher));
    let id = o.confirm(nashua(), "Diner").await.unwrap().settled().await;
    let a = o.store().get(id).unwrap();

    assert_eq!(a.status, Status::Failed);
    assert_eq!(a.failure_reason.as_deref(), Some(ENRICHMENT_UNAVAILABLE));
    assert!(a.weather.is_none() && a.place_info.is_none());
    assert_eq!(a.caption, "Diner");
}
