//! Nearest-settlement enrichment.
//!
//! Primary source is the Wikidata SPARQL endpoint: the nearest instance of
//! "human settlement" (Q486972, subclasses included) around the coordinate,
//! with optional population, image and English Wikipedia title. When Wikidata
//! has no description but a Wikipedia title is linked, the Wikipedia REST
//! summary `extract` is used instead.

use async_trait::async_trait;
use metrics::counter;
use reqwest::Url;
use serde_json::Value;

use crate::annotation::{Coordinate, PlaceInfo, PlaceOrigin, NO_DESCRIPTION, UNKNOWN};
use crate::error::EnrichError;
use crate::fetch::{url_with_query, SharedFetcher};

#[async_trait]
pub trait PlaceLookup: Send + Sync {
    /// Never fails; see [`PlaceInfo::no_match`] and [`PlaceInfo::lookup_failed`].
    async fn resolve(&self, coord: Coordinate) -> PlaceInfo;
}

pub struct PlaceEnrichmentClient {
    fetcher: SharedFetcher,
    sparql_url: String,
    summary_url: String,
    radius_km: f64,
}

impl PlaceEnrichmentClient {
    pub fn new(
        fetcher: SharedFetcher,
        sparql_url: impl Into<String>,
        summary_url: impl Into<String>,
        radius_km: f64,
    ) -> Self {
        Self {
            fetcher,
            sparql_url: sparql_url.into(),
            summary_url: summary_url.into(),
            radius_km,
        }
    }

    async fn try_resolve(&self, coord: Coordinate) -> Result<PlaceInfo, EnrichError> {
        let query = nearest_settlement_query(coord, self.radius_km);
        let url = url_with_query(
            &self.sparql_url,
            &[("query", query), ("format", "json".to_string())],
        )?;
        let body = self.fetcher.get_json(url).await?;

        let Some(hit) = first_binding(&body)? else {
            return Ok(PlaceInfo::no_match());
        };

        let mut description = binding_value(hit, "description")
            .unwrap_or(NO_DESCRIPTION)
            .to_string();
        if description == NO_DESCRIPTION {
            if let Some(title) = binding_value(hit, "wikiTitle") {
                if let Some(extract) = self.wikipedia_extract(title).await {
                    description = extract;
                }
            }
        }

        Ok(PlaceInfo {
            title: binding_value(hit, "placeLabel").unwrap_or(UNKNOWN).to_string(),
            description,
            population: binding_value(hit, "population")
                .and_then(format_population)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            image_url: binding_value(hit, "image").map(str::to_string),
            distance_km: binding_value(hit, "distance").and_then(|d| d.parse::<f64>().ok()),
            origin: PlaceOrigin::Matched,
        })
    }

    /// Secondary lookup; failures are logged and swallowed.
    async fn wikipedia_extract(&self, title: &str) -> Option<String> {
        let res = match summary_url(&self.summary_url, title) {
            Ok(url) => self.fetcher.get_json(url).await,
            Err(e) => Err(e),
        };
        match res {
            Ok(body) => body
                .get("extract")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            Err(e) => {
                tracing::warn!(target: "enrich", service = "wikipedia", %title, error = %e, "summary fallback failed");
                counter!("enrich_lookup_errors_total", "service" => "wikipedia").increment(1);
                None
            }
        }
    }
}

#[async_trait]
impl PlaceLookup for PlaceEnrichmentClient {
    async fn resolve(&self, coord: Coordinate) -> PlaceInfo {
        match self.try_resolve(coord).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(target: "enrich", service = "wikidata", error = %e, "failed to fetch place info by coords");
                counter!("enrich_lookup_errors_total", "service" => "wikidata").increment(1);
                PlaceInfo::lookup_failed()
            }
        }
    }
}

/// SPARQL for the single nearest human settlement within `radius_km`.
/// WKT points are `Point(lon lat)`.
pub fn nearest_settlement_query(coord: Coordinate, radius_km: f64) -> String {
    format!(
        r#"SELECT ?place ?placeLabel ?description ?population ?image ?wikiTitle ?distance WHERE {{
  SERVICE wikibase:around {{
    ?place wdt:P625 ?location .
    bd:serviceParam wikibase:center "Point({lon} {lat})"^^geo:wktLiteral .
    bd:serviceParam wikibase:radius "{radius}" .
    bd:serviceParam wikibase:distance ?distance .
  }}
  ?place wdt:P31/wdt:P279* wd:Q486972 .
  OPTIONAL {{ ?place wdt:P1082 ?population. }}
  OPTIONAL {{ ?place wdt:P18 ?image. }}
  OPTIONAL {{
    ?article schema:about ?place ;
             schema:isPartOf <https://en.wikipedia.org/> ;
             schema:name ?wikiTitle .
  }}
  OPTIONAL {{ ?place schema:description ?description . FILTER(LANG(?description) = "en") }}
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "en". }}
}}
ORDER BY ASC(?distance)
LIMIT 1"#,
        lon = coord.lon,
        lat = coord.lat,
        radius = radius_km,
    )
}

fn first_binding(body: &Value) -> Result<Option<&Value>, EnrichError> {
    let bindings = body
        .pointer("/results/bindings")
        .and_then(Value::as_array)
        .ok_or_else(|| EnrichError::upstream("sparql response has no results.bindings"))?;
    Ok(bindings.first())
}

fn binding_value<'a>(binding: &'a Value, var: &str) -> Option<&'a str> {
    binding
        .get(var)
        .and_then(|b| b.get("value"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn summary_url(base: &str, title: &str) -> Result<Url, EnrichError> {
    let mut url =
        Url::parse(base).map_err(|e| EnrichError::Transport(format!("bad url {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| EnrichError::Transport(format!("bad summary base url {base}")))?
        .pop_if_empty()
        .push(title);
    Ok(url)
}

/// Grouped integer, e.g. `"115644"` → `"115,644"`. Wikidata may send
/// decimals or a leading `+`.
pub fn format_population(raw: &str) -> Option<String> {
    let n = raw.trim().trim_start_matches('+').parse::<f64>().ok()?;
    if !n.is_finite() {
        return None;
    }
    let rounded = n.round();
    let digits = format!("{}", rounded.abs() as u64);
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MockFetcher;
    use serde_json::json;
    use std::sync::Arc;

    const SPARQL: &str = "https://kb.test/sparql";
    const SUMMARY: &str = "https://wiki.test/api/rest_v1/page/summary";

    fn coord() -> Coordinate {
        Coordinate::new(43.0386, -71.4492).unwrap()
    }

    fn client(fetcher: Arc<MockFetcher>) -> PlaceEnrichmentClient {
        PlaceEnrichmentClient::new(fetcher, SPARQL, SUMMARY, 20.0)
    }

    fn bindings(rows: Value) -> Value {
        json!({"head": {"vars": []}, "results": {"bindings": rows}})
    }

    #[test]
    fn population_is_grouped() {
        assert_eq!(format_population("115644").as_deref(), Some("115,644"));
        assert_eq!(format_population("+1234567").as_deref(), Some("1,234,567"));
        assert_eq!(format_population("999").as_deref(), Some("999"));
        assert_eq!(format_population("1000.4").as_deref(), Some("1,000"));
        assert_eq!(format_population("0").as_deref(), Some("0"));
        assert!(format_population("lots").is_none());
    }

    #[test]
    fn query_uses_lon_lat_order_and_radius() {
        let q = nearest_settlement_query(coord(), 20.0);
        assert!(q.contains("Point(-71.4492 43.0386)"));
        assert!(q.contains(r#"wikibase:radius "20""#));
        assert!(q.contains("wd:Q486972"));
        assert!(q.contains("ORDER BY ASC(?distance)"));
        assert!(q.ends_with("LIMIT 1"));
    }

    #[test]
    fn summary_url_encodes_title_as_one_segment() {
        let u = summary_url(SUMMARY, "Manchester, New Hampshire").unwrap();
        assert_eq!(
            u.as_str(),
            "https://wiki.test/api/rest_v1/page/summary/Manchester,%20New%20Hampshire"
        );
        let slash = summary_url(SUMMARY, "AC/DC").unwrap();
        assert!(slash.as_str().ends_with("/AC%2FDC"));
    }

    #[tokio::test]
    async fn empty_bindings_return_no_match_sentinel() {
        let fetcher = Arc::new(MockFetcher::new().route(SPARQL, bindings(json!([]))));
        let info = client(fetcher.clone()).resolve(coord()).await;
        assert_eq!(info, PlaceInfo::no_match());
        assert_eq!(info.title, "Unknown place");
        assert_eq!(info.description, "No info found");
        assert_eq!(info.population, "Unknown");
        assert!(info.image_url.is_none());
        assert_eq!(fetcher.calls_to(SUMMARY), 0);
    }

    #[tokio::test]
    async fn full_binding_is_mapped() {
        let fetcher = Arc::new(MockFetcher::new().route(
            SPARQL,
            bindings(json!([{
                "placeLabel": {"type": "literal", "value": "Hooksett"},
                "description": {"type": "literal", "value": "town in New Hampshire"},
                "population": {"type": "literal", "value": "14871"},
                "image": {"type": "uri", "value": "http://commons.wikimedia.org/x.jpg"},
                "wikiTitle": {"type": "literal", "value": "Hooksett, New Hampshire"},
                "distance": {"type": "literal", "value": "1.234"}
            }])),
        ));
        let info = client(fetcher.clone()).resolve(coord()).await;
        assert_eq!(info.title, "Hooksett");
        assert_eq!(info.description, "town in New Hampshire");
        assert_eq!(info.population, "14,871");
        assert_eq!(info.image_url.as_deref(), Some("http://commons.wikimedia.org/x.jpg"));
        assert_eq!(info.distance_km, Some(1.234));
        assert_eq!(info.origin, PlaceOrigin::Matched);
        // Description present: no secondary lookup.
        assert_eq!(fetcher.calls_to(SUMMARY), 0);
    }

    #[tokio::test]
    async fn missing_description_uses_one_summary_lookup() {
        let fetcher = Arc::new(
            MockFetcher::new()
                .route(
                    SPARQL,
                    bindings(json!([{
                        "placeLabel": {"value": "Manchester"},
                        "wikiTitle": {"value": "Manchester, New Hampshire"}
                    }])),
                )
                .route(SUMMARY, json!({"extract": "Manchester is a city in New Hampshire."})),
        );
        let info = client(fetcher.clone()).resolve(coord()).await;
        assert_eq!(info.description, "Manchester is a city in New Hampshire.");
        assert_eq!(info.population, "Unknown");
        assert_eq!(fetcher.calls_to(SUMMARY), 1);
        assert_eq!(fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn summary_failure_keeps_no_description_sentinel() {
        let fetcher = Arc::new(
            MockFetcher::new()
                .route(
                    SPARQL,
                    bindings(json!([{
                        "placeLabel": {"value": "Manchester"},
                        "wikiTitle": {"value": "Manchester, New Hampshire"}
                    }])),
                )
                .fail(SUMMARY, "503"),
        );
        let info = client(fetcher.clone()).resolve(coord()).await;
        assert_eq!(info.title, "Manchester");
        assert_eq!(info.description, "No description available");
        assert_eq!(fetcher.calls_to(SUMMARY), 1);
    }

    #[tokio::test]
    async fn missing_description_without_title_skips_summary() {
        let fetcher = Arc::new(MockFetcher::new().route(
            SPARQL,
            bindings(json!([{"placeLabel": {"value": "Nowhere"}}])),
        ));
        let info = client(fetcher.clone()).resolve(coord()).await;
        assert_eq!(info.description, "No description available");
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn primary_failure_returns_error_sentinel() {
        let fetcher = Arc::new(MockFetcher::new().fail(SPARQL, "connection reset"));
        let info = client(fetcher).resolve(coord()).await;
        assert_eq!(info, PlaceInfo::lookup_failed());
        assert_eq!(info.title, "Unknown");

        let malformed = Arc::new(MockFetcher::new().route(SPARQL, json!({"results": {}})));
        let info = client(malformed).resolve(coord()).await;
        assert_eq!(info.origin, PlaceOrigin::Error);
    }
}
