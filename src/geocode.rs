//! Reverse geocoding via Nominatim: coordinate → city/state/country/postcode.
//!
//! See <https://nominatim.org/release-docs/develop/api/Reverse/>

use async_trait::async_trait;
use metrics::counter;
use serde_json::Value;

use crate::annotation::{Coordinate, LocationSummary, NOT_AVAILABLE, UNKNOWN, UNKNOWN_PLACE};
use crate::error::EnrichError;
use crate::fetch::{url_with_query, SharedFetcher};

#[async_trait]
pub trait GeocodeLookup: Send + Sync {
    /// Never fails; unresolvable fields carry sentinels.
    async fn resolve(&self, coord: Coordinate) -> LocationSummary;
}

pub struct GeocodeClient {
    fetcher: SharedFetcher,
    base_url: String,
}

impl GeocodeClient {
    pub fn new(fetcher: SharedFetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    async fn try_resolve(&self, coord: Coordinate) -> Result<LocationSummary, EnrichError> {
        let url = url_with_query(
            &self.base_url,
            &[
                ("lat", coord.lat.to_string()),
                ("lon", coord.lon.to_string()),
                ("format", "json".to_string()),
            ],
        )?;
        let body = self.fetcher.get_json(url).await?;
        parse_response(&body)
    }
}

#[async_trait]
impl GeocodeLookup for GeocodeClient {
    async fn resolve(&self, coord: Coordinate) -> LocationSummary {
        match self.try_resolve(coord).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(target: "enrich", service = "geocode", error = %e, "failed to fetch location info");
                counter!("enrich_lookup_errors_total", "service" => "geocode").increment(1);
                LocationSummary::unknown()
            }
        }
    }
}

fn parse_response(body: &Value) -> Result<LocationSummary, EnrichError> {
    // Nominatim reports "Unable to geocode" for open water and the like.
    if let Some(err) = body.get("error").and_then(Value::as_str) {
        return Err(EnrichError::upstream(format!("nominatim: {err}")));
    }
    let address = body
        .get("address")
        .filter(|a| a.is_object())
        .ok_or_else(|| EnrichError::upstream("nominatim response has no address object"))?;

    let field = |key: &str| {
        address
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    Ok(LocationSummary {
        city: field("city")
            .or_else(|| field("town"))
            .or_else(|| field("village"))
            .unwrap_or(UNKNOWN_PLACE)
            .to_string(),
        state: field("state").unwrap_or(UNKNOWN).to_string(),
        country: field("country").unwrap_or(UNKNOWN).to_string(),
        postcode: field("postcode").unwrap_or(NOT_AVAILABLE).to_string(),
    })
}
