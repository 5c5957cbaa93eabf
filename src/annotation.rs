//! annotation.rs: the annotation record and the value types it carries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AnnotateError;

/// Sentinels shown inline instead of hiding a field.
pub const UNKNOWN: &str = "Unknown";
pub const UNKNOWN_PLACE: &str = "Unknown place";
pub const NOT_AVAILABLE: &str = "N/A";
pub const NO_INFO_FOUND: &str = "No info found";
pub const NO_DESCRIPTION: &str = "No description available";

/// Opaque, never-reused identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub u64);

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Validated constructor: finite, lat in [-90, 90], lon in [-180, 180].
    pub fn new(lat: f64, lon: f64) -> Result<Self, AnnotateError> {
        let ok = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        if ok {
            Ok(Self { lat, lon })
        } else {
            Err(AnnotateError::InvalidCoordinate {
                lat: lat.to_string(),
                lon: lon.to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSummary {
    pub city: String,
    pub state: String,
    pub country: String,
    pub postcode: String,
}

impl LocationSummary {
    /// Returned when the geocoding call itself failed.
    pub fn unknown() -> Self {
        Self {
            city: UNKNOWN.into(),
            state: UNKNOWN.into(),
            country: UNKNOWN.into(),
            postcode: UNKNOWN.into(),
        }
    }
}

/// Output of the configured weather strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeatherReport {
    Current {
        temperature_c: f64,
        wind_speed_kph: f64,
        description: String,
    },
    /// `None` marks a value the upstream reported as missing.
    Historical {
        date: String,
        max_temp_c: Option<f64>,
        min_temp_c: Option<f64>,
    },
    /// Best-effort "N/A" structure after a failed lookup.
    Unavailable,
}

impl WeatherReport {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

/// How a [`PlaceInfo`] came to be; lets the orchestrator tell an empty answer
/// from a failed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceOrigin {
    #[default]
    Matched,
    NoMatch,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceInfo {
    pub title: String,
    pub description: String,
    pub population: String,
    pub image_url: Option<String>,
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub origin: PlaceOrigin,
}

impl PlaceInfo {
    /// Zero settlements within the search radius.
    pub fn no_match() -> Self {
        Self {
            title: UNKNOWN_PLACE.into(),
            description: NO_INFO_FOUND.into(),
            population: UNKNOWN.into(),
            image_url: None,
            distance_km: None,
            origin: PlaceOrigin::NoMatch,
        }
    }

    /// The knowledge-base query failed.
    pub fn lookup_failed() -> Self {
        Self {
            title: UNKNOWN.into(),
            description: NO_INFO_FOUND.into(),
            population: UNKNOWN.into(),
            image_url: None,
            distance_km: None,
            origin: PlaceOrigin::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Ready,
    Failed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub coordinate: Coordinate,
    pub caption: String,
    pub location_summary: Option<LocationSummary>,
    pub weather: Option<WeatherReport>,
    pub place_info: Option<PlaceInfo>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of one enrichment round, merged into an annotation by id.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentPatch {
    Ready {
        weather: WeatherReport,
        place_info: PlaceInfo,
    },
    Failed {
        reason: String,
    },
}

impl Annotation {
    /// Pending record; the caption must already be validated by the caller.
    pub fn pending(
        id: AnnotationId,
        coordinate: Coordinate,
        caption: String,
        location_summary: Option<LocationSummary>,
    ) -> Self {
        Self {
            id,
            coordinate,
            caption,
            location_summary,
            weather: None,
            place_info: None,
            status: Status::Pending,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Merge an enrichment result. Only a Pending annotation accepts a patch;
    /// returns whether anything changed.
    pub fn apply(&mut self, patch: EnrichmentPatch) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match patch {
            EnrichmentPatch::Ready {
                weather,
                place_info,
            } => {
                self.weather = Some(weather);
                self.place_info = Some(place_info);
                self.status = Status::Ready;
            }
            EnrichmentPatch::Failed { reason } => {
                self.weather = None;
                self.place_info = None;
                self.status = Status::Failed;
                self.failure_reason = Some(reason);
            }
        }
        true
    }
}

/// Trimmed caption, or `None` when nothing is left.
pub fn normalize_caption(raw: &str) -> Option<String> {
    let t = raw.trim();
    (!t.is_empty()).then(|| t.to_string())
}
