//! Weather lookup with two interchangeable strategies.
//!
//! * [`WeatherStrategy::Current`]: Open-Meteo `current_weather`.
//! * [`WeatherStrategy::Historical`]: NASA POWER daily `T2M_MAX` / `T2M_MIN`
//!   for a date `days_ago` days in the past (UTC). POWER encodes missing data
//!   as `-999`, which is surfaced as `None` rather than as a number.
//!
//! Either strategy degrades to [`WeatherReport::Unavailable`] on failure.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use metrics::counter;
use serde_json::Value;

use crate::annotation::{Coordinate, WeatherReport};
use crate::config::services::{Endpoints, WeatherSettings};
use crate::config::WeatherMode;
use crate::error::EnrichError;
use crate::fetch::{url_with_query, SharedFetcher};
use crate::weather_codes;

/// Reserved "no data" value in NASA POWER responses.
pub const POWER_MISSING: f64 = -999.0;

#[async_trait]
pub trait WeatherLookup: Send + Sync {
    /// Never fails; returns [`WeatherReport::Unavailable`] instead.
    async fn resolve(&self, coord: Coordinate) -> WeatherReport;
}

#[derive(Debug, Clone, PartialEq)]
pub enum WeatherStrategy {
    Current { base_url: String },
    Historical { base_url: String, days_ago: u32 },
}

impl WeatherStrategy {
    pub fn from_config(settings: &WeatherSettings, endpoints: &Endpoints) -> Self {
        match settings.mode {
            WeatherMode::Current => Self::Current {
                base_url: endpoints.open_meteo_url.clone(),
            },
            WeatherMode::Historical => Self::Historical {
                base_url: endpoints.nasa_power_url.clone(),
                days_ago: settings.days_ago,
            },
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Current { .. } => "weather_current",
            Self::Historical { .. } => "weather_historical",
        }
    }
}

pub struct WeatherClient {
    fetcher: SharedFetcher,
    strategy: WeatherStrategy,
}

impl WeatherClient {
    pub fn new(fetcher: SharedFetcher, strategy: WeatherStrategy) -> Self {
        Self { fetcher, strategy }
    }

    fn degrade(&self, res: Result<WeatherReport, EnrichError>) -> WeatherReport {
        res.unwrap_or_else(|e| {
            let service = self.strategy.name();
            tracing::warn!(target: "enrich", service, error = %e, "failed to fetch weather info");
            counter!("enrich_lookup_errors_total", "service" => service).increment(1);
            WeatherReport::Unavailable
        })
    }

    async fn try_current(&self, base_url: &str, coord: Coordinate) -> Result<WeatherReport, EnrichError> {
        let url = url_with_query(
            base_url,
            &[
                ("latitude", coord.lat.to_string()),
                ("longitude", coord.lon.to_string()),
                ("current_weather", "true".to_string()),
            ],
        )?;
        let body = self.fetcher.get_json(url).await?;
        parse_current(&body)
    }

    async fn try_historical(
        &self,
        base_url: &str,
        coord: Coordinate,
        date: NaiveDate,
    ) -> Result<WeatherReport, EnrichError> {
        let key = power_date_key(date);
        let url = url_with_query(
            base_url,
            &[
                ("parameters", "T2M_MAX,T2M_MIN".to_string()),
                ("community", "RE".to_string()),
                ("latitude", coord.lat.to_string()),
                ("longitude", coord.lon.to_string()),
                ("start", key.clone()),
                ("end", key.clone()),
                ("format", "JSON".to_string()),
            ],
        )?;
        let body = self.fetcher.get_json(url).await?;
        parse_historical(&body, &key)
    }
}

#[async_trait]
impl WeatherLookup for WeatherClient {
    async fn resolve(&self, coord: Coordinate) -> WeatherReport {
        let res = match &self.strategy {
            WeatherStrategy::Current { base_url } => self.try_current(base_url, coord).await,
            WeatherStrategy::Historical { base_url, days_ago } => {
                match days_before(Utc::now().date_naive(), *days_ago) {
                    Some(date) => self.try_historical(base_url, coord, date).await,
                    None => Err(EnrichError::upstream(format!(
                        "days_ago={days_ago} is before the earliest representable date"
                    ))),
                }
            }
        };
        self.degrade(res)
    }
}

/// `today` minus `days_ago` days; `None` when the result is not representable.
pub fn days_before(today: NaiveDate, days_ago: u32) -> Option<NaiveDate> {
    today.checked_sub_signed(Duration::days(i64::from(days_ago)))
}

/// 8-digit `YYYYMMDD` key used by NASA POWER.
pub fn power_date_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

fn parse_current(body: &Value) -> Result<WeatherReport, EnrichError> {
    let cw = body
        .get("current_weather")
        .ok_or_else(|| EnrichError::upstream("open-meteo response has no current_weather"))?;
    let num = |key: &str| {
        cw.get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| EnrichError::upstream(format!("current_weather.{key} missing")))
    };
    let temperature_c = num("temperature")?;
    let wind_speed_kph = num("windspeed")?;
    let description = cw
        .get("weathercode")
        .and_then(Value::as_i64)
        .map(weather_codes::describe)
        .unwrap_or(weather_codes::UNKNOWN_WEATHER)
        .to_string();

    Ok(WeatherReport::Current {
        temperature_c,
        wind_speed_kph,
        description,
    })
}

fn parse_historical(body: &Value, date_key: &str) -> Result<WeatherReport, EnrichError> {
    let params = body
        .pointer("/properties/parameter")
        .ok_or_else(|| EnrichError::upstream("power response has no properties.parameter"))?;
    let read = |name: &str| -> Result<Option<f64>, EnrichError> {
        let series = params
            .get(name)
            .ok_or_else(|| EnrichError::upstream(format!("power parameter {name} missing")))?;
        Ok(series
            .get(date_key)
            .and_then(Value::as_f64)
            .filter(|v| !is_power_missing(*v)))
    };

    Ok(WeatherReport::Historical {
        date: date_key.to_string(),
        max_temp_c: read("T2M_MAX")?,
        min_temp_c: read("T2M_MIN")?,
    })
}

fn is_power_missing(v: f64) -> bool {
    (v - POWER_MISSING).abs() < f64::EPSILON
}
