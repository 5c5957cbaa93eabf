// src/config/services.rs
//! Service configuration: upstream endpoints, HTTP client settings, weather
//! strategy, place search radius and the connectivity probe.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration against the public endpoints.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_CONFIG_PATH: &str = "MAP_CONFIG_PATH";
pub const ENV_WEATHER_MODE: &str = "MAP_WEATHER_MODE";
pub const ENV_WEATHER_DAYS_AGO: &str = "MAP_WEATHER_DAYS_AGO";
pub const ENV_PROBE_URL: &str = "MAP_PROBE_URL";

const DEFAULT_TOML_PATH: &str = "config/map.toml";
const DEFAULT_JSON_PATH: &str = "config/map.json";

fn default_connect_timeout_secs() -> u64 {
    4
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_days_ago() -> u32 {
    3
}
/// NASA POWER has no data older than a century.
const MAX_DAYS_AGO: u32 = 36_500;

fn default_radius_km() -> f64 {
    20.0
}
fn default_probe_timeout_secs() -> u64 {
    3
}

/// Which weather strategy the pipeline uses. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherMode {
    /// Open-Meteo current conditions.
    #[default]
    Current,
    /// NASA POWER daily min/max for a past date.
    Historical,
}

impl FromStr for WeatherMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current" => Ok(Self::Current),
            "historical" => Ok(Self::Historical),
            other => Err(anyhow!("unsupported weather mode: {other}")),
        }
    }
}

impl fmt::Display for WeatherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str("current"),
            Self::Historical => f.write_str("historical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub nominatim_url: String,
    pub open_meteo_url: String,
    pub nasa_power_url: String,
    pub wikidata_sparql_url: String,
    pub wikipedia_summary_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            nominatim_url: "https://nominatim.openstreetmap.org/reverse".into(),
            open_meteo_url: "https://api.open-meteo.com/v1/forecast".into(),
            nasa_power_url: "https://power.larc.nasa.gov/api/temporal/daily/point".into(),
            wikidata_sparql_url: "https://query.wikidata.org/sparql".into(),
            wikipedia_summary_url: "https://en.wikipedia.org/api/rest_v1/page/summary".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Nominatim and Wikimedia reject requests without an identifying agent.
    pub user_agent: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: concat!("map-annotator/", env!("CARGO_PKG_VERSION")).into(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSettings {
    pub mode: WeatherMode,
    /// Only used by [`WeatherMode::Historical`].
    #[serde(default = "default_days_ago")]
    pub days_ago: u32,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            mode: WeatherMode::default(),
            days_ago: default_days_ago(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceSettings {
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
}

impl Default for PlaceSettings {
    fn default() -> Self {
        Self {
            radius_km: default_radius_km(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivitySettings {
    /// `None` means "assume online".
    pub probe_url: Option<String>,
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        Self {
            probe_url: None,
            timeout_secs: default_probe_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub endpoints: Endpoints,
    pub http: HttpSettings,
    pub weather: WeatherSettings,
    pub place: PlaceSettings,
    pub connectivity: ConnectivitySettings,
}

impl ServiceConfig {
    /// Apply `MAP_*` environment overrides on top of file values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(mode) = std::env::var(ENV_WEATHER_MODE) {
            self.weather.mode = mode
                .parse()
                .with_context(|| format!("parsing {ENV_WEATHER_MODE}"))?;
        }
        if let Ok(days) = std::env::var(ENV_WEATHER_DAYS_AGO) {
            self.weather.days_ago = days
                .trim()
                .parse()
                .with_context(|| format!("parsing {ENV_WEATHER_DAYS_AGO}"))?;
        }
        if let Ok(url) = std::env::var(ENV_PROBE_URL) {
            let url = url.trim();
            self.connectivity.probe_url = (!url.is_empty()).then(|| url.to_string());
        }
        Ok(())
    }

    /// Replace nonsensical values with defaults.
    pub fn sanitize(&mut self) {
        if self.http.connect_timeout_secs == 0 {
            self.http.connect_timeout_secs = default_connect_timeout_secs();
        }
        if self.http.request_timeout_secs == 0 {
            self.http.request_timeout_secs = default_request_timeout_secs();
        }
        if self.connectivity.timeout_secs == 0 {
            self.connectivity.timeout_secs = default_probe_timeout_secs();
        }
        self.weather.days_ago = self.weather.days_ago.clamp(1, MAX_DAYS_AGO);
        if !(self.place.radius_km.is_finite() && self.place.radius_km > 0.0) {
            self.place.radius_km = default_radius_km();
        }
        if self.http.user_agent.trim().is_empty() {
            self.http.user_agent = HttpSettings::default().user_agent;
        }
        if let Some(url) = &self.connectivity.probe_url {
            if url.trim().is_empty() {
                self.connectivity.probe_url = None;
            }
        }
    }
}

/// Load configuration from an explicit path. Supports TOML or JSON.
pub fn load_config_from(path: &Path) -> Result<ServiceConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading map config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let mut cfg = parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing map config {}", path.display()))?;
    cfg.apply_env_overrides()?;
    cfg.sanitize();
    Ok(cfg)
}

/// Load configuration using env var + fallbacks:
/// 1) $MAP_CONFIG_PATH
/// 2) config/map.toml
/// 3) config/map.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<ServiceConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return load_config_from(&pb);
        }
    }
    let mut cfg = ServiceConfig::default();
    cfg.apply_env_overrides()?;
    cfg.sanitize();
    Ok(cfg)
}

fn parse_config(s: &str, hint_ext: &str) -> Result<ServiceConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => {
            // No usable extension: JSON documents start with '{'.
            if s.trim_start().starts_with('{') {
                Ok(serde_json::from_str(s)?)
            } else {
                Ok(toml::from_str(s)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn empty_documents_yield_defaults() {
        let from_toml = parse_config("", "toml").unwrap();
        let from_json = parse_config("{}", "json").unwrap();
        assert_eq!(from_toml, ServiceConfig::default());
        assert_eq!(from_json, ServiceConfig::default());
        assert_eq!(from_toml.weather.mode, WeatherMode::Current);
        assert_eq!(from_toml.place.radius_km, 20.0);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let toml = r#"
[weather]
mode = "historical"

[place]
radius_km = 5.0
"#;
        let cfg = parse_config(toml, "").unwrap();
        assert_eq!(cfg.weather.mode, WeatherMode::Historical);
        assert_eq!(cfg.weather.days_ago, 3);
        assert_eq!(cfg.place.radius_km, 5.0);
        assert_eq!(cfg.endpoints, Endpoints::default());
    }

    #[test]
    fn sanitize_repairs_bad_values() {
        let mut cfg = ServiceConfig::default();
        cfg.http.request_timeout_secs = 0;
        cfg.place.radius_km = -1.0;
        cfg.http.user_agent = "  ".into();
        cfg.connectivity.probe_url = Some("".into());
        cfg.sanitize();
        assert_eq!(cfg.http.request_timeout_secs, 10);
        assert_eq!(cfg.place.radius_km, 20.0);
        assert!(cfg.http.user_agent.starts_with("map-annotator/"));
        assert!(cfg.connectivity.probe_url.is_none());
    }

    #[test]
    fn sanitize_clamps_days_ago() {
        let mut cfg = parse_config("[weather]\ndays_ago = 4000000000\n", "toml").unwrap();
        cfg.sanitize();
        assert_eq!(cfg.weather.days_ago, MAX_DAYS_AGO);

        cfg.weather.days_ago = 0;
        cfg.sanitize();
        assert_eq!(cfg.weather.days_ago, 1);
    }

    #[test]
    fn weather_mode_parses_case_insensitively() {
        assert_eq!(
            " Historical ".parse::<WeatherMode>().unwrap(),
            WeatherMode::Historical
        );
        assert!("tomorrow".parse::<WeatherMode>().is_err());
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_apply_after_file() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("map.json");
        fs::write(&p, r#"{"weather": {"mode": "current", "days_ago": 1}}"#).unwrap();

        env::set_var(ENV_WEATHER_MODE, "historical");
        env::set_var(ENV_WEATHER_DAYS_AGO, "7");
        let cfg = load_config_from(&p).unwrap();
        env::remove_var(ENV_WEATHER_MODE);
        env::remove_var(ENV_WEATHER_DAYS_AGO);

        assert_eq!(cfg.weather.mode, WeatherMode::Historical);
        assert_eq!(cfg.weather.days_ago, 7);
    }
}
