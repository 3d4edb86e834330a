//! Registry of external HTTP services.
//!
//! Each service is described by a TOML file under `services/`, embedded
//! at compile time. The registry is the one place endpoints, timeouts,
//! user agents and API-key variable names are configured.

use std::time::Duration;

use serde::Deserialize;

/// Timeout used when a service file does not name one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// One configured external service.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Unique identifier (e.g. `"openweather"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this service is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-request timeout, also the fan-out branch budget.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// `User-Agent` header, required by the OSM services.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Provider-specific settings.
    pub provider: ProviderConfig,
}

impl ServiceConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

const fn default_true() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Provider-specific settings, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// `OpenWeather` current weather, air pollution and alerts.
    OpenWeather {
        base_url: String,
        /// One Call endpoints tried in order for alerts.
        one_call_urls: Vec<String>,
        api_key_env: String,
        /// Alert events must mention one of these.
        alert_keywords: Vec<String>,
    },
    /// USGS earthquake catalog.
    Usgs {
        base_url: String,
        lookback_days: i64,
        min_magnitude: f64,
        max_radius_km: f64,
        /// Closer events are left to local reporting.
        min_distance_km: f64,
    },
    /// NOAA National Hurricane Center active storms.
    Noaa { url: String, max_distance_km: f64 },
    /// `NewsAPI` headline search.
    NewsApi {
        base_url: String,
        api_key_env: String,
        query: String,
        page_size: u32,
    },
    /// Nominatim search (geocoding and boundaries).
    Nominatim { base_url: String, candidate_limit: u32 },
    /// Overpass API, tried mirror by mirror.
    Overpass { mirrors: Vec<String> },
    /// Remote raster histogram service.
    Raster { base_url_env: String },
}

/// Embedded TOML service configs.
const SERVICE_TOMLS: &[(&str, &str)] = &[
    ("newsapi", include_str!("../services/newsapi.toml")),
    ("noaa", include_str!("../services/noaa.toml")),
    ("nominatim", include_str!("../services/nominatim.toml")),
    ("openweather", include_str!("../services/openweather.toml")),
    ("overpass", include_str!("../services/overpass.toml")),
    ("raster", include_str!("../services/raster.toml")),
    ("usgs", include_str!("../services/usgs.toml")),
];

/// Returns all configured services.
///
/// # Panics
///
/// Panics if any embedded TOML file is malformed.
#[must_use]
pub fn all_services() -> Vec<ServiceConfig> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, content)| {
            toml::de::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse service config {name}: {e}"))
        })
        .collect()
}

/// Returns enabled services.
#[must_use]
pub fn enabled_services() -> Vec<ServiceConfig> {
    all_services().into_iter().filter(|s| s.enabled).collect()
}

/// Returns the enabled service with the given id.
#[must_use]
pub fn service(id: &str) -> Option<ServiceConfig> {
    enabled_services().into_iter().find(|s| s.id == id)
}
