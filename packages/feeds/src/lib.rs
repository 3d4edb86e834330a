#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HTTP clients for everything outside the process.
//!
//! Location lookups ([`nominatim`], [`overpass`]) implement the
//! `landcover_aoi` resolver traits, [`raster::HttpRasterService`]
//! implements `landcover_raster::RasterService`, and the context feeds
//! ([`openweather`], [`usgs`], [`noaa`], [`news`]) are gathered
//! concurrently by [`fanout`]. Endpoints and timeouts come from the
//! [`service_registry`]; every request goes through [`retry`].

pub mod fanout;
pub mod news;
pub mod noaa;
pub mod nominatim;
pub mod openweather;
pub mod overpass;
pub mod raster;
pub mod retry;
pub mod service_registry;
pub mod usgs;

use async_trait::async_trait;
use landcover_aoi::AoiError;
use landcover_models::Coordinates;
use landcover_models::readings::{AirQualityReading, DisasterEvent, NewsHeadline, WeatherReading};
use landcover_raster::RasterError;
use thiserror::Error;

use crate::service_registry::ServiceConfig;

pub use fanout::{FeedBundle, FeedSet};

/// Errors from an external service.
#[derive(Debug, Error)]
pub enum FeedError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The response could not be interpreted.
    #[error("Unexpected response: {message}")]
    Parse {
        /// What was wrong with the body.
        message: String,
    },

    /// A required API key is not set.
    #[error("Environment variable {var} is not set")]
    MissingKey {
        /// Variable that should hold the key.
        var: String,
    },

    /// The service is absent from the registry or disabled.
    #[error("Service {id} is not configured")]
    NotConfigured {
        /// Registry id.
        id: String,
    },
}

impl FeedError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

impl From<FeedError> for AoiError {
    fn from(e: FeedError) -> Self {
        Self::Lookup {
            message: e.to_string(),
        }
    }
}

impl From<FeedError> for RasterError {
    fn from(e: FeedError) -> Self {
        Self::Service {
            message: e.to_string(),
        }
    }
}

/// Current weather at a point.
#[async_trait]
pub trait WeatherFeed: Send + Sync {
    /// # Errors
    ///
    /// Returns [`FeedError`] if the upstream call fails.
    async fn current_weather(&self, at: Coordinates) -> Result<WeatherReading, FeedError>;
}

/// Air pollution at a point.
#[async_trait]
pub trait AirQualityFeed: Send + Sync {
    /// # Errors
    ///
    /// Returns [`FeedError`] if the upstream call fails.
    async fn air_quality(&self, at: Coordinates) -> Result<AirQualityReading, FeedError>;
}

/// Hazards near a point.
#[async_trait]
pub trait DisasterFeed: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Returns [`FeedError`] if the upstream call fails.
    async fn disasters(&self, at: Coordinates) -> Result<Vec<DisasterEvent>, FeedError>;
}

/// Recent weather and climate headlines.
#[async_trait]
pub trait NewsFeed: Send + Sync {
    /// # Errors
    ///
    /// Returns [`FeedError`] if the upstream call fails.
    async fn headlines(&self) -> Result<Vec<NewsHeadline>, FeedError>;
}

/// Builds a client with the service's timeout and user agent.
///
/// # Errors
///
/// Returns [`FeedError::Http`] if the TLS backend cannot be initialized.
pub fn http_client(service: &ServiceConfig) -> Result<reqwest::Client, FeedError> {
    let mut builder = reqwest::Client::builder().timeout(service.timeout());
    if let Some(user_agent) = &service.user_agent {
        builder = builder.user_agent(user_agent.clone());
    }
    Ok(builder.build()?)
}

/// Reads a non-empty API key from `var`.
///
/// # Errors
///
/// Returns [`FeedError::MissingKey`] if the variable is unset or blank.
pub fn api_key(var: &str) -> Result<String, FeedError> {
    std::env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| FeedError::MissingKey {
            var: var.to_string(),
        })
}

/// Looks up an enabled service by id.
///
/// # Errors
///
/// Returns [`FeedError::NotConfigured`] if it is missing or disabled.
pub fn registered(id: &str) -> Result<ServiceConfig, FeedError> {
    service_registry::service(id).ok_or_else(|| FeedError::NotConfigured { id: id.to_string() })
}

pub(crate) fn f64_at(value: &serde_json::Value, pointer: &str) -> Option<f64> {
    value.pointer(pointer).and_then(serde_json::Value::as_f64)
}

pub(crate) fn str_at<'a>(value: &'a serde_json::Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(serde_json::Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_errors_become_lookup_errors() {
        let err: AoiError = FeedError::Status {
            status: 503,
            url: "https://nominatim.openstreetmap.org/search".to_string(),
        }
        .into();
        assert!(matches!(err, AoiError::Lookup { .. }));
        assert!(err.to_string().contains("HTTP 503"));
    }

    #[test]
    fn feed_errors_become_raster_service_errors() {
        let err: RasterError = FeedError::parse("no bins").into();
        assert!(matches!(err, RasterError::Service { .. }));
    }

    #[test]
    fn missing_key_names_the_variable() {
        let err = api_key("LANDCOVER_TEST_KEY_THAT_IS_NEVER_SET").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Environment variable LANDCOVER_TEST_KEY_THAT_IS_NEVER_SET is not set"
        );
    }

    #[test]
    fn unknown_service_is_not_configured() {
        assert!(matches!(
            registered("nope"),
            Err(FeedError::NotConfigured { .. })
        ));
    }
}
