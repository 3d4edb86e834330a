#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Remote raster access.
//!
//! Pixel work (compositing, band math, reduction) happens in a remote
//! service behind the [`RasterService`] trait. This crate only asks it
//! for an image and then for per-class histograms of that image over a
//! geometry, escalating through the [`aggregate`] ladder when the
//! service comes back empty.

pub mod aggregate;

use async_trait::async_trait;
use chrono::NaiveDate;
use geo::MultiPolygon;
use landcover_models::imagery::{DateRange, ImageSource};
use landcover_models::{HistogramMeasure, PixelHistogram};
use thiserror::Error;

pub use aggregate::{
    AggregateError, Aggregation, AggregationOptions, Rung, TileStats, aggregate,
};

/// Sentinel-2 scenes cloudier than this are excluded by default.
pub const DEFAULT_MAX_CLOUD_PCT: f64 = 10.0;

/// Errors from a raster service call.
#[derive(Debug, Error)]
pub enum RasterError {
    /// The service failed or returned something unusable.
    #[error("Raster service error: {message}")]
    Service {
        /// Description of the failure.
        message: String,
    },

    /// No scene matched the request.
    #[error("No {image_source} imagery between {start} and {end}")]
    NoImagery {
        /// Requested source.
        image_source: ImageSource,
        /// Window start.
        start: NaiveDate,
        /// Window end.
        end: NaiveDate,
    },
}

/// Which band an image exposes for histogramming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageProduct {
    /// The source's own class label band.
    Labels,
    /// Classes computed remotely from a band-math expression.
    SpectralClasses {
        /// Expression producing one class label per pixel.
        expression: String,
    },
}

/// What to composite.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub geometry: MultiPolygon<f64>,
    pub source: ImageSource,
    pub dates: DateRange,
    /// Upper bound on scene cloud cover in percent.
    pub max_cloud_pct: Option<f64>,
    pub product: ImageProduct,
}

impl ImageRequest {
    /// Dynamic World label composite over the fixed comparison season.
    #[must_use]
    pub fn dynamic_world(geometry: MultiPolygon<f64>) -> Self {
        Self {
            geometry,
            source: ImageSource::DynamicWorld,
            dates: DateRange::dynamic_world_season(),
            max_cloud_pct: None,
            product: ImageProduct::Labels,
        }
    }

    /// Sentinel-2 composite classified by `expression`.
    #[must_use]
    pub fn sentinel2(geometry: MultiPolygon<f64>, dates: DateRange, expression: String) -> Self {
        Self {
            geometry,
            source: ImageSource::Sentinel2,
            dates,
            max_cloud_pct: Some(DEFAULT_MAX_CLOUD_PCT),
            product: ImageProduct::SpectralClasses { expression },
        }
    }
}

/// Handle to an image held by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    /// Service-specific identifier.
    pub id: String,
    pub source: ImageSource,
    /// Acquisition date of the composite, when the service reports one.
    pub acquired: Option<NaiveDate>,
}

/// A remote raster/analytics provider.
///
/// Implementations may return an empty histogram (or fail) for
/// geometries that are too large or unsupported; [`aggregate`] is built
/// around exactly that.
#[async_trait]
pub trait RasterService: Send + Sync {
    /// Builds or selects an image for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError`] if no image can be produced.
    async fn fetch_image(&self, request: &ImageRequest) -> Result<RasterImage, RasterError>;

    /// Per-class histogram of `image` over `geometry`.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Service`] if the reduction fails.
    async fn histogram_over(
        &self,
        image: &RasterImage,
        geometry: &MultiPolygon<f64>,
        resolution_m: f64,
        measure: HistogramMeasure,
    ) -> Result<PixelHistogram, RasterError>;
}
