#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared land-cover data types.
//!
//! Everything that crosses a crate boundary in the land-cover pipeline
//! lives here: the [`BoundingBox`] derived from an analysis geometry, the
//! [`PixelHistogram`] returned by a raster service, the four-class
//! [`LandCoverResult`], raw class label enums, and the readings supplied
//! by external feeds.

pub mod classes;
pub mod histogram;
pub mod imagery;
pub mod readings;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use histogram::{HistogramMeasure, MASKED_LABEL, PixelHistogram};

/// Kilometers per degree of latitude (and of longitude at the equator).
pub const KM_PER_DEGREE: f64 = 111.0;

/// Maximum allowed deviation, in percentage points, of a
/// [`LandCoverResult`] total from 100%.
pub const PERCENT_TOLERANCE: f64 = 5.0;

/// Kilometers per degree of longitude at the given latitude.
///
/// Clamped away from zero so that polar latitudes never divide by zero.
#[must_use]
pub fn km_per_degree_lon(lat: f64) -> f64 {
    (KM_PER_DEGREE * lat.to_radians().cos().abs()).max(1e-9)
}

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl Coordinates {
    /// Creates a coordinate pair.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Axis-aligned bounds of an analysis geometry.
///
/// Always derived from a geometry; used for tiling and approximate area
/// math (`1° lat ≈ 111 km`, `1° lon ≈ 111 km × cos(lat)`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Western edge.
    pub min_lon: f64,
    /// Southern edge.
    pub min_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
}

impl BoundingBox {
    /// Creates a bounding box from its edges.
    #[must_use]
    pub const fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Square box extending `half_km` from `center` in each direction.
    #[must_use]
    pub fn around(center: Coordinates, half_km: f64) -> Self {
        let d_lat = half_km / KM_PER_DEGREE;
        let d_lon = half_km / km_per_degree_lon(center.lat);
        Self::new(
            center.lon - d_lon,
            center.lat - d_lat,
            center.lon + d_lon,
            center.lat + d_lat,
        )
    }

    /// Center point of the box.
    #[must_use]
    pub fn center(&self) -> Coordinates {
        Coordinates::new(
            f64::midpoint(self.min_lat, self.max_lat),
            f64::midpoint(self.min_lon, self.max_lon),
        )
    }

    /// Average latitude, used for longitude-to-km conversion.
    #[must_use]
    pub fn avg_lat(&self) -> f64 {
        f64::midpoint(self.min_lat, self.max_lat)
    }

    /// North-south extent in kilometers.
    #[must_use]
    pub fn height_km(&self) -> f64 {
        (self.max_lat - self.min_lat) * KM_PER_DEGREE
    }

    /// East-west extent in kilometers at the average latitude.
    #[must_use]
    pub fn width_km(&self) -> f64 {
        (self.max_lon - self.min_lon) * km_per_degree_lon(self.avg_lat())
    }

    /// The larger of [`Self::width_km`] and [`Self::height_km`].
    #[must_use]
    pub fn max_dimension_km(&self) -> f64 {
        self.width_km().max(self.height_km())
    }

    /// Approximate planar area in square kilometers.
    #[must_use]
    pub fn approx_area_km2(&self) -> f64 {
        self.width_km() * self.height_km()
    }
}

/// Four-class land-cover breakdown in percent.
///
/// A valid result sums to 100 within [`PERCENT_TOLERANCE`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandCoverResult {
    /// Built-up surface percentage.
    pub urban: f64,
    /// Dense tree cover percentage.
    pub forest: f64,
    /// Grass, crops, shrub and sparse vegetation percentage.
    pub vegetation: f64,
    /// Open water percentage.
    pub water: f64,
}

impl LandCoverResult {
    /// Creates a result from its four percentages.
    #[must_use]
    pub const fn new(urban: f64, forest: f64, vegetation: f64, water: f64) -> Self {
        Self {
            urban,
            forest,
            vegetation,
            water,
        }
    }

    /// Sum of all four percentages.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.urban + self.forest + self.vegetation + self.water
    }

    /// Forest plus vegetation percentage.
    #[must_use]
    pub fn green(&self) -> f64 {
        self.forest + self.vegetation
    }

    /// Whether [`Self::total`] is within [`PERCENT_TOLERANCE`] of 100.
    #[must_use]
    pub fn sums_to_hundred(&self) -> bool {
        (self.total() - 100.0).abs() <= PERCENT_TOLERANCE
    }

    /// Copy with every value rounded to `places` decimal places.
    #[must_use]
    pub fn rounded(&self, places: i32) -> Self {
        Self::new(
            round_to(self.urban, places),
            round_to(self.forest, places),
            round_to(self.vegetation, places),
            round_to(self.water, places),
        )
    }
}

/// Rounds `value` to `places` decimal places.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// How an analysis geometry was produced.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AoiMode {
    /// Administrative boundary of a whole city.
    Boundary,
    /// Circular buffer around a point.
    Buffered,
    /// Fixed 1 km square around a locality centroid.
    Fixed,
    /// 800 m square used when a locality has no boundary.
    Fallback,
    /// Caller-supplied polygon.
    Custom,
}
