#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Report and option types returned by the analysis operations.

use chrono::{DateTime, Datelike as _, NaiveDate, Utc};
use landcover_classify::ClassificationDetails;
use landcover_classify::normalize::Normalization;
use landcover_models::imagery::{DateRange, ImageSource};
use landcover_models::readings::{AirQualityReading, DisasterEvent, NewsHeadline, WeatherReading};
use landcover_models::{AoiMode, BoundingBox, Coordinates, LandCoverResult, round_to};
use landcover_raster::{Rung, TileStats};
use landcover_scoring::{
    CarbonImpact, ClimateRisks, EconomicImpact, SustainabilityIndex, UrbanisationRisk, UsAqi,
};
use serde::{Deserialize, Serialize};

/// Caller knobs shared by every analysis mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisOptions {
    /// Meters per pixel; defaults to the image source's resolution.
    pub resolution_m: Option<f64>,
    /// Residents of the area. Enables health savings and a measured
    /// population density for the urbanisation score.
    pub population: Option<u64>,
    /// Overrides the default property value per km².
    pub base_property_value_per_km2: Option<f64>,
    /// Sentinel-2 window; defaults to the trailing year. Ignored by
    /// Dynamic World, which always reads its fixed season.
    pub dates: Option<DateRange>,
    /// Tiles queried at once on the tiled rung.
    pub tile_concurrency: usize,
    /// Whether to fetch weather, air quality, hazards and news.
    pub include_context: bool,
    /// Whether locality analyses may read and write the cache.
    pub use_cache: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            resolution_m: None,
            population: None,
            base_property_value_per_km2: None,
            dates: None,
            tile_concurrency: 1,
            include_context: true,
            use_cache: true,
        }
    }
}

/// Where and how big the analysed area is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AoiSummary {
    pub name: String,
    pub mode: AoiMode,
    pub center: Coordinates,
    pub bbox: BoundingBox,
    pub area_km2: f64,
}

/// How the histogram was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationSummary {
    pub source: ImageSource,
    pub resolution_m: f64,
    /// `None` when the histogram came from the cache.
    pub rung: Option<Rung>,
    pub tiles: TileStats,
    /// Area the histogram covers. Larger than the AOI on the expanded
    /// rung, smaller on a partially answered tiled rung.
    pub area_km2: f64,
    pub from_cache: bool,
}

/// Air pollution reading with both index scales.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AirQualitySummary {
    pub reading: AirQualityReading,
    /// Name of the feed's 1-5 level.
    pub level_name: &'static str,
    pub level_advisory: &'static str,
    pub us_aqi: UsAqi,
    pub us_aqi_advisory: &'static str,
    /// Present when poor air coincides with dense built-up cover.
    pub urban_density_note: Option<String>,
}

/// All derived scores, computed from the presented percentages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub climate: ClimateRisks,
    pub urbanisation: UrbanisationRisk,
    pub sustainability: SustainabilityIndex,
    pub carbon: CarbonImpact,
    pub economic: EconomicImpact,
}

/// Result of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub aoi: AoiSummary,
    /// Presented percentages, after the display floor.
    pub land_cover: LandCoverResult,
    /// Percentages straight from the reconciler.
    pub raw_land_cover: LandCoverResult,
    pub normalization: Normalization,
    pub classification: ClassificationDetails,
    pub aggregation: AggregationSummary,
    /// Acquisition date of the image, when the service reports one.
    pub image_date: Option<NaiveDate>,
    pub weather: Option<WeatherReading>,
    pub air_quality: Option<AirQualitySummary>,
    pub scores: Scores,
    pub disasters: Vec<DisasterEvent>,
    pub news: Vec<NewsHeadline>,
    pub warnings: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// One window of a time series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    pub window: DateRange,
    pub image_date: Option<NaiveDate>,
    pub land_cover: LandCoverResult,
}

/// A window that could not be analysed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedWindow {
    pub window: DateRange,
    pub reason: String,
}

/// Percentage-point change per class between two results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverChange {
    pub urban: f64,
    pub forest: f64,
    pub vegetation: f64,
    pub water: f64,
    /// Years between the first and last analysed window.
    pub period_years: i32,
}

impl CoverChange {
    /// `last − first` per class, rounded to two places.
    #[must_use]
    pub fn between(first: &TimeSeriesPoint, last: &TimeSeriesPoint) -> Self {
        let delta = |a: f64, b: f64| round_to(b - a, 2);
        Self {
            urban: delta(first.land_cover.urban, last.land_cover.urban),
            forest: delta(first.land_cover.forest, last.land_cover.forest),
            vegetation: delta(first.land_cover.vegetation, last.land_cover.vegetation),
            water: delta(first.land_cover.water, last.land_cover.water),
            period_years: last.window.start.year() - first.window.start.year(),
        }
    }
}

/// Land cover of one buffered area over consecutive yearly windows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesReport {
    pub location: String,
    pub aoi: AoiSummary,
    pub range: DateRange,
    pub interval_years: u32,
    pub points: Vec<TimeSeriesPoint>,
    pub skipped: Vec<SkippedWindow>,
    /// First-to-last change; absent with fewer than two points.
    pub change: Option<CoverChange>,
}
