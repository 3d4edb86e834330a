//! The histogram aggregation ladder.
//!
//! 1. **Direct**: one query over the whole geometry.
//! 2. **Expanded**: the same query over the geometry grown by
//!    [`AggregationOptions::expand_m`], which catches boundary and
//!    rounding gaps.
//! 3. **Tiled**: the bounding box is cut into cells of
//!    [`AggregationOptions::tile_size_km`], each cell is intersected with
//!    the geometry and queried on its own, and every non-empty result is
//!    summed per label.
//!
//! A rung is only tried when the previous one produced nothing usable.
//! Service errors on a rung count as empty. A failing or empty tile is
//! skipped; the aggregation fails only when every rung and every tile
//! came back empty.

use futures::stream::{self, StreamExt as _};
use geo::MultiPolygon;
use landcover_aoi::geometry::{area_m2, expand, tile_grid};
use landcover_models::{HistogramMeasure, PixelHistogram};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

use crate::{RasterImage, RasterService};

/// Tuning for [`aggregate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationOptions {
    /// Meters per pixel.
    pub resolution_m: f64,
    /// Whether to ask for pixel counts or areas.
    pub measure: HistogramMeasure,
    /// Side of a tile on the tiled rung.
    pub tile_size_km: f64,
    /// Outward buffer used on the expanded rung.
    pub expand_m: f64,
    /// Tiles whose intersection with the geometry is smaller than this
    /// are not queried.
    pub min_tile_area_m2: f64,
    /// Tiles queried at once. `1` keeps the tiled rung sequential.
    pub tile_concurrency: usize,
}

impl AggregationOptions {
    /// Defaults for the given resolution and measure: 2 km tiles, 100 m
    /// expansion, 1 m² minimum tile, sequential tiles.
    #[must_use]
    pub const fn new(resolution_m: f64, measure: HistogramMeasure) -> Self {
        Self {
            resolution_m,
            measure,
            tile_size_km: 2.0,
            expand_m: 100.0,
            min_tile_area_m2: 1.0,
            tile_concurrency: 1,
        }
    }

    /// Same options with `tile_concurrency` tiles in flight.
    #[must_use]
    pub const fn with_tile_concurrency(mut self, tile_concurrency: usize) -> Self {
        self.tile_concurrency = tile_concurrency;
        self
    }
}

/// Which rung of the ladder produced the histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Rung {
    Direct,
    Expanded,
    Tiled,
}

/// Counters for the tiled rung.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileStats {
    /// Cells in the grid.
    pub cells: usize,
    /// Cells skipped for a negligible intersection.
    pub skipped: usize,
    /// Tiles queried.
    pub attempted: usize,
    /// Tiles that returned usable pixels.
    pub succeeded: usize,
    /// Tiles that returned nothing usable.
    pub empty: usize,
    /// Tiles whose query errored.
    pub failed: usize,
}

/// A successful aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// Merged histogram with the masked label removed.
    pub histogram: PixelHistogram,
    pub rung: Rung,
    /// Zeroed unless the tiled rung ran.
    pub tiles: TileStats,
    /// Area the histogram covers: the expanded geometry on the expanded
    /// rung, the answering tiles on the tiled rung.
    pub area_m2: f64,
}

/// Errors from [`aggregate`].
#[derive(Debug, Error)]
pub enum AggregateError {
    /// Every rung and every tile came back empty.
    #[error(
        "No raster data over {area_km2:.3} km² at {resolution_m} m/pixel: \
         {} cells, {} skipped, {} tiles attempted, {} succeeded, {} empty, {} failed",
        .tiles.cells,
        .tiles.skipped,
        .tiles.attempted,
        .tiles.succeeded,
        .tiles.empty,
        .tiles.failed
    )]
    DataUnavailable {
        /// Area of the geometry.
        area_km2: f64,
        /// Resolution that was requested.
        resolution_m: f64,
        /// What the tiled rung did.
        tiles: TileStats,
    },
}

async fn query(
    service: &dyn RasterService,
    image: &RasterImage,
    geometry: &MultiPolygon<f64>,
    options: &AggregationOptions,
    rung: Rung,
) -> Option<PixelHistogram> {
    match service
        .histogram_over(image, geometry, options.resolution_m, options.measure)
        .await
    {
        Ok(histogram) if !histogram.is_empty() => Some(histogram.without_masked()),
        Ok(_) => {
            log::info!("{rung} histogram query returned no usable pixels");
            None
        }
        Err(e) => {
            log::warn!("{rung} histogram query failed: {e}");
            None
        }
    }
}

/// Runs the ladder for `image` over `geometry`.
///
/// # Errors
///
/// Returns [`AggregateError::DataUnavailable`] with the tile counters
/// when no rung produced usable pixels.
pub async fn aggregate(
    service: &dyn RasterService,
    image: &RasterImage,
    geometry: &MultiPolygon<f64>,
    options: &AggregationOptions,
) -> Result<Aggregation, AggregateError> {
    if let Some(histogram) = query(service, image, geometry, options, Rung::Direct).await {
        return Ok(Aggregation {
            histogram,
            rung: Rung::Direct,
            tiles: TileStats::default(),
            area_m2: area_m2(geometry),
        });
    }

    log::info!("Retrying over geometry expanded by {} m", options.expand_m);
    let expanded = expand(geometry, options.expand_m);
    if let Some(histogram) = query(service, image, &expanded, options, Rung::Expanded).await {
        return Ok(Aggregation {
            histogram,
            rung: Rung::Expanded,
            tiles: TileStats::default(),
            area_m2: area_m2(&expanded),
        });
    }

    log::info!("Falling back to {} km tiles", options.tile_size_km);
    let (histogram, tiles, covered_m2) = aggregate_tiles(service, image, geometry, options).await;
    log::debug!("Tile statistics: {tiles:?}");

    if histogram.is_empty() {
        return Err(AggregateError::DataUnavailable {
            area_km2: area_m2(geometry) / 1_000_000.0,
            resolution_m: options.resolution_m,
            tiles,
        });
    }

    Ok(Aggregation {
        histogram,
        rung: Rung::Tiled,
        tiles,
        area_m2: covered_m2,
    })
}

async fn aggregate_tiles(
    service: &dyn RasterService,
    image: &RasterImage,
    geometry: &MultiPolygon<f64>,
    options: &AggregationOptions,
) -> (PixelHistogram, TileStats, f64) {
    let grid = tile_grid(geometry, options.tile_size_km, options.min_tile_area_m2);
    let mut stats = TileStats {
        cells: grid.cells,
        skipped: grid.skipped,
        attempted: grid.tiles.len(),
        ..TileStats::default()
    };

    let results: Vec<_> = stream::iter(grid.tiles.iter().map(|tile| async move {
        let result = service
            .histogram_over(image, &tile.geometry, options.resolution_m, options.measure)
            .await;
        (tile.row, tile.col, tile.area_m2, result)
    }))
    .buffer_unordered(options.tile_concurrency.max(1))
    .collect()
    .await;

    let mut merged = PixelHistogram::new(options.measure);
    let mut covered_m2 = 0.0;
    for (row, col, tile_area_m2, result) in results {
        match result {
            Ok(histogram) if !histogram.is_empty() => {
                merged.merge(&histogram.without_masked());
                covered_m2 += tile_area_m2;
                stats.succeeded += 1;
            }
            Ok(_) => {
                log::debug!("Tile ({row}, {col}) returned no usable pixels");
                stats.empty += 1;
            }
            Err(e) => {
                log::warn!("Tile ({row}, {col}) failed: {e}");
                stats.failed += 1;
            }
        }
    }

    (merged, stats, covered_m2)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use landcover_aoi::geometry::square;
    use landcover_models::imagery::ImageSource;
    use landcover_models::{Coordinates, MASKED_LABEL};

    use super::*;
    use crate::{ImageRequest, RasterError};

    type Script = Box<dyn Fn(f64) -> Result<PixelHistogram, RasterError> + Send + Sync>;

    /// Answers each query from the geometry's area in km².
    struct Scripted {
        script: Script,
        calls: Mutex<Vec<f64>>,
    }

    impl Scripted {
        fn new(
            script: impl Fn(f64) -> Result<PixelHistogram, RasterError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                script: Box::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<f64> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RasterService for Scripted {
        async fn fetch_image(&self, request: &ImageRequest) -> Result<RasterImage, RasterError> {
            Ok(RasterImage {
                id: "test".to_string(),
                source: request.source,
                acquired: None,
            })
        }

        async fn histogram_over(
            &self,
            _image: &RasterImage,
            geometry: &MultiPolygon<f64>,
            _resolution_m: f64,
            _measure: HistogramMeasure,
        ) -> Result<PixelHistogram, RasterError> {
            let km2 = area_m2(geometry) / 1_000_000.0;
            self.calls.lock().unwrap().push(km2);
            (self.script)(km2)
        }
    }

    fn counts(bins: &[(i32, f64)]) -> PixelHistogram {
        PixelHistogram::from_bins(HistogramMeasure::Count, bins.iter().copied())
    }

    fn empty() -> PixelHistogram {
        PixelHistogram::new(HistogramMeasure::Count)
    }

    fn image() -> RasterImage {
        RasterImage {
            id: "img".to_string(),
            source: ImageSource::DynamicWorld,
            acquired: None,
        }
    }

    /// 5 km square: 4 full tiles (4 km²), 4 edge tiles (2 km²), 1 corner (1 km²).
    fn five_km() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![square(Coordinates::new(12.9716, 77.5946), 5.0)])
    }

    fn options() -> AggregationOptions {
        AggregationOptions::new(30.0, HistogramMeasure::Count)
    }

    #[tokio::test]
    async fn direct_query_wins_and_strips_masked_pixels() {
        let service = Scripted::new(|_| Ok(counts(&[(MASKED_LABEL, 99.0), (6, 10.0)])));
        let result = aggregate(&service, &image(), &five_km(), &options())
            .await
            .unwrap();
        assert_eq!(result.rung, Rung::Direct);
        assert!(result.histogram.masked().abs() < 1e-9);
        assert!((result.histogram.total() - 10.0).abs() < 1e-9);
        assert_eq!(service.calls().len(), 1);
    }

    #[tokio::test]
    async fn empty_direct_escalates_to_expanded() {
        let service = Scripted::new(|km2| {
            if km2 > 25.01 {
                Ok(counts(&[(0, 5.0)]))
            } else {
                Ok(empty())
            }
        });
        let result = aggregate(&service, &image(), &five_km(), &options())
            .await
            .unwrap();
        assert_eq!(result.rung, Rung::Expanded);
        assert_eq!(service.calls().len(), 2);
        let grown_km2 = service.calls()[1];
        assert!((result.area_m2 / 1_000_000.0 - grown_km2).abs() < 1e-6);
        assert!(result.area_m2 > area_m2(&five_km()));
    }

    #[tokio::test]
    async fn direct_area_is_the_geometry_area() {
        let service = Scripted::new(|_| Ok(counts(&[(6, 1.0)])));
        let result = aggregate(&service, &image(), &five_km(), &options())
            .await
            .unwrap();
        assert!((result.area_m2 - area_m2(&five_km())).abs() < 1e-6);
    }

    #[tokio::test]
    async fn only_masked_pixels_counts_as_empty() {
        let service = Scripted::new(|km2| {
            if km2 > 24.9 {
                Ok(counts(&[(MASKED_LABEL, 1_000.0)]))
            } else {
                Ok(counts(&[(1, 1.0)]))
            }
        });
        let result = aggregate(&service, &image(), &five_km(), &options())
            .await
            .unwrap();
        assert_eq!(result.rung, Rung::Tiled);
        assert!((result.histogram.total() - 9.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn tiled_rung_tolerates_failed_and_empty_tiles() {
        let service = Scripted::new(|km2| {
            if km2 > 5.0 {
                Err(RasterError::Service {
                    message: "geometry too large".to_string(),
                })
            } else if km2 > 3.0 {
                Ok(counts(&[(6, 10.0), (MASKED_LABEL, 3.0)]))
            } else if km2 > 1.5 {
                Ok(empty())
            } else {
                Err(RasterError::Service {
                    message: "boom".to_string(),
                })
            }
        });
        let result = aggregate(&service, &image(), &five_km(), &options())
            .await
            .unwrap();

        assert_eq!(result.rung, Rung::Tiled);
        assert_eq!(
            result.tiles,
            TileStats {
                cells: 9,
                skipped: 0,
                attempted: 9,
                succeeded: 4,
                empty: 4,
                failed: 1,
            }
        );
        assert!((result.histogram.get(6) - 40.0).abs() < 1e-9);
        assert!(result.histogram.masked().abs() < 1e-9);
        // Only the four full tiles answered.
        assert!((result.area_m2 / 1_000_000.0 - 16.0).abs() < 0.05);
    }

    #[tokio::test]
    async fn concurrent_tiles_merge_to_the_same_histogram() {
        let script = |km2: f64| -> Result<PixelHistogram, RasterError> {
            if km2 > 5.0 {
                Ok(empty())
            } else if km2 > 3.0 {
                Ok(counts(&[(1, 4.0), (6, 1.0)]))
            } else {
                Ok(counts(&[(0, 2.0)]))
            }
        };
        let sequential = aggregate(&Scripted::new(script), &image(), &five_km(), &options())
            .await
            .unwrap();
        let parallel = aggregate(
            &Scripted::new(script),
            &image(),
            &five_km(),
            &options().with_tile_concurrency(4),
        )
        .await
        .unwrap();
        assert_eq!(sequential.histogram, parallel.histogram);
        assert_eq!(sequential.tiles, parallel.tiles);
    }

    #[tokio::test]
    async fn nothing_anywhere_is_data_unavailable() {
        let service = Scripted::new(|_| Ok(empty()));
        let err = aggregate(&service, &image(), &five_km(), &options())
            .await
            .unwrap_err();
        let AggregateError::DataUnavailable {
            area_km2,
            resolution_m,
            tiles,
        } = err;
        assert!((area_km2 - 25.0).abs() < 1e-3);
        assert!((resolution_m - 30.0).abs() < 1e-9);
        assert_eq!(tiles.attempted, 9);
        assert_eq!(tiles.empty, 9);
        assert_eq!(service.calls().len(), 11);
    }

    #[tokio::test]
    async fn error_message_carries_counts() {
        let service = Scripted::new(|_| Ok(empty()));
        let err = aggregate(&service, &image(), &five_km(), &options())
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("25.000 km²"));
        assert!(message.contains("9 tiles attempted"));
    }
}
