#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Land-cover analysis operations.
//!
//! Every mode runs the same pipeline: build an area of interest, ask the
//! raster service for an image, aggregate its histogram over the AOI,
//! reconcile the histogram into four percentages, apply the display
//! floor and score the presented result. Context feeds are gathered
//! alongside the raster work and never fail an analysis.
//!
//! | Operation | AOI | Scheme |
//! |---|---|---|
//! | [`Analyzer::analyze_boundary`] | administrative boundary | Dynamic World |
//! | [`Analyzer::analyze_buffered`] | circle around a point | spectral |
//! | [`Analyzer::analyze_locality`] | fixed 1 km square | Dynamic World |
//! | [`Analyzer::analyze_polygon`] | caller `GeoJSON` | spectral |
//! | [`Analyzer::analyze_time_series`] | circle around a point | spectral, per window |

mod report;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use landcover_analysis_models::{
    AggregationSummary, AnalysisOptions, AnalysisReport, CoverChange, SkippedWindow,
    TimeSeriesPoint, TimeSeriesReport,
};
use landcover_aoi::resolve::{boundary_aoi, buffered_aoi, locality_aoi, resolve_center};
use landcover_aoi::{
    AoiError, AreaOfInterest, BoundarySource, Geocoder, LocalitySource, LocationQuery, builder,
};
use landcover_cache::{
    CacheKey, CachedHistogram, CachedLocalities, Freshness, LandCoverCache, MemoryCache,
    fresh_histogram, fresh_localities, store_histogram, store_localities,
};
use landcover_classify::{ClassifiedCover, Classifier, ClassifyError};
use landcover_feeds::nominatim::NominatimClient;
use landcover_feeds::overpass::OverpassClient;
use landcover_feeds::raster::HttpRasterService;
use landcover_feeds::{FeedBundle, FeedError, FeedSet};
use landcover_models::imagery::DateRange;
use landcover_models::readings::Locality;
use landcover_models::{Coordinates, PixelHistogram};
use landcover_raster::{
    AggregateError, AggregationOptions, ImageRequest, RasterError, RasterService, TileStats,
    aggregate,
};
use thiserror::Error;

/// Name given to caller-supplied polygons.
pub const CUSTOM_AOI_NAME: &str = "Custom area";

/// Errors from an analysis operation.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The area of interest could not be built.
    #[error(transparent)]
    Aoi(#[from] AoiError),

    /// The raster service failed or had no scene for the request.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Every aggregation rung came back empty.
    #[error(transparent)]
    DataUnavailable(#[from] AggregateError),

    /// The histogram could not be reconciled.
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    /// A service client could not be configured.
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// Operation arguments are unusable.
    #[error("Invalid analysis request: {message}")]
    InvalidInput {
        /// What was wrong.
        message: String,
    },
}

impl AnalysisError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Whether the caller can fix this by changing the request.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        match self {
            Self::Aoi(e) => e.is_validation(),
            Self::InvalidInput { .. } => true,
            _ => false,
        }
    }

    /// Whether a location name could not be resolved.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Aoi(AoiError::NotFound { .. }))
    }

    /// Whether the raster service simply had nothing for this area.
    #[must_use]
    pub const fn is_data_unavailable(&self) -> bool {
        matches!(
            self,
            Self::DataUnavailable(_) | Self::Raster(RasterError::NoImagery { .. })
        )
    }
}

/// A histogram plus where it came from.
struct Measured {
    histogram: PixelHistogram,
    image_date: Option<NaiveDate>,
    summary: AggregationSummary,
}

impl Measured {
    /// Reconciles against the area the histogram actually covers, which
    /// differs from the AOI when the ladder expanded or tiled.
    fn classify(&self, classifier: Classifier) -> Result<ClassifiedCover, ClassifyError> {
        classifier.classify(&self.histogram, self.summary.area_km2 * 1_000_000.0)
    }
}

/// Runs analyses against a set of collaborators.
#[derive(Clone)]
pub struct Analyzer {
    geocoder: Arc<dyn Geocoder>,
    boundaries: Arc<dyn BoundarySource>,
    localities: Arc<dyn LocalitySource>,
    raster: Arc<dyn RasterService>,
    feeds: FeedSet,
    cache: Option<Arc<dyn LandCoverCache>>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("feeds", &self.feeds)
            .field("cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl Analyzer {
    /// An analyzer without context feeds or cache.
    #[must_use]
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        boundaries: Arc<dyn BoundarySource>,
        localities: Arc<dyn LocalitySource>,
        raster: Arc<dyn RasterService>,
    ) -> Self {
        Self {
            geocoder,
            boundaries,
            localities,
            raster,
            feeds: FeedSet::default(),
            cache: None,
        }
    }

    /// Wires the HTTP clients from the service registry and the
    /// environment.
    ///
    /// Uses the `DuckDB` cache when the `duckdb` feature is enabled and
    /// the store opens, else an in-memory cache.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Feed`] if the geocoder, locality or
    /// raster client cannot be configured. Context feeds with missing
    /// keys are skipped instead.
    pub fn from_env() -> Result<Self, AnalysisError> {
        let nominatim = Arc::new(NominatimClient::from_env()?);
        let analyzer = Self::new(
            nominatim.clone(),
            nominatim,
            Arc::new(OverpassClient::from_env()?),
            Arc::new(HttpRasterService::from_env()?),
        );
        Ok(analyzer
            .with_feeds(FeedSet::from_env())
            .with_cache(default_cache()))
    }

    #[must_use]
    pub fn with_feeds(mut self, feeds: FeedSet) -> Self {
        self.feeds = feeds;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn LandCoverCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Whole-city analysis on the Dynamic World scheme.
    ///
    /// # Errors
    ///
    /// * [`AnalysisError::Aoi`] if the city cannot be resolved
    /// * [`AnalysisError::DataUnavailable`] if no rung returned pixels
    /// * [`AnalysisError::Classify`] if the histogram cannot be reconciled
    pub async fn analyze_boundary(
        &self,
        location: &str,
        options: &AnalysisOptions,
    ) -> Result<AnalysisReport, AnalysisError> {
        log::info!("Boundary analysis for {location}");
        let aoi = boundary_aoi(location, self.geocoder.as_ref(), self.boundaries.as_ref()).await?;
        let classifier = dynamic_world_classifier(options);
        let (measured, context) = tokio::join!(
            self.measure(
                &aoi,
                classifier,
                ImageRequest::dynamic_world(aoi.geometry.clone()),
                options,
            ),
            self.context(aoi.center, options),
        );
        finish(&aoi, classifier, measured?, context, options)
    }

    /// Spectral analysis of a circle of `radius_km` around a location.
    ///
    /// # Errors
    ///
    /// * [`AnalysisError::Aoi`] for an unknown location or an oversized
    ///   radius
    /// * [`AnalysisError::Raster`] if no Sentinel-2 scene matches
    /// * [`AnalysisError::DataUnavailable`] if no rung returned pixels
    /// * [`AnalysisError::Classify`] if the areas do not add up
    pub async fn analyze_buffered(
        &self,
        location: &str,
        radius_km: f64,
        options: &AnalysisOptions,
    ) -> Result<AnalysisReport, AnalysisError> {
        log::info!("Buffered analysis for {location} ({radius_km} km)");
        let aoi = buffered_aoi(location, radius_km, self.geocoder.as_ref()).await?;
        self.spectral(&aoi, options).await
    }

    /// Dynamic World analysis of a fixed 1 km locality square.
    ///
    /// Histograms are served from the cache for 30 days, unless a
    /// non-default resolution was requested.
    ///
    /// # Errors
    ///
    /// * [`AnalysisError::Aoi`] if the locality cannot be found or its
    ///   boundary is too wide
    /// * [`AnalysisError::DataUnavailable`] if no rung returned pixels
    /// * [`AnalysisError::Classify`] if the histogram cannot be reconciled
    pub async fn analyze_locality(
        &self,
        city: &str,
        locality: &str,
        options: &AnalysisOptions,
    ) -> Result<AnalysisReport, AnalysisError> {
        log::info!("Locality analysis for {locality}, {city}");
        let aoi = locality_aoi(
            city,
            locality,
            None,
            self.geocoder.as_ref(),
            self.boundaries.as_ref(),
        )
        .await?;
        let classifier = dynamic_world_classifier(options);

        let cache = self
            .cache
            .as_deref()
            .filter(|_| options.use_cache && options.resolution_m.is_none());
        let key = CacheKey::new(city, locality);

        let (measured, context) = tokio::join!(
            self.locality_histogram(&aoi, classifier, cache, &key, options),
            self.context(aoi.center, options),
        );
        finish(&aoi, classifier, measured?, context, options)
    }

    /// Spectral analysis of a caller-supplied polygon.
    ///
    /// # Errors
    ///
    /// * [`AnalysisError::Aoi`] for unparseable, unrepairable or
    ///   oversized `GeoJSON`
    /// * plus everything [`Self::analyze_buffered`] can return after the
    ///   AOI is built
    pub async fn analyze_polygon(
        &self,
        geojson: &str,
        options: &AnalysisOptions,
    ) -> Result<AnalysisReport, AnalysisError> {
        let aoi = builder::custom(CUSTOM_AOI_NAME, geojson)?;
        log::info!("Polygon analysis over {:.3} km²", aoi.area_km2);
        self.spectral(&aoi, options).await
    }

    /// Spectral land cover of one buffered area over yearly windows.
    ///
    /// Windows whose image or histogram cannot be obtained are recorded
    /// as skipped; the series only fails when the AOI cannot be built.
    /// Points carry the raw reconciled percentages.
    ///
    /// # Errors
    ///
    /// * [`AnalysisError::InvalidInput`] for a zero interval or an
    ///   inverted range
    /// * [`AnalysisError::Aoi`] if the AOI cannot be built
    pub async fn analyze_time_series(
        &self,
        location: &str,
        radius_km: f64,
        range: DateRange,
        interval_years: u32,
        options: &AnalysisOptions,
    ) -> Result<TimeSeriesReport, AnalysisError> {
        if interval_years == 0 {
            return Err(AnalysisError::invalid("interval must be at least one year"));
        }
        if range.start > range.end {
            return Err(AnalysisError::invalid(format!(
                "start {} is after end {}",
                range.start, range.end
            )));
        }

        let aoi = buffered_aoi(location, radius_km, self.geocoder.as_ref()).await?;
        let classifier = Classifier::spectral();

        let mut points = Vec::new();
        let mut skipped = Vec::new();
        for window in DateRange::yearly_windows(range.start, range.end, interval_years) {
            log::debug!("Time series window {} to {}", window.start, window.end);
            let result = async {
                let measured = self
                    .measure(&aoi, classifier, spectral_request(&aoi, classifier, window), options)
                    .await?;
                let classified = measured.classify(classifier)?;
                Ok::<_, AnalysisError>(TimeSeriesPoint {
                    window,
                    image_date: measured.image_date,
                    land_cover: classified.cover,
                })
            }
            .await;

            match result {
                Ok(point) => points.push(point),
                Err(e) => {
                    log::warn!(
                        "Skipping window {} to {}: {e}",
                        window.start,
                        window.end
                    );
                    skipped.push(SkippedWindow {
                        window,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let change = match (points.first(), points.last()) {
            (Some(first), Some(last)) if points.len() > 1 => {
                Some(CoverChange::between(first, last))
            }
            _ => None,
        };

        Ok(TimeSeriesReport {
            location: location.to_string(),
            aoi: report::summarize(&aoi),
            range,
            interval_years,
            points,
            skipped,
            change,
        })
    }

    /// Named localities within `radius_km` of a city, cached for 7 days.
    ///
    /// # Errors
    ///
    /// * [`AnalysisError::InvalidInput`] for a non-positive radius
    /// * [`AnalysisError::Aoi`] if the city is unknown or every locality
    ///   mirror fails
    pub async fn list_localities(
        &self,
        city: &str,
        radius_km: f64,
    ) -> Result<Vec<Locality>, AnalysisError> {
        if !(radius_km.is_finite() && radius_km > 0.0) {
            return Err(AnalysisError::invalid(format!(
                "radius must be positive, got {radius_km}"
            )));
        }

        let key = CacheKey::locality_list(city, radius_km);
        if let Some(cache) = self.cache.as_deref()
            && let Some(hit) = fresh_localities(cache, &key, Freshness::NAMES).await
        {
            log::debug!("Locality list cache hit for {key}");
            return Ok(hit.localities);
        }

        let center = resolve_center(&LocationQuery::parse(city), self.geocoder.as_ref()).await?;
        let localities = self.localities.localities(center, radius_km).await?;
        log::info!("Found {} localities around {city}", localities.len());

        if let Some(cache) = self.cache.as_deref() {
            let entry = CachedLocalities {
                localities: localities.clone(),
                stored_at: Utc::now(),
            };
            store_localities(cache, &key, &entry).await;
        }
        Ok(localities)
    }

    async fn locality_histogram(
        &self,
        aoi: &AreaOfInterest,
        classifier: Classifier,
        cache: Option<&dyn LandCoverCache>,
        key: &CacheKey,
        options: &AnalysisOptions,
    ) -> Result<Measured, AnalysisError> {
        if let Some(cache) = cache
            && let Some(hit) = fresh_histogram(cache, key, Freshness::RASTER).await
        {
            return Ok(Measured {
                histogram: hit.histogram,
                image_date: hit.image_date,
                summary: AggregationSummary {
                    source: classifier.source(),
                    resolution_m: resolution(classifier, options),
                    rung: None,
                    tiles: TileStats::default(),
                    area_km2: aoi.area_km2,
                    from_cache: true,
                },
            });
        }

        let measured = self
            .measure(
                aoi,
                classifier,
                ImageRequest::dynamic_world(aoi.geometry.clone()),
                options,
            )
            .await?;
        if let Some(cache) = cache {
            let entry = CachedHistogram {
                histogram: measured.histogram.clone(),
                image_date: measured.image_date,
                stored_at: Utc::now(),
            };
            store_histogram(cache, key, &entry).await;
        }
        Ok(measured)
    }

    async fn spectral(
        &self,
        aoi: &AreaOfInterest,
        options: &AnalysisOptions,
    ) -> Result<AnalysisReport, AnalysisError> {
        let classifier = Classifier::spectral();
        let dates = options
            .dates
            .unwrap_or_else(|| DateRange::trailing_year(Utc::now().date_naive()));
        let (measured, context) = tokio::join!(
            self.measure(aoi, classifier, spectral_request(aoi, classifier, dates), options),
            self.context(aoi.center, options),
        );
        finish(aoi, classifier, measured?, context, options)
    }

    async fn measure(
        &self,
        aoi: &AreaOfInterest,
        classifier: Classifier,
        request: ImageRequest,
        options: &AnalysisOptions,
    ) -> Result<Measured, AnalysisError> {
        let image = self.raster.fetch_image(&request).await?;
        let resolution_m = resolution(classifier, options);
        let aggregation_options = AggregationOptions::new(resolution_m, classifier.measure())
            .with_tile_concurrency(options.tile_concurrency.max(1));
        let aggregation = aggregate(
            self.raster.as_ref(),
            &image,
            &aoi.geometry,
            &aggregation_options,
        )
        .await?;
        log::debug!(
            "{} histogram for {} from the {} rung",
            image.source,
            aoi.name,
            aggregation.rung
        );

        Ok(Measured {
            histogram: aggregation.histogram,
            image_date: image.acquired,
            summary: AggregationSummary {
                source: image.source,
                resolution_m,
                rung: Some(aggregation.rung),
                tiles: aggregation.tiles,
                area_km2: aggregation.area_m2 / 1_000_000.0,
                from_cache: false,
            },
        })
    }

    async fn context(&self, at: Coordinates, options: &AnalysisOptions) -> FeedBundle {
        if options.include_context {
            self.feeds.gather(at).await
        } else {
            FeedBundle::default()
        }
    }
}

fn finish(
    aoi: &AreaOfInterest,
    classifier: Classifier,
    measured: Measured,
    context: FeedBundle,
    options: &AnalysisOptions,
) -> Result<AnalysisReport, AnalysisError> {
    let classified = measured.classify(classifier)?;
    Ok(report::build(
        aoi,
        classified,
        measured.summary,
        measured.image_date,
        context,
        options,
    ))
}

fn resolution(classifier: Classifier, options: &AnalysisOptions) -> f64 {
    options
        .resolution_m
        .unwrap_or_else(|| classifier.source().default_resolution_m())
}

fn dynamic_world_classifier(options: &AnalysisOptions) -> Classifier {
    Classifier::DynamicWorld {
        resolution_m: resolution(Classifier::dynamic_world(), options),
    }
}

fn spectral_request(
    aoi: &AreaOfInterest,
    classifier: Classifier,
    dates: DateRange,
) -> ImageRequest {
    let expression = match classifier {
        Classifier::Spectral { thresholds } => thresholds.band_math(),
        Classifier::DynamicWorld { .. } => String::new(),
    };
    ImageRequest::sentinel2(aoi.geometry.clone(), dates, expression)
}

#[cfg(feature = "duckdb")]
fn default_cache() -> Arc<dyn LandCoverCache> {
    match landcover_cache::DuckDbCache::open_default() {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            log::warn!("DuckDB cache unavailable, using memory: {e}");
            Arc::new(MemoryCache::new())
        }
    }
}

#[cfg(not(feature = "duckdb"))]
fn default_cache() -> Arc<dyn LandCoverCache> {
    Arc::new(MemoryCache::new())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Datelike as _;
    use geo::MultiPolygon;
    use landcover_aoi::geometry::{area_m2, square};
    use landcover_aoi::{AdminTier, Boundary};
    use landcover_models::classes::{DynamicWorldClass, SpectralClass};
    use landcover_models::imagery::ImageSource;
    use landcover_models::{AoiMode, HistogramMeasure};
    use landcover_raster::RasterImage;

    use super::*;

    const CITY: Coordinates = Coordinates {
        lat: 12.9716,
        lon: 77.5946,
    };

    struct FakeGeocoder;

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, AoiError> {
            let known = query.starts_with("Bengaluru") || query.starts_with("Koramangala");
            Ok(known.then_some(CITY))
        }
    }

    struct FakeBoundaries;

    #[async_trait]
    impl BoundarySource for FakeBoundaries {
        async fn boundary(
            &self,
            query: &str,
            tier: AdminTier,
        ) -> Result<Option<Boundary>, AoiError> {
            let side_km = match (query, tier) {
                ("Bengaluru", AdminTier::City) => 6.0,
                ("Koramangala, Bengaluru", AdminTier::Locality) => 0.8,
                _ => return Ok(None),
            };
            Ok(Some(Boundary {
                name: query.to_string(),
                geometry: MultiPolygon::new(vec![square(CITY, side_km)]),
                center: Some(CITY),
                admin_level: None,
            }))
        }
    }

    struct FakeLocalities {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LocalitySource for FakeLocalities {
        async fn localities(
            &self,
            center: Coordinates,
            _radius_km: f64,
        ) -> Result<Vec<Locality>, AoiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Locality {
                name: "Koramangala".to_string(),
                center,
                place_type: "suburb".to_string(),
            }])
        }
    }

    /// Serves fixed Dynamic World counts and spectral areas proportional
    /// to the queried geometry.
    struct FakeRaster {
        dynamic_world: Vec<(i32, f64)>,
        spectral_fractions: Vec<(SpectralClass, f64)>,
        missing_years: Vec<i32>,
        /// Spectral queries over smaller geometries come back empty.
        spectral_min_area_m2: f64,
        histogram_calls: AtomicUsize,
    }

    impl FakeRaster {
        fn new() -> Self {
            Self {
                dynamic_world: vec![
                    (DynamicWorldClass::BuiltArea.label(), 800.0),
                    (DynamicWorldClass::Grass.label(), 150.0),
                    (DynamicWorldClass::Water.label(), 50.0),
                ],
                spectral_fractions: vec![
                    (SpectralClass::Urban, 0.7),
                    (SpectralClass::Vegetation, 0.2),
                    (SpectralClass::Forest, 0.05),
                    (SpectralClass::Water, 0.05),
                ],
                missing_years: Vec::new(),
                spectral_min_area_m2: 0.0,
                histogram_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RasterService for FakeRaster {
        async fn fetch_image(&self, request: &ImageRequest) -> Result<RasterImage, RasterError> {
            if self.missing_years.contains(&request.dates.start.year()) {
                return Err(RasterError::NoImagery {
                    image_source: request.source,
                    start: request.dates.start,
                    end: request.dates.end,
                });
            }
            Ok(RasterImage {
                id: format!("{}-{}", request.source, request.dates.start),
                source: request.source,
                acquired: Some(request.dates.end),
            })
        }

        async fn histogram_over(
            &self,
            image: &RasterImage,
            geometry: &MultiPolygon<f64>,
            _resolution_m: f64,
            measure: HistogramMeasure,
        ) -> Result<PixelHistogram, RasterError> {
            self.histogram_calls.fetch_add(1, Ordering::SeqCst);
            Ok(match image.source {
                ImageSource::DynamicWorld => {
                    PixelHistogram::from_bins(measure, self.dynamic_world.iter().copied())
                }
                ImageSource::Sentinel2 => {
                    let area = area_m2(geometry);
                    if area < self.spectral_min_area_m2 {
                        return Ok(PixelHistogram::new(measure));
                    }
                    PixelHistogram::from_bins(
                        measure,
                        self.spectral_fractions
                            .iter()
                            .map(|(class, fraction)| (class.label(), area * fraction)),
                    )
                }
            })
        }
    }

    struct Harness {
        analyzer: Analyzer,
        raster: Arc<FakeRaster>,
        localities: Arc<FakeLocalities>,
    }

    fn harness(raster: FakeRaster) -> Harness {
        let raster = Arc::new(raster);
        let localities = Arc::new(FakeLocalities {
            calls: AtomicUsize::new(0),
        });
        let analyzer = Analyzer::new(
            Arc::new(FakeGeocoder),
            Arc::new(FakeBoundaries),
            localities.clone(),
            raster.clone(),
        )
        .with_cache(Arc::new(MemoryCache::new()));
        Harness {
            analyzer,
            raster,
            localities,
        }
    }

    fn no_context() -> AnalysisOptions {
        AnalysisOptions {
            include_context: false,
            ..AnalysisOptions::default()
        }
    }

    #[tokio::test]
    async fn boundary_uses_dynamic_world_on_the_city_polygon() {
        let h = harness(FakeRaster::new());
        let report = h
            .analyzer
            .analyze_boundary("Bengaluru", &no_context())
            .await
            .unwrap();

        assert_eq!(report.aoi.mode, AoiMode::Boundary);
        assert_eq!(report.aggregation.source, ImageSource::DynamicWorld);
        assert_eq!(report.aggregation.rung, Some(landcover_raster::Rung::Direct));
        assert!((report.land_cover.urban - 80.0).abs() < 1e-6);
        assert!((report.land_cover.vegetation - 15.0).abs() < 1e-6);
        assert!((report.land_cover.water - 5.0).abs() < 1e-6);
        assert!(!report.normalization.applied);
        assert!(report.weather.is_none());
        assert!(report.disasters.is_empty());
    }

    #[tokio::test]
    async fn all_urban_result_gets_display_floor_and_scores_use_it() {
        let mut raster = FakeRaster::new();
        raster.dynamic_world = vec![(DynamicWorldClass::BuiltArea.label(), 1000.0)];
        let h = harness(raster);

        let report = h
            .analyzer
            .analyze_boundary("Bengaluru", &no_context())
            .await
            .unwrap();

        assert!((report.raw_land_cover.urban - 100.0).abs() < 1e-6);
        assert!(report.normalization.applied);
        assert!(report.normalization.display_only);
        assert!(report.land_cover.vegetation > 0.0);
        assert!(report.land_cover.urban >= 80.0);
        assert!(report.warnings.iter().any(|w| w.contains("display only")));
        let expected = report::scores(
            &report.land_cover,
            report.aoi.area_km2,
            None,
            None,
            &no_context(),
        );
        assert_eq!(report.scores, expected);
    }

    #[tokio::test]
    async fn buffered_runs_the_spectral_scheme() {
        let h = harness(FakeRaster::new());
        let report = h
            .analyzer
            .analyze_buffered("12.9716, 77.5946", 2.0, &no_context())
            .await
            .unwrap();

        assert_eq!(report.aoi.mode, AoiMode::Buffered);
        assert_eq!(report.aggregation.source, ImageSource::Sentinel2);
        assert!((report.raw_land_cover.urban - 70.0).abs() < 0.5);
        assert!((report.raw_land_cover.vegetation - 20.0).abs() < 0.5);
        assert!(matches!(
            report.classification,
            landcover_classify::ClassificationDetails::Spectral(_)
        ));
    }

    #[tokio::test]
    async fn expanded_rung_divides_by_the_grown_area() {
        let mut raster = FakeRaster::new();
        raster.spectral_min_area_m2 = 12_000_000.0;
        let h = harness(raster);

        let report = h
            .analyzer
            .analyze_buffered("12.9716, 77.5946", 2.0, &no_context())
            .await
            .unwrap();

        assert_eq!(report.aggregation.rung, Some(landcover_raster::Rung::Expanded));
        assert!(report.aggregation.area_km2 > report.aoi.area_km2);
        assert!((report.raw_land_cover.urban - 70.0).abs() < 0.5);
        let total = report.raw_land_cover.urban
            + report.raw_land_cover.forest
            + report.raw_land_cover.vegetation
            + report.raw_land_cover.water;
        assert!((total - 100.0).abs() < 0.5);
    }

    #[tokio::test]
    async fn unknown_location_is_not_found() {
        let h = harness(FakeRaster::new());
        let err = h
            .analyzer
            .analyze_buffered("Atlantis", 2.0, &no_context())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn oversized_radius_is_a_validation_error() {
        let h = harness(FakeRaster::new());
        let err = h
            .analyzer
            .analyze_buffered("Bengaluru", 500.0, &no_context())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(h.raster.histogram_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn locality_histograms_are_cached() {
        let h = harness(FakeRaster::new());
        let first = h
            .analyzer
            .analyze_locality("Bengaluru", "Koramangala", &no_context())
            .await
            .unwrap();
        assert_eq!(first.aoi.mode, AoiMode::Fixed);
        assert!(!first.aggregation.from_cache);
        let calls = h.raster.histogram_calls.load(Ordering::SeqCst);

        let second = h
            .analyzer
            .analyze_locality("Bengaluru", "Koramangala", &no_context())
            .await
            .unwrap();
        assert!(second.aggregation.from_cache);
        assert_eq!(second.aggregation.rung, None);
        assert_eq!(h.raster.histogram_calls.load(Ordering::SeqCst), calls);
        assert_eq!(second.land_cover, first.land_cover);
    }

    #[tokio::test]
    async fn locality_cache_can_be_bypassed() {
        let h = harness(FakeRaster::new());
        let options = AnalysisOptions {
            use_cache: false,
            ..no_context()
        };
        h.analyzer
            .analyze_locality("Bengaluru", "Koramangala", &options)
            .await
            .unwrap();
        let report = h
            .analyzer
            .analyze_locality("Bengaluru", "Koramangala", &options)
            .await
            .unwrap();
        assert!(!report.aggregation.from_cache);
    }

    #[tokio::test]
    async fn polygon_analysis_uses_custom_geometry() {
        let h = harness(FakeRaster::new());
        let geojson = serde_json::json!({
            "type": "Polygon",
            "coordinates": [[
                [77.59, 12.97], [77.60, 12.97], [77.60, 12.98], [77.59, 12.98], [77.59, 12.97]
            ]]
        })
        .to_string();

        let report = h
            .analyzer
            .analyze_polygon(&geojson, &no_context())
            .await
            .unwrap();
        assert_eq!(report.aoi.mode, AoiMode::Custom);
        assert_eq!(report.aoi.name, CUSTOM_AOI_NAME);
        assert!(report.aoi.area_km2 > 1.0);
    }

    #[tokio::test]
    async fn empty_raster_is_data_unavailable() {
        let mut raster = FakeRaster::new();
        raster.dynamic_world = Vec::new();
        let h = harness(raster);
        let err = h
            .analyzer
            .analyze_boundary("Bengaluru", &no_context())
            .await
            .unwrap_err();
        assert!(err.is_data_unavailable());
    }

    #[tokio::test]
    async fn time_series_skips_windows_without_imagery() {
        let mut raster = FakeRaster::new();
        raster.missing_years = vec![2020];
        let h = harness(raster);

        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2019, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 6, 1).unwrap(),
        );
        let report = h
            .analyzer
            .analyze_time_series("Bengaluru", 2.0, range, 1, &no_context())
            .await
            .unwrap();

        assert_eq!(report.points.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].window.start.year(), 2020);
        let change = report.change.unwrap();
        assert!(change.urban.abs() < 1e-6);
        assert_eq!(change.period_years, 2);
    }

    #[tokio::test]
    async fn time_series_rejects_zero_interval() {
        let h = harness(FakeRaster::new());
        let range = DateRange::trailing_year(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let err = h
            .analyzer
            .analyze_time_series("Bengaluru", 2.0, range, 0, &no_context())
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn locality_lists_are_cached() {
        let h = harness(FakeRaster::new());
        let first = h.analyzer.list_localities("Bengaluru", 10.0).await.unwrap();
        let second = h.analyzer.list_localities("Bengaluru", 10.0).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].name, "Koramangala");
        assert_eq!(h.localities.calls.load(Ordering::SeqCst), 1);

        h.analyzer.list_localities("Bengaluru", 20.0).await.unwrap();
        assert_eq!(h.localities.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn locality_list_needs_positive_radius() {
        let h = harness(FakeRaster::new());
        let err = h.analyzer.list_localities("Bengaluru", 0.0).await.unwrap_err();
        assert!(err.is_validation());
    }

}
