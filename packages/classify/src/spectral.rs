//! Spectral-index classification.
//!
//! Each pixel gets exactly one of four labels, by strict priority:
//!
//! 1. water: MNDWI above [`SpectralThresholds::water_mndwi`]
//! 2. forest: NDVI above [`SpectralThresholds::forest_ndvi`], not water
//! 3. vegetation: NDVI within `[vegetation_ndvi_min, forest_ndvi]`, not water
//! 4. urban: everything else
//!
//! There is no bare-land class. An undefined index (zero denominator)
//! never passes a threshold, so such pixels end up urban.

use std::collections::BTreeMap;

use landcover_models::classes::SpectralClass;
use landcover_models::{HistogramMeasure, LandCoverResult, PixelHistogram};
use serde::Serialize;

use crate::ClassifyError;

/// Urban share above which a region is treated as a city core.
pub const URBAN_CONTEXT_PCT: f64 = 30.0;

/// A city core below this urban share gets a warning.
pub const LOW_URBAN_WARNING_PCT: f64 = 60.0;

/// A city core above this forest share gets a warning.
pub const HIGH_FOREST_WARNING_PCT: f64 = 10.0;

/// Index thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectralThresholds {
    pub water_mndwi: f64,
    pub forest_ndvi: f64,
    pub vegetation_ndvi_min: f64,
}

impl SpectralThresholds {
    /// MNDWI > 0.20 water, NDVI > 0.60 forest, NDVI ≥ 0.25 vegetation.
    pub const DEFAULT: Self = Self {
        water_mndwi: 0.20,
        forest_ndvi: 0.60,
        vegetation_ndvi_min: 0.25,
    };

    /// Renders the rules as a band-math expression over Sentinel-2
    /// bands `B3` (green), `B4` (red), `B8` (NIR) and `B11` (SWIR) for
    /// services that classify remotely.
    #[must_use]
    pub fn band_math(&self) -> String {
        format!(
            "ndvi = (B8 - B4) / (B8 + B4); \
             mndwi = (B3 - B11) / (B3 + B11); \
             mndwi > {water} ? {w} : \
             ndvi > {forest} ? {f} : \
             (ndvi >= {veg} && ndvi <= {forest}) ? {v} : {u}",
            water = self.water_mndwi,
            forest = self.forest_ndvi,
            veg = self.vegetation_ndvi_min,
            w = SpectralClass::Water.label(),
            f = SpectralClass::Forest.label(),
            v = SpectralClass::Vegetation.label(),
            u = SpectralClass::Urban.label(),
        )
    }
}

impl Default for SpectralThresholds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Surface reflectance of one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reflectance {
    pub green: f64,
    pub red: f64,
    pub nir: f64,
    pub swir: f64,
}

fn normalized_difference(a: f64, b: f64) -> Option<f64> {
    let sum = a + b;
    let index = (a - b) / sum;
    (sum.abs() > f64::EPSILON && index.is_finite()).then_some(index)
}

/// `(NIR − Red) / (NIR + Red)`, or `None` when undefined.
#[must_use]
pub fn ndvi(nir: f64, red: f64) -> Option<f64> {
    normalized_difference(nir, red)
}

/// `(Green − SWIR) / (Green + SWIR)`, or `None` when undefined.
#[must_use]
pub fn mndwi(green: f64, swir: f64) -> Option<f64> {
    normalized_difference(green, swir)
}

/// Class of a single pixel given its indices.
#[must_use]
pub fn classify_indices(
    ndvi: Option<f64>,
    mndwi: Option<f64>,
    thresholds: &SpectralThresholds,
) -> SpectralClass {
    let water = mndwi.is_some_and(|m| m > thresholds.water_mndwi);
    if water {
        return SpectralClass::Water;
    }
    match ndvi {
        Some(n) if n > thresholds.forest_ndvi => SpectralClass::Forest,
        Some(n) if n >= thresholds.vegetation_ndvi_min => SpectralClass::Vegetation,
        _ => SpectralClass::Urban,
    }
}

/// Class of a single pixel given its reflectance.
#[must_use]
pub fn classify_pixel(pixel: &Reflectance, thresholds: &SpectralThresholds) -> SpectralClass {
    classify_indices(
        ndvi(pixel.nir, pixel.red),
        mndwi(pixel.green, pixel.swir),
        thresholds,
    )
}

/// Classifies a block of pixels by applying each rule as a mask over
/// initially unassigned pixels, urban last.
///
/// # Errors
///
/// Returns [`ClassifyError::ClassificationInvariant`] if any pixel is
/// still unassigned after the urban fallback.
pub fn classify_pixels(
    pixels: &[Reflectance],
    thresholds: &SpectralThresholds,
) -> Result<Vec<SpectralClass>, ClassifyError> {
    let indices: Vec<(Option<f64>, Option<f64>)> = pixels
        .iter()
        .map(|p| (ndvi(p.nir, p.red), mndwi(p.green, p.swir)))
        .collect();
    let mut labels: Vec<Option<SpectralClass>> = vec![None; pixels.len()];

    let water = |m: Option<f64>| m.is_some_and(|m| m > thresholds.water_mndwi);
    let forest =
        |n: Option<f64>, m: Option<f64>| !water(m) && n.is_some_and(|n| n > thresholds.forest_ndvi);
    let vegetation = |n: Option<f64>, m: Option<f64>| {
        !water(m)
            && n.is_some_and(|n| n >= thresholds.vegetation_ndvi_min && n <= thresholds.forest_ndvi)
    };

    for (label, (_, m)) in labels.iter_mut().zip(&indices) {
        if water(*m) {
            *label = Some(SpectralClass::Water);
        }
    }
    for (label, (n, m)) in labels.iter_mut().zip(&indices) {
        if forest(*n, *m) {
            *label = Some(SpectralClass::Forest);
        }
    }
    for (label, (n, m)) in labels.iter_mut().zip(&indices) {
        if vegetation(*n, *m) {
            *label = Some(SpectralClass::Vegetation);
        }
    }
    for (label, (n, m)) in labels.iter_mut().zip(&indices) {
        if !water(*m) && !forest(*n, *m) && !vegetation(*n, *m) {
            *label = Some(SpectralClass::Urban);
        }
    }

    let unassigned = labels.iter().filter(|label| label.is_none()).count();
    if unassigned > 0 {
        return Err(ClassifyError::ClassificationInvariant {
            message: format!("{unassigned} of {} pixels left unclassified", pixels.len()),
        });
    }
    Ok(labels.into_iter().flatten().collect())
}

/// Area histogram of classified pixels, each covering `pixel_area_m2`.
#[must_use]
pub fn area_histogram(classes: &[SpectralClass], pixel_area_m2: f64) -> PixelHistogram {
    PixelHistogram::from_bins(
        HistogramMeasure::Area,
        classes.iter().map(|class| (class.label(), pixel_area_m2)),
    )
}

/// Bookkeeping behind a spectral reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectralBreakdown {
    /// Per-class area in m², keyed by class name.
    pub class_areas_m2: BTreeMap<String, f64>,
    pub aoi_area_m2: f64,
    /// The service returned pixel counts, which were scaled to the AOI.
    pub converted_from_counts: bool,
}

/// Turns a per-class area histogram into percentages of the AOI area.
///
/// Count histograms are converted to areas proportionally
/// (`count / total × aoi_area`) first.
///
/// # Errors
///
/// * [`ClassifyError::NoData`] for an empty histogram
/// * [`ClassifyError::ClassificationInvariant`] for a label outside the
///   four spectral classes
/// * [`ClassifyError::Validation`] for a non-positive AOI area or a
///   total more than 5 points away from 100%
pub fn aggregate_areas_to_percentages(
    histogram: &PixelHistogram,
    aoi_area_m2: f64,
) -> Result<(LandCoverResult, SpectralBreakdown), ClassifyError> {
    if histogram.is_empty() {
        return Err(ClassifyError::NoData {
            message: "spectral histogram is empty".to_string(),
        });
    }
    if !aoi_area_m2.is_finite() || aoi_area_m2 <= 0.0 {
        return Err(ClassifyError::Validation {
            message: format!("AOI area must be positive, got {aoi_area_m2} m²"),
        });
    }

    let stripped = histogram.without_masked();
    if let Some((label, _)) = stripped
        .iter()
        .find(|(label, _)| SpectralClass::from_label(*label).is_none())
    {
        return Err(ClassifyError::ClassificationInvariant {
            message: format!("unclassified spectral label {label} in histogram"),
        });
    }

    let converted_from_counts = histogram.measure() == HistogramMeasure::Count;
    let total = stripped.total();
    let area_of = |class: SpectralClass| {
        let value = stripped.get(class.label());
        if converted_from_counts {
            value / total * aoi_area_m2
        } else {
            value
        }
    };

    let class_areas_m2: BTreeMap<String, f64> = SpectralClass::ALL
        .iter()
        .map(|class| (class.to_string(), area_of(*class)))
        .collect();
    let pct = |class: SpectralClass| area_of(class) / aoi_area_m2 * 100.0;
    let cover = LandCoverResult::new(
        pct(SpectralClass::Urban),
        pct(SpectralClass::Forest),
        pct(SpectralClass::Vegetation),
        pct(SpectralClass::Water),
    );

    if !cover.sums_to_hundred() {
        return Err(ClassifyError::Validation {
            message: format!(
                "spectral percentages sum to {:.2}% of a {aoi_area_m2:.0} m² AOI",
                cover.total()
            ),
        });
    }

    Ok((
        cover,
        SpectralBreakdown {
            class_areas_m2,
            aoi_area_m2,
            converted_from_counts,
        },
    ))
}

/// Advisory notes for regions that look like city cores.
#[must_use]
pub fn urban_validation_warnings(cover: &LandCoverResult) -> Vec<String> {
    let mut warnings = Vec::new();
    if cover.urban <= URBAN_CONTEXT_PCT {
        return warnings;
    }
    if cover.urban < LOW_URBAN_WARNING_PCT {
        warnings.push(format!(
            "Low urban percentage ({:.1}%) for an urban area; dense cores usually exceed 70%. \
             The area may contain significant green space or be misclassified.",
            cover.urban
        ));
    }
    if cover.forest > HIGH_FOREST_WARNING_PCT {
        warnings.push(format!(
            "High forest percentage ({:.1}%) for an urban area; city cores rarely exceed 5%. \
             Parks or crop patches may be classified as forest.",
            cover.forest
        ));
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: SpectralThresholds = SpectralThresholds::DEFAULT;

    /// Reflectance with the requested indices (green+swir = nir+red = 1).
    fn pixel(ndvi: f64, mndwi: f64) -> Reflectance {
        Reflectance {
            green: (1.0 + mndwi) / 2.0,
            swir: (1.0 - mndwi) / 2.0,
            nir: (1.0 + ndvi) / 2.0,
            red: (1.0 - ndvi) / 2.0,
        }
    }

    #[test]
    fn water_takes_priority_over_forest() {
        assert_eq!(classify_pixel(&pixel(0.8, 0.3), &T), SpectralClass::Water);
    }

    #[test]
    fn threshold_edges() {
        assert_eq!(classify_indices(Some(0.7), Some(0.2), &T), SpectralClass::Forest);
        assert_eq!(classify_indices(Some(0.6), Some(0.0), &T), SpectralClass::Vegetation);
        assert_eq!(classify_indices(Some(0.25), Some(0.0), &T), SpectralClass::Vegetation);
        assert_eq!(classify_indices(Some(0.2499), Some(0.0), &T), SpectralClass::Urban);
        assert_eq!(classify_indices(Some(-0.4), Some(-0.3), &T), SpectralClass::Urban);
    }

    #[test]
    fn undefined_indices_fall_back_to_urban() {
        let dark = Reflectance {
            green: 0.0,
            red: 0.0,
            nir: 0.0,
            swir: 0.0,
        };
        assert!(ndvi(0.0, 0.0).is_none());
        assert_eq!(classify_pixel(&dark, &T), SpectralClass::Urban);
    }

    #[test]
    fn masked_classification_matches_per_pixel_rules() {
        let pixels = vec![
            pixel(0.8, 0.5),
            pixel(0.7, 0.0),
            pixel(0.4, -0.1),
            pixel(0.1, -0.2),
            pixel(0.5, 0.1),
            Reflectance {
                green: 0.0,
                red: 0.0,
                nir: 0.0,
                swir: 0.0,
            },
        ];
        let masked = classify_pixels(&pixels, &T).unwrap();
        let direct: Vec<_> = pixels.iter().map(|p| classify_pixel(p, &T)).collect();
        assert_eq!(masked, direct);
        assert_eq!(
            masked,
            vec![
                SpectralClass::Water,
                SpectralClass::Forest,
                SpectralClass::Vegetation,
                SpectralClass::Urban,
                SpectralClass::Vegetation,
                SpectralClass::Urban,
            ]
        );
    }

    #[test]
    fn all_water_image_is_all_water() {
        let pixels = vec![pixel(0.1, 0.5); 400];
        let classes = classify_pixels(&pixels, &T).unwrap();
        let histogram = area_histogram(&classes, 100.0);
        let (cover, _) = aggregate_areas_to_percentages(&histogram, 40_000.0).unwrap();
        assert!((cover.water - 100.0).abs() < 1e-9);
        assert!(cover.urban.abs() < 1e-9);
        assert!(cover.forest.abs() < 1e-9);
        assert!(cover.vegetation.abs() < 1e-9);
    }

    #[test]
    fn areas_divide_by_aoi_area() {
        let histogram = PixelHistogram::from_bins(
            HistogramMeasure::Area,
            [(0, 100_000.0), (1, 50_000.0), (2, 700_000.0), (3, 160_000.0)],
        );
        let (cover, breakdown) = aggregate_areas_to_percentages(&histogram, 1_000_000.0).unwrap();
        assert!((cover.urban - 70.0).abs() < 1e-9);
        assert!((cover.vegetation - 16.0).abs() < 1e-9);
        assert!((cover.total() - 101.0).abs() < 1e-9);
        assert!(!breakdown.converted_from_counts);
        assert!((breakdown.class_areas_m2["urban"] - 700_000.0).abs() < 1e-9);
    }

    #[test]
    fn counts_are_scaled_to_the_aoi() {
        let histogram = PixelHistogram::from_bins(HistogramMeasure::Count, [(2, 30.0), (3, 10.0)]);
        let (cover, breakdown) = aggregate_areas_to_percentages(&histogram, 2_000_000.0).unwrap();
        assert!((cover.urban - 75.0).abs() < 1e-9);
        assert!((cover.vegetation - 25.0).abs() < 1e-9);
        assert!(breakdown.converted_from_counts);
        assert!((breakdown.class_areas_m2["urban"] - 1_500_000.0).abs() < 1e-6);
    }

    #[test]
    fn totals_far_from_hundred_fail() {
        let histogram = PixelHistogram::from_bins(HistogramMeasure::Area, [(2, 500_000.0)]);
        assert!(matches!(
            aggregate_areas_to_percentages(&histogram, 1_000_000.0),
            Err(ClassifyError::Validation { .. })
        ));
    }

    #[test]
    fn unknown_labels_are_an_invariant_violation() {
        let histogram =
            PixelHistogram::from_bins(HistogramMeasure::Area, [(2, 900_000.0), (4, 100_000.0)]);
        assert!(matches!(
            aggregate_areas_to_percentages(&histogram, 1_000_000.0),
            Err(ClassifyError::ClassificationInvariant { .. })
        ));
    }

    #[test]
    fn masked_area_is_ignored() {
        let histogram = PixelHistogram::from_bins(
            HistogramMeasure::Area,
            [(-1, 5_000_000.0), (2, 1_000_000.0)],
        );
        let (cover, _) = aggregate_areas_to_percentages(&histogram, 1_000_000.0).unwrap();
        assert!((cover.urban - 100.0).abs() < 1e-9);
    }

    #[test]
    fn warnings_only_for_urban_regions() {
        assert!(urban_validation_warnings(&LandCoverResult::new(20.0, 30.0, 40.0, 10.0)).is_empty());
        assert_eq!(
            urban_validation_warnings(&LandCoverResult::new(50.0, 15.0, 30.0, 5.0)).len(),
            2
        );
        assert!(urban_validation_warnings(&LandCoverResult::new(80.0, 5.0, 10.0, 5.0)).is_empty());
    }

    #[test]
    fn band_math_embeds_thresholds_and_labels() {
        let expr = T.band_math();
        assert!(expr.contains("mndwi > 0.2 ? 0"));
        assert!(expr.contains("ndvi > 0.6 ? 1"));
        assert!(expr.contains("ndvi >= 0.25"));
        assert!(expr.ends_with("? 3 : 2"));
    }
}
