//! Dynamic World (9 classes) to four-class reconciliation.
//!
//! | Output     | Dynamic World labels                                          |
//! |------------|---------------------------------------------------------------|
//! | Water      | water                                                         |
//! | Forest     | trees, only when their area exceeds [`FOREST_MIN_AREA_KM2`]  |
//! | Vegetation | grass, crops, shrub; trees below the threshold; bare ground when crops are present |
//! | Urban      | built area; bare ground when no crops are present             |
//!
//! Flooded vegetation, snow/ice, masked and unknown labels are left out
//! of the total.

use landcover_models::classes::DynamicWorldClass;
use landcover_models::{HistogramMeasure, LandCoverResult, MASKED_LABEL, PixelHistogram};
use serde::Serialize;

use crate::ClassifyError;

/// Trees only count as forest above this area.
pub const FOREST_MIN_AREA_KM2: f64 = 0.25;

/// Per-label values as they came from the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawClassCounts {
    pub water: f64,
    pub trees: f64,
    pub grass: f64,
    pub flooded_vegetation: f64,
    pub crops: f64,
    pub shrub_scrub: f64,
    pub built_area: f64,
    pub bare_ground: f64,
    pub snow_ice: f64,
}

impl RawClassCounts {
    fn from_histogram(histogram: &PixelHistogram) -> Self {
        let get = |class: DynamicWorldClass| histogram.get(class.label());
        Self {
            water: get(DynamicWorldClass::Water),
            trees: get(DynamicWorldClass::Trees),
            grass: get(DynamicWorldClass::Grass),
            flooded_vegetation: get(DynamicWorldClass::FloodedVegetation),
            crops: get(DynamicWorldClass::Crops),
            shrub_scrub: get(DynamicWorldClass::ShrubScrub),
            built_area: get(DynamicWorldClass::BuiltArea),
            bare_ground: get(DynamicWorldClass::BareGround),
            snow_ice: get(DynamicWorldClass::SnowIce),
        }
    }
}

/// What ended up in the vegetation bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VegetationComponents {
    pub grass: f64,
    pub crops: f64,
    pub shrub_scrub: f64,
    pub trees_as_vegetation: f64,
    pub bare_ground_as_vegetation: f64,
}

/// Bookkeeping behind a Dynamic World reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicWorldBreakdown {
    /// Sum of the labels that count toward percentages.
    pub total_pixels: f64,
    pub tree_area_km2: f64,
    /// Whether trees were large enough to count as forest.
    pub forest_valid: bool,
    pub raw_counts: RawClassCounts,
    pub vegetation_components: VegetationComponents,
    /// Crops were present, so bare ground was read as fallow fields.
    pub agricultural_context: bool,
    pub harvested_fields_included: bool,
    /// Labels outside the Dynamic World scheme that were ignored.
    pub unknown_labels: Vec<i32>,
}

/// Area in km² covered by `trees` (a pixel count, or m² for area
/// histograms).
fn tree_area_km2(trees: f64, measure: HistogramMeasure, resolution_m: f64) -> f64 {
    match measure {
        HistogramMeasure::Count => trees * resolution_m * resolution_m / 1_000_000.0,
        HistogramMeasure::Area => trees / 1_000_000.0,
    }
}

/// Reconciles a Dynamic World histogram.
///
/// # Errors
///
/// * [`ClassifyError::NoData`] if no counted label has pixels
/// * [`ClassifyError::ClassificationInvariant`] if the percentages do
///   not sum to 100 within tolerance
pub fn reconcile(
    histogram: &PixelHistogram,
    resolution_m: f64,
) -> Result<(LandCoverResult, DynamicWorldBreakdown), ClassifyError> {
    let mut unknown_labels = Vec::new();
    let mut total = 0.0;
    for (label, value) in histogram.iter() {
        if label == MASKED_LABEL {
            continue;
        }
        match DynamicWorldClass::from_label(label) {
            Some(class) if class.is_excluded() => {}
            Some(_) => total += value,
            None => {
                log::warn!("Ignoring unknown Dynamic World label {label} ({value} pixels)");
                unknown_labels.push(label);
            }
        }
    }

    if total <= 0.0 {
        return Err(ClassifyError::NoData {
            message: format!(
                "Dynamic World histogram has no counted pixels ({} labels present)",
                histogram.len()
            ),
        });
    }

    let raw = RawClassCounts::from_histogram(histogram);
    let tree_area_km2 = tree_area_km2(raw.trees, histogram.measure(), resolution_m);
    let forest_valid = tree_area_km2 > FOREST_MIN_AREA_KM2;
    let agricultural_context = raw.crops > 0.0;

    let (forest, trees_as_vegetation) = if forest_valid {
        (raw.trees, 0.0)
    } else {
        (0.0, raw.trees)
    };
    let (urban, bare_ground_as_vegetation) = if agricultural_context {
        (raw.built_area, raw.bare_ground)
    } else {
        (raw.built_area + raw.bare_ground, 0.0)
    };
    let vegetation =
        raw.grass + raw.crops + raw.shrub_scrub + trees_as_vegetation + bare_ground_as_vegetation;

    let cover = LandCoverResult::new(
        urban / total * 100.0,
        forest / total * 100.0,
        vegetation / total * 100.0,
        raw.water / total * 100.0,
    );

    if !cover.sums_to_hundred() {
        return Err(ClassifyError::ClassificationInvariant {
            message: format!(
                "Dynamic World percentages sum to {:.2}% over {total} pixels",
                cover.total()
            ),
        });
    }

    let breakdown = DynamicWorldBreakdown {
        total_pixels: total,
        tree_area_km2,
        forest_valid,
        raw_counts: raw,
        vegetation_components: VegetationComponents {
            grass: raw.grass,
            crops: raw.crops,
            shrub_scrub: raw.shrub_scrub,
            trees_as_vegetation,
            bare_ground_as_vegetation,
        },
        agricultural_context,
        harvested_fields_included: agricultural_context && raw.bare_ground > 0.0,
        unknown_labels,
    };

    Ok((cover, breakdown))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(bins: &[(DynamicWorldClass, f64)]) -> PixelHistogram {
        PixelHistogram::from_bins(
            HistogramMeasure::Count,
            bins.iter().map(|(class, value)| (class.label(), *value)),
        )
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn small_tree_patches_fold_into_vegetation() {
        // 200 pixels × 900 m² = 0.18 km², below the forest threshold.
        let h = counts(&[
            (DynamicWorldClass::Trees, 200.0),
            (DynamicWorldClass::BuiltArea, 700.0),
            (DynamicWorldClass::Grass, 100.0),
        ]);
        let (cover, breakdown) = reconcile(&h, 30.0).unwrap();
        assert!(close(cover.forest, 0.0));
        assert!(close(cover.vegetation, 30.0));
        assert!(close(cover.urban, 70.0));
        assert!(!breakdown.forest_valid);
        assert!(close(breakdown.vegetation_components.trees_as_vegetation, 200.0));
        assert!(close(breakdown.tree_area_km2, 0.18));
    }

    #[test]
    fn large_tree_cover_is_forest() {
        // 300 pixels × 900 m² = 0.27 km².
        let h = counts(&[
            (DynamicWorldClass::Trees, 300.0),
            (DynamicWorldClass::BuiltArea, 700.0),
        ]);
        let (cover, breakdown) = reconcile(&h, 30.0).unwrap();
        assert!(close(cover.forest, 30.0));
        assert!(close(cover.vegetation, 0.0));
        assert!(breakdown.forest_valid);
    }

    #[test]
    fn tree_threshold_depends_on_resolution() {
        let h = counts(&[
            (DynamicWorldClass::Trees, 300.0),
            (DynamicWorldClass::BuiltArea, 700.0),
        ]);
        let (cover, _) = reconcile(&h, 10.0).unwrap();
        assert!(close(cover.forest, 0.0));
        assert!(close(cover.vegetation, 30.0));
    }

    #[test]
    fn crops_turn_bare_ground_into_vegetation() {
        let h = counts(&[
            (DynamicWorldClass::Crops, 100.0),
            (DynamicWorldClass::BareGround, 300.0),
            (DynamicWorldClass::BuiltArea, 600.0),
        ]);
        let (cover, breakdown) = reconcile(&h, 30.0).unwrap();
        assert!(close(cover.urban, 60.0));
        assert!(close(cover.vegetation, 40.0));
        assert!(breakdown.agricultural_context);
        assert!(breakdown.harvested_fields_included);
        assert!(close(breakdown.vegetation_components.bare_ground_as_vegetation, 300.0));
    }

    #[test]
    fn without_crops_bare_ground_is_urban() {
        let h = counts(&[
            (DynamicWorldClass::BareGround, 300.0),
            (DynamicWorldClass::BuiltArea, 600.0),
            (DynamicWorldClass::Water, 100.0),
        ]);
        let (cover, breakdown) = reconcile(&h, 30.0).unwrap();
        assert!(close(cover.urban, 90.0));
        assert!(close(cover.water, 10.0));
        assert!(!breakdown.agricultural_context);
        assert!(!breakdown.harvested_fields_included);
    }

    #[test]
    fn excluded_and_masked_labels_stay_out_of_totals() {
        let mut h = counts(&[
            (DynamicWorldClass::BuiltArea, 500.0),
            (DynamicWorldClass::Grass, 500.0),
            (DynamicWorldClass::FloodedVegetation, 4_000.0),
            (DynamicWorldClass::SnowIce, 250.0),
        ]);
        h.add(MASKED_LABEL, 9_999.0);
        h.add(42, 10.0);

        let (cover, breakdown) = reconcile(&h, 30.0).unwrap();
        assert!(close(breakdown.total_pixels, 1_000.0));
        assert!(close(cover.urban, 50.0));
        assert!(close(cover.vegetation, 50.0));
        assert!(close(cover.total(), 100.0));
        assert_eq!(breakdown.unknown_labels, vec![42]);
        assert!(close(breakdown.raw_counts.flooded_vegetation, 4_000.0));
    }

    #[test]
    fn percentages_always_sum_to_hundred() {
        let h = counts(&[
            (DynamicWorldClass::Water, 13.0),
            (DynamicWorldClass::Trees, 1_234.0),
            (DynamicWorldClass::Grass, 77.0),
            (DynamicWorldClass::Crops, 5.0),
            (DynamicWorldClass::ShrubScrub, 91.0),
            (DynamicWorldClass::BuiltArea, 3_001.0),
            (DynamicWorldClass::BareGround, 17.0),
        ]);
        let (cover, _) = reconcile(&h, 30.0).unwrap();
        assert!((cover.total() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn only_excluded_pixels_is_no_data() {
        let h = counts(&[(DynamicWorldClass::SnowIce, 10.0)]);
        assert!(matches!(
            reconcile(&h, 30.0),
            Err(ClassifyError::NoData { .. })
        ));
    }

    #[test]
    fn area_histograms_use_square_meters_for_trees() {
        let h = PixelHistogram::from_bins(
            HistogramMeasure::Area,
            [
                (DynamicWorldClass::Trees.label(), 300_000.0),
                (DynamicWorldClass::BuiltArea.label(), 700_000.0),
            ],
        );
        let (cover, breakdown) = reconcile(&h, 30.0).unwrap();
        assert!(close(breakdown.tree_area_km2, 0.3));
        assert!(close(cover.forest, 30.0));
    }
}
