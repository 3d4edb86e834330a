//! Bounded presentation adjustments.
//!
//! Neither function reclassifies pixels. [`urban_green_floor`] smooths a
//! degenerate all-concrete result for display, and [`risk_input_floor`]
//! keeps the urbanisation score's `(1 − V)` term away from 1.0. The two
//! use different thresholds and are kept separate.

use landcover_models::LandCoverResult;
use serde::Serialize;

/// Urban share at or above which the display floor may apply.
pub const DISPLAY_URBAN_MIN_PCT: f64 = 85.0;

/// Vegetation share below which the display floor may apply.
pub const DISPLAY_VEGETATION_MAX_PCT: f64 = 2.0;

/// Water share at or below which the display floor may apply.
pub const DISPLAY_WATER_MAX_PCT: f64 = 3.0;

/// Vegetation level the display floor raises toward.
pub const DISPLAY_VEGETATION_TARGET_PCT: f64 = 2.5;

/// Largest shift the display floor makes.
pub const DISPLAY_MAX_DELTA_PCT: f64 = 3.0;

/// Urban share the display floor never goes below.
pub const DISPLAY_URBAN_FLOOR_PCT: f64 = 80.0;

/// Urban fraction above which the risk floor applies.
pub const RISK_URBAN_FRACTION: f64 = 0.95;

/// Green fraction the risk floor raises to.
pub const RISK_GREEN_FLOOR: f64 = 0.05;

/// Result of the display floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Normalization {
    pub applied: bool,
    /// Why the floor fired, when it did.
    pub reason: Option<&'static str>,
    /// Percentage points moved from urban to vegetation.
    pub delta: f64,
    pub raw: LandCoverResult,
    pub presented: LandCoverResult,
    /// Always true: the adjustment is cosmetic and must be labelled so.
    pub display_only: bool,
}

const ALL_URBAN_REASON: &str =
    "near-total urban result with no green cover; vegetation floor applied for display only";

/// Applies the urban-green display floor.
///
/// Fires when urban ≥ 85%, vegetation < 2%, forest is zero and water ≤ 3%.
/// Moves `min(3, 2.5 − vegetation)` points from urban to vegetation,
/// reduced further so urban stays at or above 80%.
#[must_use]
pub fn urban_green_floor(raw: &LandCoverResult) -> Normalization {
    let degenerate = raw.urban >= DISPLAY_URBAN_MIN_PCT
        && raw.vegetation < DISPLAY_VEGETATION_MAX_PCT
        && raw.forest <= 0.0
        && raw.water <= DISPLAY_WATER_MAX_PCT;

    let delta = if degenerate {
        (DISPLAY_VEGETATION_TARGET_PCT - raw.vegetation)
            .min(DISPLAY_MAX_DELTA_PCT)
            .min(raw.urban - DISPLAY_URBAN_FLOOR_PCT)
            .max(0.0)
    } else {
        0.0
    };

    if delta <= 0.0 {
        return Normalization {
            applied: false,
            reason: None,
            delta: 0.0,
            raw: *raw,
            presented: *raw,
            display_only: true,
        };
    }

    let presented = LandCoverResult {
        urban: raw.urban - delta,
        vegetation: raw.vegetation + delta,
        ..*raw
    };
    log::info!(
        "Urban-green floor applied: moved {delta:.2} points (urban {:.1}% -> {:.1}%)",
        raw.urban,
        presented.urban
    );

    Normalization {
        applied: true,
        reason: Some(ALL_URBAN_REASON),
        delta,
        raw: *raw,
        presented,
        display_only: true,
    }
}

/// Fractions fed to the urbanisation risk score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskInputFloor {
    pub urban: f64,
    pub green: f64,
    pub applied: bool,
    pub delta: f64,
}

/// Clamps green up to 0.05 (and urban down by the same amount) when urban
/// exceeds 0.95 and green is below 0.05. Inputs are fractions in `[0, 1]`.
#[must_use]
pub fn risk_input_floor(urban_fraction: f64, green_fraction: f64) -> RiskInputFloor {
    if urban_fraction > RISK_URBAN_FRACTION && green_fraction < RISK_GREEN_FLOOR {
        let delta = RISK_GREEN_FLOOR - green_fraction;
        log::debug!("Risk-input floor: green {green_fraction:.3} -> {RISK_GREEN_FLOOR}");
        RiskInputFloor {
            urban: (urban_fraction - delta).max(0.0),
            green: RISK_GREEN_FLOOR,
            applied: true,
            delta,
        }
    } else {
        RiskInputFloor {
            urban: urban_fraction,
            green: green_fraction,
            applied: false,
            delta: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn degenerate_urban_gets_vegetation_floor() {
        let raw = LandCoverResult::new(96.0, 0.0, 1.0, 1.0);
        let n = urban_green_floor(&raw);
        assert!(n.applied);
        assert!(n.display_only);
        assert!(close(n.delta, 1.5));
        assert!(close(n.presented.urban, 94.5));
        assert!(close(n.presented.vegetation, 2.5));
        assert!(close(n.presented.water, 1.0));
        assert_eq!(n.raw, raw);
        assert!(n.reason.is_some());
    }

    #[test]
    fn zero_vegetation_moves_two_and_a_half() {
        let n = urban_green_floor(&LandCoverResult::new(100.0, 0.0, 0.0, 0.0));
        assert!(close(n.delta, 2.5));
        assert!(close(n.presented.urban, 97.5));
    }

    #[test]
    fn floor_at_the_urban_trigger() {
        let n = urban_green_floor(&LandCoverResult::new(85.0, 0.0, 0.0, 3.0));
        assert!(close(n.delta, 2.5));
        assert!(n.presented.urban >= DISPLAY_URBAN_FLOOR_PCT);
        assert!(!urban_green_floor(&LandCoverResult::new(84.9, 0.0, 0.0, 3.0)).applied);
    }

    #[test]
    fn any_forest_or_water_disables_display_floor() {
        assert!(!urban_green_floor(&LandCoverResult::new(95.0, 0.5, 1.0, 3.5)).applied);
        assert!(!urban_green_floor(&LandCoverResult::new(95.0, 0.0, 1.0, 4.0)).applied);
        assert!(!urban_green_floor(&LandCoverResult::new(95.0, 0.0, 2.0, 3.0)).applied);
        assert!(!urban_green_floor(&LandCoverResult::new(70.0, 0.0, 0.0, 0.0)).applied);
    }

    #[test]
    fn untouched_result_is_presented_as_is() {
        let raw = LandCoverResult::new(60.0, 10.0, 25.0, 5.0);
        let n = urban_green_floor(&raw);
        assert_eq!(n.presented, raw);
        assert!(close(n.delta, 0.0));
    }

    #[test]
    fn risk_floor_clamps_green_to_five_percent() {
        let f = risk_input_floor(0.99, 0.01);
        assert!(f.applied);
        assert!(close(f.green, 0.05));
        assert!(close(f.urban, 0.95));
        assert!(close(f.delta, 0.04));
    }

    #[test]
    fn risk_floor_needs_both_conditions() {
        assert!(!risk_input_floor(0.95, 0.0).applied);
        assert!(!risk_input_floor(0.97, 0.05).applied);
        let f = risk_input_floor(0.5, 0.5);
        assert!(close(f.urban, 0.5) && close(f.green, 0.5));
    }
}
