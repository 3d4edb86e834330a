//! Urbanisation Risk Score.
//!
//! `URS = 0.40·U + 0.30·(1−V) + 0.20·P + 0.10·I`
//!
//! * `U`: urban fraction after the risk-input floor
//! * `V`: forest plus vegetation fraction after the floor
//! * `P`: normalized population density ([`normalize_population_density`])
//! * `I`: infrastructure stress ([`infrastructure_stress`])

use landcover_classify::normalize::risk_input_floor;
use landcover_models::LandCoverResult;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

pub const WEIGHT_URBAN: f64 = 0.40;
pub const WEIGHT_VEGETATION_LOSS: f64 = 0.30;
pub const WEIGHT_POPULATION: f64 = 0.20;
pub const WEIGHT_INFRASTRUCTURE: f64 = 0.10;

/// Density assumed for a fully urban area when none is supplied.
pub const ESTIMATED_URBAN_DENSITY_PER_KM2: f64 = 15_000.0;

pub const FORMULA: &str = "URS = (0.40 × U) + (0.30 × (1 − V)) + (0.20 × P) + (0.10 × I)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Display, AsRefStr)]
pub enum UrsLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl UrsLevel {
    /// Low below 0.3, Moderate below 0.6, High below 0.8.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score < 0.3 {
            Self::Low
        } else if score < 0.6 {
            Self::Moderate
        } else if score < 0.8 {
            Self::High
        } else {
            Self::Critical
        }
    }
}

/// The four normalized inputs, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrsInputs {
    pub urban_fraction: f64,
    pub vegetation_fraction: f64,
    pub population_normalized: f64,
    pub infrastructure_stress: f64,
}

/// Weighted contribution of each term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrsBreakdown {
    pub urban_contribution: f64,
    pub vegetation_loss_contribution: f64,
    pub population_contribution: f64,
    pub infrastructure_contribution: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrbanisationRisk {
    pub score: f64,
    pub level: UrsLevel,
    pub breakdown: UrsBreakdown,
    pub inputs: UrsInputs,
    /// Whether the risk-input floor changed `U` and `V`.
    pub floor_applied: bool,
    pub formula: &'static str,
}

/// Maps people per km² onto `[0, 1]` in four bands: rural up to 1 000,
/// suburban up to 5 000, urban up to 15 000, dense urban above.
#[must_use]
pub fn normalize_population_density(per_km2: f64) -> f64 {
    if per_km2 <= 0.0 {
        0.0
    } else if per_km2 <= 1_000.0 {
        (per_km2 / 5_000.0).min(0.2)
    } else if per_km2 <= 5_000.0 {
        ((per_km2 - 1_000.0) / 4_000.0).mul_add(0.3, 0.2)
    } else if per_km2 <= 15_000.0 {
        ((per_km2 - 5_000.0) / 10_000.0).mul_add(0.3, 0.5)
    } else {
        ((per_km2 - 15_000.0) / 20_000.0).mul_add(0.2, 0.8).min(1.0)
    }
}

/// Stress added by the 1–5 air-quality level; zero when unknown.
#[must_use]
pub const fn air_quality_stress(aqi_level: Option<u8>) -> f64 {
    match aqi_level {
        Some(2) => 0.1,
        Some(3) => 0.2,
        Some(4) => 0.4,
        Some(5) => 0.6,
        _ => 0.0,
    }
}

/// `min(1, 0.5·U + 0.3·P + air-quality stress)`.
#[must_use]
pub fn infrastructure_stress(
    urban_fraction: f64,
    population_normalized: f64,
    aqi_level: Option<u8>,
) -> f64 {
    (0.5 * urban_fraction + 0.3 * population_normalized + air_quality_stress(aqi_level)).min(1.0)
}

/// Applies the weights to already normalized inputs and clamps to `[0, 1]`.
#[must_use]
pub fn score(inputs: &UrsInputs) -> (f64, UrsBreakdown) {
    let breakdown = UrsBreakdown {
        urban_contribution: WEIGHT_URBAN * inputs.urban_fraction,
        vegetation_loss_contribution: WEIGHT_VEGETATION_LOSS * (1.0 - inputs.vegetation_fraction),
        population_contribution: WEIGHT_POPULATION * inputs.population_normalized,
        infrastructure_contribution: WEIGHT_INFRASTRUCTURE * inputs.infrastructure_stress,
    };
    let total = breakdown.urban_contribution
        + breakdown.vegetation_loss_contribution
        + breakdown.population_contribution
        + breakdown.infrastructure_contribution;
    (total.clamp(0.0, 1.0), breakdown)
}

/// Scores `cover`. Without a population density one is estimated as
/// `U × 15 000` people per km².
#[must_use]
pub fn urbanisation_risk(
    cover: &LandCoverResult,
    population_per_km2: Option<f64>,
    aqi_level: Option<u8>,
) -> UrbanisationRisk {
    let floor = risk_input_floor(cover.urban / 100.0, cover.green() / 100.0);
    let density = population_per_km2.unwrap_or_else(|| {
        let estimate = floor.urban * ESTIMATED_URBAN_DENSITY_PER_KM2;
        log::debug!("No population density given, estimating {estimate:.0}/km² from urban cover");
        estimate
    });
    let population_normalized = normalize_population_density(density);

    let inputs = UrsInputs {
        urban_fraction: floor.urban,
        vegetation_fraction: floor.green,
        population_normalized,
        infrastructure_stress: infrastructure_stress(floor.urban, population_normalized, aqi_level),
    };
    let (score, breakdown) = score(&inputs);

    UrbanisationRisk {
        score,
        level: UrsLevel::from_score(score),
        breakdown,
        inputs,
        floor_applied: floor.applied,
        formula: FORMULA,
    }
}
