//! Economic value of an area's land cover, in INR.

use landcover_models::LandCoverResult;
use serde::Serialize;

/// Default base property value per km² (₹50 crore).
pub const DEFAULT_BASE_PROPERTY_VALUE_PER_KM2: f64 = 500_000_000.0;

pub const URBAN_PROPERTY_MULTIPLIER: f64 = 1.0;
pub const FOREST_PROPERTY_MULTIPLIER: f64 = 0.1;
pub const VEGETATION_PROPERTY_MULTIPLIER: f64 = 0.3;
pub const WATER_PROPERTY_MULTIPLIER: f64 = 0.05;

/// Percent property value gained per percent of green cover.
pub const GREEN_SPACE_PREMIUM_PCT: f64 = 0.5;

/// Tourism revenue per km² per year.
pub const FOREST_TOURISM_PER_KM2: f64 = 500_000.0;
pub const WATER_TOURISM_PER_KM2: f64 = 800_000.0;
pub const VEGETATION_TOURISM_PER_KM2: f64 = 200_000.0;
pub const URBAN_TOURISM_PER_KM2: f64 = 100_000.0;

/// Agricultural revenue per km² of vegetation per year.
pub const AGRICULTURAL_REVENUE_PER_KM2: f64 = 1_500_000.0;

/// Health savings per person per percent of green cover per year.
pub const HEALTH_SAVINGS_PER_PERSON: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EconomicInputs {
    pub area_km2: f64,
    pub population: Option<u64>,
    pub base_property_value_per_km2: f64,
}

impl EconomicInputs {
    #[must_use]
    pub const fn new(area_km2: f64) -> Self {
        Self {
            area_km2,
            population: None,
            base_property_value_per_km2: DEFAULT_BASE_PROPERTY_VALUE_PER_KM2,
        }
    }
}

/// Per-class amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassValues {
    pub urban: f64,
    pub forest: f64,
    pub vegetation: f64,
    pub water: f64,
}

impl ClassValues {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.urban + self.forest + self.vegetation + self.water
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomicImpact {
    pub area_km2: f64,
    pub class_areas_km2: ClassValues,
    pub property_values: ClassValues,
    pub green_space_premium: f64,
    pub tourism: ClassValues,
    pub agricultural_revenue: f64,
    /// Only present when a population was supplied.
    pub health_savings: Option<f64>,
    pub total_value: f64,
}

#[must_use]
pub fn economic_impact(cover: &LandCoverResult, inputs: &EconomicInputs) -> EconomicImpact {
    let km2 = |pct: f64| pct / 100.0 * inputs.area_km2;
    let areas = ClassValues {
        urban: km2(cover.urban),
        forest: km2(cover.forest),
        vegetation: km2(cover.vegetation),
        water: km2(cover.water),
    };
    let base = inputs.base_property_value_per_km2;
    let property_values = ClassValues {
        urban: areas.urban * base * URBAN_PROPERTY_MULTIPLIER,
        forest: areas.forest * base * FOREST_PROPERTY_MULTIPLIER,
        vegetation: areas.vegetation * base * VEGETATION_PROPERTY_MULTIPLIER,
        water: areas.water * base * WATER_PROPERTY_MULTIPLIER,
    };
    let green_pct = cover.green();
    let green_space_premium =
        property_values.urban * (green_pct / 100.0) * (GREEN_SPACE_PREMIUM_PCT / 100.0);
    let tourism = ClassValues {
        urban: areas.urban * URBAN_TOURISM_PER_KM2,
        forest: areas.forest * FOREST_TOURISM_PER_KM2,
        vegetation: areas.vegetation * VEGETATION_TOURISM_PER_KM2,
        water: areas.water * WATER_TOURISM_PER_KM2,
    };
    let agricultural_revenue = areas.vegetation * AGRICULTURAL_REVENUE_PER_KM2;

    #[allow(clippy::cast_precision_loss)]
    let health_savings = inputs
        .population
        .filter(|population| *population > 0)
        .map(|population| population as f64 * green_pct * HEALTH_SAVINGS_PER_PERSON);

    let total_value = property_values.total()
        + green_space_premium
        + tourism.total()
        + agricultural_revenue
        + health_savings.unwrap_or(0.0);

    EconomicImpact {
        area_km2: inputs.area_km2,
        class_areas_km2: areas,
        property_values,
        green_space_premium,
        tourism,
        agricultural_revenue,
        health_savings,
        total_value,
    }
}
