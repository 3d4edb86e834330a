//! Annual carbon balance of an area, in tonnes of CO₂.

use landcover_models::LandCoverResult;
use serde::Serialize;

/// Sequestration, t CO₂/ha/yr.
pub const FOREST_SEQUESTRATION: f64 = 5.5;
pub const VEGETATION_SEQUESTRATION: f64 = 2.2;
pub const URBAN_SEQUESTRATION: f64 = -0.5;
pub const WATER_SEQUESTRATION: f64 = 0.0;

/// Emissions from built-up land, t CO₂/ha/yr.
pub const URBAN_EMISSION_FACTOR: f64 = 8.5;

/// Carbon credit price, INR per tonne.
pub const CREDIT_RATE_INR: f64 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequestration {
    pub forest: f64,
    pub vegetation: f64,
    pub urban: f64,
    pub water: f64,
    pub total: f64,
    pub value_inr: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarbonImpact {
    pub area_km2: f64,
    pub area_hectares: f64,
    pub sequestration: Sequestration,
    pub urban_emissions: f64,
    pub emission_cost_inr: f64,
    /// Sequestration minus emissions; positive is a sink.
    pub net: f64,
    pub net_value_inr: f64,
    pub status: &'static str,
    pub credit_rate_inr: f64,
}

impl CarbonImpact {
    #[must_use]
    pub fn is_sink(&self) -> bool {
        self.net > 0.0
    }
}

#[must_use]
pub fn carbon_impact(cover: &LandCoverResult, area_km2: f64) -> CarbonImpact {
    let area_hectares = area_km2 * 100.0;
    let hectares = |pct: f64| pct / 100.0 * area_hectares;

    let forest = hectares(cover.forest) * FOREST_SEQUESTRATION;
    let vegetation = hectares(cover.vegetation) * VEGETATION_SEQUESTRATION;
    let urban = hectares(cover.urban) * URBAN_SEQUESTRATION;
    let water = hectares(cover.water) * WATER_SEQUESTRATION;
    let total = forest + vegetation + urban + water;

    let urban_emissions = hectares(cover.urban) * URBAN_EMISSION_FACTOR;
    let net = total - urban_emissions;

    CarbonImpact {
        area_km2,
        area_hectares,
        sequestration: Sequestration {
            forest,
            vegetation,
            urban,
            water,
            total,
            value_inr: total * CREDIT_RATE_INR,
        },
        urban_emissions,
        emission_cost_inr: urban_emissions * CREDIT_RATE_INR,
        net,
        net_value_inr: net * CREDIT_RATE_INR,
        status: if net > 0.0 {
            "Net Carbon Sink"
        } else {
            "Net Carbon Emitter"
        },
        credit_rate_inr: CREDIT_RATE_INR,
    }
}
