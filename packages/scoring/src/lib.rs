#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Risk and impact scores derived from land-cover percentages.
//!
//! Every scorer is a pure function of an already reconciled
//! [`LandCoverResult`](landcover_models::LandCoverResult), plus optional
//! weather, air-quality and population inputs. Scorers read the
//! presented (post-floor) percentages.

pub mod air_quality;
pub mod carbon;
pub mod climate;
pub mod economic;
pub mod sustainability;
pub mod urbanisation;

pub use air_quality::{UsAqi, us_aqi};
pub use carbon::{CarbonImpact, carbon_impact};
pub use climate::{ClimateRisks, RiskLevel, climate_risks};
pub use economic::{EconomicImpact, EconomicInputs, economic_impact};
pub use sustainability::{EsiRating, SustainabilityIndex, sustainability_index};
pub use urbanisation::{UrbanisationRisk, UrsLevel, urbanisation_risk};
