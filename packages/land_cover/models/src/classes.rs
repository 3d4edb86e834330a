//! Raw class label schemes produced by raster services.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Labels of the global 9-class Dynamic World land-cover model.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DynamicWorldClass {
    /// Open water.
    Water = 0,
    /// Trees.
    Trees = 1,
    /// Grass.
    Grass = 2,
    /// Flooded vegetation.
    FloodedVegetation = 3,
    /// Crops.
    Crops = 4,
    /// Shrub and scrub.
    ShrubScrub = 5,
    /// Built area.
    BuiltArea = 6,
    /// Bare ground.
    BareGround = 7,
    /// Snow and ice.
    SnowIce = 8,
}

impl DynamicWorldClass {
    /// Every class, in label order.
    pub const ALL: [Self; 9] = [
        Self::Water,
        Self::Trees,
        Self::Grass,
        Self::FloodedVegetation,
        Self::Crops,
        Self::ShrubScrub,
        Self::BuiltArea,
        Self::BareGround,
        Self::SnowIce,
    ];

    /// Integer label used in raster histograms.
    #[must_use]
    pub const fn label(self) -> i32 {
        self as i32
    }

    /// Looks up a class by its raster label.
    #[must_use]
    pub const fn from_label(label: i32) -> Option<Self> {
        match label {
            0 => Some(Self::Water),
            1 => Some(Self::Trees),
            2 => Some(Self::Grass),
            3 => Some(Self::FloodedVegetation),
            4 => Some(Self::Crops),
            5 => Some(Self::ShrubScrub),
            6 => Some(Self::BuiltArea),
            7 => Some(Self::BareGround),
            8 => Some(Self::SnowIce),
            _ => None,
        }
    }

    /// Whether pixels of this class are left out of percentage totals.
    #[must_use]
    pub const fn is_excluded(self) -> bool {
        matches!(self, Self::FloodedVegetation | Self::SnowIce)
    }
}

/// Labels of the four-class spectral-index scheme.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SpectralClass {
    /// Water-index above the water threshold.
    Water = 0,
    /// Vegetation-index above the forest threshold.
    Forest = 1,
    /// Everything not matched by another rule.
    Urban = 2,
    /// Vegetation-index within the vegetation band.
    Vegetation = 3,
}

impl SpectralClass {
    /// Every class, in label order.
    pub const ALL: [Self; 4] = [Self::Water, Self::Forest, Self::Urban, Self::Vegetation];

    /// Integer label used in raster histograms.
    #[must_use]
    pub const fn label(self) -> i32 {
        self as i32
    }

    /// Looks up a class by its raster label.
    #[must_use]
    pub const fn from_label(label: i32) -> Option<Self> {
        match label {
            0 => Some(Self::Water),
            1 => Some(Self::Forest),
            2 => Some(Self::Urban),
            3 => Some(Self::Vegetation),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for class in DynamicWorldClass::ALL {
            assert_eq!(DynamicWorldClass::from_label(class.label()), Some(class));
        }
        for class in SpectralClass::ALL {
            assert_eq!(SpectralClass::from_label(class.label()), Some(class));
        }
        assert_eq!(DynamicWorldClass::from_label(9), None);
        assert_eq!(SpectralClass::from_label(-1), None);
    }

    #[test]
    fn only_flooded_vegetation_and_snow_are_excluded() {
        let excluded: Vec<_> = DynamicWorldClass::ALL
            .into_iter()
            .filter(|c| c.is_excluded())
            .collect();
        assert_eq!(
            excluded,
            vec![DynamicWorldClass::FloodedVegetation, DynamicWorldClass::SnowIce]
        );
    }
}
