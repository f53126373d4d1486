//! Mineral-soil land-use factor (F_lu).
//!
//! F_lu is the fraction of soil organic carbon retained after conversion to
//! long-term cultivation. It depends on the IPCC climate zone, grouped into
//! dry / wet / montane, and on whether the pixel is tropical.
//!
//! IPCC climate-zone codes:
//!   1 warm temperate moist   2 warm temperate dry    3 cool temperate moist
//!   4 cool temperate dry     5 polar moist           6 polar dry
//!   7 boreal moist           8 boreal dry            9 tropical montane
//!  10 tropical wet          11 tropical moist       12 tropical dry

use crate::config::FluTable;
use crate::pixel::EcoZone;

/// Moisture grouping of the twelve IPCC climate zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClimateGroup {
    Dry,
    Wet,
    Montane,
}

impl ClimateGroup {
    /// `None` for codes outside 1–12.
    pub fn from_code(climate_zone: i32) -> Option<Self> {
        match climate_zone {
            2 | 4 | 6 | 8 | 12 => Some(ClimateGroup::Dry),
            1 | 3 | 5 | 7 | 10 | 11 => Some(ClimateGroup::Wet),
            9 => Some(ClimateGroup::Montane),
            _ => None,
        }
    }
}

/// F_lu for the given climate zone and ecozone. Unrecognized combinations
/// return 0.
pub fn flu(climate_zone: i32, ecozone: EcoZone, table: FluTable) -> f32 {
    let Some(group) = ClimateGroup::from_code(climate_zone) else {
        return 0.0;
    };
    match table {
        FluTable::Current => match (ecozone, group) {
            (EcoZone::Tropical, ClimateGroup::Dry) => 0.92,
            (EcoZone::Tropical, ClimateGroup::Wet) => 0.83,
            (EcoZone::Tropical, ClimateGroup::Montane) => 0.88,
            (EcoZone::Boreal | EcoZone::Temperate, ClimateGroup::Dry) => 0.77,
            (EcoZone::Boreal | EcoZone::Temperate, ClimateGroup::Wet) => 0.70,
            (EcoZone::Boreal | EcoZone::Temperate, ClimateGroup::Montane) => 0.0,
            (EcoZone::Unknown, _) => 0.0,
        },
        FluTable::Legacy => match (ecozone, group) {
            (EcoZone::Tropical, ClimateGroup::Dry) => 0.58,
            (EcoZone::Tropical, ClimateGroup::Wet) => 0.48,
            (EcoZone::Tropical, ClimateGroup::Montane) => 0.64,
            (EcoZone::Boreal | EcoZone::Temperate, ClimateGroup::Dry) => 0.80,
            (EcoZone::Boreal | EcoZone::Temperate, ClimateGroup::Wet) => 0.69,
            (EcoZone::Boreal | EcoZone::Temperate, ClimateGroup::Montane) => 0.0,
            (EcoZone::Unknown, _) => 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_zone_code_has_a_group() {
        for code in 1..=12 {
            assert!(ClimateGroup::from_code(code).is_some(), "zone {code} ungrouped");
        }
        assert!(ClimateGroup::from_code(0).is_none());
        assert!(ClimateGroup::from_code(13).is_none());
    }

    #[test]
    fn current_tropical_values() {
        assert_eq!(flu(12, EcoZone::Tropical, FluTable::Current), 0.92);
        assert_eq!(flu(11, EcoZone::Tropical, FluTable::Current), 0.83);
        assert_eq!(flu(10, EcoZone::Tropical, FluTable::Current), 0.83);
        assert_eq!(flu(9, EcoZone::Tropical, FluTable::Current), 0.88);
    }

    #[test]
    fn current_extratropical_values() {
        assert_eq!(flu(4, EcoZone::Temperate, FluTable::Current), 0.77);
        assert_eq!(flu(7, EcoZone::Boreal, FluTable::Current), 0.70);
        assert_eq!(flu(9, EcoZone::Boreal, FluTable::Current), 0.0);
    }

    #[test]
    fn legacy_table_is_distinct() {
        assert_eq!(flu(12, EcoZone::Tropical, FluTable::Legacy), 0.58);
        assert_eq!(flu(1, EcoZone::Temperate, FluTable::Legacy), 0.69);
        assert_ne!(
            flu(11, EcoZone::Tropical, FluTable::Legacy),
            flu(11, EcoZone::Tropical, FluTable::Current)
        );
    }

    #[test]
    fn unrecognized_inputs_return_zero() {
        assert_eq!(flu(0, EcoZone::Tropical, FluTable::Current), 0.0);
        assert_eq!(flu(11, EcoZone::Unknown, FluTable::Current), 0.0);
        assert_eq!(flu(-3, EcoZone::Boreal, FluTable::Legacy), 0.0);
    }

    #[test]
    fn values_are_fractions() {
        for table in [FluTable::Current, FluTable::Legacy] {
            for zone in [EcoZone::Tropical, EcoZone::Boreal, EcoZone::Temperate, EcoZone::Unknown] {
                for code in -1..=13 {
                    let v = flu(code, zone, table);
                    assert!((0.0..=1.0).contains(&v), "flu({code}, {zone:?}) = {v}");
                }
            }
        }
    }
}
