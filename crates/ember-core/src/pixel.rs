//! Per-pixel input record and its categorical decoding.
//!
//! Raw categorical codes stay as `i32` in [`PixelInputs`] so out-of-range
//! values survive until [`PixelInputs::classify`], which maps them to the
//! nearest defined branch and reports a [`ContractViolation`].

use serde::{Deserialize, Serialize};

use crate::config::{DriverScheme, ModelConfig};

/// One pixel's worth of input layers, as read from the tile.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelInputs {
    /// t C/ha, or the carbon no-data sentinel.
    pub above_ground_carbon: f32,
    pub below_ground_carbon: f32,
    pub deadwood_carbon: f32,
    pub litter_carbon: f32,
    pub soil_carbon: f32,
    /// Model-relative loss year, 0 = no loss.
    pub loss_year: i32,
    pub driver_class: i32,
    /// > 0 means peat present.
    pub peat_flag: f32,
    /// > 0 means a burn was detected.
    pub burn_flag: f32,
    /// 1 tropical, 2 boreal, 3 temperate.
    pub ecozone: i32,
    /// IPCC climate zone, 1–12.
    pub climate_zone: i32,
    pub intact_forest_flag: f32,
    /// 0 none, 1 oil palm, 2 wood fiber, ≥3 other plantation.
    pub plantation_type: i32,
}

impl PixelInputs {
    /// A pixel enters the decision tree iff it has a loss year and positive
    /// above-ground carbon.
    #[inline]
    pub fn is_modeled(&self) -> bool {
        self.loss_year > 0 && self.above_ground_carbon > 0.0
    }

    /// Decode raw codes into the categorical state the tree splits on.
    ///
    /// Must only be called for pixels where [`Self::is_modeled`] holds.
    /// Violations are appended to `violations`; the returned state is always
    /// usable. The climate zone passes through unchecked since only leaves
    /// reading the F_lu table depend on it.
    pub fn classify(
        &self,
        cfg: &ModelConfig,
        violations: &mut Vec<ContractViolation>,
    ) -> ClassifiedPixel {
        let mut loss_year = self.loss_year;
        if loss_year > i32::from(cfg.model_years) {
            violations.push(ContractViolation::LossYearBeyondModel {
                loss_year,
                model_years: cfg.model_years,
            });
            loss_year = i32::from(cfg.model_years);
        }

        let driver = match DriverCategory::from_code(self.driver_class, cfg.profile.driver_scheme) {
            Some(d) => d,
            None => {
                violations.push(ContractViolation::UnknownDriver { value: self.driver_class });
                DriverCategory::NoDriver
            }
        };

        let ecozone = match EcoZone::from_code(self.ecozone) {
            EcoZone::Unknown => {
                violations.push(ContractViolation::UnknownEcozone { value: self.ecozone });
                EcoZone::Tropical
            }
            z => z,
        };

        let plantation = if self.plantation_type < 0 {
            violations.push(ContractViolation::NegativePlantation { value: self.plantation_type });
            PlantationType::None
        } else {
            PlantationType::from_code(self.plantation_type)
        };

        let pool = |v: f32| if cfg.is_carbon_nodata(v) { 0.0 } else { v };

        ClassifiedPixel {
            driver,
            peat: if self.peat_flag > 0.0 { PeatState::Peat } else { PeatState::Mineral },
            fire: if self.burn_flag > 0.0 { FireState::Burned } else { FireState::Unburned },
            ecozone,
            climate_zone: self.climate_zone,
            intact_forest: self.intact_forest_flag > 0.0,
            plantation,
            // Clamped above and positive by the modeled pre-check.
            loss_year: loss_year as u16,
            above_ground_carbon: self.above_ground_carbon,
            below_ground_carbon: pool(self.below_ground_carbon),
            deadwood_carbon: pool(self.deadwood_carbon),
            litter_carbon: pool(self.litter_carbon),
            soil_carbon: pool(self.soil_carbon),
        }
    }
}

/// Normalized pixel state after categorical decoding and no-data coercion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifiedPixel {
    pub driver: DriverCategory,
    pub peat: PeatState,
    pub fire: FireState,
    /// Never [`EcoZone::Unknown`].
    pub ecozone: EcoZone,
    pub climate_zone: i32,
    pub intact_forest: bool,
    pub plantation: PlantationType,
    /// In `1..=model_years`.
    pub loss_year: u16,
    pub above_ground_carbon: f32,
    pub below_ground_carbon: f32,
    pub deadwood_carbon: f32,
    pub litter_carbon: f32,
    pub soil_carbon: f32,
}

impl ClassifiedPixel {
    /// agc + bgc + deadwood + litter.
    #[inline]
    pub fn non_soil_carbon(&self) -> f32 {
        self.above_ground_carbon + self.below_ground_carbon + self.deadwood_carbon + self.litter_carbon
    }

    /// agc + bgc.
    #[inline]
    pub fn above_below_carbon(&self) -> f32 {
        self.above_ground_carbon + self.below_ground_carbon
    }
}

// ── Categorical types ─────────────────────────────────────────────────────────

/// Attributed cause of tree-cover loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverCategory {
    PermanentAgriculture,
    HardCommodities,
    ShiftingCultivation,
    ForestManagement,
    Wildfire,
    SettlementsInfrastructure,
    OtherDisturbances,
    NoDriver,
}

impl DriverCategory {
    pub const ALL: [DriverCategory; 8] = [
        DriverCategory::PermanentAgriculture,
        DriverCategory::HardCommodities,
        DriverCategory::ShiftingCultivation,
        DriverCategory::ForestManagement,
        DriverCategory::Wildfire,
        DriverCategory::SettlementsInfrastructure,
        DriverCategory::OtherDisturbances,
        DriverCategory::NoDriver,
    ];

    /// Decode a raw driver code. `0` is unclassified; `None` means the code is
    /// outside the scheme.
    pub fn from_code(code: i32, scheme: DriverScheme) -> Option<Self> {
        use DriverCategory::*;
        match scheme {
            DriverScheme::Current => match code {
                0 => Some(NoDriver),
                1 => Some(PermanentAgriculture),
                2 => Some(HardCommodities),
                3 => Some(ShiftingCultivation),
                4 => Some(ForestManagement),
                5 => Some(Wildfire),
                6 => Some(SettlementsInfrastructure),
                7 => Some(OtherDisturbances),
                _ => None,
            },
            DriverScheme::Legacy => match code {
                0 => Some(NoDriver),
                1 => Some(PermanentAgriculture),
                2 => Some(ShiftingCultivation),
                3 => Some(ForestManagement),
                4 => Some(Wildfire),
                5 => Some(SettlementsInfrastructure),
                _ => None,
            },
        }
    }

    /// Position in [`Self::ALL`]; indexes per-driver output buffers.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable name used in output layer names.
    pub fn slug(self) -> &'static str {
        match self {
            DriverCategory::PermanentAgriculture => "permanent_agriculture",
            DriverCategory::HardCommodities => "hard_commodities",
            DriverCategory::ShiftingCultivation => "shifting_cultivation",
            DriverCategory::ForestManagement => "forest_management",
            DriverCategory::Wildfire => "wildfire",
            DriverCategory::SettlementsInfrastructure => "settlements_infrastructure",
            DriverCategory::OtherDisturbances => "other_disturbances",
            DriverCategory::NoDriver => "no_driver",
        }
    }
}

/// FAO ecozone group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EcoZone {
    Tropical,
    Boreal,
    Temperate,
    Unknown,
}

impl EcoZone {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => EcoZone::Tropical,
            2 => EcoZone::Boreal,
            3 => EcoZone::Temperate,
            _ => EcoZone::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeatState {
    Peat,
    Mineral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireState {
    Burned,
    Unburned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlantationType {
    None,
    OilPalm,
    WoodFiber,
    Other,
}

impl PlantationType {
    /// Non-negative codes only; negatives are handled by the caller.
    pub fn from_code(code: i32) -> Self {
        match code {
            i32::MIN..=0 => PlantationType::None,
            1 => PlantationType::OilPalm,
            2 => PlantationType::WoodFiber,
            _ => PlantationType::Other,
        }
    }

    #[inline]
    pub fn is_present(self) -> bool {
        self != PlantationType::None
    }
}

// ── Contract violations ───────────────────────────────────────────────────────

/// An input value outside its defined range. The pixel is still computed
/// with the nearest defined branch unless the run is strict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContractViolation {
    NegativeLossYear { value: i32 },
    LossYearBeyondModel { loss_year: i32, model_years: u16 },
    UnknownDriver { value: i32 },
    UnknownEcozone { value: i32 },
    UnknownClimateZone { value: i32 },
    NegativePlantation { value: i32 },
}

impl ContractViolation {
    /// Name of the offending input field.
    pub fn field(&self) -> &'static str {
        match self {
            ContractViolation::NegativeLossYear { .. } | ContractViolation::LossYearBeyondModel { .. } => {
                "loss_year"
            }
            ContractViolation::UnknownDriver { .. } => "driver_class",
            ContractViolation::UnknownEcozone { .. } => "ecozone",
            ContractViolation::UnknownClimateZone { .. } => "climate_zone",
            ContractViolation::NegativePlantation { .. } => "plantation_type",
        }
    }

    /// Human-readable description including the fallback applied.
    pub fn detail(&self) -> String {
        match *self {
            ContractViolation::NegativeLossYear { value: y } => {
                format!("loss year {y} is negative; pixel not modeled")
            }
            ContractViolation::LossYearBeyondModel { loss_year, model_years } => format!(
                "loss year {loss_year} exceeds model_years {model_years}; clamped"
            ),
            ContractViolation::UnknownDriver { value: c } => {
                format!("driver code {c} is undefined; treated as no driver")
            }
            ContractViolation::UnknownEcozone { value: c } => {
                format!("ecozone code {c} is undefined; treated as tropical")
            }
            ContractViolation::UnknownClimateZone { value: c } => {
                format!("climate zone {c} is undefined; F_lu resolves to 0")
            }
            ContractViolation::NegativePlantation { value: c } => {
                format!("plantation code {c} is negative; treated as none")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PixelInputs {
        PixelInputs {
            above_ground_carbon: 100.0,
            below_ground_carbon: 20.0,
            deadwood_carbon: 5.0,
            litter_carbon: 3.0,
            soil_carbon: 135.0,
            loss_year: 3,
            driver_class: 2,
            ecozone: 1,
            climate_zone: 11,
            ..PixelInputs::default()
        }
    }

    #[test]
    fn modeled_requires_loss_and_agc() {
        assert!(base().is_modeled());
        assert!(!PixelInputs { loss_year: 0, ..base() }.is_modeled());
        assert!(!PixelInputs { above_ground_carbon: 0.0, ..base() }.is_modeled());
        assert!(!PixelInputs { above_ground_carbon: -9999.0, ..base() }.is_modeled());
        assert!(!PixelInputs { above_ground_carbon: f32::NAN, ..base() }.is_modeled());
    }

    #[test]
    fn driver_schemes_place_wildfire_differently() {
        assert_eq!(
            DriverCategory::from_code(5, DriverScheme::Current),
            Some(DriverCategory::Wildfire)
        );
        assert_eq!(
            DriverCategory::from_code(4, DriverScheme::Legacy),
            Some(DriverCategory::Wildfire)
        );
        assert_eq!(DriverCategory::from_code(7, DriverScheme::Legacy), None);
        assert_eq!(
            DriverCategory::from_code(0, DriverScheme::Current),
            Some(DriverCategory::NoDriver)
        );
    }

    #[test]
    fn driver_index_matches_all_order() {
        for (i, d) in DriverCategory::ALL.iter().enumerate() {
            assert_eq!(d.index(), i);
        }
    }

    #[test]
    fn clean_pixel_has_no_violations() {
        let mut v = Vec::new();
        let c = base().classify(&ModelConfig::current(), &mut v);
        assert!(v.is_empty(), "unexpected violations: {v:?}");
        assert_eq!(c.driver, DriverCategory::HardCommodities);
        assert_eq!(c.ecozone, EcoZone::Tropical);
        assert_eq!(c.peat, PeatState::Mineral);
        assert_eq!(c.fire, FireState::Unburned);
        assert_eq!(c.non_soil_carbon(), 128.0);
        assert_eq!(c.above_below_carbon(), 120.0);
    }

    #[test]
    fn nodata_pools_coerced_to_zero() {
        let px = PixelInputs {
            deadwood_carbon: -9999.0,
            litter_carbon: f32::NAN,
            ..base()
        };
        let mut v = Vec::new();
        let c = px.classify(&ModelConfig::current(), &mut v);
        assert_eq!(c.deadwood_carbon, 0.0);
        assert_eq!(c.litter_carbon, 0.0);
        assert_eq!(c.non_soil_carbon(), 120.0);
    }

    #[test]
    fn out_of_range_codes_fall_back_and_flag() {
        let px = PixelInputs {
            loss_year: 30,
            driver_class: 9,
            ecozone: 7,
            climate_zone: 0,
            plantation_type: -1,
            ..base()
        };
        let mut v = Vec::new();
        let c = px.classify(&ModelConfig::current(), &mut v);
        assert_eq!(c.loss_year, 24);
        assert_eq!(c.driver, DriverCategory::NoDriver);
        assert_eq!(c.ecozone, EcoZone::Tropical);
        assert_eq!(c.plantation, PlantationType::None);
        let fields: Vec<_> = v.iter().map(|x| x.field()).collect();
        // The climate zone is only checked where F_lu is looked up.
        assert_eq!(fields, ["loss_year", "driver_class", "ecozone", "plantation_type"]);
    }

    #[test]
    fn plantation_codes() {
        assert_eq!(PlantationType::from_code(0), PlantationType::None);
        assert_eq!(PlantationType::from_code(1), PlantationType::OilPalm);
        assert_eq!(PlantationType::from_code(2), PlantationType::WoodFiber);
        assert_eq!(PlantationType::from_code(3), PlantationType::Other);
        assert_eq!(PlantationType::from_code(17), PlantationType::Other);
    }
}
