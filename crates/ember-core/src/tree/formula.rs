//! Leaf formulas.
//!
//! Each driver maps onto one of three formula families. The leaf key then
//! fixes which biomass, peat and mineral-soil terms apply. Evaluation works
//! in `f32` and keeps the `10^-3` g/kg → t scaling as a literal factor.

use crate::config::{DriverScheme, EmittedPools, ModelConfig, NoDriverRule};
use crate::factors::{EmissionFactors, Gases};
use crate::flu::flu;
use crate::pixel::{ClassifiedPixel, DriverCategory, FireState, PeatState};

use super::leaf::{LeafKey, TropicalCover, ZoneBranch};

/// Which carbon pools a family emits from biomass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarbonPool {
    /// agc + bgc + deadwood + litter.
    NonSoil,
    /// agc + bgc; dead organic matter is conserved.
    AboveBelow,
}

/// How burning partitions the biomass emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireModel {
    /// All carbon is emitted; the fire adds CH4 and N2O.
    Clearing,
    /// The combusted fraction emits through its emission factor, the rest
    /// decays to CO2.
    Natural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeatTerm {
    None,
    Drain,
    DrainAndBurn,
}

/// Source of the F_lu fraction in the mineral-soil term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FluSource {
    ClimateTable,
    Literal(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SoilTerm {
    None,
    Minsoil(FluSource),
}

/// Fully resolved formula of one leaf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeafFormula {
    pub pool: CarbonPool,
    /// `None` on unburned leaves.
    pub fire: Option<FireModel>,
    pub peat: PeatTerm,
    pub soil: SoilTerm,
}

/// Formula family a driver's sub-tree is built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormulaFamily {
    /// Land-use conversion: dead organic matter burns, soil carbon is lost.
    Conversion { soil: SoilTerm },
    ForestManagement,
    /// Wildfire and other natural disturbances.
    Natural,
}

impl FormulaFamily {
    pub fn of(driver: DriverCategory, cfg: &ModelConfig) -> Self {
        let profile = &cfg.profile;
        let soil_enabled = profile.emitted_pools == EmittedPools::BiomassSoil;
        let soil = |src: FluSource, enabled: bool| {
            if soil_enabled && enabled {
                SoilTerm::Minsoil(src)
            } else {
                SoilTerm::None
            }
        };
        let lit = &cfg.flu_literals;
        match driver {
            DriverCategory::PermanentAgriculture => FormulaFamily::Conversion {
                soil: soil(FluSource::ClimateTable, true),
            },
            DriverCategory::HardCommodities => FormulaFamily::Conversion {
                soil: soil(FluSource::Literal(lit.hard_commodities), true),
            },
            DriverCategory::ShiftingCultivation => FormulaFamily::Conversion {
                soil: soil(
                    FluSource::Literal(lit.shifting_cultivation),
                    profile.shifting_cultivation_soil,
                ),
            },
            DriverCategory::SettlementsInfrastructure => {
                let value = match profile.driver_scheme {
                    DriverScheme::Current => lit.settlements,
                    DriverScheme::Legacy => lit.urbanization,
                };
                FormulaFamily::Conversion { soil: soil(FluSource::Literal(value), true) }
            }
            DriverCategory::ForestManagement => FormulaFamily::ForestManagement,
            DriverCategory::Wildfire | DriverCategory::OtherDisturbances => FormulaFamily::Natural,
            DriverCategory::NoDriver => match profile.no_driver_rule {
                NoDriverRule::OtherDisturbances => FormulaFamily::Natural,
                NoDriverRule::ForestManagement => FormulaFamily::ForestManagement,
            },
        }
    }

    /// The formula at `key` within this family.
    pub fn leaf(self, key: LeafKey) -> LeafFormula {
        let cleared_peat = match (key.peat, key.fire) {
            (PeatState::Peat, FireState::Burned) => PeatTerm::DrainAndBurn,
            (PeatState::Peat, FireState::Unburned) => PeatTerm::Drain,
            (PeatState::Mineral, _) => PeatTerm::None,
        };
        match self {
            FormulaFamily::Conversion { soil } => LeafFormula {
                pool: CarbonPool::NonSoil,
                fire: fire_model(key.fire, FireModel::Clearing),
                peat: cleared_peat,
                soil: match key.peat {
                    PeatState::Peat => SoilTerm::None,
                    PeatState::Mineral => soil,
                },
            },
            FormulaFamily::ForestManagement => LeafFormula {
                pool: CarbonPool::AboveBelow,
                fire: fire_model(key.fire, FireModel::Clearing),
                peat: cleared_peat,
                soil: SoilTerm::None,
            },
            FormulaFamily::Natural => LeafFormula {
                pool: CarbonPool::AboveBelow,
                fire: fire_model(key.fire, FireModel::Natural),
                // Natural loss only oxidises peat that is burned or already
                // drained for a plantation.
                peat: match (key.peat, key.fire, key.zone) {
                    (PeatState::Peat, FireState::Burned, _) => PeatTerm::DrainAndBurn,
                    (
                        PeatState::Peat,
                        FireState::Unburned,
                        ZoneBranch::Tropical(TropicalCover::Plantation),
                    ) => PeatTerm::Drain,
                    (
                        PeatState::Peat,
                        FireState::Unburned,
                        ZoneBranch::Tropical(TropicalCover::Open | TropicalCover::IntactForest),
                    ) => PeatTerm::None,
                    (
                        PeatState::Peat,
                        FireState::Unburned,
                        ZoneBranch::Boreal | ZoneBranch::Temperate,
                    ) => PeatTerm::None,
                    (PeatState::Mineral, _, _) => PeatTerm::None,
                },
                soil: SoilTerm::None,
            },
        }
    }
}

fn fire_model(fire: FireState, model: FireModel) -> Option<FireModel> {
    match fire {
        FireState::Burned => Some(model),
        FireState::Unburned => None,
    }
}

/// Mineral-soil flux in the same units as the soil carbon input, amortized
/// over `soil_emission_period` and counted for the remaining model years.
pub fn minsoil(px: &ClassifiedPixel, flu_fraction: f32, cfg: &ModelConfig) -> f32 {
    let remaining_years = (i32::from(cfg.model_years) - i32::from(px.loss_year)) as f32;
    ((px.soil_carbon - px.soil_carbon * flu_fraction) / f32::from(cfg.soil_emission_period))
        * remaining_years
}

impl LeafFormula {
    /// True if the mineral-soil term looks F_lu up by climate zone.
    pub fn reads_climate_zone(&self) -> bool {
        self.soil == SoilTerm::Minsoil(FluSource::ClimateTable)
    }

    /// Evaluate the leaf for one pixel. Returns t CO2e/ha per gas.
    pub fn evaluate(&self, px: &ClassifiedPixel, factors: &EmissionFactors, cfg: &ModelConfig) -> Gases {
        let carbon = match self.pool {
            CarbonPool::NonSoil => px.non_soil_carbon(),
            CarbonPool::AboveBelow => px.above_below_carbon(),
        };

        let mut out = match self.fire {
            None => Gases { co2: carbon * cfg.c_to_co2, ch4: 0.0, n2o: 0.0 },
            Some(model) => {
                let cf = factors.combustion_factor;
                let ef = factors.ghg_emission_factor;
                let co2 = match model {
                    FireModel::Clearing => carbon * cfg.c_to_co2,
                    FireModel::Natural => {
                        (carbon / cfg.biomass_to_c) * cf * ef.co2 * 10f32.powi(-3)
                            + carbon * (1.0 - cf) * cfg.c_to_co2
                    }
                };
                Gases {
                    co2,
                    ch4: (carbon / cfg.biomass_to_c) * cf * ef.ch4 * 10f32.powi(-3) * cfg.gwp.ch4_equiv,
                    n2o: (carbon / cfg.biomass_to_c) * cf * ef.n2o * 10f32.powi(-3) * cfg.gwp.n2o_equiv,
                }
            }
        };

        let drain = factors.peat_drain_total_emission;
        let burn = factors.peat_burn_emission;
        match self.peat {
            PeatTerm::None => {}
            PeatTerm::Drain => {
                out.co2 += drain.co2;
                out.ch4 += drain.ch4;
                out.n2o += drain.n2o;
            }
            PeatTerm::DrainAndBurn => {
                out.co2 += drain.co2 + burn.co2;
                out.ch4 += drain.ch4 + burn.ch4;
                out.n2o += drain.n2o;
            }
        }

        if let SoilTerm::Minsoil(source) = self.soil {
            let fraction = match source {
                FluSource::ClimateTable => flu(px.climate_zone, px.ecozone, cfg.profile.flu_table),
                FluSource::Literal(v) => v,
            };
            out.co2 += minsoil(px, fraction, cfg);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelProfile;

    fn key(peat: PeatState, fire: FireState, zone: ZoneBranch) -> LeafKey {
        LeafKey { peat, fire, zone }
    }

    #[test]
    fn minsoil_only_on_mineral_conversion_leaves() {
        let cfg = ModelConfig::current();
        for driver in DriverCategory::ALL {
            let fam = FormulaFamily::of(driver, &cfg);
            for k in LeafKey::all() {
                let f = fam.leaf(k);
                if matches!(f.soil, SoilTerm::Minsoil(_)) {
                    assert_eq!(k.peat, PeatState::Mineral);
                    assert!(matches!(fam, FormulaFamily::Conversion { .. }), "{driver:?}");
                }
            }
        }
    }

    #[test]
    fn dead_organic_matter_only_in_conversion_families() {
        let cfg = ModelConfig::current();
        for driver in DriverCategory::ALL {
            let f = FormulaFamily::of(driver, &cfg).leaf(LeafKey::all()[0]);
            let expect = match driver {
                DriverCategory::PermanentAgriculture
                | DriverCategory::HardCommodities
                | DriverCategory::ShiftingCultivation
                | DriverCategory::SettlementsInfrastructure => CarbonPool::NonSoil,
                _ => CarbonPool::AboveBelow,
            };
            assert_eq!(f.pool, expect, "{driver:?}");
        }
    }

    #[test]
    fn no_driver_rule_selects_mirrored_family() {
        let mut cfg = ModelConfig::current();
        assert_eq!(FormulaFamily::of(DriverCategory::NoDriver, &cfg), FormulaFamily::Natural);
        cfg.profile.no_driver_rule = NoDriverRule::ForestManagement;
        assert_eq!(
            FormulaFamily::of(DriverCategory::NoDriver, &cfg),
            FormulaFamily::ForestManagement
        );
    }

    #[test]
    fn biomass_only_profile_drops_soil() {
        let mut cfg = ModelConfig::current();
        cfg.profile.emitted_pools = EmittedPools::BiomassOnly;
        assert_eq!(
            FormulaFamily::of(DriverCategory::PermanentAgriculture, &cfg),
            FormulaFamily::Conversion { soil: SoilTerm::None }
        );
    }

    #[test]
    fn legacy_profile_has_no_shifting_soil_and_urbanization_flu() {
        let cfg = ModelConfig { profile: ModelProfile::LEGACY, ..ModelConfig::current() };
        assert_eq!(
            FormulaFamily::of(DriverCategory::ShiftingCultivation, &cfg),
            FormulaFamily::Conversion { soil: SoilTerm::None }
        );
        assert_eq!(
            FormulaFamily::of(DriverCategory::SettlementsInfrastructure, &cfg),
            FormulaFamily::Conversion {
                soil: SoilTerm::Minsoil(FluSource::Literal(cfg.flu_literals.urbanization))
            }
        );
    }

    #[test]
    fn natural_unburned_peat_drains_only_under_plantation() {
        let fam = FormulaFamily::Natural;
        let p = |zone| fam.leaf(key(PeatState::Peat, FireState::Unburned, zone)).peat;
        assert_eq!(p(ZoneBranch::Tropical(TropicalCover::Plantation)), PeatTerm::Drain);
        assert_eq!(p(ZoneBranch::Tropical(TropicalCover::Open)), PeatTerm::None);
        assert_eq!(p(ZoneBranch::Tropical(TropicalCover::IntactForest)), PeatTerm::None);
        assert_eq!(p(ZoneBranch::Boreal), PeatTerm::None);
        assert_eq!(
            fam.leaf(key(PeatState::Peat, FireState::Burned, ZoneBranch::Temperate)).peat,
            PeatTerm::DrainAndBurn
        );
    }
}
