//! Emission factor resolution.
//!
//! Maps (ecozone, driver group, IFL, plantation, loss year) onto the
//! combustion factor, per-gas emission factors, and the peat burn and
//! drainage totals for one pixel. The table cells are IPCC-derived literals
//! and must stay literal.
//!
//! Units: emission factors are g gas / kg dry matter burnt. Peat-drain rates
//! are t CO2 / ha / yr for CO2 and kg gas / ha / yr for CH4 and N2O. All
//! resolved peat totals are t CO2e / ha.

use serde::Serialize;

use crate::config::ModelConfig;
use crate::pixel::{DriverCategory, EcoZone, PlantationType};

/// Per-gas triple.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Gases {
    pub co2: f32,
    pub ch4: f32,
    pub n2o: f32,
}

/// Resolved factors for one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EmissionFactors {
    pub combustion_factor: f32,
    /// g/kg dry matter.
    pub ghg_emission_factor: Gases,
    /// t CO2e/ha. Peat combustion emits no N2O, so `n2o` is always 0.
    pub peat_burn_emission: Gases,
    /// Annual drainage rate × remaining model years, t CO2e/ha.
    pub peat_drain_total_emission: Gases,
}

/// Inputs to [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorQuery {
    pub ecozone: EcoZone,
    pub driver: DriverCategory,
    pub intact_forest: bool,
    /// Carried alongside the other pixel categories; the factor tables do not
    /// split on it.
    pub climate_zone: i32,
    pub plantation: PlantationType,
    pub loss_year: u16,
}

/// Coarse driver grouping shared by the factor tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorGroup {
    /// Permanent agriculture, hard commodities, shifting cultivation,
    /// settlements and infrastructure.
    Conversion,
    ForestManagement,
    Wildfire,
    /// Other disturbances and unclassified loss.
    Natural,
}

impl FactorGroup {
    pub fn of(driver: DriverCategory) -> Self {
        match driver {
            DriverCategory::PermanentAgriculture
            | DriverCategory::HardCommodities
            | DriverCategory::ShiftingCultivation
            | DriverCategory::SettlementsInfrastructure => FactorGroup::Conversion,
            DriverCategory::ForestManagement => FactorGroup::ForestManagement,
            DriverCategory::Wildfire => FactorGroup::Wildfire,
            DriverCategory::OtherDisturbances | DriverCategory::NoDriver => FactorGroup::Natural,
        }
    }
}

// ── Literal tables ────────────────────────────────────────────────────────────

const EF_TROPICAL: Gases = Gases { co2: 1580.0, ch4: 6.8, n2o: 0.2 };
const EF_EXTRATROPICAL: Gases = Gases { co2: 1569.0, ch4: 4.7, n2o: 0.26 };

const CF_TROPICAL_IFL: f32 = 0.36;
const CF_TROPICAL_NON_IFL: f32 = 0.55;

/// Peat fire: fuel consumed (t dm/ha) and emission factors (g/kg).
struct PeatFire {
    fuel: f32,
    ef_co2: f32,
    ef_ch4: f32,
}

const PEAT_FIRE_BOREAL: PeatFire = PeatFire { fuel: 41.0, ef_co2: 1565.0, ef_ch4: 7.0 };
const PEAT_FIRE_TEMPERATE: PeatFire = PeatFire { fuel: 336.0, ef_co2: 1565.0, ef_ch4: 7.0 };
const PEAT_FIRE_TROPICAL: PeatFire = PeatFire { fuel: 353.0, ef_co2: 1703.0, ef_ch4: 20.8 };

const DRAIN_CONVERSION_BOREAL: Gases = Gases { co2: 29.0, ch4: 0.0, n2o: 20.4 };
const DRAIN_CONVERSION_TEMPERATE: Gases = Gases { co2: 29.0, ch4: 0.0, n2o: 20.4 };
const DRAIN_FOREST_BOREAL: Gases = Gases { co2: 3.4, ch4: 2.0, n2o: 5.0 };
const DRAIN_FOREST_TEMPERATE: Gases = Gases { co2: 9.5, ch4: 2.5, n2o: 4.4 };
const DRAIN_TROPICAL_OIL_PALM: Gases = Gases { co2: 40.3, ch4: 0.0, n2o: 1.9 };
const DRAIN_TROPICAL_WOOD_FIBER: Gases = Gases { co2: 73.3, ch4: 0.0, n2o: 3.8 };
const DRAIN_TROPICAL_OTHER: Gases = Gases { co2: 51.3, ch4: 7.0, n2o: 3.8 };

fn boreal_cf(group: FactorGroup) -> f32 {
    match group {
        FactorGroup::Conversion => 0.59,
        FactorGroup::ForestManagement => 0.33,
        FactorGroup::Wildfire => 0.34,
        FactorGroup::Natural => 0.40,
    }
}

fn temperate_cf(group: FactorGroup) -> f32 {
    match group {
        FactorGroup::Conversion => 0.51,
        FactorGroup::ForestManagement => 0.62,
        FactorGroup::Wildfire => 0.45,
        FactorGroup::Natural => 0.45,
    }
}

fn tropical_drain(plantation: PlantationType) -> Gases {
    match plantation {
        PlantationType::OilPalm => DRAIN_TROPICAL_OIL_PALM,
        PlantationType::WoodFiber => DRAIN_TROPICAL_WOOD_FIBER,
        PlantationType::Other | PlantationType::None => DRAIN_TROPICAL_OTHER,
    }
}

// ── Resolver ──────────────────────────────────────────────────────────────────

/// Resolve the emission factors for one pixel.
///
/// Total over its domain: an unknown ecozone takes the tropical emission
/// factors and peat tables with a combustion factor of 0.
pub fn resolve(q: &FactorQuery, cfg: &ModelConfig) -> EmissionFactors {
    let group = FactorGroup::of(q.driver);

    let (cf, ef, drain_annual, peat_fire) = match q.ecozone {
        EcoZone::Boreal => {
            let drain = match group {
                FactorGroup::Conversion => DRAIN_CONVERSION_BOREAL,
                _ => DRAIN_FOREST_BOREAL,
            };
            (boreal_cf(group), EF_EXTRATROPICAL, drain, PEAT_FIRE_BOREAL)
        }
        EcoZone::Temperate => {
            let drain = match group {
                FactorGroup::Conversion => DRAIN_CONVERSION_TEMPERATE,
                _ => DRAIN_FOREST_TEMPERATE,
            };
            (temperate_cf(group), EF_EXTRATROPICAL, drain, PEAT_FIRE_TEMPERATE)
        }
        EcoZone::Tropical => {
            let cf = if q.intact_forest { CF_TROPICAL_IFL } else { CF_TROPICAL_NON_IFL };
            (cf, EF_TROPICAL, tropical_drain(q.plantation), PEAT_FIRE_TROPICAL)
        }
        EcoZone::Unknown => (0.0, EF_TROPICAL, tropical_drain(q.plantation), PEAT_FIRE_TROPICAL),
    };

    // Negative if loss_year > model_years; the classifier clamps before calling.
    let remaining_years = (i32::from(cfg.model_years) - i32::from(q.loss_year)) as f32;

    let peat_burn_emission = Gases {
        co2: peat_fire.fuel * peat_fire.ef_co2 * 10f32.powi(-3),
        ch4: peat_fire.fuel * peat_fire.ef_ch4 * 10f32.powi(-3) * cfg.gwp.ch4_equiv,
        n2o: 0.0,
    };

    let peat_drain_total_emission = Gases {
        co2: drain_annual.co2 * remaining_years,
        ch4: drain_annual.ch4 * 10f32.powi(-3) * cfg.gwp.ch4_equiv * remaining_years,
        n2o: drain_annual.n2o * 10f32.powi(-3) * cfg.gwp.n2o_equiv * remaining_years,
    };

    EmissionFactors {
        combustion_factor: cf,
        ghg_emission_factor: ef,
        peat_burn_emission,
        peat_drain_total_emission,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn query(ecozone: EcoZone, driver: DriverCategory) -> FactorQuery {
        FactorQuery {
            ecozone,
            driver,
            intact_forest: false,
            climate_zone: 11,
            plantation: PlantationType::None,
            loss_year: 4,
        }
    }

    #[test]
    fn tropical_cf_depends_on_ifl() {
        let cfg = ModelConfig::current();
        let mut q = query(EcoZone::Tropical, DriverCategory::Wildfire);
        assert_eq!(resolve(&q, &cfg).combustion_factor, 0.55);
        q.intact_forest = true;
        assert_eq!(resolve(&q, &cfg).combustion_factor, 0.36);
    }

    #[test]
    fn extratropical_cf_depends_on_group() {
        let cfg = ModelConfig::current();
        let cf = |z, d| resolve(&query(z, d), &cfg).combustion_factor;
        assert_eq!(cf(EcoZone::Boreal, DriverCategory::PermanentAgriculture), 0.59);
        assert_eq!(cf(EcoZone::Boreal, DriverCategory::ForestManagement), 0.33);
        assert_eq!(cf(EcoZone::Boreal, DriverCategory::Wildfire), 0.34);
        assert_eq!(cf(EcoZone::Boreal, DriverCategory::NoDriver), 0.40);
        assert_eq!(cf(EcoZone::Temperate, DriverCategory::SettlementsInfrastructure), 0.51);
        assert_eq!(cf(EcoZone::Temperate, DriverCategory::ForestManagement), 0.62);
        assert_eq!(cf(EcoZone::Temperate, DriverCategory::OtherDisturbances), 0.45);
    }

    #[test]
    fn ifl_is_ignored_outside_tropics() {
        let cfg = ModelConfig::current();
        let mut q = query(EcoZone::Boreal, DriverCategory::Wildfire);
        let a = resolve(&q, &cfg);
        q.intact_forest = true;
        assert_eq!(a, resolve(&q, &cfg));
    }

    #[test]
    fn unknown_zone_defaults_to_tropical_tables_with_zero_cf() {
        let cfg = ModelConfig::current();
        let f = resolve(&query(EcoZone::Unknown, DriverCategory::HardCommodities), &cfg);
        assert_eq!(f.combustion_factor, 0.0);
        assert_eq!(f.ghg_emission_factor, EF_TROPICAL);
    }

    #[test]
    fn plantation_selects_tropical_drain_rate() {
        let cfg = ModelConfig::current();
        let mut q = query(EcoZone::Tropical, DriverCategory::PermanentAgriculture);
        let years = (cfg.model_years - q.loss_year) as f32;
        q.plantation = PlantationType::OilPalm;
        assert_abs_diff_eq!(resolve(&q, &cfg).peat_drain_total_emission.co2, 40.3 * years, epsilon = 1e-3);
        q.plantation = PlantationType::WoodFiber;
        assert_abs_diff_eq!(resolve(&q, &cfg).peat_drain_total_emission.co2, 73.3 * years, epsilon = 1e-3);
        q.plantation = PlantationType::Other;
        assert_abs_diff_eq!(resolve(&q, &cfg).peat_drain_total_emission.co2, 51.3 * years, epsilon = 1e-3);
    }

    #[test]
    fn peat_burn_has_no_n2o() {
        let cfg = ModelConfig::current();
        for z in [EcoZone::Tropical, EcoZone::Boreal, EcoZone::Temperate, EcoZone::Unknown] {
            let f = resolve(&query(z, DriverCategory::Wildfire), &cfg);
            assert_eq!(f.peat_burn_emission.n2o, 0.0);
            assert!(f.peat_burn_emission.co2 > 0.0);
        }
    }

    #[test]
    fn tropical_peat_burn_literals() {
        let cfg = ModelConfig::current();
        let f = resolve(&query(EcoZone::Tropical, DriverCategory::Wildfire), &cfg);
        assert_abs_diff_eq!(f.peat_burn_emission.co2, 353.0 * 1703.0 * 0.001, epsilon = 1e-2);
        assert_abs_diff_eq!(f.peat_burn_emission.ch4, 353.0 * 20.8 * 0.001 * 27.0, epsilon = 1e-2);
    }

    #[test]
    fn gwp_scales_non_co2_drain() {
        let cur = ModelConfig::current();
        let old = ModelConfig { gwp: crate::config::Gwp::AR5, ..ModelConfig::current() };
        let q = query(EcoZone::Boreal, DriverCategory::ForestManagement);
        let a = resolve(&q, &cur).peat_drain_total_emission;
        let b = resolve(&q, &old).peat_drain_total_emission;
        assert_eq!(a.co2, b.co2);
        assert!(b.ch4 > a.ch4, "AR5 CH4 multiplier is larger");
        assert!(b.n2o < a.n2o, "AR5 N2O multiplier is smaller");
    }

    #[test]
    fn drain_reaches_zero_at_final_model_year() {
        let cfg = ModelConfig::current();
        let mut q = query(EcoZone::Temperate, DriverCategory::HardCommodities);
        q.loss_year = cfg.model_years;
        let d = resolve(&q, &cfg).peat_drain_total_emission;
        assert_eq!(d, Gases::default());
    }
}
