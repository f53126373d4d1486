//! Per-pixel decision tree: classification, leaf selection and formula
//! evaluation.

pub mod formula;
pub mod leaf;

pub use formula::{CarbonPool, FireModel, FormulaFamily, LeafFormula, PeatTerm, SoilTerm};
pub use leaf::{describe_node, node_code, node_table, LeafKey, NodeEntry, TropicalCover, ZoneBranch};

use serde::Serialize;

use crate::config::ModelConfig;
use crate::factors::{resolve, FactorQuery, Gases};
use crate::flu::ClimateGroup;
use crate::pixel::{ContractViolation, DriverCategory, PixelInputs};

/// Output for one pixel, in t CO2e/ha.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EmissionResult {
    /// `None` for pixels outside the model.
    pub driver: Option<DriverCategory>,
    pub gases: Gases,
    /// 0 = not modeled.
    pub node_code: u16,
}

impl EmissionResult {
    pub const NOT_MODELED: EmissionResult =
        EmissionResult { driver: None, gases: Gases { co2: 0.0, ch4: 0.0, n2o: 0.0 }, node_code: 0 };

    #[inline]
    pub fn all_gas(&self) -> f32 {
        self.gases.co2 + self.gases.ch4 + self.gases.n2o
    }

    #[inline]
    pub fn non_co2(&self) -> f32 {
        self.gases.ch4 + self.gases.n2o
    }

    /// Spread the result over the eight driver slots. Only the active
    /// driver's slot is non-zero.
    pub fn per_driver(&self) -> [Gases; 8] {
        let mut out = [Gases::default(); 8];
        if let Some(d) = self.driver {
            out[d.index()] = self.gases;
        }
        out
    }
}

/// An [`EmissionResult`] together with the leaf reached and any contract
/// violations raised while classifying.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub result: EmissionResult,
    pub leaf: Option<LeafKey>,
    pub violations: Vec<ContractViolation>,
}

/// Classify one pixel and evaluate its leaf formula.
pub fn classify_and_compute(pixel: &PixelInputs, cfg: &ModelConfig) -> Evaluation {
    if !pixel.is_modeled() {
        let violations = if pixel.loss_year < 0 {
            vec![ContractViolation::NegativeLossYear { value: pixel.loss_year }]
        } else {
            Vec::new()
        };
        return Evaluation { result: EmissionResult::NOT_MODELED, leaf: None, violations };
    }

    let mut violations = Vec::new();
    let px = pixel.classify(cfg, &mut violations);
    let key = LeafKey::of(&px);

    let factors = resolve(
        &FactorQuery {
            ecozone: px.ecozone,
            driver: px.driver,
            intact_forest: px.intact_forest,
            climate_zone: px.climate_zone,
            plantation: px.plantation,
            loss_year: px.loss_year,
        },
        cfg,
    );

    let formula = FormulaFamily::of(px.driver, cfg).leaf(key);
    if formula.reads_climate_zone() && ClimateGroup::from_code(px.climate_zone).is_none() {
        violations.push(ContractViolation::UnknownClimateZone { value: px.climate_zone });
    }
    let gases = formula.evaluate(&px, &factors, cfg);

    Evaluation {
        result: EmissionResult { driver: Some(px.driver), gases, node_code: node_code(px.driver, key) },
        leaf: Some(key),
        violations,
    }
}
