//! Versioned model constants and the profile selecting between model variants.
//!
//! Constants that changed between model revisions (GWP multipliers, the
//! span of the loss archive, F_lu literals) are carried here explicitly and
//! passed into every resolver, never read from global state.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EmissionsError, Result};

// ── Enumerated profile switches ───────────────────────────────────────────────

/// How raw driver codes decode into [`DriverCategory`](crate::pixel::DriverCategory).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverScheme {
    /// Seven-class driver map: 1 permanent agriculture … 7 other disturbances.
    Current,
    /// Five-class driver map: commodity, shifting agriculture, forestry,
    /// wildfire, urbanization.
    Legacy,
}

/// Which formula family unclassified pixels borrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDriverRule {
    OtherDisturbances,
    ForestManagement,
}

/// Parameterization of the mineral-soil F_lu table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FluTable {
    Current,
    /// Superseded values, kept for reproducing earlier published outputs.
    Legacy,
}

/// Which carbon pools are counted as emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmittedPools {
    /// Biomass and dead organic matter plus the mineral-soil flux.
    BiomassSoil,
    /// Biomass and dead organic matter only.
    BiomassOnly,
}

/// What happens when a pixel violates the input contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// Compute with the nearest defined branch and record a diagnostic.
    Flag,
    /// Abort the tile at the first violation.
    Strict,
}

// ── Constant groups ───────────────────────────────────────────────────────────

/// Global-warming-potential multipliers (100-year horizon).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gwp {
    pub ch4_equiv: f32,
    pub n2o_equiv: f32,
}

impl Gwp {
    /// IPCC AR5 values.
    pub const AR5: Gwp = Gwp { ch4_equiv: 28.0, n2o_equiv: 265.0 };
    /// IPCC AR6 values (non-fossil CH4).
    pub const AR6: Gwp = Gwp { ch4_equiv: 27.0, n2o_equiv: 273.0 };
}

impl Default for Gwp {
    fn default() -> Self {
        Self::AR6
    }
}

/// Fixed fraction of soil carbon retained after conversion, per driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluLiterals {
    pub shifting_cultivation: f32,
    pub settlements: f32,
    pub hard_commodities: f32,
    /// Used for the settlements family under the legacy driver scheme.
    pub urbanization: f32,
}

impl Default for FluLiterals {
    fn default() -> Self {
        Self {
            shifting_cultivation: 0.72,
            settlements: 0.80,
            hard_commodities: 0.80,
            urbanization: 0.80,
        }
    }
}

/// Selects one of the coexisting model variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelProfile {
    pub driver_scheme: DriverScheme,
    pub no_driver_rule: NoDriverRule,
    pub flu_table: FluTable,
    pub emitted_pools: EmittedPools,
    /// Whether shifting cultivation carries a mineral-soil term.
    pub shifting_cultivation_soil: bool,
}

impl ModelProfile {
    pub const CURRENT: ModelProfile = ModelProfile {
        driver_scheme: DriverScheme::Current,
        no_driver_rule: NoDriverRule::OtherDisturbances,
        flu_table: FluTable::Current,
        emitted_pools: EmittedPools::BiomassSoil,
        shifting_cultivation_soil: true,
    };

    pub const LEGACY: ModelProfile = ModelProfile {
        driver_scheme: DriverScheme::Legacy,
        no_driver_rule: NoDriverRule::ForestManagement,
        flu_table: FluTable::Legacy,
        emitted_pools: EmittedPools::BiomassSoil,
        shifting_cultivation_soil: false,
    };
}

impl Default for ModelProfile {
    fn default() -> Self {
        Self::CURRENT
    }
}

// ── ModelConfig ───────────────────────────────────────────────────────────────

/// Every constant the emissions model consumes.
///
/// Deserialisation fills missing fields from [`ModelConfig::current`], so a
/// JSON override only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Free-form revision tag written into run summaries.
    pub revision: String,
    /// Number of years spanned by the loss archive.
    pub model_years: u16,
    pub gwp: Gwp,
    /// Mass ratio CO2 : C (44/12).
    pub c_to_co2: f32,
    /// Carbon fraction of dry biomass.
    pub biomass_to_c: f32,
    /// Years over which the mineral-soil flux is amortized.
    pub soil_emission_period: u16,
    pub flu_literals: FluLiterals,
    pub profile: ModelProfile,
    /// No-data sentinel written by the carbon-pool stage.
    pub carbon_nodata: f32,
    pub validation: ValidationPolicy,
}

impl ModelConfig {
    /// The authoritative parameterization.
    pub fn current() -> Self {
        Self {
            revision: "2024-soil".to_string(),
            model_years: 24,
            gwp: Gwp::AR6,
            c_to_co2: 44.0 / 12.0,
            biomass_to_c: 0.47,
            soil_emission_period: 20,
            flu_literals: FluLiterals::default(),
            profile: ModelProfile::CURRENT,
            carbon_nodata: -9999.0,
            validation: ValidationPolicy::Flag,
        }
    }

    /// The five-driver parameterization that preceded the current one.
    pub fn legacy() -> Self {
        Self {
            revision: "2020-legacy".to_string(),
            model_years: 20,
            gwp: Gwp::AR5,
            profile: ModelProfile::LEGACY,
            ..Self::current()
        }
    }

    /// Parse a JSON document, filling unspecified fields from [`Self::current`],
    /// then validate it.
    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_json_over(text, &Self::current())
    }

    /// Parse a JSON override on top of `base`. Nested objects merge field by
    /// field, so unspecified fields keep `base`'s values.
    pub fn from_json_over(text: &str, base: &ModelConfig) -> Result<Self> {
        let parse_err = |e: serde_json::Error| EmissionsError::ConfigParse(e.to_string());
        let overrides: Value = serde_json::from_str(text).map_err(parse_err)?;
        let mut merged = serde_json::to_value(base).map_err(parse_err)?;
        merge_json(&mut merged, overrides);
        let cfg: ModelConfig = serde_json::from_value(merged).map_err(parse_err)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject constants that would make the model meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.model_years == 0 {
            return Err(EmissionsError::InvalidConfig("model_years must be > 0".into()));
        }
        if self.soil_emission_period == 0 {
            return Err(EmissionsError::InvalidConfig(
                "soil_emission_period must be > 0".into(),
            ));
        }
        let positive = [
            ("c_to_co2", self.c_to_co2),
            ("biomass_to_c", self.biomass_to_c),
            ("gwp.ch4_equiv", self.gwp.ch4_equiv),
            ("gwp.n2o_equiv", self.gwp.n2o_equiv),
        ];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(EmissionsError::InvalidConfig(format!("{name} must be > 0, got {v}")));
            }
        }
        let fractions = [
            ("flu_literals.shifting_cultivation", self.flu_literals.shifting_cultivation),
            ("flu_literals.settlements", self.flu_literals.settlements),
            ("flu_literals.hard_commodities", self.flu_literals.hard_commodities),
            ("flu_literals.urbanization", self.flu_literals.urbanization),
        ];
        for (name, v) in fractions {
            if !(0.0..=1.0).contains(&v) {
                return Err(EmissionsError::InvalidConfig(format!(
                    "{name} must lie in [0, 1], got {v}"
                )));
            }
        }
        Ok(())
    }

    /// True if `v` is the carbon-pool no-data value (sentinel or NaN).
    #[inline]
    pub fn is_carbon_nodata(&self, v: f32) -> bool {
        v.is_nan() || v == self.carbon_nodata
    }
}

fn merge_json(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::current()
    }
}
