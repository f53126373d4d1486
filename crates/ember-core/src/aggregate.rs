//! Cross-driver totals.

use serde::Serialize;

use crate::factors::Gases;

/// Per-pixel sums across all eight drivers, in t CO2e/ha.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CrossDriverTotals {
    pub all_gas: f32,
    pub co2_only: f32,
    pub non_co2: f32,
    pub ch4_only: f32,
    pub n2o_only: f32,
}

/// Sum the per-driver gas triples. A pixel whose all-gas total is exactly 0
/// is no-data: every output is forced to 0.
pub fn aggregate(per_driver: &[Gases; 8]) -> CrossDriverTotals {
    let mut co2 = 0.0f32;
    let mut ch4 = 0.0f32;
    let mut n2o = 0.0f32;
    for g in per_driver {
        co2 += g.co2;
        ch4 += g.ch4;
        n2o += g.n2o;
    }

    let all_gas = co2 + ch4 + n2o;
    if all_gas == 0.0 {
        return CrossDriverTotals::default();
    }

    CrossDriverTotals { all_gas, co2_only: co2, non_co2: ch4 + n2o, ch4_only: ch4, n2o_only: n2o }
}
