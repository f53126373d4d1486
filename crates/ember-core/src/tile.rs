//! Tile driver: runs the decision tree over every pixel of a tile and
//! assembles the output grids.
//!
//! Rows are independent. With the `threading` feature they are evaluated in
//! parallel with rayon; results are stitched in row order either way, so the
//! outputs and the violation log are identical.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, CrossDriverTotals};
use crate::config::{ModelConfig, ValidationPolicy};
use crate::error::{EmissionsError, Result};
use crate::grid::Grid;
use crate::pixel::{ContractViolation, DriverCategory, PixelInputs};
use crate::tree::classify_and_compute;

/// Violations beyond this count per tile are logged at `debug`.
const WARN_LIMIT: usize = 16;
/// Violation records kept in the summary.
const SUMMARY_VIOLATION_LIMIT: usize = 256;

// ── Inputs ────────────────────────────────────────────────────────────────────

/// Same-shaped input layers, row-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputLayers {
    pub above_ground_carbon: Vec<f32>,
    pub below_ground_carbon: Vec<f32>,
    pub deadwood_carbon: Vec<f32>,
    pub litter_carbon: Vec<f32>,
    pub soil_carbon: Vec<f32>,
    pub loss_year: Vec<i32>,
    pub driver_class: Vec<i32>,
    pub peat_flag: Vec<f32>,
    pub burn_flag: Vec<f32>,
    pub ecozone: Vec<i32>,
    pub climate_zone: Vec<i32>,
    pub intact_forest_flag: Vec<f32>,
    pub plantation_type: Vec<i32>,
}

impl InputLayers {
    /// Every layer zero-filled to `len` pixels.
    pub fn zeroed(len: usize) -> Self {
        Self::from_pixels(&vec![PixelInputs::default(); len])
    }

    /// Split a row-major slice of pixel records into layers.
    pub fn from_pixels(pixels: &[PixelInputs]) -> Self {
        Self {
            above_ground_carbon: pixels.iter().map(|p| p.above_ground_carbon).collect(),
            below_ground_carbon: pixels.iter().map(|p| p.below_ground_carbon).collect(),
            deadwood_carbon: pixels.iter().map(|p| p.deadwood_carbon).collect(),
            litter_carbon: pixels.iter().map(|p| p.litter_carbon).collect(),
            soil_carbon: pixels.iter().map(|p| p.soil_carbon).collect(),
            loss_year: pixels.iter().map(|p| p.loss_year).collect(),
            driver_class: pixels.iter().map(|p| p.driver_class).collect(),
            peat_flag: pixels.iter().map(|p| p.peat_flag).collect(),
            burn_flag: pixels.iter().map(|p| p.burn_flag).collect(),
            ecozone: pixels.iter().map(|p| p.ecozone).collect(),
            climate_zone: pixels.iter().map(|p| p.climate_zone).collect(),
            intact_forest_flag: pixels.iter().map(|p| p.intact_forest_flag).collect(),
            plantation_type: pixels.iter().map(|p| p.plantation_type).collect(),
        }
    }

    /// Layer names with their pixel counts, in declaration order.
    pub fn lengths(&self) -> [(&'static str, usize); 13] {
        [
            ("above_ground_carbon", self.above_ground_carbon.len()),
            ("below_ground_carbon", self.below_ground_carbon.len()),
            ("deadwood_carbon", self.deadwood_carbon.len()),
            ("litter_carbon", self.litter_carbon.len()),
            ("soil_carbon", self.soil_carbon.len()),
            ("loss_year", self.loss_year.len()),
            ("driver_class", self.driver_class.len()),
            ("peat_flag", self.peat_flag.len()),
            ("burn_flag", self.burn_flag.len()),
            ("ecozone", self.ecozone.len()),
            ("climate_zone", self.climate_zone.len()),
            ("intact_forest_flag", self.intact_forest_flag.len()),
            ("plantation_type", self.plantation_type.len()),
        ]
    }

    #[inline]
    fn pixel(&self, i: usize) -> PixelInputs {
        PixelInputs {
            above_ground_carbon: self.above_ground_carbon[i],
            below_ground_carbon: self.below_ground_carbon[i],
            deadwood_carbon: self.deadwood_carbon[i],
            litter_carbon: self.litter_carbon[i],
            soil_carbon: self.soil_carbon[i],
            loss_year: self.loss_year[i],
            driver_class: self.driver_class[i],
            peat_flag: self.peat_flag[i],
            burn_flag: self.burn_flag[i],
            ecozone: self.ecozone[i],
            climate_zone: self.climate_zone[i],
            intact_forest_flag: self.intact_forest_flag[i],
            plantation_type: self.plantation_type[i],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileInputs {
    pub tile_id: String,
    pub width: usize,
    pub height: usize,
    pub layers: InputLayers,
}

impl TileInputs {
    /// Reject empty tiles and layers whose size differs from the tile's.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EmissionsError::EmptyTile {
                tile: self.tile_id.clone(),
                width: self.width,
                height: self.height,
            });
        }
        let expected = self.width * self.height;
        for (layer, actual) in self.layers.lengths() {
            if actual != expected {
                return Err(EmissionsError::LayerSizeMismatch {
                    tile: self.tile_id.clone(),
                    layer,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

// ── Outputs ───────────────────────────────────────────────────────────────────

/// A float output grid of a processed tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayer {
    /// All-gas emissions attributed to one driver.
    Driver(DriverCategory),
    AllGas,
    Co2Only,
    NonCo2,
    Ch4Only,
    N2oOnly,
}

impl OutputLayer {
    /// File stem used when writing the layer.
    pub fn name(self) -> String {
        match self {
            OutputLayer::Driver(d) => format!("gross_emis_all_gases_{}", d.slug()),
            OutputLayer::AllGas => "gross_emis_all_gases_all_drivers".to_string(),
            OutputLayer::Co2Only => "gross_emis_co2_only_all_drivers".to_string(),
            OutputLayer::NonCo2 => "gross_emis_non_co2_all_drivers".to_string(),
            OutputLayer::Ch4Only => "gross_emis_ch4_only_all_drivers".to_string(),
            OutputLayer::N2oOnly => "gross_emis_n2o_only_all_drivers".to_string(),
        }
    }
}

/// File stem of the node-code grid.
pub const NODE_CODE_LAYER: &str = "gross_emis_decision_tree_nodes";

/// A contract violation with its pixel coordinate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViolationRecord {
    pub row: usize,
    pub col: usize,
    pub field: &'static str,
    pub detail: String,
    pub violation: ContractViolation,
}

/// Per-tile diagnostics.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TileSummary {
    pub tile_id: String,
    pub revision: String,
    pub width: usize,
    pub height: usize,
    pub modeled_pixels: u64,
    /// Pixels with at least one contract violation.
    pub flagged_pixels: u64,
    pub total_violations: u64,
    pub node_histogram: BTreeMap<u16, u64>,
    /// The first violations in row-major order.
    pub violations: Vec<ViolationRecord>,
}

impl TileSummary {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileOutputs {
    pub tile_id: String,
    pub width: usize,
    pub height: usize,
    /// Indexed by [`DriverCategory::index`].
    pub per_driver: [Grid<f32>; 8],
    pub all_gas: Grid<f32>,
    pub co2_only: Grid<f32>,
    pub non_co2: Grid<f32>,
    pub ch4_only: Grid<f32>,
    pub n2o_only: Grid<f32>,
    pub node_code: Grid<u16>,
    pub summary: TileSummary,
}

impl TileOutputs {
    /// Every float grid with its layer tag: the eight per-driver grids, then
    /// the cross-driver grids.
    pub fn layers(&self) -> impl Iterator<Item = (OutputLayer, &Grid<f32>)> + '_ {
        DriverCategory::ALL
            .iter()
            .map(move |&d| (OutputLayer::Driver(d), &self.per_driver[d.index()]))
            .chain([
                (OutputLayer::AllGas, &self.all_gas),
                (OutputLayer::Co2Only, &self.co2_only),
                (OutputLayer::NonCo2, &self.non_co2),
                (OutputLayer::Ch4Only, &self.ch4_only),
                (OutputLayer::N2oOnly, &self.n2o_only),
            ])
    }
}

// ── Processing ────────────────────────────────────────────────────────────────

/// Owned results of one row.
struct RowOutput {
    per_driver: [Vec<f32>; 8],
    totals: Vec<CrossDriverTotals>,
    node_code: Vec<u16>,
    /// (col, violation), in column order.
    violations: Vec<(usize, ContractViolation)>,
    modeled: u64,
    flagged: u64,
}

fn process_row(tile: &TileInputs, cfg: &ModelConfig, row: usize) -> RowOutput {
    let w = tile.width;
    let mut out = RowOutput {
        per_driver: std::array::from_fn(|_| vec![0.0; w]),
        totals: Vec::with_capacity(w),
        node_code: Vec::with_capacity(w),
        violations: Vec::new(),
        modeled: 0,
        flagged: 0,
    };

    for col in 0..w {
        let eval = classify_and_compute(&tile.layers.pixel(row * w + col), cfg);
        let per_driver = eval.result.per_driver();
        if let Some(d) = eval.result.driver {
            out.per_driver[d.index()][col] = eval.result.all_gas();
            out.modeled += 1;
        }
        out.totals.push(aggregate(&per_driver));
        out.node_code.push(eval.result.node_code);
        if !eval.violations.is_empty() {
            out.flagged += 1;
            out.violations.extend(eval.violations.into_iter().map(|v| (col, v)));
        }
    }
    out
}

#[cfg(feature = "threading")]
fn process_rows(tile: &TileInputs, cfg: &ModelConfig) -> Vec<RowOutput> {
    use rayon::prelude::*;
    (0..tile.height).into_par_iter().map(|row| process_row(tile, cfg, row)).collect()
}

#[cfg(not(feature = "threading"))]
fn process_rows(tile: &TileInputs, cfg: &ModelConfig) -> Vec<RowOutput> {
    (0..tile.height).map(|row| process_row(tile, cfg, row)).collect()
}

/// Run the model over a whole tile.
///
/// Fails on invalid configuration, malformed layers, or, under
/// [`ValidationPolicy::Strict`], on the first contract violation in
/// row-major order. No partial output is returned on failure.
pub fn process_tile(tile: &TileInputs, cfg: &ModelConfig) -> Result<TileOutputs> {
    cfg.validate()?;
    tile.validate()?;

    info!(
        tile = %tile.tile_id,
        width = tile.width,
        height = tile.height,
        revision = %cfg.revision,
        "processing tile"
    );

    let rows = process_rows(tile, cfg);

    if cfg.validation == ValidationPolicy::Strict {
        for (row, r) in rows.iter().enumerate() {
            if let Some((col, v)) = r.violations.first() {
                return Err(EmissionsError::InputContract {
                    tile: tile.tile_id.clone(),
                    row,
                    col: *col,
                    field: v.field(),
                    detail: v.detail(),
                });
            }
        }
    }

    let (w, h) = (tile.width, tile.height);
    let mut per_driver: [Grid<f32>; 8] = std::array::from_fn(|_| Grid::new(w, h, 0.0));
    let mut all_gas = Grid::new(w, h, 0.0f32);
    let mut co2_only = Grid::new(w, h, 0.0f32);
    let mut non_co2 = Grid::new(w, h, 0.0f32);
    let mut ch4_only = Grid::new(w, h, 0.0f32);
    let mut n2o_only = Grid::new(w, h, 0.0f32);
    let mut node_code = Grid::new(w, h, 0u16);
    let mut summary = TileSummary {
        tile_id: tile.tile_id.clone(),
        revision: cfg.revision.clone(),
        width: w,
        height: h,
        ..TileSummary::default()
    };

    for (row, r) in rows.into_iter().enumerate() {
        for (grid, values) in per_driver.iter_mut().zip(&r.per_driver) {
            grid.row_mut(row).copy_from_slice(values);
        }
        for (col, t) in r.totals.iter().enumerate() {
            all_gas.set(row, col, t.all_gas);
            co2_only.set(row, col, t.co2_only);
            non_co2.set(row, col, t.non_co2);
            ch4_only.set(row, col, t.ch4_only);
            n2o_only.set(row, col, t.n2o_only);
        }
        node_code.row_mut(row).copy_from_slice(&r.node_code);
        for &code in r.node_code.iter().filter(|&&c| c != 0) {
            *summary.node_histogram.entry(code).or_insert(0) += 1;
        }

        summary.modeled_pixels += r.modeled;
        summary.flagged_pixels += r.flagged;
        for (col, v) in r.violations {
            let n = summary.total_violations as usize;
            if n < WARN_LIMIT {
                warn!(tile = %tile.tile_id, row, col, field = v.field(), "{}", v.detail());
            } else {
                debug!(tile = %tile.tile_id, row, col, field = v.field(), "{}", v.detail());
            }
            if n < SUMMARY_VIOLATION_LIMIT {
                summary.violations.push(ViolationRecord {
                    row,
                    col,
                    field: v.field(),
                    detail: v.detail(),
                    violation: v,
                });
            }
            summary.total_violations += 1;
        }
    }

    info!(
        tile = %tile.tile_id,
        modeled = summary.modeled_pixels,
        flagged = summary.flagged_pixels,
        "tile complete"
    );

    Ok(TileOutputs {
        tile_id: tile.tile_id.clone(),
        width: w,
        height: h,
        per_driver,
        all_gas,
        co2_only,
        non_co2,
        ch4_only,
        n2o_only,
        node_code,
        summary,
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_pixel() -> impl Strategy<Value = PixelInputs> {
        (0.0f32..300.0, 0i32..26, -1i32..9, 0.0f32..2.0, 0.0f32..2.0, 0i32..5, 0.0f32..2.0, 0i32..4)
            .prop_map(|(agc, ly, drv, peat, burn, eco, ifl, plant)| PixelInputs {
                above_ground_carbon: agc,
                below_ground_carbon: agc * 0.2,
                deadwood_carbon: 4.0,
                litter_carbon: 2.0,
                soil_carbon: 90.0,
                loss_year: ly,
                driver_class: drv,
                peat_flag: peat,
                burn_flag: burn,
                ecozone: eco,
                climate_zone: 11,
                intact_forest_flag: ifl,
                plantation_type: plant,
            })
    }

    proptest! {
        #[test]
        fn driver_grids_sum_to_all_gas(pixels in prop::collection::vec(arb_pixel(), 6)) {
            let t = TileInputs {
                tile_id: "prop".to_string(),
                width: 3,
                height: 2,
                layers: InputLayers::from_pixels(&pixels),
            };
            let out = process_tile(&t, &ModelConfig::current()).unwrap();
            for i in 0..6 {
                let sum: f32 = out.per_driver.iter().map(|g| g.data[i]).sum();
                let all = out.all_gas.data[i];
                prop_assert!((all - sum).abs() <= 1e-4 * all.abs().max(1.0));
                let parts = out.co2_only.data[i] + out.non_co2.data[i];
                prop_assert!((all - parts).abs() <= 1e-4 * all.abs().max(1.0));
            }
        }
    }
}
