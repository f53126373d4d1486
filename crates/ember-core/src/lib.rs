//! Gross greenhouse-gas emissions from tree-cover loss.
//!
//! Per pixel, a decision tree keyed on loss driver, peat, fire, ecozone,
//! intact-forest status and plantation type selects one emission formula.
//! Outputs are t CO2e/ha per driver and per gas, plus a node code that
//! identifies the leaf reached.
//!
//! ```text
//! PixelInputs ──classify──▶ ClassifiedPixel ──LeafKey──▶ LeafFormula
//!                                  │                         │
//!                           factors::resolve ─────────▶ evaluate ──▶ EmissionResult
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod factors;
pub mod flu;
pub mod grid;
pub mod pixel;
pub mod tile;
pub mod tree;

pub use aggregate::{aggregate, CrossDriverTotals};
pub use config::{ModelConfig, ModelProfile, ValidationPolicy};
pub use error::{EmissionsError, Result};
pub use factors::{EmissionFactors, Gases};
pub use grid::Grid;
pub use pixel::{ContractViolation, DriverCategory, PixelInputs};
pub use tile::{process_tile, InputLayers, OutputLayer, TileInputs, TileOutputs, TileSummary};
pub use tree::{classify_and_compute, describe_node, node_table, EmissionResult, Evaluation};
