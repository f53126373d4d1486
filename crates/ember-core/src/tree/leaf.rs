//! Decision-tree leaves and their node codes.
//!
//! A leaf is addressed by the driver family plus a [`LeafKey`], the ordered
//! splits peat → fire → ecozone → IFL → plantation. Node codes are a
//! published audit contract:
//!
//! ```text
//! node_code = family · 100 + group · 10 + unit
//!
//! family  1 permanent agriculture   2 hard commodities   3 shifting cultivation
//!         4 forest management       5 wildfire           6 settlements & infrastructure
//!         7 other disturbances      8 no driver
//!
//! group   1 peat, burned, tropical       2 peat, burned, boreal/temperate
//!         3 peat, unburned, tropical     4 peat, unburned, boreal/temperate
//!         5 mineral, burned, tropical    6 mineral, burned, boreal/temperate
//!         7 mineral, unburned, tropical  8 mineral, unburned, boreal/temperate
//!
//! unit    tropical:          1 outside IFL, no plantation
//!                            2 outside IFL, plantation
//!                            3 inside IFL
//!         boreal/temperate:  1 boreal   2 temperate
//! ```
//!
//! Code 0 is reserved for pixels that never enter the tree.

use serde::Serialize;

use crate::pixel::{ClassifiedPixel, DriverCategory, EcoZone, FireState, PeatState};

/// Tropical sub-branch: IFL first, then plantation presence outside IFL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TropicalCover {
    /// Outside intact forest, no plantation.
    Open,
    /// Outside intact forest, plantation present.
    Plantation,
    IntactForest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneBranch {
    Boreal,
    Temperate,
    Tropical(TropicalCover),
}

/// The categorical address of a leaf within one driver family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LeafKey {
    pub peat: PeatState,
    pub fire: FireState,
    pub zone: ZoneBranch,
}

impl LeafKey {
    /// Walk the categorical splits for a classified pixel.
    pub fn of(px: &ClassifiedPixel) -> Self {
        let zone = match px.ecozone {
            EcoZone::Boreal => ZoneBranch::Boreal,
            EcoZone::Temperate => ZoneBranch::Temperate,
            // Unknown zones are remapped to tropical during classification.
            EcoZone::Tropical | EcoZone::Unknown => {
                let cover = if px.intact_forest {
                    TropicalCover::IntactForest
                } else if px.plantation.is_present() {
                    TropicalCover::Plantation
                } else {
                    TropicalCover::Open
                };
                ZoneBranch::Tropical(cover)
            }
        };
        LeafKey { peat: px.peat, fire: px.fire, zone }
    }

    /// Every leaf within a family, in node-code order.
    pub fn all() -> Vec<LeafKey> {
        let zones = [
            ZoneBranch::Tropical(TropicalCover::Open),
            ZoneBranch::Tropical(TropicalCover::Plantation),
            ZoneBranch::Tropical(TropicalCover::IntactForest),
            ZoneBranch::Boreal,
            ZoneBranch::Temperate,
        ];
        let mut keys = Vec::with_capacity(20);
        for peat in [PeatState::Peat, PeatState::Mineral] {
            for fire in [FireState::Burned, FireState::Unburned] {
                for zone in zones {
                    keys.push(LeafKey { peat, fire, zone });
                }
            }
        }
        keys.sort_by_key(|k| node_code(DriverCategory::PermanentAgriculture, *k));
        keys
    }
}

fn family_digit(driver: DriverCategory) -> u16 {
    match driver {
        DriverCategory::PermanentAgriculture => 1,
        DriverCategory::HardCommodities => 2,
        DriverCategory::ShiftingCultivation => 3,
        DriverCategory::ForestManagement => 4,
        DriverCategory::Wildfire => 5,
        DriverCategory::SettlementsInfrastructure => 6,
        DriverCategory::OtherDisturbances => 7,
        DriverCategory::NoDriver => 8,
    }
}

/// Node code of the leaf reached by `key` in `driver`'s sub-tree.
pub fn node_code(driver: DriverCategory, key: LeafKey) -> u16 {
    use FireState::{Burned, Unburned};
    use PeatState::{Mineral, Peat};

    let group = match (key.peat, key.fire, key.zone) {
        (Peat, Burned, ZoneBranch::Tropical(_)) => 1,
        (Peat, Burned, ZoneBranch::Boreal | ZoneBranch::Temperate) => 2,
        (Peat, Unburned, ZoneBranch::Tropical(_)) => 3,
        (Peat, Unburned, ZoneBranch::Boreal | ZoneBranch::Temperate) => 4,
        (Mineral, Burned, ZoneBranch::Tropical(_)) => 5,
        (Mineral, Burned, ZoneBranch::Boreal | ZoneBranch::Temperate) => 6,
        (Mineral, Unburned, ZoneBranch::Tropical(_)) => 7,
        (Mineral, Unburned, ZoneBranch::Boreal | ZoneBranch::Temperate) => 8,
    };
    let unit = match key.zone {
        ZoneBranch::Tropical(TropicalCover::Open) => 1,
        ZoneBranch::Tropical(TropicalCover::Plantation) => 2,
        ZoneBranch::Tropical(TropicalCover::IntactForest) => 3,
        ZoneBranch::Boreal => 1,
        ZoneBranch::Temperate => 2,
    };
    family_digit(driver) * 100 + group * 10 + unit
}

/// One row of the published node-code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeEntry {
    pub driver: DriverCategory,
    pub leaf: LeafKey,
    pub node_code: u16,
}

/// Every (driver, leaf, code) triple, ordered by code.
pub fn node_table() -> Vec<NodeEntry> {
    let keys = LeafKey::all();
    DriverCategory::ALL
        .iter()
        .flat_map(|&driver| {
            keys.iter().map(move |&leaf| NodeEntry { driver, leaf, node_code: node_code(driver, leaf) })
        })
        .collect()
}

/// Human-readable path for a node code, or `None` if no leaf carries it.
pub fn describe_node(code: u16) -> Option<String> {
    if code == 0 {
        return Some("not modeled".to_string());
    }
    let entry = node_table().into_iter().find(|e| e.node_code == code)?;
    let peat = match entry.leaf.peat {
        PeatState::Peat => "peat",
        PeatState::Mineral => "mineral soil",
    };
    let fire = match entry.leaf.fire {
        FireState::Burned => "burned",
        FireState::Unburned => "not burned",
    };
    let zone = match entry.leaf.zone {
        ZoneBranch::Boreal => "boreal",
        ZoneBranch::Temperate => "temperate",
        ZoneBranch::Tropical(TropicalCover::Open) => "tropical, outside IFL, no plantation",
        ZoneBranch::Tropical(TropicalCover::Plantation) => "tropical, outside IFL, plantation",
        ZoneBranch::Tropical(TropicalCover::IntactForest) => "tropical, inside IFL",
    };
    Some(format!("{}: {peat}, {fire}, {zone}", entry.driver.slug()))
}
