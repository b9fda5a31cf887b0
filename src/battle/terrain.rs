//! Battle terrain types and their effects

use serde::{Deserialize, Serialize};

use crate::battle::constants::{
    FORD_COST, FOREST_COST, HILL_COST, MARSH_COST, PLAINS_COST, ROAD_COST,
};

/// Terrain of a single grid tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    #[default]
    Plains,
    Road,
    Hill,
    Forest,
    Marsh,
    Ford, // The only way across a river
    River,
}

impl Terrain {
    /// Default movement cost to enter a tile (infinite = impassable)
    pub fn default_movement_cost(&self) -> f32 {
        match self {
            Terrain::Plains => PLAINS_COST,
            Terrain::Road => ROAD_COST,
            Terrain::Hill => HILL_COST,
            Terrain::Forest => FOREST_COST,
            Terrain::Marsh => MARSH_COST,
            Terrain::Ford => FORD_COST,
            Terrain::River => f32::INFINITY,
        }
    }

    /// Rivers can only be crossed at fords
    pub fn is_impassable(&self) -> bool {
        matches!(self, Terrain::River)
    }

    pub fn is_elevated(&self) -> bool {
        matches!(self, Terrain::Hill)
    }

    /// Does standing here hide a unit from distant observers?
    pub fn provides_concealment(&self) -> bool {
        matches!(self, Terrain::Forest)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Terrain::Plains => "plains",
            Terrain::Road => "road",
            Terrain::Hill => "hill",
            Terrain::Forest => "forest",
            Terrain::Marsh => "marsh",
            Terrain::Ford => "ford",
            Terrain::River => "river",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "plains" | "plain" | "open" | "grass" => Some(Terrain::Plains),
            "road" => Some(Terrain::Road),
            "hill" | "hills" => Some(Terrain::Hill),
            "forest" | "woods" => Some(Terrain::Forest),
            "marsh" | "swamp" => Some(Terrain::Marsh),
            "ford" => Some(Terrain::Ford),
            "river" | "water" => Some(Terrain::River),
            _ => None,
        }
    }
}
