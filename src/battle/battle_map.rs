//! Map descriptor: static terrain lookup tables for one battle
//!
//! Maps are authored elsewhere and consumed read-only. Terrain is sparse:
//! tiles absent from `terrain` use `default_terrain`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::battle::grid::GridCoord;
use crate::battle::terrain::Terrain;

/// Extra combat modifiers a map grants on a terrain type (stat points)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TerrainCombatModifier {
    /// Added to the attack of a unit attacking from this terrain
    #[serde(default)]
    pub attack: i32,
    /// Added to the defense of a unit defending on this terrain
    #[serde(default)]
    pub defense: i32,
}

/// Objective on the battle map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub name: String,
    pub position: GridCoord,
    #[serde(default)]
    pub description: String,
}

/// The full map descriptor handed to each turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub default_terrain: Terrain,
    #[serde(default)]
    pub terrain: HashMap<GridCoord, Terrain>,
    /// Per-terrain movement cost overrides, keyed by terrain label
    #[serde(default)]
    pub movement_costs: HashMap<String, f32>,
    /// Per-terrain combat modifiers, keyed by terrain label
    #[serde(default)]
    pub combat_modifiers: HashMap<String, TerrainCombatModifier>,
    #[serde(default)]
    pub objectives: Vec<Objective>,
}

impl MapDescriptor {
    /// Create a map of uniform terrain
    pub fn new(default_terrain: Terrain) -> Self {
        Self {
            default_terrain,
            ..Self::default()
        }
    }

    /// Open plains everywhere
    pub fn open_field() -> Self {
        Self::new(Terrain::Plains)
    }

    pub fn terrain_at(&self, coord: GridCoord) -> Terrain {
        self.terrain
            .get(&coord)
            .copied()
            .unwrap_or(self.default_terrain)
    }

    pub fn set_terrain(&mut self, coord: GridCoord, terrain: Terrain) {
        self.terrain.insert(coord, terrain);
    }

    /// Cost to enter a tile; infinite when impassable
    pub fn movement_cost(&self, coord: GridCoord) -> f32 {
        let terrain = self.terrain_at(coord);
        if terrain.is_impassable() {
            return f32::INFINITY;
        }
        match self.movement_costs.get(terrain.label()) {
            Some(cost) if cost.is_finite() && *cost > 0.0 => *cost,
            _ => terrain.default_movement_cost(),
        }
    }

    pub fn is_passable(&self, coord: GridCoord) -> bool {
        self.movement_cost(coord).is_finite()
    }

    pub fn combat_modifier(&self, terrain: Terrain) -> TerrainCombatModifier {
        self.combat_modifiers
            .get(terrain.label())
            .copied()
            .unwrap_or_default()
    }
}
