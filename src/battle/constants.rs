//! Battle system constants - fixed board geometry and engagement bands
//!
//! Tunable balance numbers live in `core::config::RulesConfig`; these are the
//! structural values the rules are expressed against.

// Board
pub const GRID_SIZE: u8 = 20;

// Engagement ranges (Chebyshev tiles)
pub const MELEE_RANGE: u32 = 1;
pub const RANGED_MIN_RANGE: u32 = 2;
pub const RANGED_MAX_RANGE: u32 = 3;

// Terrain movement costs (per tile entered)
pub const PLAINS_COST: f32 = 1.0;
pub const ROAD_COST: f32 = 0.5;
pub const HILL_COST: f32 = 1.5;
pub const FOREST_COST: f32 = 2.0;
pub const MARSH_COST: f32 = 3.0;
pub const FORD_COST: f32 = 1.5;

// Morale scale
pub const MAX_MORALE: i32 = 100;
