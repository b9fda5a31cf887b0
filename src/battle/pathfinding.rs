//! A* pathfinding for battle maps
//!
//! Eight-way movement over per-tile entry costs. Rivers are impassable;
//! fords are the only crossing.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::battle::battle_map::MapDescriptor;
use crate::battle::grid::GridCoord;
use crate::core::error::{BattleError, Result};

/// A route across the map, start tile included
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub nodes: Vec<GridCoord>,
    /// Sum of entry costs of every tile after the start
    pub cost: f32,
}

impl Path {
    pub fn start(&self) -> Option<GridCoord> {
        self.nodes.first().copied()
    }

    pub fn end(&self) -> Option<GridCoord> {
        self.nodes.last().copied()
    }
}

/// Find path using A* algorithm
///
/// Heuristic is the Manhattan distance to the goal. Fails with
/// `MovementBlocked` carrying a readable reason when the goal cannot be
/// reached without crossing impassable terrain.
pub fn find_path(map: &MapDescriptor, start: GridCoord, goal: GridCoord) -> Result<Path> {
    if start == goal {
        return Ok(Path {
            nodes: vec![start],
            cost: 0.0,
        });
    }

    if !map.is_passable(goal) {
        return Err(BattleError::MovementBlocked(format!(
            "{} is {} terrain and impassable without a ford",
            goal,
            map.terrain_at(goal).label()
        )));
    }

    // Min-heap keyed by (f_cost, coord); coord breaks ties deterministically
    let mut open_set = BinaryHeap::new();
    let mut came_from: AHashMap<GridCoord, GridCoord> = AHashMap::new();
    let mut g_scores: AHashMap<GridCoord, f32> = AHashMap::new();

    g_scores.insert(start, 0.0);
    open_set.push(Reverse((
        OrderedFloat(start.manhattan_distance(&goal) as f32),
        start,
    )));

    while let Some(Reverse((_, current))) = open_set.pop() {
        if current == goal {
            let nodes = reconstruct_path(&came_from, current);
            let cost = g_scores.get(&goal).copied().unwrap_or(0.0);
            return Ok(Path { nodes, cost });
        }

        let current_g = g_scores.get(&current).copied().unwrap_or(f32::INFINITY);

        for neighbor in current.adjacent() {
            let move_cost = map.movement_cost(neighbor);
            if move_cost.is_infinite() {
                continue;
            }

            let tentative_g = current_g + move_cost;
            let neighbor_g = g_scores.get(&neighbor).copied().unwrap_or(f32::INFINITY);

            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current);
                g_scores.insert(neighbor, tentative_g);

                let f_cost = tentative_g + neighbor.manhattan_distance(&goal) as f32;
                open_set.push(Reverse((OrderedFloat(f_cost), neighbor)));
            }
        }
    }

    Err(BattleError::MovementBlocked(format!(
        "no path from {} to {} avoids impassable river terrain",
        start, goal
    )))
}

/// Reconstruct path from came_from map
fn reconstruct_path(
    came_from: &AHashMap<GridCoord, GridCoord>,
    mut current: GridCoord,
) -> Vec<GridCoord> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Calculate path cost (entry cost of every tile after the first)
pub fn path_cost(map: &MapDescriptor, path: &[GridCoord]) -> f32 {
    path.iter().skip(1).map(|coord| map.movement_cost(*coord)).sum()
}
