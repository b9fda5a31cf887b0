//! Formation change state machine
//!
//! stable(formation) -> changing(target, remaining, penalty) -> stable(target)
//!
//! Phalanx and testudo take one full turn to assume: no movement that turn
//! and a defense penalty while exposed. Everything else changes instantly.
//! Rough ground and a weakened unit reject the change outright.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::battle::battle_map::MapDescriptor;
use crate::battle::terrain::Terrain;
use crate::battle::units::{Formation, FormationChange, Unit};
use crate::core::config::RulesConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FormationChangeOutcome {
    /// Already in the requested formation
    Unchanged,
    Instant { from: Formation, to: Formation },
    Started { target: Formation, turns: u32 },
    Rejected { reason: String },
}

impl FormationChangeOutcome {
    /// Does the change keep the unit from moving this turn?
    pub fn suppresses_movement(&self) -> bool {
        matches!(self, FormationChangeOutcome::Started { .. })
    }
}

/// Check the terrain and strength preconditions
pub fn check_formation_preconditions(
    unit: &Unit,
    target: Formation,
    terrain: Terrain,
    rules: &RulesConfig,
) -> Result<(), String> {
    if target.forbidden_on_rough_ground() && matches!(terrain, Terrain::Forest | Terrain::Marsh) {
        return Err(format!(
            "{} cannot form {} on {} terrain",
            unit.unit_id,
            target.label(),
            terrain.label()
        ));
    }

    let floor = rules.formation.strength_floor;
    if target.requires_strength() && unit.strength_ratio() < floor {
        return Err(format!(
            "{} is at {:.0}% strength; {} needs at least {:.0}%",
            unit.unit_id,
            unit.strength_ratio() * 100.0,
            target.label(),
            floor * 100.0
        ));
    }

    Ok(())
}

/// Request a formation change; rejection leaves the unit untouched
pub fn request_formation_change(
    unit: &mut Unit,
    target: Formation,
    map: &MapDescriptor,
    rules: &RulesConfig,
) -> FormationChangeOutcome {
    if unit.formation == target && unit.formation_change.is_none() {
        return FormationChangeOutcome::Unchanged;
    }

    let terrain = map.terrain_at(unit.position);
    if let Err(reason) = check_formation_preconditions(unit, target, terrain, rules) {
        warn!(unit = %unit.unit_id, %reason, "Formation change rejected");
        return FormationChangeOutcome::Rejected { reason };
    }

    if target.requires_preparation() && unit.formation != target {
        let turns = rules.formation.change_turns.max(1);
        unit.formation_change = Some(FormationChange {
            target_formation: target,
            remaining_turns: turns,
            defense_penalty: rules.positional.formation_change_penalty,
        });
        debug!(unit = %unit.unit_id, target = target.label(), turns, "Formation change started");
        return FormationChangeOutcome::Started { target, turns };
    }

    let from = unit.formation;
    unit.formation = target;
    unit.formation_change = None;
    debug!(unit = %unit.unit_id, from = from.label(), to = target.label(), "Formation changed");
    FormationChangeOutcome::Instant { from, to: target }
}

/// Tick an in-progress change at the start of a turn, returning the new
/// formation when it completes
pub fn advance_formation_change(unit: &mut Unit) -> Option<Formation> {
    let change = unit.formation_change.as_mut()?;
    change.remaining_turns = change.remaining_turns.saturating_sub(1);
    if change.remaining_turns > 0 {
        return None;
    }
    let target = change.target_formation;
    unit.formation = target;
    unit.formation_change = None;
    Some(target)
}
