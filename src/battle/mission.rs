//! Multi-turn movement missions
//!
//! A mission exists only because an explicit move could not finish in one
//! turn. It completes on arrival or on contact, and is canceled by any new
//! explicit order for the unit.

use serde::{Deserialize, Serialize};

use crate::battle::grid::GridCoord;
use crate::battle::units::{Army, Unit};
use crate::core::error::{BattleError, Result};
use crate::core::types::{Turn, UnitId};
use crate::orders::actions::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionType {
    #[default]
    Move,
    /// Advance on a target position with intent to attack on arrival
    Attack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    #[default]
    Active,
    Complete,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    #[serde(rename = "type", default)]
    pub mission_type: MissionType,
    pub target: GridCoord,
    /// Where the unit stood when the mission was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<GridCoord>,
    pub start_turn: Turn,
    #[serde(default)]
    pub status: MissionStatus,
    /// Fraction of the original distance covered, 0.0 - 1.0
    #[serde(default)]
    pub progress: f32,
}

impl Mission {
    pub fn new(
        mission_type: MissionType,
        origin: GridCoord,
        target: GridCoord,
        start_turn: Turn,
    ) -> Self {
        Self {
            mission_type,
            target,
            origin: Some(origin),
            start_turn,
            status: MissionStatus::Active,
            progress: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MissionStatus::Active
    }

    /// Refresh progress from the unit's current position
    pub fn update_progress(&mut self, position: GridCoord) {
        let Some(origin) = self.origin else {
            return;
        };
        let total = origin.distance(&self.target);
        if total == 0 {
            self.progress = 1.0;
            return;
        }
        let remaining = position.distance(&self.target);
        self.progress = (1.0 - remaining as f32 / total as f32).clamp(0.0, 1.0);
    }

    pub fn complete(&mut self) {
        self.status = MissionStatus::Complete;
        self.progress = 1.0;
    }

    pub fn cancel(&mut self) {
        self.status = MissionStatus::Canceled;
    }
}

/// The move action that continues a unit's active mission
pub fn continuation_action(unit: &Unit) -> Result<Action> {
    match &unit.active_mission {
        Some(mission) if mission.is_active() => Ok(Action::Move {
            unit_id: unit.unit_id.clone(),
            target_position: mission.target,
        }),
        _ => Err(BattleError::NoActiveMission(unit.unit_id.clone())),
    }
}

/// One continuation per unit with an active mission and no explicit order
pub fn synthesize_continuations(army: &Army, explicitly_ordered: &[&UnitId]) -> Vec<Action> {
    army.units
        .iter()
        .filter(|u| u.is_alive())
        .filter(|u| !explicitly_ordered.contains(&&u.unit_id))
        .filter_map(|u| continuation_action(u).ok())
        .collect()
}
