//! Battle state aggregate
//!
//! Owned by the turn resolver for the duration of a turn. Phases work on a
//! clone; the caller's state only changes when a turn resolves.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::battle::commander::Commander;
use crate::battle::grid::GridCoord;
use crate::battle::terrain::Terrain;
use crate::battle::units::{Army, Unit};
use crate::battle::visibility::IntelMemory;
use crate::combat::environment::Weather;
use crate::core::types::{BattleId, PlayerId, Side, SidePair, Turn, UnitRef};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleState {
    #[serde(flatten)]
    pub armies: SidePair<Army>,
    /// Enemy positions each side saw at the end of the last turn
    #[serde(default)]
    pub visible_enemy_positions: SidePair<Vec<GridCoord>>,
    #[serde(default)]
    pub intel_memory: SidePair<IntelMemory>,
    #[serde(default)]
    pub weather: Weather,
    /// Prevailing terrain of the battlefield
    #[serde(default)]
    pub terrain: Terrain,
    /// Turn being resolved next
    #[serde(default = "first_turn")]
    pub current_turn: Turn,
    #[serde(default)]
    pub commanders: SidePair<Option<Commander>>,
}

fn first_turn() -> Turn {
    1
}

impl BattleState {
    pub fn new(player1: Army, player2: Army) -> Self {
        let mut state = Self {
            armies: SidePair::new(player1, player2),
            current_turn: first_turn(),
            ..Self::default()
        };
        for side in Side::all() {
            state.armies.get_mut(side).record_starting_strength();
        }
        state
    }

    pub fn army(&self, side: Side) -> &Army {
        self.armies.get(side)
    }

    pub fn army_mut(&mut self, side: Side) -> &mut Army {
        self.armies.get_mut(side)
    }

    pub fn unit(&self, unit: &UnitRef) -> Option<&Unit> {
        self.army(unit.side).get_unit(&unit.unit_id)
    }

    pub fn unit_mut(&mut self, unit: &UnitRef) -> Option<&mut Unit> {
        self.army_mut(unit.side).get_unit_mut(&unit.unit_id)
    }

    pub fn position_of(&self, unit: &UnitRef) -> Option<GridCoord> {
        self.unit(unit).map(|u| u.position)
    }

    /// Every unit's position, for diffing across a turn
    pub fn positions(&self) -> BTreeMap<UnitRef, GridCoord> {
        let mut positions = BTreeMap::new();
        for side in Side::all() {
            for unit in &self.army(side).units {
                positions.insert(UnitRef::new(side, unit.unit_id.clone()), unit.position);
            }
        }
        positions
    }
}

/// A battle as persisted between turns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleRecord {
    #[serde(default)]
    pub id: BattleId,
    pub player1_id: PlayerId,
    pub player2_id: PlayerId,
    pub current_turn: Turn,
    /// 0 means no turn limit
    #[serde(default)]
    pub max_turns: Turn,
    pub battle_state: BattleState,
}

impl BattleRecord {
    pub fn new(
        player1_id: PlayerId,
        player2_id: PlayerId,
        max_turns: Turn,
        battle_state: BattleState,
    ) -> Self {
        Self {
            id: BattleId::new(),
            player1_id,
            player2_id,
            current_turn: battle_state.current_turn,
            max_turns,
            battle_state,
        }
    }

    pub fn player_id(&self, side: Side) -> &PlayerId {
        match side {
            Side::Player1 => &self.player1_id,
            Side::Player2 => &self.player2_id,
        }
    }
}
