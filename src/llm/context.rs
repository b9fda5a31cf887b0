//! Battle context for LLM prompts
//!
//! Builds one side's view of the battle: its own units in full, and the
//! enemy only as far as that side has seen it.

use std::fmt::Write as _;

use crate::battle::battle_map::MapDescriptor;
use crate::battle::grid::GridCoord;
use crate::battle::state::BattleState;
use crate::battle::visibility::DetailLevel;
use crate::core::types::{Side, Turn};

/// A friendly unit the player might name in orders
pub struct OwnUnitSummary {
    pub unit_id: String,
    pub unit_type: String,
    pub position: GridCoord,
    pub strength: u32,
    pub max_strength: u32,
    pub formation: String,
    pub status: String,
    /// Target of an active multi-turn move
    pub mission_target: Option<GridCoord>,
}

/// Something known about an enemy
pub struct EnemyContact {
    pub position: GridCoord,
    pub detail: DetailLevel,
    pub last_seen_turn: Turn,
    pub estimated_strength: Option<u32>,
}

pub struct BattleContext {
    pub side: Side,
    pub turn: Turn,
    pub weather: String,
    pub terrain: String,
    pub culture: String,
    pub units: Vec<OwnUnitSummary>,
    pub contacts: Vec<EnemyContact>,
    pub objectives: Vec<String>,
}

impl BattleContext {
    pub fn from_state(state: &BattleState, side: Side, map: &MapDescriptor) -> Self {
        let army = state.army(side);
        let units = army
            .units
            .iter()
            .filter(|u| u.is_alive())
            .map(|u| {
                let status = if u.has_deserted {
                    "deserted"
                } else if u.is_routing {
                    "routing"
                } else if u.is_changing_formation() {
                    "reforming"
                } else {
                    "steady"
                };
                OwnUnitSummary {
                    unit_id: u.unit_id.to_string(),
                    unit_type: u.unit_type.label().to_string(),
                    position: u.position,
                    strength: u.current_strength,
                    max_strength: u.max_strength,
                    formation: u.formation.label().to_string(),
                    status: status.to_string(),
                    mission_target: u
                        .active_mission
                        .as_ref()
                        .filter(|m| m.is_active())
                        .map(|m| m.target),
                }
            })
            .collect();

        let contacts = state
            .intel_memory
            .get(side)
            .0
            .iter()
            .map(|(position, record)| EnemyContact {
                position: *position,
                detail: record.detail_level,
                last_seen_turn: record.last_seen_turn,
                estimated_strength: record.estimated_strength,
            })
            .collect();

        Self {
            side,
            turn: state.current_turn,
            weather: state.weather.label().to_string(),
            terrain: state.terrain.label().to_string(),
            culture: army.culture.label().to_string(),
            units,
            contacts,
            objectives: map
                .objectives
                .iter()
                .map(|o| format!("{} at {}", o.name, o.position))
                .collect(),
        }
    }

    /// Text summary of the context for LLM prompts
    pub fn summary(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "You command {} ({} army).", self.side, self.culture);
        let _ = writeln!(
            s,
            "Turn {}, weather {}, ground mostly {}.",
            self.turn, self.weather, self.terrain
        );

        s.push_str("\nYOUR UNITS:\n");
        for u in &self.units {
            let _ = write!(
                s,
                "- {} ({}) at {}: {}/{} men, {} formation, {}",
                u.unit_id,
                u.unit_type,
                u.position,
                u.strength,
                u.max_strength,
                u.formation,
                u.status
            );
            if let Some(target) = u.mission_target {
                let _ = write!(s, ", marching to {}", target);
            }
            s.push('\n');
        }

        s.push_str("\nKNOWN ENEMY POSITIONS:\n");
        if self.contacts.is_empty() {
            s.push_str("- none sighted\n");
        }
        for contact in &self.contacts {
            let _ = write!(
                s,
                "- {} ({:?}, last seen turn {})",
                contact.position, contact.detail, contact.last_seen_turn
            );
            if let Some(strength) = contact.estimated_strength {
                let _ = write!(s, ", about {} men", strength);
            }
            s.push('\n');
        }

        if !self.objectives.is_empty() {
            s.push_str("\nOBJECTIVES:\n");
            for objective in &self.objectives {
                let _ = writeln!(s, "- {}", objective);
            }
        }
        s
    }
}
