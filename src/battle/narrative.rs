//! Turn narrative
//!
//! The narrative request is the payload handed to a storyteller once a
//! turn has resolved. `TemplateNarrator` always works and is the fallback
//! whenever prose generation is disabled or fails.

use std::fmt::Write as _;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::battle::commander::CommanderEvent;
use crate::battle::grid::GridCoord;
use crate::battle::morale::MoraleEvent;
use crate::battle::movement::MovementRecord;
use crate::battle::terrain::Terrain;
use crate::battle::victory::VictoryResult;
use crate::combat::adapter::CombatReport;
use crate::combat::environment::Weather;
use crate::core::error::Result;
use crate::core::types::{BattleId, SidePair, Turn, UnitRef};

/// Losses one unit took this turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CasualtyRecord {
    pub unit: UnitRef,
    pub losses: u32,
    pub remaining: u32,
}

/// A unit that changed tiles this turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionChange {
    pub unit: UnitRef,
    pub from: GridCoord,
    pub to: GridCoord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeRequest {
    pub battle_id: BattleId,
    pub turn: Turn,
    pub weather: Weather,
    pub terrain: Terrain,
    pub movements: Vec<MovementRecord>,
    pub combats: Vec<CombatReport>,
    pub casualties: Vec<CasualtyRecord>,
    pub total_casualties: SidePair<u32>,
    pub destroyed: Vec<UnitRef>,
    pub morale_events: Vec<MoraleEvent>,
    pub commander_events: Vec<CommanderEvent>,
    pub position_changes: Vec<PositionChange>,
    pub victory: VictoryResult,
}

pub trait NarrativeGenerator {
    fn generate(&self, request: &NarrativeRequest) -> impl Future<Output = Result<String>> + Send;
}

/// Plain deterministic summary of a turn
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrator;

impl TemplateNarrator {
    pub fn render(request: &NarrativeRequest) -> String {
        let mut s = String::new();
        let _ = write!(
            s,
            "Turn {} under {} skies over {}.",
            request.turn,
            request.weather.label(),
            request.terrain.label()
        );

        let moved = request.position_changes.len();
        if moved > 0 {
            let plural = if moved == 1 { "" } else { "s" };
            let _ = write!(s, " {} unit{} changed position.", moved, plural);
        }

        for combat in &request.combats {
            let e = &combat.engagement;
            let r = &combat.result;
            let _ = write!(
                s,
                " At {}, {} met {}: {} (ratio {:.2}), losses {} and {}.",
                e.location,
                e.attacker,
                e.defender,
                r.result_label.label().replace('_', " "),
                r.ratio,
                r.casualties.attacker,
                r.casualties.defender
            );
        }

        for unit in &request.destroyed {
            let _ = write!(s, " {} was destroyed.", unit);
        }
        for event in &request.morale_events {
            let verb = if event.deserted { "deserted" } else { "broke and fled" };
            let _ = write!(s, " {} {}.", event.unit, verb);
        }
        for event in &request.commander_events {
            match event {
                CommanderEvent::AtRisk { side, position } => {
                    let _ = write!(s, " The {} commander is in danger at {}.", side, position);
                }
                CommanderEvent::Resolved { side, status, .. } => {
                    let _ = write!(s, " The {} commander is {:?}.", side, status);
                }
                CommanderEvent::Reattached { .. } | CommanderEvent::OrderRejected { .. } => {}
            }
        }

        if request.victory.achieved {
            let _ = write!(s, " {}.", request.victory.description);
        }
        s
    }
}

impl NarrativeGenerator for TemplateNarrator {
    fn generate(&self, request: &NarrativeRequest) -> impl Future<Output = Result<String>> + Send {
        let text = Self::render(request);
        async move { Ok(text) }
    }
}
