//! Order interpretation
//!
//! Turns a side's order text into raw action values for the
//! normalization boundary. Interpreters may also report units whose
//! standing mission was interrupted by a hold order.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::battle::battle_map::MapDescriptor;
use crate::battle::grid::GridCoord;
use crate::battle::state::BattleState;
use crate::battle::visibility::unit_detects_enemy_within;
use crate::core::config::RulesConfig;
use crate::core::error::{BattleError, Result};
use crate::core::types::{Side, UnitId};
use crate::orders::actions::Action;

/// A unit on a mission told to hold while enemies are in sight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionInterruption {
    pub unit_id: UnitId,
    /// Question put back to the player
    pub question: String,
    pub detected_enemies: Vec<GridCoord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretedOrders {
    /// Raw actions, not yet normalized
    pub validated_actions: Vec<Value>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub mission_interruptions: Vec<MissionInterruption>,
}

pub trait OrderInterpreter {
    fn interpret(
        &self,
        text: &str,
        state: &BattleState,
        side: Side,
        map: &MapDescriptor,
    ) -> impl Future<Output = Result<InterpretedOrders>> + Send;
}

/// Split a JSON document into raw actions
///
/// Accepts an array of actions, an object with an `actions` array, or a
/// single action object.
pub fn raw_actions(document: Value) -> Result<Vec<Value>> {
    match document {
        Value::Array(items) => Ok(items),
        Value::Object(mut object) => match object.remove("actions") {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(BattleError::Interpreter(format!(
                "actions must be a list, got {}",
                other
            ))),
            None => Ok(vec![Value::Object(object)]),
        },
        other => Err(BattleError::Interpreter(format!(
            "expected a list of actions, got {}",
            other
        ))),
    }
}

/// Reads orders that are already JSON actions
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredOrderInterpreter;

impl StructuredOrderInterpreter {
    pub fn parse(text: &str) -> Result<InterpretedOrders> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(InterpretedOrders::default());
        }
        let document: Value =
            serde_json::from_str(text).map_err(|e| {
                BattleError::Interpreter(format!("orders are not JSON: {}", e))
            })?;
        let validated_actions = raw_actions(document)?;
        debug!(count = validated_actions.len(), "Structured orders read");
        Ok(InterpretedOrders {
            validated_actions,
            ..InterpretedOrders::default()
        })
    }
}

impl OrderInterpreter for StructuredOrderInterpreter {
    fn interpret(
        &self,
        text: &str,
        _state: &BattleState,
        _side: Side,
        _map: &MapDescriptor,
    ) -> impl Future<Output = Result<InterpretedOrders>> + Send {
        let parsed = Self::parse(text);
        async move { parsed }
    }
}

/// Hold orders given to units on a mission with an enemy in their own sight
pub fn detect_mission_interruptions(
    actions: &[Action],
    side: Side,
    state: &BattleState,
    map: &MapDescriptor,
    rules: &RulesConfig,
) -> Vec<MissionInterruption> {
    let enemies = &state.army(side.opponent()).units;
    let mut interruptions = Vec::new();

    for action in actions {
        let Action::Hold { unit_id } = action else {
            continue;
        };
        let Some(unit) = state.army(side).get_unit(unit_id) else {
            continue;
        };
        let Some(mission) = unit.active_mission.as_ref().filter(|m| m.is_active()) else {
            continue;
        };

        let detected = unit_detects_enemy_within(
            unit,
            enemies,
            map,
            state.weather,
            &rules.vision,
            rules.movement.identification_threshold,
        );
        if detected.is_empty() {
            continue;
        }

        interruptions.push(MissionInterruption {
            unit_id: unit_id.clone(),
            question: format!(
                "{} halted on the way to {} with enemies in sight. Resume the march, or hold?",
                unit_id, mission.target
            ),
            detected_enemies: detected,
        });
    }

    interruptions
}
