//! Morale and breaking
//!
//! Units break when cumulative losses pass their quality tier's threshold
//! or when morale runs out. Broken units rout; veteran mercenaries desert
//! instead and stop counting toward their side's strength.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::battle::constants::MAX_MORALE;
use crate::battle::units::{Army, Unit};
use crate::core::config::MoraleRules;
use crate::core::types::{Side, SidePair, UnitRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakCause {
    Casualties,
    MoraleExhausted,
}

/// Result of a morale check
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoraleCheckResult {
    pub breaks: bool,
    pub deserts: bool,
    pub cause: Option<BreakCause>,
}

/// Shift a unit's morale, clamped to 0..=MAX_MORALE
pub fn apply_morale_delta(unit: &mut Unit, delta: i32) {
    unit.morale = (unit.morale + delta).clamp(0, MAX_MORALE);
}

/// Check if a unit breaks
pub fn check_morale_break(unit: &Unit, rules: &MoraleRules) -> MoraleCheckResult {
    let mut result = MoraleCheckResult::default();

    // Already broken units can't break again
    if unit.is_broken || unit.has_deserted || !unit.is_alive() {
        return result;
    }

    let threshold = rules.break_threshold(unit.quality_type);
    if unit.loss_fraction() >= threshold {
        result.cause = Some(BreakCause::Casualties);
    } else if unit.morale <= 0 {
        result.cause = Some(BreakCause::MoraleExhausted);
    }

    if result.cause.is_some() {
        result.breaks = true;
        result.deserts = unit.quality_type.deserts_when_broken();
    }
    result
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoraleEvent {
    pub unit: UnitRef,
    pub cause: BreakCause,
    pub deserted: bool,
    pub loss_fraction: f32,
    pub morale: i32,
}

/// Run morale checks for every unit on both sides
pub fn evaluate_morale(armies: &mut SidePair<Army>, rules: &MoraleRules) -> Vec<MoraleEvent> {
    let mut events = Vec::new();

    for side in Side::all() {
        for unit in armies.get_mut(side).units.iter_mut() {
            let check = check_morale_break(unit, rules);
            let Some(cause) = check.cause.filter(|_| check.breaks) else {
                continue;
            };

            unit.is_broken = true;
            unit.is_routing = !check.deserts;
            unit.has_deserted = check.deserts;
            unit.active_mission = None;

            info!(
                unit = %unit.unit_id,
                side = %side,
                ?cause,
                deserted = check.deserts,
                "Unit broke"
            );
            events.push(MoraleEvent {
                unit: UnitRef::new(side, unit.unit_id.clone()),
                cause,
                deserted: check.deserts,
                loss_fraction: unit.loss_fraction(),
                morale: unit.morale,
            });
        }
    }

    events
}
