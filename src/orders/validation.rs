//! Validation gate and conditional resolution
//!
//! Every action of both sides is checked before anything is mutated. One
//! bad action rejects the whole turn.

use crate::battle::state::BattleState;
use crate::battle::units::Unit;
use crate::combat::culture::is_restricted;
use crate::core::config::RulesConfig;
use crate::core::error::{ActionError, BattleError, Result};
use crate::core::types::{Side, UnitId};
use crate::orders::actions::{Action, Condition};

fn own_unit<'a>(state: &'a BattleState, side: Side, unit_id: &UnitId) -> Result<&'a Unit> {
    match state.army(side).get_unit(unit_id) {
        Some(unit) if unit.is_alive() => Ok(unit),
        Some(_) => Err(BattleError::ActionSchemaInvalid(format!(
            "unit {} has been destroyed",
            unit_id
        ))),
        None => Err(BattleError::ActionSchemaInvalid(format!("{} has no unit {}", side, unit_id))),
    }
}

fn enemy_unit<'a>(state: &'a BattleState, side: Side, unit_id: &UnitId) -> Result<&'a Unit> {
    match state.army(side.opponent()).get_unit(unit_id) {
        Some(unit) if unit.is_alive() => Ok(unit),
        _ => Err(BattleError::ActionSchemaInvalid(format!("no enemy unit {} to target", unit_id))),
    }
}

fn validate_condition(condition: &Condition, side: Side, state: &BattleState) -> Result<()> {
    match condition {
        Condition::EnemyWithin { unit_id, .. } | Condition::StrengthBelow { unit_id, .. } => {
            own_unit(state, side, unit_id).map(|_| ())
        }
        Condition::EnemyAt { .. } | Condition::TurnAtLeast { .. } => Ok(()),
    }
}

fn record(errors: &mut Vec<BattleError>, result: Result<()>) {
    if let Err(err) = result {
        errors.push(err);
    }
}

/// Check one action, collecting every problem found (branches included)
fn check_action(
    action: &Action,
    side: Side,
    state: &BattleState,
    rules: &RulesConfig,
    errors: &mut Vec<BattleError>,
) {
    match action {
        Action::Move { unit_id, .. } | Action::Hold { unit_id } => {
            record(errors, own_unit(state, side, unit_id).map(|_| ()));
        }
        Action::Formation {
            unit_id,
            formation_type,
        } => {
            record(errors, own_unit(state, side, unit_id).map(|_| ()));
            let culture = state.army(side).culture;
            if is_restricted(&rules.tables.cultural_restrictions, culture, *formation_type) {
                record(errors, Err(BattleError::CulturalRestrictionViolated(format!(
                    "{} armies do not fight in {} formation",
                    culture.label(),
                    formation_type.label()
                ))));
            }
        }
        Action::Attack {
            unit_id,
            target_unit_id,
            target_position,
        } => {
            record(errors, own_unit(state, side, unit_id).map(|_| ()));
            match (target_unit_id, target_position) {
                (Some(target), _) => record(errors, enemy_unit(state, side, target).map(|_| ())),
                (None, Some(_)) => {}
                (None, None) => record(errors, Err(BattleError::ActionSchemaInvalid(format!(
                    "attack by {} names no target",
                    unit_id
                )))),
            }
        }
        Action::SupportFire {
            unit_id,
            supporting,
            target_unit_id,
        } => {
            record(errors, own_unit(state, side, unit_id).map(|_| ()));
            if supporting.is_none() && target_unit_id.is_none() {
                record(errors, Err(BattleError::ActionSchemaInvalid(format!(
                    "support fire by {} names neither a friend nor a target",
                    unit_id
                ))));
            }
            if let Some(friend) = supporting {
                record(errors, own_unit(state, side, friend).map(|_| ()));
            }
            if let Some(target) = target_unit_id {
                record(errors, enemy_unit(state, side, target).map(|_| ()));
            }
        }
        Action::Conditional {
            condition,
            if_true,
            if_false,
        } => {
            record(errors, validate_condition(condition, side, state));
            for nested in if_true.iter().chain(if_false.iter()) {
                check_action(nested, side, state, rules, errors);
            }
        }
        // Resolved later as a no-op with a message when rejected
        Action::Commander { .. } => {}
    }
}

/// Validate a side's actions; an empty result means the side passes the gate
pub fn validate_actions(
    actions: &[Action],
    side: Side,
    state: &BattleState,
    rules: &RulesConfig,
) -> Vec<ActionError> {
    let mut report = Vec::new();
    for (index, action) in actions.iter().enumerate() {
        let mut errors = Vec::new();
        check_action(action, side, state, rules, &mut errors);
        report.extend(
            errors
                .iter()
                .map(|err| ActionError::new(index, action.unit_id().cloned(), err)),
        );
    }
    report
}

/// Does `condition` hold for `side` in the current state?
pub fn evaluate_condition(condition: &Condition, side: Side, state: &BattleState) -> bool {
    let enemies = || {
        state
            .army(side.opponent())
            .units
            .iter()
            .filter(|u| u.is_alive() && !u.has_deserted)
    };

    match condition {
        Condition::EnemyWithin { unit_id, distance } => state
            .army(side)
            .get_unit(unit_id)
            .is_some_and(|unit| {
                enemies().any(|e| e.position.distance(&unit.position) <= *distance)
            }),
        Condition::StrengthBelow { unit_id, ratio } => state
            .army(side)
            .get_unit(unit_id)
            .is_some_and(|unit| unit.strength_ratio() < *ratio),
        Condition::EnemyAt { position } => enemies().any(|e| e.position == *position),
        Condition::TurnAtLeast { turn } => state.current_turn >= *turn,
    }
}

/// Replace every conditional with the branch its condition selects
pub fn resolve_conditionals(actions: Vec<Action>, side: Side, state: &BattleState) -> Vec<Action> {
    let mut resolved = Vec::with_capacity(actions.len());
    for action in actions {
        match action {
            Action::Conditional {
                condition,
                if_true,
                if_false,
            } => {
                let branch = if evaluate_condition(&condition, side, state) {
                    if_true
                } else {
                    if_false
                };
                resolved.extend(resolve_conditionals(branch, side, state));
            }
            other => resolved.push(other),
        }
    }
    resolved
}
