//! Structured actions and the normalization boundary
//!
//! Interpreters hand back loosely shaped JSON. `normalize_action` is the one
//! place that accepts aliases and key spellings; everything past it works on
//! the typed `Action` union.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::battle::grid::GridCoord;
use crate::battle::units::Formation;
use crate::core::error::{BattleError, Result};
use crate::core::types::{Turn, UnitId};

/// Condition gating a conditional action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// Any enemy within `distance` tiles of the unit
    #[serde(rename_all = "camelCase")]
    EnemyWithin { unit_id: UnitId, distance: u32 },
    /// Unit strength ratio below `ratio`
    #[serde(rename_all = "camelCase")]
    StrengthBelow { unit_id: UnitId, ratio: f32 },
    /// An enemy unit stands on `position`
    EnemyAt { position: GridCoord },
    TurnAtLeast { turn: Turn },
}

/// Orders for the side's commander
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommanderCommand {
    #[serde(rename_all = "camelCase")]
    Reattach { unit_id: UnitId },
    Detach,
    #[serde(rename_all = "camelCase")]
    Move { target_position: GridCoord },
}

/// A single structured order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    Move {
        unit_id: UnitId,
        target_position: GridCoord,
    },
    #[serde(rename_all = "camelCase")]
    Formation {
        unit_id: UnitId,
        formation_type: Formation,
    },
    #[serde(rename_all = "camelCase")]
    Attack {
        unit_id: UnitId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_unit_id: Option<UnitId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_position: Option<GridCoord>,
    },
    #[serde(rename_all = "camelCase")]
    SupportFire {
        unit_id: UnitId,
        /// Friendly unit being supported
        #[serde(default, skip_serializing_if = "Option::is_none")]
        supporting: Option<UnitId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_unit_id: Option<UnitId>,
    },
    #[serde(rename_all = "camelCase")]
    Conditional {
        condition: Condition,
        #[serde(default)]
        if_true: Vec<Action>,
        #[serde(default)]
        if_false: Vec<Action>,
    },
    #[serde(rename_all = "camelCase")]
    Hold { unit_id: UnitId },
    Commander { command: CommanderCommand },
}

impl Action {
    /// The unit this action orders, if it orders exactly one
    pub fn unit_id(&self) -> Option<&UnitId> {
        match self {
            Action::Move { unit_id, .. }
            | Action::Formation { unit_id, .. }
            | Action::Attack { unit_id, .. }
            | Action::SupportFire { unit_id, .. }
            | Action::Hold { unit_id } => Some(unit_id),
            Action::Conditional { .. } | Action::Commander { .. } => None,
        }
    }

    /// Every unit named by this action, branches included
    pub fn ordered_units(&self) -> Vec<&UnitId> {
        match self {
            Action::Conditional {
                if_true, if_false, ..
            } => if_true
                .iter()
                .chain(if_false.iter())
                .flat_map(|a| a.ordered_units())
                .collect(),
            other => other.unit_id().into_iter().collect(),
        }
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            Action::Move { .. } => "move",
            Action::Formation { .. } => "formation",
            Action::Attack { .. } => "attack",
            Action::SupportFire { .. } => "support_fire",
            Action::Conditional { .. } => "conditional",
            Action::Hold { .. } => "hold",
            Action::Commander { .. } => "commander",
        }
    }
}

fn canonical_type(raw: &str) -> Option<&'static str> {
    let key: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-' && *c != ' ')
        .collect::<String>()
        .to_lowercase();
    match key.as_str() {
        "move" | "movement" | "advance" | "march" => Some("move"),
        "formation" | "changeformation" | "formationchange" => Some("formation"),
        "attack" | "charge" | "engage" => Some("attack"),
        "supportfire" | "support" => Some("support_fire"),
        "conditional" | "if" => Some("conditional"),
        "hold" | "halt" | "stand" => Some("hold"),
        "commander" => Some("commander"),
        _ => None,
    }
}

fn camel_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for ch in key.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn unit_id_value(value: Value, field: &str) -> Result<Value> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(Value::String(s.trim().to_string())),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        other => Err(BattleError::ActionSchemaInvalid(format!(
            "{} must be a unit id, got {}",
            field, other
        ))),
    }
}

fn coordinate_value(value: Value, field: &str) -> Result<Value> {
    match value {
        Value::String(s) => {
            let coord = GridCoord::parse(&s.trim().to_uppercase())?;
            Ok(Value::String(coord.to_string()))
        }
        other => Err(BattleError::ActionSchemaInvalid(format!(
            "{} must be a coordinate string, got {}",
            field, other
        ))),
    }
}

fn normalize_fields(object: Map<String, Value>) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for (key, value) in object {
        let key = match camel_key(&key).as_str() {
            "unit" | "id" => "unitId".to_string(),
            "target" | "destination" | "to" | "position" if value_is_coordinate(&value) => {
                if key == "position" {
                    "position".to_string()
                } else {
                    "targetPosition".to_string()
                }
            }
            "target" | "targetUnit" => "targetUnitId".to_string(),
            "formation" => "formationType".to_string(),
            "then" => "ifTrue".to_string(),
            "else" => "ifFalse".to_string(),
            other => other.to_string(),
        };

        let value = match key.as_str() {
            "unitId" | "targetUnitId" | "supporting" => unit_id_value(value, &key)?,
            "targetPosition" | "position" => coordinate_value(value, &key)?,
            "formationType" => match value {
                Value::String(s) => Value::String(s.trim().to_lowercase()),
                other => other,
            },
            _ => value,
        };
        out.insert(key, value);
    }
    Ok(out)
}

fn value_is_coordinate(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| GridCoord::parse(&s.trim().to_uppercase()).is_ok())
}

fn normalize_condition(value: Value) -> Result<Value> {
    let Value::Object(object) = value else {
        return Err(BattleError::ActionSchemaInvalid(
            "condition must be an object".into(),
        ));
    };
    let mut fields = normalize_fields(object)?;
    if let Some(kind) = fields.remove("type") {
        fields.entry("kind").or_insert(kind);
    }
    if let Some(Value::String(kind)) = fields.get_mut("kind") {
        *kind = kind.trim().to_lowercase();
    }
    Ok(Value::Object(fields))
}

fn normalize_branch(value: Value) -> Result<Value> {
    let items = match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single @ Value::Object(_) => vec![single],
        other => {
            return Err(BattleError::ActionSchemaInvalid(format!(
                "conditional branch must be a list of actions, got {}",
                other
            )))
        }
    };
    let actions = items
        .into_iter()
        .map(normalize_action)
        .collect::<Result<Vec<_>>>()?;
    Ok(serde_json::to_value(actions)?)
}

/// Normalize one raw action into the typed union
pub fn normalize_action(raw: Value) -> Result<Action> {
    let Value::Object(object) = raw else {
        return Err(BattleError::ActionSchemaInvalid(format!(
            "action must be an object, got {}",
            raw
        )));
    };

    let raw_type = object
        .get("type")
        .or_else(|| object.get("action"))
        .and_then(Value::as_str)
        .ok_or_else(|| BattleError::ActionSchemaInvalid("action has no type".into()))?
        .to_string();
    let action_type = canonical_type(&raw_type).ok_or_else(|| {
        BattleError::ActionSchemaInvalid(format!("unknown action type '{}'", raw_type))
    })?;

    let mut fields = normalize_fields(object)?;
    fields.remove("action");
    fields.insert("type".into(), Value::String(action_type.into()));

    if action_type == "conditional" {
        if let Some(condition) = fields.remove("condition") {
            fields.insert("condition".into(), normalize_condition(condition)?);
        }
        for branch in ["ifTrue", "ifFalse"] {
            if let Some(value) = fields.remove(branch) {
                fields.insert(branch.into(), normalize_branch(value)?);
            }
        }
    }

    if action_type == "commander" {
        if let Some(Value::String(command)) = fields.remove("command") {
            let mut inner = Map::new();
            inner.insert("kind".into(), Value::String(command.trim().to_lowercase()));
            for key in ["unitId", "targetPosition"] {
                if let Some(value) = fields.remove(key) {
                    inner.insert(key.into(), value);
                }
            }
            fields.insert("command".into(), Value::Object(inner));
        }
    }

    serde_json::from_value(Value::Object(fields))
        .map_err(|e| BattleError::ActionSchemaInvalid(format!("{} action: {}", action_type, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn c(text: &str) -> GridCoord {
        GridCoord::parse(text).unwrap()
    }

    #[test]
    fn test_canonical_move() {
        let action = normalize_action(json!({
            "type": "move", "unitId": "legio-1", "targetPosition": "J11"
        }))
        .unwrap();
        assert_eq!(
            action,
            Action::Move {
                unit_id: UnitId::new("legio-1"),
                target_position: c("J11"),
            }
        );
    }

    #[test]
    fn test_aliases_and_snake_case() {
        let action = normalize_action(json!({
            "type": "movement", "unit_id": 7, "target_position": "j11"
        }))
        .unwrap();
        assert_eq!(
            action,
            Action::Move {
                unit_id: UnitId::new("7"),
                target_position: c("J11"),
            }
        );

        let action = normalize_action(json!({
            "type": "change_formation", "unitId": "a", "formation": "Testudo"
        }))
        .unwrap();
        assert_eq!(
            action,
            Action::Formation {
                unit_id: UnitId::new("a"),
                formation_type: Formation::Testudo,
            }
        );

        let action = normalize_action(json!({
            "type": "supportFire", "unitId": "arch", "supporting": "a"
        }))
        .unwrap();
        assert!(matches!(action, Action::SupportFire { .. }));
    }

    #[test]
    fn test_attack_target_disambiguation() {
        let raw = json!({ "type": "attack", "unitId": "a", "target": "gauls-2" });
        let by_unit = normalize_action(raw).unwrap();
        assert_eq!(
            by_unit,
            Action::Attack {
                unit_id: UnitId::new("a"),
                target_unit_id: Some(UnitId::new("gauls-2")),
                target_position: None,
            }
        );

        let by_tile =
            normalize_action(json!({ "type": "attack", "unitId": "a", "target": "K4" })).unwrap();
        assert_eq!(
            by_tile,
            Action::Attack {
                unit_id: UnitId::new("a"),
                target_unit_id: None,
                target_position: Some(c("K4")),
            }
        );
    }

    #[test]
    fn test_conditional_nested() {
        let action = normalize_action(json!({
            "type": "if",
            "condition": { "type": "enemy_within", "unit_id": "a", "distance": 3 },
            "then": [{ "type": "hold", "unitId": "a" }],
            "else": { "type": "move", "unitId": "a", "targetPosition": "C3" }
        }))
        .unwrap();

        match action {
            Action::Conditional {
                condition,
                if_true,
                if_false,
            } => {
                assert_eq!(
                    condition,
                    Condition::EnemyWithin {
                        unit_id: UnitId::new("a"),
                        distance: 3
                    }
                );
                assert_eq!(if_true.len(), 1);
                assert_eq!(if_false.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_commander_command() {
        let action = normalize_action(json!({
            "type": "commander", "command": "reattach", "unitId": "b"
        }))
        .unwrap();
        assert_eq!(
            action,
            Action::Commander {
                command: CommanderCommand::Reattach {
                    unit_id: UnitId::new("b")
                }
            }
        );
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(
            normalize_action(json!({ "type": "dance", "unitId": "a" })),
            Err(BattleError::ActionSchemaInvalid(_))
        ));
        assert!(matches!(
            normalize_action(json!({ "type": "move", "unitId": "a" })),
            Err(BattleError::ActionSchemaInvalid(_))
        ));
        assert!(matches!(
            normalize_action(json!({ "type": "move", "unitId": "a", "targetPosition": "Z99" })),
            Err(BattleError::InvalidCoordinate(_))
        ));
        assert!(matches!(
            normalize_action(json!("move a to b")),
            Err(BattleError::ActionSchemaInvalid(_))
        ));
    }

    #[test]
    fn test_serialized_shape() {
        let action = Action::Move {
            unit_id: UnitId::new("a"),
            target_position: c("B2"),
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value, json!({ "type": "move", "unitId": "a", "targetPosition": "B2" }));
    }
}
