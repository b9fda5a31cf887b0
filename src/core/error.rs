use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{UnitId, UnitRef};

#[derive(Error, Debug)]
pub enum BattleError {
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Movement blocked: {0}")]
    MovementBlocked(String),

    #[error("Invalid action: {0}")]
    ActionSchemaInvalid(String),

    #[error("Cultural restriction violated: {0}")]
    CulturalRestrictionViolated(String),

    #[error("Commander adjacency violation: {0}")]
    CommanderAdjacencyViolation(String),

    #[error("Commander cannot detach: {0}")]
    CommanderDetachNotAllowed(String),

    #[error("Unit {0} has no active mission")]
    NoActiveMission(UnitId),

    #[error("Combat resolution failed: {0}")]
    CombatResolutionFailure(String),

    #[error("Order interpreter error: {0}")]
    Interpreter(String),

    #[error("Narrative error: {0}")]
    Narrative(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl BattleError {
    /// Stable machine-readable code, used in serialized turn results
    pub fn code(&self) -> &'static str {
        match self {
            BattleError::InvalidCoordinate(_) => "invalid_coordinate",
            BattleError::MovementBlocked(_) => "movement_blocked",
            BattleError::ActionSchemaInvalid(_) => "action_schema_invalid",
            BattleError::CulturalRestrictionViolated(_) => "cultural_restriction_violated",
            BattleError::CommanderAdjacencyViolation(_) => "commander_adjacency_violation",
            BattleError::CommanderDetachNotAllowed(_) => "commander_detach_not_allowed",
            BattleError::NoActiveMission(_) => "no_active_mission",
            BattleError::CombatResolutionFailure(_) => "combat_resolution_failure",
            BattleError::Interpreter(_) => "interpreter",
            BattleError::Narrative(_) => "narrative",
            BattleError::Llm(_) => "llm",
            BattleError::Config(_) => "config",
            BattleError::Io(_) => "io",
            BattleError::Serde(_) => "serde",
            BattleError::Toml(_) => "toml",
        }
    }
}

pub type Result<T> = std::result::Result<T, BattleError>;

/// A rejected action, as reported back to the player who issued it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionError {
    pub action_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<UnitId>,
    pub code: String,
    pub error: String,
}

impl ActionError {
    pub fn new(action_index: usize, unit_id: Option<UnitId>, error: &BattleError) -> Self {
        Self {
            action_index,
            unit_id,
            code: error.code().to_string(),
            error: error.to_string(),
        }
    }
}

/// A per-unit failure that did not stop the rest of the turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitFailure {
    pub unit: UnitRef,
    pub code: String,
    pub message: String,
}

impl UnitFailure {
    pub fn new(unit: UnitRef, error: &BattleError) -> Self {
        Self {
            unit,
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let err = BattleError::MovementBlocked("river".into());
        assert_eq!(err.code(), "movement_blocked");
        assert_eq!(err.to_string(), "Movement blocked: river");

        let err = BattleError::NoActiveMission(UnitId::new("u1"));
        assert_eq!(err.code(), "no_active_mission");
        assert!(err.to_string().contains("u1"));
    }

    #[test]
    fn test_action_error_carries_code() {
        let err = BattleError::CulturalRestrictionViolated("celtic cannot form phalanx".into());
        let report = ActionError::new(2, Some(UnitId::new("u7")), &err);
        assert_eq!(report.action_index, 2);
        assert_eq!(report.code, "cultural_restriction_violated");
        assert!(report.error.contains("phalanx"));
    }
}
