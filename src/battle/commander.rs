//! Commander attachment and capture
//!
//! The player's commander always rides with exactly one unit. It cannot
//! detach or move on its own, and may only switch to a unit within one
//! tile. A commander whose unit is shattered next to the enemy is at
//! risk until the player picks escape, death or surrender.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::battle::grid::GridCoord;
use crate::battle::units::{Army, Unit};
use crate::combat::culture::Culture;
use crate::core::config::CommanderRules;
use crate::core::error::{BattleError, Result};
use crate::core::types::{BattleId, PlayerId, Side, UnitId};
use crate::orders::actions::CommanderCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommanderStatus {
    #[default]
    Active,
    AtRisk,
    Escaped,
    Captured,
    Killed,
    Surrendered,
}

impl CommanderStatus {
    /// Out of the battle for good
    pub fn is_lost(&self) -> bool {
        matches!(
            self,
            CommanderStatus::Captured | CommanderStatus::Killed | CommanderStatus::Surrendered
        )
    }
}

/// The player's answer to an at-risk commander
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureChoice {
    Escape,
    Die,
    Surrender,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commander {
    pub battle_id: BattleId,
    pub player_id: PlayerId,
    #[serde(default)]
    pub culture: Culture,
    pub attached_unit_id: UnitId,
    pub position: GridCoord,
    #[serde(default)]
    pub status: CommanderStatus,
}

impl Commander {
    pub fn new(battle_id: BattleId, player_id: PlayerId, culture: Culture, unit: &Unit) -> Self {
        Self {
            battle_id,
            player_id,
            culture,
            attached_unit_id: unit.unit_id.clone(),
            position: unit.position,
            status: CommanderStatus::Active,
        }
    }

    /// Move to another unit within one tile
    pub fn reattach(&mut self, unit: &Unit) -> Result<()> {
        if !unit.is_alive() {
            return Err(BattleError::CommanderAdjacencyViolation(format!(
                "{} has no one left to lead",
                unit.unit_id
            )));
        }
        let distance = self.position.distance(&unit.position);
        if distance > 1 {
            return Err(BattleError::CommanderAdjacencyViolation(format!(
                "{} at {} is {} tiles from the commander at {}",
                unit.unit_id, unit.position, distance, self.position
            )));
        }

        self.attached_unit_id = unit.unit_id.clone();
        self.position = unit.position;
        Ok(())
    }

    /// Commanders never leave their unit
    pub fn detach(&self) -> Result<()> {
        Err(BattleError::CommanderDetachNotAllowed(format!(
            "the commander stays with {}",
            self.attached_unit_id
        )))
    }

    /// Commanders move only with their unit
    pub fn independent_move(&self, target: GridCoord) -> Result<()> {
        Err(BattleError::CommanderDetachNotAllowed(format!(
            "the commander cannot ride to {} alone; move {} instead",
            target, self.attached_unit_id
        )))
    }

    /// Take up the attached unit's position
    ///
    /// Returns false when the unit is no longer on the field.
    pub fn follow(&mut self, army: &Army) -> bool {
        match army.get_unit(&self.attached_unit_id).filter(|u| u.is_alive()) {
            Some(unit) => {
                self.position = unit.position;
                true
            }
            None => false,
        }
    }

    /// An escape from the previous turn is over once a new turn starts
    pub fn reset_for_turn(&mut self) {
        if self.status == CommanderStatus::Escaped {
            self.status = CommanderStatus::Active;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommanderEvent {
    #[serde(rename_all = "camelCase")]
    Reattached {
        side: Side,
        unit_id: UnitId,
    },
    OrderRejected {
        side: Side,
        code: String,
        message: String,
    },
    AtRisk {
        side: Side,
        position: GridCoord,
    },
    #[serde(rename_all = "camelCase")]
    Resolved {
        side: Side,
        choice: CaptureChoice,
        status: CommanderStatus,
        attached_unit_id: UnitId,
    },
}

/// Apply a commander order; a rejection leaves the commander untouched
pub fn apply_commander_command(
    commander: &mut Commander,
    side: Side,
    command: &CommanderCommand,
    army: &Army,
) -> CommanderEvent {
    let outcome = match command {
        CommanderCommand::Reattach { unit_id } => match army.get_unit(unit_id) {
            Some(unit) => commander.reattach(unit).map(|_| unit_id.clone()),
            None => Err(BattleError::CommanderAdjacencyViolation(format!(
                "no unit {} to join",
                unit_id
            ))),
        },
        CommanderCommand::Detach => commander.detach().map(|_| commander.attached_unit_id.clone()),
        CommanderCommand::Move { target_position } => commander
            .independent_move(*target_position)
            .map(|_| commander.attached_unit_id.clone()),
    };

    match outcome {
        Ok(unit_id) => {
            info!(side = %side, unit = %unit_id, "Commander reattached");
            CommanderEvent::Reattached { side, unit_id }
        }
        Err(err) => {
            warn!(side = %side, error = %err, "Commander order rejected");
            CommanderEvent::OrderRejected {
                side,
                code: err.code().to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Is the commander in danger of capture?
///
/// Its unit must be below the strength ratio with an enemy within one
/// tile. A commander whose unit is gone is always at risk.
pub fn evaluate_capture_risk(
    commander: &Commander,
    own: &Army,
    enemies: &Army,
    rules: &CommanderRules,
) -> bool {
    if commander.status != CommanderStatus::Active {
        return false;
    }

    let Some(unit) = own.get_unit(&commander.attached_unit_id).filter(|u| u.is_alive()) else {
        return true;
    };

    let weakened = unit.strength_ratio() < rules.capture_risk_strength_ratio;
    let enemy_adjacent = enemies
        .units
        .iter()
        .filter(|e| e.is_alive() && !e.has_deserted)
        .any(|e| e.position.distance(&commander.position) <= 1);

    weakened && enemy_adjacent
}

/// Capture-roll collaborator: decides how an at-risk commander fares
pub trait CaptureResolver {
    fn resolve(
        &self,
        battle_id: BattleId,
        player_id: &PlayerId,
        choice: CaptureChoice,
        rng: &mut dyn RngCore,
    ) -> CommanderStatus;
}

/// Dice-based capture resolution
#[derive(Debug, Clone)]
pub struct DiceCaptureResolver {
    pub escape_success_chance: f32,
    pub escape_capture_chance: f32,
}

impl DiceCaptureResolver {
    pub fn new(rules: &CommanderRules) -> Self {
        Self {
            escape_success_chance: rules.escape_success_chance,
            escape_capture_chance: rules.escape_capture_chance,
        }
    }
}

impl Default for DiceCaptureResolver {
    fn default() -> Self {
        Self::new(&CommanderRules::default())
    }
}

impl CaptureResolver for DiceCaptureResolver {
    fn resolve(
        &self,
        _battle_id: BattleId,
        _player_id: &PlayerId,
        choice: CaptureChoice,
        rng: &mut dyn RngCore,
    ) -> CommanderStatus {
        match choice {
            CaptureChoice::Die => CommanderStatus::Killed,
            CaptureChoice::Surrender => CommanderStatus::Surrendered,
            CaptureChoice::Escape => {
                let roll: f32 = rng.gen();
                if roll < self.escape_success_chance {
                    CommanderStatus::Escaped
                } else if roll < self.escape_success_chance + self.escape_capture_chance {
                    CommanderStatus::Captured
                } else {
                    CommanderStatus::Killed
                }
            }
        }
    }
}

/// Resolve an at-risk commander with the player's choice
///
/// An escaped commander joins the nearest unit that still has men; with
/// none left the escape fails and the commander is captured.
pub fn resolve_capture(
    commander: &mut Commander,
    side: Side,
    choice: CaptureChoice,
    resolver: &dyn CaptureResolver,
    own: &Army,
    rng: &mut dyn RngCore,
) -> CommanderEvent {
    let mut status = resolver.resolve(commander.battle_id, &commander.player_id, choice, rng);

    if status == CommanderStatus::Escaped {
        let from = commander.position;
        let refuge = own
            .units
            .iter()
            .filter(|u| u.current_strength > 0 && !u.has_deserted)
            .min_by_key(|u| (u.position.distance(&from), u.unit_id.clone()));
        match refuge {
            Some(unit) => {
                commander.attached_unit_id = unit.unit_id.clone();
                commander.position = unit.position;
            }
            None => status = CommanderStatus::Captured,
        }
    }

    commander.status = status;
    info!(side = %side, ?choice, ?status, "Commander capture resolved");
    CommanderEvent::Resolved {
        side,
        choice,
        status,
        attached_unit_id: commander.attached_unit_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::unit_type::UnitType;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn c(text: &str) -> GridCoord {
        GridCoord::parse(text).unwrap()
    }

    fn army(units: Vec<Unit>) -> Army {
        Army::new(PlayerId::new("p"), Culture::Roman, units)
    }

    fn commander_with(unit: &Unit) -> Commander {
        Commander::new(BattleId::new(), PlayerId::new("p1"), Culture::Roman, unit)
    }

    /// Resolver that always returns the same status
    struct Fixed(CommanderStatus);

    impl CaptureResolver for Fixed {
        fn resolve(
            &self,
            _: BattleId,
            _: &PlayerId,
            _: CaptureChoice,
            _: &mut dyn RngCore,
        ) -> CommanderStatus {
            self.0
        }
    }

    #[test]
    fn test_reattach_adjacent_only() {
        let home = Unit::new("home", UnitType::Infantry, c("E5"), 100);
        let near = Unit::new("near", UnitType::Infantry, c("F6"), 100);
        let far = Unit::new("far", UnitType::Infantry, c("H5"), 100);
        let mut commander = commander_with(&home);

        let err = commander.reattach(&far).unwrap_err();
        assert!(matches!(err, BattleError::CommanderAdjacencyViolation(_)));
        assert_eq!(commander.attached_unit_id, UnitId::new("home"));

        commander.reattach(&near).unwrap();
        assert_eq!(commander.attached_unit_id, UnitId::new("near"));
        assert_eq!(commander.position, c("F6"));
    }

    #[test]
    fn test_detach_and_solo_move_rejected() {
        let home = Unit::new("home", UnitType::Infantry, c("E5"), 100);
        let forces = army(vec![home.clone()]);
        let mut commander = commander_with(&home);
        let before = commander.clone();

        let detach = CommanderCommand::Detach;
        let event = apply_commander_command(&mut commander, Side::Player1, &detach, &forces);
        assert!(matches!(
            event,
            CommanderEvent::OrderRejected { ref code, .. } if code == "commander_detach_not_allowed"
        ));
        let event = apply_commander_command(
            &mut commander,
            Side::Player1,
            &CommanderCommand::Move { target_position: c("J10") },
            &forces,
        );
        assert!(matches!(event, CommanderEvent::OrderRejected { .. }));
        assert_eq!(commander, before);
    }

    #[test]
    fn test_capture_risk_needs_weakness_and_contact() {
        let rules = CommanderRules::default();
        let mut home = Unit::new("home", UnitType::Infantry, c("E5"), 100);
        let commander = commander_with(&home);
        let enemies = army(vec![Unit::new("x", UnitType::Infantry, c("E6"), 100)]);

        assert!(!evaluate_capture_risk(&commander, &army(vec![home.clone()]), &enemies, &rules));

        home.current_strength = 20;
        assert!(evaluate_capture_risk(&commander, &army(vec![home.clone()]), &enemies, &rules));

        let distant = army(vec![Unit::new("x", UnitType::Infantry, c("E9"), 100)]);
        assert!(!evaluate_capture_risk(&commander, &army(vec![home]), &distant, &rules));

        // Unit destroyed outright
        assert!(evaluate_capture_risk(&commander, &army(vec![]), &distant, &rules));
    }

    #[test]
    fn test_escape_joins_nearest_unit() {
        let home = Unit::new("home", UnitType::Infantry, c("E5"), 100);
        let mut shattered = home.clone();
        shattered.current_strength = 0;
        let forces = army(vec![
            shattered,
            Unit::new("far", UnitType::Infantry, c("P5"), 100),
            Unit::new("close", UnitType::Infantry, c("E8"), 100),
        ]);
        let mut commander = commander_with(&home);
        commander.status = CommanderStatus::AtRisk;
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let event = resolve_capture(
            &mut commander,
            Side::Player1,
            CaptureChoice::Escape,
            &Fixed(CommanderStatus::Escaped),
            &forces,
            &mut rng,
        );
        assert_eq!(commander.status, CommanderStatus::Escaped);
        assert_eq!(commander.attached_unit_id, UnitId::new("close"));
        assert_eq!(commander.position, c("E8"));
        assert!(matches!(event, CommanderEvent::Resolved { status: CommanderStatus::Escaped, .. }));

        commander.reset_for_turn();
        assert_eq!(commander.status, CommanderStatus::Active);
    }

    #[test]
    fn test_escape_with_no_refuge_is_capture() {
        let home = Unit::new("home", UnitType::Infantry, c("E5"), 100);
        let mut commander = commander_with(&home);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        resolve_capture(
            &mut commander,
            Side::Player1,
            CaptureChoice::Escape,
            &Fixed(CommanderStatus::Escaped),
            &army(vec![]),
            &mut rng,
        );
        assert_eq!(commander.status, CommanderStatus::Captured);
    }

    #[test]
    fn test_dice_resolver_fixed_choices() {
        let resolver = DiceCaptureResolver::default();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let id = BattleId::new();
        let player = PlayerId::new("p1");
        assert_eq!(
            resolver.resolve(id, &player, CaptureChoice::Die, &mut rng),
            CommanderStatus::Killed
        );
        assert_eq!(
            resolver.resolve(id, &player, CaptureChoice::Surrender, &mut rng),
            CommanderStatus::Surrendered
        );

        let always = DiceCaptureResolver {
            escape_success_chance: 1.0,
            escape_capture_chance: 0.0,
        };
        assert_eq!(
            always.resolve(id, &player, CaptureChoice::Escape, &mut rng),
            CommanderStatus::Escaped
        );
    }
}
