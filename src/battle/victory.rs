//! Victory conditions
//!
//! Checked in order: annihilation, rout, then the turn limit.

use serde::{Deserialize, Serialize};

use crate::battle::units::Army;
use crate::core::config::VictoryRules;
use crate::core::types::{Side, SidePair, Turn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Player1,
    Player2,
    Draw,
}

impl From<Side> for Winner {
    fn from(side: Side) -> Self {
        match side {
            Side::Player1 => Winner::Player1,
            Side::Player2 => Winner::Player2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictoryReason {
    EnemyAnnihilated,
    MutualAnnihilation,
    EnemyRouted,
    MutualRout,
    TacticalVictory,
    Stalemate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VictoryResult {
    pub achieved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<VictoryReason>,
    pub description: String,
}

impl VictoryResult {
    pub fn ongoing() -> Self {
        Self {
            achieved: false,
            winner: None,
            reason: None,
            description: "The battle continues".to_string(),
        }
    }

    fn decided(winner: Winner, reason: VictoryReason, description: String) -> Self {
        Self {
            achieved: true,
            winner: Some(winner),
            reason: Some(reason),
            description,
        }
    }
}

fn is_routed(army: &Army, rules: &VictoryRules) -> bool {
    let starting = army.starting_strength();
    starting > 0 && (army.total_strength() as f32) < rules.rout_threshold * starting as f32
}

/// Evaluate the battle after turn `turn` has been resolved
pub fn check_victory_conditions(
    armies: &SidePair<Army>,
    turn: Turn,
    max_turns: Turn,
    rules: &VictoryRules,
) -> VictoryResult {
    let p1_gone = armies.player1.is_empty();
    let p2_gone = armies.player2.is_empty();

    match (p1_gone, p2_gone) {
        (true, true) => {
            return VictoryResult::decided(
                Winner::Draw,
                VictoryReason::MutualAnnihilation,
                "Both armies have been destroyed".to_string(),
            )
        }
        (true, false) | (false, true) => {
            let winner = if p1_gone { Side::Player2 } else { Side::Player1 };
            return VictoryResult::decided(
                winner.into(),
                VictoryReason::EnemyAnnihilated,
                format!("{} destroyed the enemy army", winner),
            );
        }
        (false, false) => {}
    }

    let p1_routed = is_routed(&armies.player1, rules);
    let p2_routed = is_routed(&armies.player2, rules);
    match (p1_routed, p2_routed) {
        (true, true) => {
            return VictoryResult::decided(
                Winner::Draw,
                VictoryReason::MutualRout,
                "Both armies have fled the field".to_string(),
            )
        }
        (true, false) | (false, true) => {
            let winner = if p1_routed { Side::Player2 } else { Side::Player1 };
            return VictoryResult::decided(
                winner.into(),
                VictoryReason::EnemyRouted,
                format!("{} routed the enemy army", winner),
            );
        }
        (false, false) => {}
    }

    if max_turns == 0 || turn < max_turns {
        return VictoryResult::ongoing();
    }

    let p1 = armies.player1.total_strength() as f32;
    let p2 = armies.player2.total_strength() as f32;
    let ratio = if p2 > 0.0 { p1 / p2 } else { f32::INFINITY };

    if ratio > rules.tactical_victory_ratio {
        VictoryResult::decided(
            Winner::Player1,
            VictoryReason::TacticalVictory,
            format!("Time is up; player1 holds the field ({:.2}:1)", ratio),
        )
    } else if ratio < rules.tactical_defeat_ratio {
        VictoryResult::decided(
            Winner::Player2,
            VictoryReason::TacticalVictory,
            format!("Time is up; player2 holds the field ({:.2}:1)", ratio),
        )
    } else {
        VictoryResult::decided(
            Winner::Draw,
            VictoryReason::Stalemate,
            "Time is up; neither side could break the other".to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::grid::GridCoord;
    use crate::battle::unit_type::UnitType;
    use crate::battle::units::Unit;
    use crate::combat::culture::Culture;
    use crate::core::types::PlayerId;

    fn army(strengths: &[(u32, u32)]) -> Army {
        let units = strengths
            .iter()
            .enumerate()
            .map(|(i, (current, max))| {
                let position = GridCoord::parse("E5").unwrap();
                let id = format!("u{i}");
                let mut unit = Unit::new(id.as_str(), UnitType::Infantry, position, *max);
                unit.current_strength = *current;
                unit
            })
            .collect();
        Army::new(PlayerId::new("p"), Culture::Roman, units)
    }

    #[test]
    fn test_annihilation_ignores_turn() {
        let armies = SidePair::new(army(&[]), army(&[(10, 100)]));
        let result = check_victory_conditions(&armies, 1, 20, &VictoryRules::default());
        assert!(result.achieved);
        assert_eq!(result.winner, Some(Winner::Player2));
        assert_eq!(result.reason, Some(VictoryReason::EnemyAnnihilated));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["winner"], "player2");
        assert_eq!(json["reason"], "enemy_annihilated");
    }

    #[test]
    fn test_rout_below_quarter_strength() {
        let armies = SidePair::new(army(&[(20, 100), (4, 100)]), army(&[(90, 100)]));
        let result = check_victory_conditions(&armies, 2, 20, &VictoryRules::default());
        assert_eq!(result.winner, Some(Winner::Player2));
        assert_eq!(result.reason, Some(VictoryReason::EnemyRouted));

        let holding = SidePair::new(army(&[(30, 100), (30, 100)]), army(&[(90, 100)]));
        assert!(!check_victory_conditions(&holding, 2, 20, &VictoryRules::default()).achieved);
    }

    #[test]
    fn test_turn_limit_ratios() {
        let rules = VictoryRules::default();
        let strong = SidePair::new(army(&[(80, 100)]), army(&[(50, 100)]));
        assert!(!check_victory_conditions(&strong, 19, 20, &rules).achieved);

        let result = check_victory_conditions(&strong, 20, 20, &rules);
        assert_eq!(result.winner, Some(Winner::Player1));
        assert_eq!(result.reason, Some(VictoryReason::TacticalVictory));

        let weak = SidePair::new(army(&[(30, 100)]), army(&[(60, 100)]));
        assert_eq!(check_victory_conditions(&weak, 20, 20, &rules).winner, Some(Winner::Player2));

        let even = SidePair::new(army(&[(60, 100)]), army(&[(55, 100)]));
        let result = check_victory_conditions(&even, 20, 20, &rules);
        assert_eq!(result.winner, Some(Winner::Draw));
        assert_eq!(result.reason, Some(VictoryReason::Stalemate));
    }
}
