//! Formation-versus-formation interactions
//!
//! Keyed `"{attacker}_vs_{defender}"` by formation label. Values are additive
//! stat points: `attack` goes to the attacker, `defense` to the defender.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::battle::units::Formation;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationInteraction {
    pub attack: f32,
    pub defense: f32,
}

impl FormationInteraction {
    pub const NEUTRAL: FormationInteraction = FormationInteraction {
        attack: 0.0,
        defense: 0.0,
    };
}

pub fn interaction_key(attacker: Formation, defender: Formation) -> String {
    format!("{}_vs_{}", attacker.label(), defender.label())
}

/// Built-in interaction matrix; pairs not listed are neutral
pub fn default_formation_interactions() -> HashMap<String, FormationInteraction> {
    use Formation::*;
    let entries: [(Formation, Formation, f32, f32); 14] = [
        (Wedge, Line, 3.0, 0.0),
        (Wedge, Column, 3.0, 0.0),
        (Wedge, Phalanx, -2.0, 2.0),
        (Wedge, Square, -3.0, 2.0),
        (Phalanx, Line, 2.0, 0.0),
        (Line, Phalanx, -1.0, 2.0),
        (Line, Column, 2.0, 0.0),
        (Line, Skirmish, 1.0, 0.0),
        (Line, Testudo, -2.0, 3.0),
        (Column, Line, -1.0, 0.0),
        (Skirmish, Phalanx, 2.0, 0.0),
        (Skirmish, Testudo, -2.0, 2.0),
        (Testudo, Line, -1.0, 0.0),
        (Square, Wedge, 1.0, 0.0),
    ];

    entries
        .into_iter()
        .map(|(a, d, attack, defense)| {
            (
                interaction_key(a, d),
                FormationInteraction { attack, defense },
            )
        })
        .collect()
}

/// Look up an interaction, neutral when the pair is unlisted
pub fn formation_interaction(
    table: &HashMap<String, FormationInteraction>,
    attacker: Formation,
    defender: Formation,
) -> FormationInteraction {
    let key = interaction_key(attacker, defender);
    match table.get(&key) {
        Some(interaction) => *interaction,
        None => {
            debug!(pair = %key, "No formation interaction listed, treating as neutral");
            FormationInteraction::NEUTRAL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listed_pair() {
        let table = default_formation_interactions();
        let i = formation_interaction(&table, Formation::Wedge, Formation::Line);
        assert_eq!(i.attack, 3.0);
        assert_eq!(i.defense, 0.0);
    }

    #[test]
    fn test_unlisted_pair_is_neutral() {
        let table = default_formation_interactions();
        let i = formation_interaction(&table, Formation::Square, Formation::Square);
        assert_eq!(i, FormationInteraction::NEUTRAL);
    }

    #[test]
    fn test_key_format() {
        assert_eq!(interaction_key(Formation::Phalanx, Formation::Testudo), "phalanx_vs_testudo");
    }
}
