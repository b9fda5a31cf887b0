//! Positional modifiers for an engagement
//!
//! Flanking, elevation, ford crossings, forest, marsh and in-progress
//! formation changes, plus whatever the map adds per terrain. All values
//! are additive stat points.

use serde::{Deserialize, Serialize};

use crate::battle::battle_map::MapDescriptor;
use crate::battle::terrain::Terrain;
use crate::battle::units::Unit;
use crate::core::config::PositionalRules;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionalModifiers {
    pub attacker_attack: i32,
    pub attacker_defense: i32,
    pub defender_attack: i32,
    pub defender_defense: i32,
    /// Short labels of the modifiers that fired
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl PositionalModifiers {
    fn note(&mut self, text: impl Into<String>) {
        self.notes.push(text.into());
    }
}

/// Compute modifiers for `attacker` striking `defender`
///
/// `flankers` is the number of additional friendly units next to the
/// defender that are also engaging it this turn.
pub fn positional_modifiers(
    attacker: &Unit,
    defender: &Unit,
    flankers: usize,
    map: &MapDescriptor,
    rules: &PositionalRules,
) -> PositionalModifiers {
    let mut mods = PositionalModifiers::default();
    let att_terrain = map.terrain_at(attacker.position);
    let def_terrain = map.terrain_at(defender.position);

    let flank = rules.flanking_bonus(flankers);
    if flank != 0 {
        mods.attacker_attack += flank;
        mods.note(format!("flanking x{}", flankers));
    }

    if def_terrain.is_elevated() {
        mods.defender_defense += rules.elevation_bonus;
        mods.note("defender holds high ground");
    } else if att_terrain.is_elevated() {
        mods.attacker_attack += rules.elevation_bonus;
        mods.note("attacker strikes downhill");
    }

    if def_terrain == Terrain::Ford && att_terrain != Terrain::Ford {
        mods.attacker_attack -= rules.ford_attack_penalty;
        mods.defender_defense += rules.ford_defense_bonus;
        mods.note("attack across a ford");
    }

    if def_terrain == Terrain::Forest {
        mods.defender_defense += rules.forest_defense_bonus;
        mods.note("defender in forest");
        if attacker.is_mounted() {
            mods.attacker_attack -= rules.forest_mounted_penalty;
            mods.note("cavalry in the trees");
        }
    }

    if att_terrain == Terrain::Marsh || def_terrain == Terrain::Marsh {
        mods.attacker_attack -= rules.marsh_penalty;
        mods.defender_defense -= rules.marsh_penalty;
        mods.note("marsh");
    }

    if let Some(change) = &attacker.formation_change {
        mods.attacker_defense -= change.defense_penalty;
        mods.note("attacker reforming");
    }
    if let Some(change) = &defender.formation_change {
        mods.defender_defense -= change.defense_penalty;
        mods.note("defender reforming");
    }

    let att_map = map.combat_modifier(att_terrain);
    let def_map = map.combat_modifier(def_terrain);
    mods.attacker_attack += att_map.attack;
    mods.attacker_defense += att_map.defense;
    mods.defender_attack += def_map.attack;
    mods.defender_defense += def_map.defense;

    mods
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::battle_map::TerrainCombatModifier;
    use crate::battle::grid::GridCoord;
    use crate::battle::unit_type::UnitType;
    use crate::battle::units::{Formation, FormationChange};

    fn c(text: &str) -> GridCoord {
        GridCoord::parse(text).unwrap()
    }

    fn pair(att_pos: &str, def_pos: &str) -> (Unit, Unit) {
        (
            Unit::new("a", UnitType::Infantry, c(att_pos), 100),
            Unit::new("d", UnitType::Infantry, c(def_pos), 100),
        )
    }

    #[test]
    fn test_open_field_is_neutral() {
        let (a, d) = pair("E5", "E6");
        let mods = positional_modifiers(
            &a,
            &d,
            0,
            &MapDescriptor::open_field(),
            &PositionalRules::default(),
        );
        assert_eq!(mods, PositionalModifiers::default());
    }

    #[test]
    fn test_flanking_tiers() {
        let (a, d) = pair("E5", "E6");
        let map = MapDescriptor::open_field();
        let rules = PositionalRules::default();
        assert_eq!(positional_modifiers(&a, &d, 1, &map, &rules).attacker_attack, 2);
        assert_eq!(positional_modifiers(&a, &d, 2, &map, &rules).attacker_attack, 4);
        assert_eq!(positional_modifiers(&a, &d, 5, &map, &rules).attacker_attack, 4);
    }

    #[test]
    fn test_elevation() {
        let (a, d) = pair("E5", "E6");
        let rules = PositionalRules::default();

        let mut map = MapDescriptor::open_field();
        map.set_terrain(c("E6"), Terrain::Hill);
        let mods = positional_modifiers(&a, &d, 0, &map, &rules);
        assert_eq!(mods.defender_defense, 2);
        assert_eq!(mods.attacker_attack, 0);

        let mut map = MapDescriptor::open_field();
        map.set_terrain(c("E5"), Terrain::Hill);
        let mods = positional_modifiers(&a, &d, 0, &map, &rules);
        assert_eq!(mods.attacker_attack, 2);
        assert_eq!(mods.defender_defense, 0);
    }

    #[test]
    fn test_ford_crossing() {
        let (a, d) = pair("J9", "J10");
        let mut map = MapDescriptor::open_field();
        map.set_terrain(c("J10"), Terrain::Ford);
        let mods = positional_modifiers(&a, &d, 0, &map, &PositionalRules::default());
        assert_eq!(mods.attacker_attack, -4);
        assert_eq!(mods.defender_defense, 3);
    }

    #[test]
    fn test_forest_punishes_cavalry() {
        let a = Unit::new("a", UnitType::HeavyCavalry, c("E5"), 100);
        let d = Unit::new("d", UnitType::Infantry, c("E6"), 100);
        let mut map = MapDescriptor::open_field();
        map.set_terrain(c("E6"), Terrain::Forest);
        let mods = positional_modifiers(&a, &d, 0, &map, &PositionalRules::default());
        assert_eq!(mods.attacker_attack, -4);
        assert_eq!(mods.defender_defense, 2);
    }

    #[test]
    fn test_marsh_hurts_both() {
        let (a, d) = pair("E5", "E6");
        let mut map = MapDescriptor::open_field();
        map.set_terrain(c("E5"), Terrain::Marsh);
        let mods = positional_modifiers(&a, &d, 0, &map, &PositionalRules::default());
        assert_eq!(mods.attacker_attack, -2);
        assert_eq!(mods.defender_defense, -2);
    }

    #[test]
    fn test_reforming_defender_is_vulnerable() {
        let (a, mut d) = pair("E5", "E6");
        d.formation_change = Some(FormationChange {
            target_formation: Formation::Phalanx,
            remaining_turns: 1,
            defense_penalty: 3,
        });
        let mods = positional_modifiers(
            &a,
            &d,
            0,
            &MapDescriptor::open_field(),
            &PositionalRules::default(),
        );
        assert_eq!(mods.defender_defense, -3);
    }

    #[test]
    fn test_map_modifiers_stack() {
        let (a, d) = pair("E5", "E6");
        let mut map = MapDescriptor::open_field();
        map.set_terrain(c("E6"), Terrain::Hill);
        map.combat_modifiers.insert(
            "hill".into(),
            TerrainCombatModifier { attack: 0, defense: 1 },
        );
        let mods = positional_modifiers(&a, &d, 0, &map, &PositionalRules::default());
        assert_eq!(mods.defender_defense, 3);
    }
}
