//! Cultures: conditional combat modifiers, formation restrictions and
//! environmental immunities

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::battle::terrain::Terrain;
use crate::battle::units::Formation;
use crate::combat::environment::Weather;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Culture {
    #[default]
    Roman,
    Greek,
    Celtic,
    Germanic,
    Nomad,
    Carthaginian,
}

impl Culture {
    pub fn label(&self) -> &'static str {
        match self {
            Culture::Roman => "roman",
            Culture::Greek => "greek",
            Culture::Celtic => "celtic",
            Culture::Germanic => "germanic",
            Culture::Nomad => "nomad",
            Culture::Carthaginian => "carthaginian",
        }
    }
}

impl fmt::Display for Culture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// When a cultural modifier applies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CulturalCondition {
    Always,
    OnTerrain { terrain: Terrain },
    InWeather { weather: Weather },
    InFormation { formation: Formation },
    Attacking,
    Defending,
    Mounted,
}

/// Facts about one side of an engagement that conditions test against
#[derive(Debug, Clone, Copy)]
pub struct CultureContext {
    pub terrain: Terrain,
    pub weather: Weather,
    pub formation: Formation,
    pub attacking: bool,
    pub mounted: bool,
}

impl CulturalCondition {
    pub fn holds(&self, ctx: &CultureContext) -> bool {
        match self {
            CulturalCondition::Always => true,
            CulturalCondition::OnTerrain { terrain } => *terrain == ctx.terrain,
            CulturalCondition::InWeather { weather } => *weather == ctx.weather,
            CulturalCondition::InFormation { formation } => *formation == ctx.formation,
            CulturalCondition::Attacking => ctx.attacking,
            CulturalCondition::Defending => !ctx.attacking,
            CulturalCondition::Mounted => ctx.mounted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CulturalModifier {
    pub name: String,
    pub culture: Culture,
    pub condition: CulturalCondition,
    #[serde(default = "one")]
    pub attack_multiplier: f32,
    #[serde(default = "one")]
    pub defense_multiplier: f32,
}

fn one() -> f32 {
    1.0
}

fn modifier(
    name: &str,
    culture: Culture,
    condition: CulturalCondition,
    attack_multiplier: f32,
    defense_multiplier: f32,
) -> CulturalModifier {
    CulturalModifier {
        name: name.to_string(),
        culture,
        condition,
        attack_multiplier,
        defense_multiplier,
    }
}

pub fn default_cultural_modifiers() -> Vec<CulturalModifier> {
    use CulturalCondition::*;
    vec![
        modifier(
            "roman_testudo_discipline",
            Culture::Roman,
            InFormation { formation: Formation::Testudo },
            1.0,
            1.2,
        ),
        modifier("roman_drill", Culture::Roman, Always, 1.0, 1.05),
        modifier(
            "greek_shield_wall",
            Culture::Greek,
            InFormation { formation: Formation::Phalanx },
            1.1,
            1.2,
        ),
        modifier("celtic_furious_charge", Culture::Celtic, Attacking, 1.15, 1.0),
        modifier(
            "germanic_forest_warfare",
            Culture::Germanic,
            OnTerrain { terrain: Terrain::Forest },
            1.2,
            1.1,
        ),
        modifier(
            "nomad_open_ground",
            Culture::Nomad,
            OnTerrain { terrain: Terrain::Plains },
            1.15,
            1.0,
        ),
        modifier("nomad_horse_archery", Culture::Nomad, Mounted, 1.1, 1.0),
        modifier(
            "carthaginian_combined_arms",
            Culture::Carthaginian,
            Always,
            1.05,
            1.0,
        ),
    ]
}

/// Formations each culture may not adopt
pub fn default_cultural_restrictions() -> HashMap<String, Vec<Formation>> {
    HashMap::from([
        (Culture::Roman.label().to_string(), vec![]),
        (Culture::Greek.label().to_string(), vec![Formation::Testudo]),
        (
            Culture::Celtic.label().to_string(),
            vec![Formation::Phalanx, Formation::Testudo],
        ),
        (Culture::Germanic.label().to_string(), vec![Formation::Testudo]),
        (
            Culture::Nomad.label().to_string(),
            vec![Formation::Phalanx, Formation::Testudo, Formation::Square],
        ),
        (Culture::Carthaginian.label().to_string(), vec![]),
    ])
}

/// Environmental effects (by name) each culture ignores
pub fn default_environment_immunities() -> HashMap<String, Vec<String>> {
    let names = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    HashMap::from([
        (Culture::Celtic.label().to_string(), names(&["rain_slick"])),
        (
            Culture::Germanic.label().to_string(),
            names(&["forest_tangle", "snow_chill"]),
        ),
        (Culture::Nomad.label().to_string(), names(&["heat_exhaustion"])),
        (
            Culture::Carthaginian.label().to_string(),
            names(&["heat_exhaustion"]),
        ),
    ])
}

/// Is `formation` forbidden to `culture`?
pub fn is_restricted(
    restrictions: &HashMap<String, Vec<Formation>>,
    culture: Culture,
    formation: Formation,
) -> bool {
    restrictions
        .get(culture.label())
        .is_some_and(|forbidden| forbidden.contains(&formation))
}

/// Product of matching modifiers as (attack, defense) multipliers
pub fn cultural_multipliers(
    modifiers: &[CulturalModifier],
    culture: Culture,
    ctx: &CultureContext,
) -> (f32, f32) {
    modifiers
        .iter()
        .filter(|m| m.culture == culture && m.condition.holds(ctx))
        .fold((1.0, 1.0), |(atk, def), m| {
            (atk * m.attack_multiplier, def * m.defense_multiplier)
        })
}
