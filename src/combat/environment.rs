//! Weather and terrain effects on combat power
//!
//! An effect applies to both sides of an engagement alike; a culture listed
//! as immune to an effect by name is spared it.

use serde::{Deserialize, Serialize};

use crate::battle::terrain::Terrain;

/// Battlefield weather, fixed for the turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    #[default]
    Clear,
    Rain,
    Fog,
    Snow,
    Heat,
    Wind,
}

impl Weather {
    pub fn label(&self) -> &'static str {
        match self {
            Weather::Clear => "clear",
            Weather::Rain => "rain",
            Weather::Fog => "fog",
            Weather::Snow => "snow",
            Weather::Heat => "heat",
            Weather::Wind => "wind",
        }
    }
}

/// One environmental multiplier; `None` conditions match anything
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalEffect {
    pub name: String,
    #[serde(default)]
    pub weather: Option<Weather>,
    #[serde(default)]
    pub terrain: Option<Terrain>,
    /// Multiplier applied to the power of each non-immune side
    pub multiplier: f32,
    /// Only applies to ranged engagements
    #[serde(default)]
    pub ranged_only: bool,
}

impl EnvironmentalEffect {
    pub fn matches(&self, weather: Weather, terrain: Terrain, ranged: bool) -> bool {
        if self.ranged_only && !ranged {
            return false;
        }
        self.weather.map_or(true, |w| w == weather) && self.terrain.map_or(true, |t| t == terrain)
    }
}

fn effect(
    name: &str,
    weather: Option<Weather>,
    terrain: Option<Terrain>,
    multiplier: f32,
    ranged_only: bool,
) -> EnvironmentalEffect {
    EnvironmentalEffect {
        name: name.to_string(),
        weather,
        terrain,
        multiplier,
        ranged_only,
    }
}

/// Built-in environmental effects
pub fn default_environmental_effects() -> Vec<EnvironmentalEffect> {
    vec![
        effect("rain_slick", Some(Weather::Rain), None, 0.9, false),
        effect("rain_wet_strings", Some(Weather::Rain), None, 0.8, true),
        effect("fog_confusion", Some(Weather::Fog), None, 0.85, false),
        effect("snow_chill", Some(Weather::Snow), None, 0.9, false),
        effect("heat_exhaustion", Some(Weather::Heat), None, 0.9, false),
        effect("wind_scatters_missiles", Some(Weather::Wind), None, 0.8, true),
        effect("marsh_mire", None, Some(Terrain::Marsh), 0.85, false),
        effect("forest_tangle", None, Some(Terrain::Forest), 0.9, false),
    ]
}

/// Combined multiplier for one side, skipping effects it is immune to
pub fn environment_multiplier(
    effects: &[EnvironmentalEffect],
    immunities: &[String],
    weather: Weather,
    terrain: Terrain,
    ranged: bool,
) -> f32 {
    effects
        .iter()
        .filter(|e| e.matches(weather, terrain, ranged))
        .filter(|e| !immunities.iter().any(|name| name == &e.name))
        .map(|e| e.multiplier)
        .product()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_plains_is_neutral() {
        let m = environment_multiplier(
            &default_environmental_effects(),
            &[],
            Weather::Clear,
            Terrain::Plains,
            false,
        );
        assert_eq!(m, 1.0);
    }

    #[test]
    fn test_weather_and_terrain_stack() {
        let m = environment_multiplier(
            &default_environmental_effects(),
            &[],
            Weather::Fog,
            Terrain::Marsh,
            false,
        );
        assert!((m - 0.85 * 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_ranged_only_effects() {
        let effects = default_environmental_effects();
        let melee = environment_multiplier(&effects, &[], Weather::Wind, Terrain::Plains, false);
        let ranged = environment_multiplier(&effects, &[], Weather::Wind, Terrain::Plains, true);
        assert_eq!(melee, 1.0);
        assert_eq!(ranged, 0.8);
    }

    #[test]
    fn test_immunity_cancels_named_effect() {
        let effects = default_environmental_effects();
        let immune = vec!["forest_tangle".to_string()];
        let m = environment_multiplier(&effects, &immune, Weather::Clear, Terrain::Forest, false);
        assert_eq!(m, 1.0);
    }
}
