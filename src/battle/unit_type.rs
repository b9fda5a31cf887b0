//! Unit types and their default properties
//!
//! The unit type decides initiative, mount, ranged reach and vision.

use serde::{Deserialize, Serialize};

/// Type of military unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    // Fast movers
    Scouts,       // Reconnaissance
    LightCavalry, // Fast, skirmish
    HeavyCavalry, // Shock, armored

    // Light foot
    Skirmishers, // Javelins, loose order
    Archers,     // Ranged, vulnerable in melee
    LightInfantry,

    // Line
    #[default]
    Infantry, // Standard foot soldiers
    HeavyInfantry, // Armored, slow, tough
}

/// Default properties for a unit type
#[derive(Debug, Clone, Copy)]
pub struct UnitProperties {
    /// Movement order within a turn; lower moves first
    pub initiative_tier: u8,
    pub mounted: bool,
    pub ranged: bool,
    /// Added to the base detection range
    pub vision_bonus: f32,
}

impl UnitType {
    pub fn label(&self) -> &'static str {
        match self {
            UnitType::Scouts => "scouts",
            UnitType::LightCavalry => "light cavalry",
            UnitType::HeavyCavalry => "heavy cavalry",
            UnitType::Skirmishers => "skirmishers",
            UnitType::Archers => "archers",
            UnitType::LightInfantry => "light infantry",
            UnitType::Infantry => "infantry",
            UnitType::HeavyInfantry => "heavy infantry",
        }
    }

    /// Get default properties for this unit type
    pub fn default_properties(&self) -> UnitProperties {
        match self {
            UnitType::Scouts => UnitProperties {
                initiative_tier: 0,
                mounted: true,
                ranged: false,
                vision_bonus: 4.0,
            },
            UnitType::LightCavalry => UnitProperties {
                initiative_tier: 1,
                mounted: true,
                ranged: false,
                vision_bonus: 0.0,
            },
            UnitType::HeavyCavalry => UnitProperties {
                initiative_tier: 1,
                mounted: true,
                ranged: false,
                vision_bonus: 0.0,
            },
            UnitType::Skirmishers => UnitProperties {
                initiative_tier: 2,
                mounted: false,
                ranged: true,
                vision_bonus: 0.0,
            },
            UnitType::Archers => UnitProperties {
                initiative_tier: 2,
                mounted: false,
                ranged: true,
                vision_bonus: 0.0,
            },
            UnitType::LightInfantry => UnitProperties {
                initiative_tier: 2,
                mounted: false,
                ranged: false,
                vision_bonus: 0.0,
            },
            UnitType::Infantry | UnitType::HeavyInfantry => UnitProperties {
                initiative_tier: 3,
                mounted: false,
                ranged: false,
                vision_bonus: 0.0,
            },
        }
    }

    /// Is this a mounted unit?
    pub fn is_mounted(&self) -> bool {
        self.default_properties().mounted
    }

    /// Is this a ranged unit?
    pub fn is_ranged(&self) -> bool {
        self.default_properties().ranged
    }

    /// Scouts < cavalry < light foot < line infantry
    pub fn initiative_tier(&self) -> u8 {
        self.default_properties().initiative_tier
    }

    pub fn is_scout(&self) -> bool {
        matches!(self, UnitType::Scouts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cavalry_is_mounted() {
        assert!(UnitType::LightCavalry.is_mounted());
        assert!(UnitType::HeavyCavalry.is_mounted());
        assert!(!UnitType::Infantry.is_mounted());
    }

    #[test]
    fn test_archers_are_ranged() {
        assert!(UnitType::Archers.is_ranged());
        assert!(UnitType::Skirmishers.is_ranged());
        assert!(!UnitType::Infantry.is_ranged());
    }

    #[test]
    fn test_initiative_tiers_ordered() {
        assert!(UnitType::Scouts.initiative_tier() < UnitType::LightCavalry.initiative_tier());
        assert!(
            UnitType::HeavyCavalry.initiative_tier() < UnitType::LightInfantry.initiative_tier()
        );
        assert!(
            UnitType::LightInfantry.initiative_tier() < UnitType::HeavyInfantry.initiative_tier()
        );
        assert_eq!(
            UnitType::Infantry.initiative_tier(),
            UnitType::HeavyInfantry.initiative_tier()
        );
    }

    #[test]
    fn test_scouts_see_further() {
        assert!(UnitType::Scouts.default_properties().vision_bonus > 0.0);
    }
}
