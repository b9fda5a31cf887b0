//! Weapon, armor and shield categories for combat resolution
//!
//! Effectiveness comes from a lookup keyed `"{weapon_class}_vs_{armor_class}"`.
//! Named weapons may override the lookup (the falx ignores shields).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Effectiveness for weapon/armor pairs missing from the table
pub const DEFAULT_WEAPON_EFFECTIVENESS: f32 = 0.7;

/// Weapon category - decides the effectiveness row and attack bonus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponClass {
    #[default]
    Sword,
    Spear,
    Pike,
    Axe,
    Mace,
    Lance,
    Dagger,
    Bow,
    Sling,
    Javelin,
}

impl WeaponClass {
    pub fn label(&self) -> &'static str {
        match self {
            WeaponClass::Sword => "sword",
            WeaponClass::Spear => "spear",
            WeaponClass::Pike => "pike",
            WeaponClass::Axe => "axe",
            WeaponClass::Mace => "mace",
            WeaponClass::Lance => "lance",
            WeaponClass::Dagger => "dagger",
            WeaponClass::Bow => "bow",
            WeaponClass::Sling => "sling",
            WeaponClass::Javelin => "javelin",
        }
    }

    /// Can strike at ranged engagement distance
    pub fn is_missile(&self) -> bool {
        matches!(self, WeaponClass::Bow | WeaponClass::Sling | WeaponClass::Javelin)
    }

    /// Additive attack bonus (stat points)
    pub fn attack_bonus(&self) -> f32 {
        match self {
            WeaponClass::Axe | WeaponClass::Lance => 2.0,
            WeaponClass::Sword
            | WeaponClass::Spear
            | WeaponClass::Pike
            | WeaponClass::Mace
            | WeaponClass::Bow
            | WeaponClass::Javelin => 1.0,
            WeaponClass::Dagger | WeaponClass::Sling => 0.0,
        }
    }
}

/// Armor weight category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmorClass {
    None,
    #[default]
    Light,
    Medium,
    Heavy,
}

impl ArmorClass {
    pub fn label(&self) -> &'static str {
        match self {
            ArmorClass::None => "none",
            ArmorClass::Light => "light",
            ArmorClass::Medium => "medium",
            ArmorClass::Heavy => "heavy",
        }
    }

    pub fn defense_bonus(&self) -> f32 {
        match self {
            ArmorClass::None => 0.0,
            ArmorClass::Light => 1.0,
            ArmorClass::Medium => 2.0,
            ArmorClass::Heavy => 3.0,
        }
    }

    /// Heavy armor slows the unit
    pub fn mobility_penalty(&self) -> f32 {
        match self {
            ArmorClass::Heavy => 1.0,
            _ => 0.0,
        }
    }
}

/// Shield category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShieldType {
    #[default]
    None,
    Small,
    Large,
    Scutum,
}

impl ShieldType {
    pub fn defense_bonus(&self) -> f32 {
        match self {
            ShieldType::None => 0.0,
            ShieldType::Small => 1.0,
            ShieldType::Large => 2.0,
            ShieldType::Scutum => 3.0,
        }
    }

    /// Multiplier a shield applies to incoming weapon effectiveness
    pub fn deflection(&self) -> f32 {
        match self {
            ShieldType::None => 1.0,
            ShieldType::Small => 0.95,
            ShieldType::Large => 0.9,
            ShieldType::Scutum => 0.85,
        }
    }
}

/// A unit's weapon: a catalog name plus its category
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WeaponRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub class: WeaponClass,
}

impl WeaponRef {
    pub fn new(name: impl Into<String>, class: WeaponClass) -> Self {
        Self {
            name: name.into(),
            class,
        }
    }
}

/// Named-weapon exception to the effectiveness table
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponOverride {
    /// Shields do not reduce this weapon and effectiveness is forced to 1.0
    pub ignores_shields: bool,
    /// Fixed effectiveness, replacing the table lookup
    pub effectiveness: Option<f32>,
}

/// Built-in weapon-vs-armor effectiveness table
pub fn default_effectiveness_table() -> HashMap<String, f32> {
    let rows: [(WeaponClass, [f32; 4]); 10] = [
        //                     none  light medium heavy
        (WeaponClass::Sword, [1.2, 1.0, 0.85, 0.65]),
        (WeaponClass::Spear, [1.1, 1.0, 0.9, 0.75]),
        (WeaponClass::Pike, [1.1, 1.0, 0.9, 0.8]),
        (WeaponClass::Axe, [1.2, 1.05, 0.9, 0.8]),
        (WeaponClass::Mace, [1.0, 0.95, 0.95, 0.9]),
        (WeaponClass::Lance, [1.3, 1.15, 1.0, 0.85]),
        (WeaponClass::Dagger, [1.0, 0.8, 0.6, 0.4]),
        (WeaponClass::Bow, [1.1, 0.9, 0.7, 0.5]),
        (WeaponClass::Sling, [1.0, 0.9, 0.8, 0.7]),
        (WeaponClass::Javelin, [1.1, 1.0, 0.8, 0.6]),
    ];
    let armors = [
        ArmorClass::None,
        ArmorClass::Light,
        ArmorClass::Medium,
        ArmorClass::Heavy,
    ];

    let mut table = HashMap::new();
    for (weapon, values) in rows {
        for (armor, value) in armors.iter().zip(values) {
            table.insert(format!("{}_vs_{}", weapon.label(), armor.label()), value);
        }
    }
    table
}

/// Built-in named weapon overrides
pub fn default_weapon_overrides() -> HashMap<String, WeaponOverride> {
    let shield_breaker = WeaponOverride {
        ignores_shields: true,
        effectiveness: None,
    };
    HashMap::from([
        ("falx".to_string(), shield_breaker),
        ("rhomphaia".to_string(), shield_breaker),
    ])
}

/// Effectiveness of `weapon` against a target wearing `armor` behind `shield`
pub fn weapon_effectiveness(
    table: &HashMap<String, f32>,
    overrides: &HashMap<String, WeaponOverride>,
    default_effectiveness: f32,
    weapon: &WeaponRef,
    armor: ArmorClass,
    shield: ShieldType,
) -> f32 {
    if let Some(over) = overrides.get(&weapon.name.to_lowercase()) {
        if over.ignores_shields {
            return 1.0;
        }
        if let Some(value) = over.effectiveness {
            return value * shield.deflection();
        }
    }

    let key = format!("{}_vs_{}", weapon.class.label(), armor.label());
    let base = table.get(&key).copied().unwrap_or(default_effectiveness);
    base * shield.deflection()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(weapon: &WeaponRef, armor: ArmorClass, shield: ShieldType) -> f32 {
        weapon_effectiveness(
            &default_effectiveness_table(),
            &default_weapon_overrides(),
            DEFAULT_WEAPON_EFFECTIVENESS,
            weapon,
            armor,
            shield,
        )
    }

    #[test]
    fn test_table_lookup() {
        let sword = WeaponRef::new("gladius", WeaponClass::Sword);
        assert_eq!(lookup(&sword, ArmorClass::Light, ShieldType::None), 1.0);
        assert_eq!(lookup(&sword, ArmorClass::Heavy, ShieldType::None), 0.65);
    }

    #[test]
    fn test_missing_pair_defaults() {
        let sword = WeaponRef::new("gladius", WeaponClass::Sword);
        let eff = weapon_effectiveness(
            &HashMap::new(),
            &HashMap::new(),
            DEFAULT_WEAPON_EFFECTIVENESS,
            &sword,
            ArmorClass::Light,
            ShieldType::None,
        );
        assert_eq!(eff, 0.7);
    }

    #[test]
    fn test_shield_reduces_effectiveness() {
        let spear = WeaponRef::new("hasta", WeaponClass::Spear);
        let bare = lookup(&spear, ArmorClass::Medium, ShieldType::None);
        let shielded = lookup(&spear, ArmorClass::Medium, ShieldType::Scutum);
        assert!(shielded < bare);
    }

    #[test]
    fn test_falx_ignores_shields() {
        let falx = WeaponRef::new("Falx", WeaponClass::Sword);
        assert_eq!(lookup(&falx, ArmorClass::Heavy, ShieldType::Scutum), 1.0);
        assert_eq!(lookup(&falx, ArmorClass::None, ShieldType::None), 1.0);
    }

    #[test]
    fn test_missile_classes() {
        assert!(WeaponClass::Bow.is_missile());
        assert!(WeaponClass::Javelin.is_missile());
        assert!(!WeaponClass::Pike.is_missile());
    }
}
