//! Units and armies
//!
//! A unit is one block of soldiers on one tile. An army is one side's
//! collection of units plus the culture that constrains it.

use serde::{Deserialize, Serialize};

use crate::battle::constants::MAX_MORALE;
use crate::battle::grid::GridCoord;
use crate::battle::mission::Mission;
use crate::battle::unit_type::UnitType;
use crate::combat::accumulation::DamageAccumulation;
use crate::combat::culture::Culture;
use crate::combat::weapons::{ArmorClass, ShieldType, WeaponRef};
use crate::core::types::{PlayerId, UnitId};

/// Quality tier, decides base stats and break threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityType {
    Levy,
    Militia,
    #[default]
    Professional,
    VeteranMercenary,
    Elite,
}

impl QualityType {
    pub fn label(&self) -> &'static str {
        match self {
            QualityType::Levy => "levy",
            QualityType::Militia => "militia",
            QualityType::Professional => "professional",
            QualityType::VeteranMercenary => "veteran_mercenary",
            QualityType::Elite => "elite",
        }
    }

    /// Mercenaries walk away instead of routing
    pub fn deserts_when_broken(&self) -> bool {
        matches!(self, QualityType::VeteranMercenary)
    }
}

/// Drill level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Training {
    Raw,
    #[default]
    Drilled,
    Seasoned,
}

impl Training {
    /// Additive attack/defense modifier
    pub fn modifier(&self) -> f32 {
        match self {
            Training::Raw => -1.0,
            Training::Drilled => 0.0,
            Training::Seasoned => 1.0,
        }
    }
}

/// Tactical formation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formation {
    #[default]
    Line,
    Column,
    Wedge,
    Phalanx,
    Testudo,
    Skirmish,
    Square,
}

impl Formation {
    pub fn label(&self) -> &'static str {
        match self {
            Formation::Line => "line",
            Formation::Column => "column",
            Formation::Wedge => "wedge",
            Formation::Phalanx => "phalanx",
            Formation::Testudo => "testudo",
            Formation::Skirmish => "skirmish",
            Formation::Square => "square",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "line" => Some(Formation::Line),
            "column" => Some(Formation::Column),
            "wedge" => Some(Formation::Wedge),
            "phalanx" => Some(Formation::Phalanx),
            "testudo" | "tortoise" => Some(Formation::Testudo),
            "skirmish" | "loose" => Some(Formation::Skirmish),
            "square" => Some(Formation::Square),
            _ => None,
        }
    }

    /// Takes a full turn to assume
    pub fn requires_preparation(&self) -> bool {
        matches!(self, Formation::Phalanx | Formation::Testudo)
    }

    /// Needs a minimum share of the unit's strength
    pub fn requires_strength(&self) -> bool {
        matches!(self, Formation::Phalanx | Formation::Testudo | Formation::Wedge)
    }

    /// Cannot be held on broken ground
    pub fn forbidden_on_rough_ground(&self) -> bool {
        matches!(self, Formation::Phalanx | Formation::Testudo)
    }
}

/// In-progress formation change; absent when the formation is stable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormationChange {
    pub target_formation: Formation,
    pub remaining_turns: u32,
    pub defense_penalty: i32,
}

fn full_morale() -> i32 {
    MAX_MORALE
}

/// A unit on the battlefield
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub unit_id: UnitId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unit_type: UnitType,
    pub position: GridCoord,
    pub current_strength: u32,
    pub max_strength: u32,
    #[serde(default)]
    pub mounted: bool,
    #[serde(default)]
    pub quality_type: QualityType,
    #[serde(default)]
    pub weapon: WeaponRef,
    #[serde(default)]
    pub armor: ArmorClass,
    #[serde(default)]
    pub shield: ShieldType,
    #[serde(default)]
    pub training: Training,
    /// Battles survived; drives the veteran bonus
    #[serde(default)]
    pub experience: u32,
    #[serde(default)]
    pub formation: Formation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formation_change: Option<FormationChange>,
    #[serde(default)]
    pub movement_remaining: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_mission: Option<Mission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage_accumulation: Option<DamageAccumulation>,
    #[serde(default = "full_morale")]
    pub morale: i32,
    #[serde(default)]
    pub is_routing: bool,
    #[serde(default)]
    pub is_broken: bool,
    #[serde(default)]
    pub has_deserted: bool,
    /// Stack depth on the unit's tile after movement (0 when alone)
    #[serde(default)]
    pub compression_level: u32,
    /// Fought this turn
    #[serde(default)]
    pub in_combat: bool,
}

impl Unit {
    pub fn new(
        unit_id: impl Into<UnitId>,
        unit_type: UnitType,
        position: GridCoord,
        strength: u32,
    ) -> Self {
        Self {
            unit_id: unit_id.into(),
            name: String::new(),
            unit_type,
            position,
            current_strength: strength,
            max_strength: strength,
            mounted: unit_type.is_mounted(),
            quality_type: QualityType::default(),
            weapon: WeaponRef::default(),
            armor: ArmorClass::default(),
            shield: ShieldType::default(),
            training: Training::default(),
            experience: 0,
            formation: Formation::default(),
            formation_change: None,
            movement_remaining: 0.0,
            active_mission: None,
            damage_accumulation: None,
            morale: MAX_MORALE,
            is_routing: false,
            is_broken: false,
            has_deserted: false,
            compression_level: 0,
            in_combat: false,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted || self.unit_type.is_mounted()
    }

    /// Current / max strength, 0 for an empty unit
    pub fn strength_ratio(&self) -> f32 {
        if self.max_strength == 0 {
            return 0.0;
        }
        self.current_strength as f32 / self.max_strength as f32
    }

    /// Fraction of the unit lost so far
    pub fn loss_fraction(&self) -> f32 {
        1.0 - self.strength_ratio()
    }

    pub fn is_alive(&self) -> bool {
        self.current_strength > 0
    }

    /// Can this unit fight?
    pub fn can_fight(&self) -> bool {
        self.is_alive() && !self.is_broken && !self.is_routing && !self.has_deserted
    }

    pub fn has_ranged_capability(&self) -> bool {
        self.unit_type.is_ranged() || self.weapon.class.is_missile()
    }

    pub fn is_changing_formation(&self) -> bool {
        self.formation_change.is_some()
    }
}

/// One side's forces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Army {
    #[serde(default)]
    pub player_id: PlayerId,
    #[serde(default)]
    pub culture: Culture,
    #[serde(default)]
    pub units: Vec<Unit>,
    /// Summed max strength at deployment; 0 means "derive from units"
    #[serde(default)]
    pub starting_max_strength: u32,
}

impl Army {
    pub fn new(player_id: PlayerId, culture: Culture, units: Vec<Unit>) -> Self {
        let starting_max_strength = units.iter().map(|u| u.max_strength).sum();
        Self {
            player_id,
            culture,
            units,
            starting_max_strength,
        }
    }

    /// Get a unit by ID
    pub fn get_unit(&self, unit_id: &UnitId) -> Option<&Unit> {
        self.units.iter().find(|u| &u.unit_id == unit_id)
    }

    /// Get a mutable unit by ID
    pub fn get_unit_mut(&mut self, unit_id: &UnitId) -> Option<&mut Unit> {
        self.units.iter_mut().find(|u| &u.unit_id == unit_id)
    }

    /// Total current strength; deserters no longer count
    pub fn total_strength(&self) -> u32 {
        self.units
            .iter()
            .filter(|u| !u.has_deserted)
            .map(|u| u.current_strength)
            .sum()
    }

    /// Summed max strength the army deployed with
    pub fn starting_strength(&self) -> u32 {
        if self.starting_max_strength > 0 {
            self.starting_max_strength
        } else {
            self.units.iter().map(|u| u.max_strength).sum()
        }
    }

    /// Pin the starting strength if it was left to be derived
    pub fn record_starting_strength(&mut self) {
        if self.starting_max_strength == 0 {
            self.starting_max_strength = self.units.iter().map(|u| u.max_strength).sum();
        }
    }

    /// Remove units at zero strength, returning their ids
    pub fn remove_destroyed(&mut self) -> Vec<UnitId> {
        let destroyed: Vec<UnitId> = self
            .units
            .iter()
            .filter(|u| !u.is_alive())
            .map(|u| u.unit_id.clone())
            .collect();
        self.units.retain(|u| u.is_alive());
        destroyed
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
