//! Battle rules configuration with documented constants
//!
//! Every tunable number used by turn resolution lives here. Values are loaded
//! from TOML (every section optional) and passed explicitly down the call
//! chain; there is no process-wide config.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::battle::units::{Formation, QualityType};
use crate::combat::culture::{
    default_cultural_modifiers, default_cultural_restrictions, default_environment_immunities,
    CulturalModifier,
};
use crate::combat::environment::{default_environmental_effects, EnvironmentalEffect};
use crate::combat::formation::{default_formation_interactions, FormationInteraction};
use crate::combat::resolution::CombatIntensity;
use crate::combat::weapons::{
    default_effectiveness_table, default_weapon_overrides, WeaponOverride,
    DEFAULT_WEAPON_EFFECTIVENESS,
};
use crate::core::error::{BattleError, Result};

/// Which casualty model drives live combat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionModel {
    /// Power ratio with intensity-keyed casualty rates (production path)
    #[default]
    Ratio,
    /// Per-unit damage accumulation (experimental)
    Bucket,
}

/// Movement allowances and mission sensing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementRules {
    /// Movement points for foot units each turn
    pub infantry_allowance: f32,
    /// Movement points for mounted units each turn
    pub mounted_allowance: f32,
    /// Distance at which a unit's own sensors identify an enemy (interrupts missions)
    pub identification_threshold: f32,
}

impl Default for MovementRules {
    fn default() -> Self {
        Self {
            infantry_allowance: 3.0,
            mounted_allowance: 5.0,
            identification_threshold: 5.0,
        }
    }
}

/// Positional modifiers, in stat points
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionalRules {
    /// Attack bonus indexed by count of additional friendly units engaging the defender
    pub flanking_tiers: Vec<i32>,
    pub elevation_bonus: i32,
    pub ford_attack_penalty: i32,
    pub ford_defense_bonus: i32,
    pub forest_defense_bonus: i32,
    pub forest_mounted_penalty: i32,
    pub marsh_penalty: i32,
    pub formation_change_penalty: i32,
}

impl Default for PositionalRules {
    fn default() -> Self {
        Self {
            flanking_tiers: vec![0, 2, 4],
            elevation_bonus: 2,
            ford_attack_penalty: 4,
            ford_defense_bonus: 3,
            forest_defense_bonus: 2,
            forest_mounted_penalty: 4,
            marsh_penalty: 2,
            formation_change_penalty: 3,
        }
    }
}

impl PositionalRules {
    /// Flanking attack bonus for `extra` additional friendly units on the defender
    pub fn flanking_bonus(&self, extra: usize) -> i32 {
        if self.flanking_tiers.is_empty() {
            return 0;
        }
        let idx = extra.min(self.flanking_tiers.len() - 1);
        self.flanking_tiers[idx]
    }
}

/// Detection ranges used by the default fog of war
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionRules {
    pub base_range: f32,
    pub scout_bonus: f32,
    pub fog_penalty: f32,
    pub rain_penalty: f32,
    pub min_range: f32,
    pub detailed_range: f32,
    pub identified_range: f32,
}

impl Default for VisionRules {
    fn default() -> Self {
        Self {
            base_range: 8.0,
            scout_bonus: 4.0,
            fog_penalty: 3.0,
            rain_penalty: 1.0,
            min_range: 2.0,
            detailed_range: 2.0,
            identified_range: 5.0,
        }
    }
}

/// Ratio thresholds for outcome classification (first match wins, descending)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeThresholds {
    pub attacker_major_victory: f32,
    pub attacker_victory: f32,
    pub attacker_advantage: f32,
    pub defender_advantage: f32,
    pub defender_victory: f32,
}

impl Default for OutcomeThresholds {
    fn default() -> Self {
        Self {
            attacker_major_victory: 1.5,
            attacker_victory: 1.2,
            attacker_advantage: 1.0,
            defender_advantage: 0.8,
            defender_victory: 0.6,
        }
    }
}

/// Casualty fractions for the winning and losing side of one intensity
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CasualtyRate {
    pub winner: f32,
    pub loser: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CasualtyRateTable {
    pub decisive: CasualtyRate,
    pub significant: CasualtyRate,
    pub slight: CasualtyRate,
    pub moderate: CasualtyRate,
}

impl Default for CasualtyRateTable {
    fn default() -> Self {
        Self {
            decisive: CasualtyRate { winner: 0.05, loser: 0.25 },
            significant: CasualtyRate { winner: 0.08, loser: 0.18 },
            slight: CasualtyRate { winner: 0.10, loser: 0.15 },
            moderate: CasualtyRate { winner: 0.12, loser: 0.12 },
        }
    }
}

impl CasualtyRateTable {
    pub fn rate(&self, intensity: CombatIntensity) -> CasualtyRate {
        match intensity {
            CombatIntensity::Decisive => self.decisive,
            CombatIntensity::Significant => self.significant,
            CombatIntensity::Slight => self.slight,
            CombatIntensity::Moderate => self.moderate,
        }
    }
}

/// Morale swing per intensity, applied + to the winner and - to the loser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoraleDeltaTable {
    pub decisive: i32,
    pub significant: i32,
    pub slight: i32,
    /// Stalemates cost both sides this much
    pub moderate: i32,
}

impl Default for MoraleDeltaTable {
    fn default() -> Self {
        Self {
            decisive: 20,
            significant: 10,
            slight: 5,
            moderate: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatRules {
    pub thresholds: OutcomeThresholds,
    pub casualty_rates: CasualtyRateTable,
    pub morale_deltas: MoraleDeltaTable,
    /// Per-unit casualty jitter, uniform in [jitter_min, jitter_max)
    pub jitter_min: f32,
    pub jitter_max: f32,
    /// Floor for combat power after additive modifiers
    pub min_power: f32,
    /// Half-width of the stalemate band around ratio 1.0 (0 disables it)
    pub stalemate_band: f32,
    pub resolution_model: ResolutionModel,
    /// Share of a supporting unit's attack added to the supported force
    pub support_fire_share: f32,
    /// Ranged engagement band (Chebyshev tiles)
    pub ranged_min_distance: u32,
    pub ranged_max_distance: u32,
}

impl Default for CombatRules {
    fn default() -> Self {
        Self {
            thresholds: OutcomeThresholds::default(),
            casualty_rates: CasualtyRateTable::default(),
            morale_deltas: MoraleDeltaTable::default(),
            jitter_min: 0.8,
            jitter_max: 1.2,
            min_power: 0.1,
            stalemate_band: 0.0,
            resolution_model: ResolutionModel::Ratio,
            support_fire_share: 1.0,
            ranged_min_distance: 2,
            ranged_max_distance: 3,
        }
    }
}

/// Cumulative loss fractions at which units break, by quality tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoraleRules {
    pub levy_break: f32,
    pub militia_break: f32,
    pub professional_break: f32,
    pub veteran_mercenary_break: f32,
    pub elite_break: f32,
    pub starting_morale: i32,
}

impl Default for MoraleRules {
    fn default() -> Self {
        Self {
            levy_break: 0.30,
            militia_break: 0.40,
            professional_break: 0.50,
            veteran_mercenary_break: 0.60,
            elite_break: 0.70,
            starting_morale: 100,
        }
    }
}

impl MoraleRules {
    pub fn break_threshold(&self, quality: QualityType) -> f32 {
        match quality {
            QualityType::Levy => self.levy_break,
            QualityType::Militia => self.militia_break,
            QualityType::Professional => self.professional_break,
            QualityType::VeteranMercenary => self.veteran_mercenary_break,
            QualityType::Elite => self.elite_break,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationRules {
    /// Minimum strength ratio to assume phalanx, testudo or wedge
    pub strength_floor: f32,
    /// Turns needed to assume phalanx or testudo
    pub change_turns: u32,
}

impl Default for FormationRules {
    fn default() -> Self {
        Self {
            strength_floor: 0.5,
            change_turns: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommanderRules {
    /// Attached unit strength ratio below which an adjacent enemy puts the commander at risk
    pub capture_risk_strength_ratio: f32,
    /// Escape attempt odds for the built-in dice resolver
    pub escape_success_chance: f32,
    pub escape_capture_chance: f32,
}

impl Default for CommanderRules {
    fn default() -> Self {
        Self {
            capture_risk_strength_ratio: 0.25,
            escape_success_chance: 0.6,
            escape_capture_chance: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VictoryRules {
    /// Remaining strength fraction below which a side is routed
    pub rout_threshold: f32,
    /// Strength ratio for a tactical victory at the turn limit
    pub tactical_victory_ratio: f32,
    /// Strength ratio below which the other side wins at the turn limit
    pub tactical_defeat_ratio: f32,
}

impl Default for VictoryRules {
    fn default() -> Self {
        Self {
            rout_threshold: 0.25,
            tactical_victory_ratio: 1.5,
            tactical_defeat_ratio: 0.67,
        }
    }
}

/// Lookup tables consumed by combat resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTables {
    /// Keyed `"{attacker}_vs_{defender}"` by formation label
    pub formation_interactions: HashMap<String, FormationInteraction>,
    /// Keyed `"{weapon_class}_vs_{armor_class}"`
    pub weapon_effectiveness: HashMap<String, f32>,
    /// Effectiveness for pairs missing from `weapon_effectiveness`
    pub default_effectiveness: f32,
    /// Keyed by weapon name (lowercase)
    pub weapon_overrides: HashMap<String, WeaponOverride>,
    pub environmental_effects: Vec<EnvironmentalEffect>,
    /// Culture label -> names of environmental effects the culture ignores
    pub environment_immunities: HashMap<String, Vec<String>>,
    pub cultural_modifiers: Vec<CulturalModifier>,
    /// Culture label -> formations that culture may not adopt
    pub cultural_restrictions: HashMap<String, Vec<Formation>>,
}

impl Default for CombatTables {
    fn default() -> Self {
        Self {
            formation_interactions: default_formation_interactions(),
            weapon_effectiveness: default_effectiveness_table(),
            default_effectiveness: DEFAULT_WEAPON_EFFECTIVENESS,
            weapon_overrides: default_weapon_overrides(),
            environmental_effects: default_environmental_effects(),
            environment_immunities: default_environment_immunities(),
            cultural_modifiers: default_cultural_modifiers(),
            cultural_restrictions: default_cultural_restrictions(),
        }
    }
}

/// Complete rule set for turn resolution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub movement: MovementRules,
    pub positional: PositionalRules,
    pub vision: VisionRules,
    pub combat: CombatRules,
    pub morale: MoraleRules,
    pub formation: FormationRules,
    pub commander: CommanderRules,
    pub victory: VictoryRules,
    pub tables: CombatTables,
    /// Ask the narrative collaborator for prose (template summary otherwise)
    pub narrative_enabled: bool,
}

impl RulesConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML rule file; missing sections keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RulesConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.movement.infantry_allowance <= 0.0 || self.movement.mounted_allowance <= 0.0 {
            return Err(BattleError::Config(
                "movement allowances must be positive".into(),
            ));
        }

        let t = &self.combat.thresholds;
        let ordered = t.attacker_major_victory > t.attacker_victory
            && t.attacker_victory > t.attacker_advantage
            && t.attacker_advantage > t.defender_advantage
            && t.defender_advantage > t.defender_victory;
        if !ordered {
            return Err(BattleError::Config(format!(
                "outcome thresholds must be strictly descending: {:?}",
                t
            )));
        }

        if self.combat.jitter_min >= self.combat.jitter_max {
            return Err(BattleError::Config(format!(
                "jitter_min ({}) must be < jitter_max ({})",
                self.combat.jitter_min, self.combat.jitter_max
            )));
        }

        if self.combat.min_power <= 0.0 {
            return Err(BattleError::Config("min_power must be positive".into()));
        }

        if self.combat.ranged_min_distance > self.combat.ranged_max_distance {
            return Err(BattleError::Config(
                "ranged_min_distance must not exceed ranged_max_distance".into(),
            ));
        }

        if self.victory.tactical_defeat_ratio >= self.victory.tactical_victory_ratio {
            return Err(BattleError::Config(
                "tactical_defeat_ratio must be below tactical_victory_ratio".into(),
            ));
        }

        Ok(())
    }
}

/// Load rules from a TOML file
pub fn load_rules(path: &Path) -> Result<RulesConfig> {
    let content = fs::read_to_string(path)?;
    RulesConfig::from_toml_str(&content)
}
