//! Engagement resolution
//!
//! Power pipeline, in fixed order: aggregated stats + positional modifiers,
//! then (1) formation interaction, (2) environment, (3) weapon vs armor,
//! (4) culture. The attacker's power is its final attack, the defender's its
//! final defense. Casualties come from the power ratio (production model) or
//! from per-unit damage buckets (experimental model).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::engagement::EngagementKind;
use crate::battle::positional::PositionalModifiers;
use crate::battle::terrain::Terrain;
use crate::battle::units::Unit;
use crate::combat::accumulation::DamageAccumulation;
use crate::combat::culture::{cultural_multipliers, Culture, CultureContext};
use crate::combat::effectiveness::{aggregate_force, unit_stats};
use crate::combat::environment::{environment_multiplier, Weather};
use crate::combat::formation::formation_interaction;
use crate::combat::weapons::weapon_effectiveness;
use crate::core::config::{OutcomeThresholds, ResolutionModel, RulesConfig};
use crate::core::error::{BattleError, Result};

/// Outcome intensity, keys the casualty and morale tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatIntensity {
    Decisive,
    Significant,
    Slight,
    /// Stalemate
    Moderate,
}

impl CombatIntensity {
    pub fn label(&self) -> &'static str {
        match self {
            CombatIntensity::Decisive => "decisive",
            CombatIntensity::Significant => "significant",
            CombatIntensity::Slight => "slight",
            CombatIntensity::Moderate => "moderate",
        }
    }
}

/// Seat in an engagement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatRole {
    Attacker,
    Defender,
}

impl CombatRole {
    pub fn other(self) -> Self {
        match self {
            CombatRole::Attacker => CombatRole::Defender,
            CombatRole::Defender => CombatRole::Attacker,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatOutcome {
    AttackerMajorVictory,
    AttackerVictory,
    AttackerAdvantage,
    DefenderAdvantage,
    DefenderVictory,
    DefenderMajorVictory,
    Stalemate,
}

impl CombatOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CombatOutcome::AttackerMajorVictory => "attacker_major_victory",
            CombatOutcome::AttackerVictory => "attacker_victory",
            CombatOutcome::AttackerAdvantage => "attacker_advantage",
            CombatOutcome::DefenderAdvantage => "defender_advantage",
            CombatOutcome::DefenderVictory => "defender_victory",
            CombatOutcome::DefenderMajorVictory => "defender_major_victory",
            CombatOutcome::Stalemate => "stalemate",
        }
    }

    pub fn intensity(&self) -> CombatIntensity {
        match self {
            CombatOutcome::AttackerMajorVictory | CombatOutcome::DefenderMajorVictory => {
                CombatIntensity::Decisive
            }
            CombatOutcome::AttackerVictory | CombatOutcome::DefenderVictory => {
                CombatIntensity::Significant
            }
            CombatOutcome::AttackerAdvantage | CombatOutcome::DefenderAdvantage => {
                CombatIntensity::Slight
            }
            CombatOutcome::Stalemate => CombatIntensity::Moderate,
        }
    }

    /// Winning seat, `None` for a stalemate
    pub fn winner(&self) -> Option<CombatRole> {
        match self {
            CombatOutcome::AttackerMajorVictory
            | CombatOutcome::AttackerVictory
            | CombatOutcome::AttackerAdvantage => Some(CombatRole::Attacker),
            CombatOutcome::DefenderAdvantage
            | CombatOutcome::DefenderVictory
            | CombatOutcome::DefenderMajorVictory => Some(CombatRole::Defender),
            CombatOutcome::Stalemate => None,
        }
    }
}

/// Classify a power ratio; first matching threshold wins
pub fn classify_outcome(
    ratio: f32,
    thresholds: &OutcomeThresholds,
    stalemate_band: f32,
) -> CombatOutcome {
    if stalemate_band > 0.0 && (ratio - 1.0).abs() < stalemate_band {
        return CombatOutcome::Stalemate;
    }
    if ratio > thresholds.attacker_major_victory {
        CombatOutcome::AttackerMajorVictory
    } else if ratio > thresholds.attacker_victory {
        CombatOutcome::AttackerVictory
    } else if ratio > thresholds.attacker_advantage {
        CombatOutcome::AttackerAdvantage
    } else if ratio > thresholds.defender_advantage {
        CombatOutcome::DefenderAdvantage
    } else if ratio > thresholds.defender_victory {
        CombatOutcome::DefenderVictory
    } else {
        CombatOutcome::DefenderMajorVictory
    }
}

/// One side of an engagement as seen by the resolver
#[derive(Debug, Clone)]
pub struct CombatSide<'a> {
    pub unit: &'a Unit,
    /// Friendly units adding fire without taking part in the melee
    pub supporters: Vec<&'a Unit>,
    pub culture: Culture,
    /// Terrain the unit stands on
    pub terrain: Terrain,
}

#[derive(Debug, Clone, Copy)]
pub struct CombatContext<'a> {
    pub kind: EngagementKind,
    pub weather: Weather,
    /// Terrain at the engagement location
    pub location_terrain: Terrain,
    pub positional: &'a PositionalModifiers,
}

/// Final attack and defense of both seats after the whole pipeline
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerBreakdown {
    pub attacker_attack: f32,
    pub attacker_defense: f32,
    pub defender_attack: f32,
    pub defender_defense: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Casualties {
    pub attacker: u32,
    pub defender: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MoraleDelta {
    pub attacker: i32,
    pub defender: i32,
}

/// Qualitative follow-ups for narrative and next-turn play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TacticalDevelopment {
    /// The loser of a decisive clash lost its order
    FormationDisrupted { role: CombatRole },
    /// Casualties diverged enough to open the loser's flank to `role`
    FlankingOpportunity { role: CombatRole },
}

/// Bucket states after an experimental-model resolution
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BucketUpdate {
    pub attacker: DamageAccumulation,
    pub defender: DamageAccumulation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatResult {
    pub ratio: f32,
    pub intensity: CombatIntensity,
    pub result_label: CombatOutcome,
    pub attacker_power: f32,
    pub defender_power: f32,
    pub casualties: Casualties,
    pub morale_delta: MoraleDelta,
    pub tactical_developments: Vec<TacticalDevelopment>,
    #[serde(skip)]
    pub bucket_update: Option<BucketUpdate>,
}

/// Run the modifier pipeline for both seats
pub fn combat_powers(
    attacker: &CombatSide,
    defender: &CombatSide,
    ctx: &CombatContext,
    rules: &RulesConfig,
) -> Result<PowerBreakdown> {
    let tables = &rules.tables;
    let share = rules.combat.support_fire_share;
    let floor = rules.combat.min_power;

    let att = aggregate_force(std::iter::once(attacker.unit));
    let def = aggregate_force(std::iter::once(defender.unit));
    let att_support: f32 = attacker.supporters.iter().map(|u| unit_stats(u).attack * share).sum();
    let def_support: f32 = defender.supporters.iter().map(|u| unit_stats(u).attack * share).sum();

    let pos = ctx.positional;
    let mut p = PowerBreakdown {
        attacker_attack: att.attack + att_support + pos.attacker_attack as f32,
        attacker_defense: att.defense + pos.attacker_defense as f32,
        defender_attack: def.attack + def_support + pos.defender_attack as f32,
        defender_defense: def.defense + pos.defender_defense as f32,
    };

    // (1) formation interaction, both directions
    let forward = formation_interaction(
        &tables.formation_interactions,
        attacker.unit.formation,
        defender.unit.formation,
    );
    let backward = formation_interaction(
        &tables.formation_interactions,
        defender.unit.formation,
        attacker.unit.formation,
    );
    p.attacker_attack += forward.attack;
    p.defender_defense += forward.defense;
    p.defender_attack += backward.attack;
    p.attacker_defense += backward.defense;

    p.attacker_attack = p.attacker_attack.max(floor);
    p.attacker_defense = p.attacker_defense.max(floor);
    p.defender_attack = p.defender_attack.max(floor);
    p.defender_defense = p.defender_defense.max(floor);

    // (2) environment
    let ranged = ctx.kind == EngagementKind::Ranged;
    let no_immunities = Vec::new();
    let immunities = |culture: Culture| {
        tables
            .environment_immunities
            .get(culture.label())
            .unwrap_or(&no_immunities)
    };
    let att_env = environment_multiplier(
        &tables.environmental_effects,
        immunities(attacker.culture),
        ctx.weather,
        ctx.location_terrain,
        ranged,
    );
    let def_env = environment_multiplier(
        &tables.environmental_effects,
        immunities(defender.culture),
        ctx.weather,
        ctx.location_terrain,
        ranged,
    );
    p.attacker_attack *= att_env;
    p.attacker_defense *= att_env;
    p.defender_attack *= def_env;
    p.defender_defense *= def_env;

    // (3) weapon vs armor
    p.attacker_attack *= weapon_effectiveness(
        &tables.weapon_effectiveness,
        &tables.weapon_overrides,
        tables.default_effectiveness,
        &attacker.unit.weapon,
        defender.unit.armor,
        defender.unit.shield,
    );
    p.defender_attack *= weapon_effectiveness(
        &tables.weapon_effectiveness,
        &tables.weapon_overrides,
        tables.default_effectiveness,
        &defender.unit.weapon,
        attacker.unit.armor,
        attacker.unit.shield,
    );

    // (4) culture
    let (att_atk_mult, att_def_mult) = cultural_multipliers(
        &tables.cultural_modifiers,
        attacker.culture,
        &CultureContext {
            terrain: attacker.terrain,
            weather: ctx.weather,
            formation: attacker.unit.formation,
            attacking: true,
            mounted: attacker.unit.is_mounted(),
        },
    );
    let (def_atk_mult, def_def_mult) = cultural_multipliers(
        &tables.cultural_modifiers,
        defender.culture,
        &CultureContext {
            terrain: defender.terrain,
            weather: ctx.weather,
            formation: defender.unit.formation,
            attacking: false,
            mounted: defender.unit.is_mounted(),
        },
    );
    p.attacker_attack *= att_atk_mult;
    p.attacker_defense *= att_def_mult;
    p.defender_attack *= def_atk_mult;
    p.defender_defense *= def_def_mult;

    let all = [
        p.attacker_attack,
        p.attacker_defense,
        p.defender_attack,
        p.defender_defense,
    ];
    if all.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(BattleError::CombatResolutionFailure(format!(
            "non-finite combat power between {} and {}: {:?}",
            attacker.unit.unit_id, defender.unit.unit_id, p
        )));
    }

    Ok(p)
}

fn jittered_casualties<R: Rng>(strength: u32, rate: f32, jitter: (f32, f32), rng: &mut R) -> u32 {
    let factor = rng.gen_range(jitter.0..jitter.1);
    let raw = (strength as f32 * rate * factor).floor();
    (raw.max(0.0) as u32).min(strength)
}

/// Resolve one engagement
pub fn resolve_combat<R: Rng>(
    attacker: &CombatSide,
    defender: &CombatSide,
    ctx: &CombatContext,
    rules: &RulesConfig,
    rng: &mut R,
) -> Result<CombatResult> {
    let combat = &rules.combat;
    let powers = combat_powers(attacker, defender, ctx, rules)?;

    let attacker_power = powers.attacker_attack;
    let defender_power = powers.defender_defense;
    let ratio = attacker_power / defender_power;
    if !ratio.is_finite() {
        return Err(BattleError::CombatResolutionFailure(format!(
            "combat ratio {} / {} is not finite",
            attacker_power, defender_power
        )));
    }

    let outcome = classify_outcome(ratio, &combat.thresholds, combat.stalemate_band);
    let intensity = outcome.intensity();

    // Archers shooting at foot that cannot answer take no losses
    let attacker_exposed =
        ctx.kind == EngagementKind::Melee || defender.unit.has_ranged_capability();

    let (casualties, bucket_update) = match combat.resolution_model {
        ResolutionModel::Ratio => {
            let rate = combat.casualty_rates.rate(intensity);
            let (att_rate, def_rate) = match outcome.winner() {
                Some(CombatRole::Attacker) => (rate.winner, rate.loser),
                Some(CombatRole::Defender) => (rate.loser, rate.winner),
                None => (rate.winner, rate.loser),
            };
            let jitter = (combat.jitter_min, combat.jitter_max);
            let att_cas = if attacker_exposed {
                jittered_casualties(attacker.unit.current_strength, att_rate, jitter, rng)
            } else {
                0
            };
            let def_cas =
                jittered_casualties(defender.unit.current_strength, def_rate, jitter, rng);
            (
                Casualties {
                    attacker: att_cas,
                    defender: def_cas,
                },
                None,
            )
        }
        ResolutionModel::Bucket => {
            let mut att_bucket = attacker.unit.damage_accumulation.unwrap_or_default();
            let mut def_bucket = defender.unit.damage_accumulation.unwrap_or_default();
            let att_cas = if attacker_exposed {
                att_bucket.apply_capped(
                    powers.defender_attack - powers.attacker_defense,
                    attacker.unit.current_strength,
                )
            } else {
                0
            };
            let def_cas = def_bucket.apply_capped(
                powers.attacker_attack - powers.defender_defense,
                defender.unit.current_strength,
            );
            (
                Casualties {
                    attacker: att_cas,
                    defender: def_cas,
                },
                Some(BucketUpdate {
                    attacker: att_bucket,
                    defender: def_bucket,
                }),
            )
        }
    };

    let morale_delta = morale_delta(outcome, rules);
    let tactical_developments = tactical_developments(outcome, casualties);

    Ok(CombatResult {
        ratio,
        intensity,
        result_label: outcome,
        attacker_power,
        defender_power,
        casualties,
        morale_delta,
        tactical_developments,
        bucket_update,
    })
}

fn morale_delta(outcome: CombatOutcome, rules: &RulesConfig) -> MoraleDelta {
    let table = &rules.combat.morale_deltas;
    let swing = match outcome.intensity() {
        CombatIntensity::Decisive => table.decisive,
        CombatIntensity::Significant => table.significant,
        CombatIntensity::Slight => table.slight,
        CombatIntensity::Moderate => {
            return MoraleDelta {
                attacker: -table.moderate,
                defender: -table.moderate,
            }
        }
    };
    match outcome.winner() {
        Some(CombatRole::Attacker) => MoraleDelta {
            attacker: swing,
            defender: -swing,
        },
        _ => MoraleDelta {
            attacker: -swing,
            defender: swing,
        },
    }
}

fn tactical_developments(
    outcome: CombatOutcome,
    casualties: Casualties,
) -> Vec<TacticalDevelopment> {
    let mut developments = Vec::new();

    if outcome.intensity() == CombatIntensity::Decisive {
        if let Some(winner) = outcome.winner() {
            developments.push(TacticalDevelopment::FormationDisrupted {
                role: winner.other(),
            });
        }
    }

    let (low, high) = if casualties.attacker <= casualties.defender {
        (casualties.attacker, casualties.defender)
    } else {
        (casualties.defender, casualties.attacker)
    };
    if high > 0 && high >= low.saturating_mul(2) {
        let role = if casualties.attacker < casualties.defender {
            CombatRole::Attacker
        } else {
            CombatRole::Defender
        };
        developments.push(TacticalDevelopment::FlankingOpportunity { role });
    }

    developments
}
