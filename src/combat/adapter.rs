//! Combat adapter - bridges battle state to combat resolution
//!
//! Looks up the units, cultures and terrain behind an engagement, works
//! out positional modifiers and support fire, and hands the assembled
//! sides to the resolver.

use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::battle::battle_map::MapDescriptor;
use crate::battle::engagement::{count_flankers, Engagement};
use crate::battle::positional::positional_modifiers;
use crate::battle::state::BattleState;
use crate::battle::units::Unit;
use crate::combat::resolution::{resolve_combat, CombatContext, CombatResult, CombatSide};
use crate::core::config::RulesConfig;
use crate::core::error::{BattleError, Result};
use crate::core::types::{UnitId, UnitRef};

/// A standing support-fire order
#[derive(Debug, Clone, PartialEq)]
pub struct SupportOrder {
    pub supporter: UnitRef,
    /// Friendly unit to back up
    pub supporting: Option<UnitId>,
    /// Enemy unit to shoot at
    pub target: Option<UnitId>,
}

/// An engagement together with how it went
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatReport {
    pub engagement: Engagement,
    pub result: CombatResult,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attacker_supporters: Vec<UnitRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defender_supporters: Vec<UnitRef>,
}

/// Adapter to resolve engagements against the current battle state
pub struct CombatAdapter<'a> {
    state: &'a BattleState,
    map: &'a MapDescriptor,
    rules: &'a RulesConfig,
}

impl<'a> CombatAdapter<'a> {
    pub fn new(state: &'a BattleState, map: &'a MapDescriptor, rules: &'a RulesConfig) -> Self {
        Self { state, map, rules }
    }

    fn unit(&self, unit: &UnitRef) -> Result<&'a Unit> {
        self.state.unit(unit).ok_or_else(|| {
            BattleError::CombatResolutionFailure(format!("engaged unit {} is missing", unit))
        })
    }

    /// Fill in positional modifiers for every engagement
    pub fn annotate_positional(&self, engagements: &mut [Engagement]) {
        let snapshot = engagements.to_vec();
        for engagement in engagements.iter_mut() {
            let attacker = self.state.unit(&engagement.attacker);
            let defender = self.state.unit(&engagement.defender);
            let (Some(attacker), Some(defender)) = (attacker, defender) else {
                continue;
            };
            let flankers = count_flankers(engagement, &snapshot, |r| self.state.position_of(r));
            engagement.positional_modifiers = positional_modifiers(
                attacker,
                defender,
                flankers,
                self.map,
                &self.rules.positional,
            );
        }
    }

    /// Support-fire orders that apply to this engagement, per seat
    ///
    /// A supporter fires into at most one engagement; `used` remembers
    /// which have already been spent.
    pub fn supporters_for(
        &self,
        engagement: &Engagement,
        orders: &[SupportOrder],
        used: &mut HashSet<UnitRef>,
    ) -> (Vec<UnitRef>, Vec<UnitRef>) {
        let mut attacker_side = Vec::new();
        let mut defender_side = Vec::new();

        for order in orders {
            if used.contains(&order.supporter) || engagement.involves(&order.supporter) {
                continue;
            }

            let (friend, enemy, seat) = if order.supporter.side == engagement.attacker.side {
                (&engagement.attacker, &engagement.defender, &mut attacker_side)
            } else {
                (&engagement.defender, &engagement.attacker, &mut defender_side)
            };

            let backs_friend = order.supporting.as_ref() == Some(&friend.unit_id);
            let hits_enemy = order.target.as_ref() == Some(&enemy.unit_id);
            if !backs_friend && !hits_enemy {
                continue;
            }

            let supporter = self.state.unit(&order.supporter);
            let enemy_pos = self.state.position_of(enemy);
            let (Some(supporter), Some(enemy_pos)) = (supporter, enemy_pos) else {
                continue;
            };
            if !supporter.can_fight() {
                continue;
            }
            if supporter.position.distance(&enemy_pos) > self.rules.combat.ranged_max_distance {
                debug!(supporter = %order.supporter, "Support fire out of range");
                continue;
            }

            used.insert(order.supporter.clone());
            seat.push(order.supporter.clone());
        }

        (attacker_side, defender_side)
    }

    /// Resolve one engagement
    pub fn resolve<R: Rng>(
        &self,
        engagement: &Engagement,
        attacker_supporters: Vec<UnitRef>,
        defender_supporters: Vec<UnitRef>,
        rng: &mut R,
    ) -> Result<CombatReport> {
        let attacker = self.side(&engagement.attacker, &attacker_supporters)?;
        let defender = self.side(&engagement.defender, &defender_supporters)?;
        let ctx = CombatContext {
            kind: engagement.kind,
            weather: self.state.weather,
            location_terrain: self.map.terrain_at(engagement.location),
            positional: &engagement.positional_modifiers,
        };

        let result = resolve_combat(&attacker, &defender, &ctx, self.rules, rng)?;
        debug!(
            attacker = %engagement.attacker,
            defender = %engagement.defender,
            ratio = result.ratio,
            outcome = result.result_label.label(),
            "Engagement resolved"
        );

        Ok(CombatReport {
            engagement: engagement.clone(),
            result,
            attacker_supporters,
            defender_supporters,
        })
    }

    fn side(&self, unit: &UnitRef, supporters: &[UnitRef]) -> Result<CombatSide<'a>> {
        let fighter = self.unit(unit)?;
        let supporters = supporters
            .iter()
            .map(|r| self.unit(r))
            .collect::<Result<Vec<_>>>()?;
        Ok(CombatSide {
            unit: fighter,
            supporters,
            culture: self.state.army(unit.side).culture,
            terrain: self.map.terrain_at(fighter.position),
        })
    }
}
