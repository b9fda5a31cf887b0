//! Engagement detection between units
//!
//! Opposing units engage in melee when adjacent, or at range (2-3 tiles)
//! when either can shoot. The scan is pairwise, which is fine for tens of
//! units per side but grows quadratically.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::battle::grid::GridCoord;
use crate::battle::positional::PositionalModifiers;
use crate::battle::units::Unit;
use crate::core::config::CombatRules;
use crate::core::types::{Side, UnitRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    Melee,
    Ranged,
}

/// Engagement between two units, produced and consumed within one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    /// Defender's tile
    pub location: GridCoord,
    pub attacker: UnitRef,
    pub defender: UnitRef,
    #[serde(rename = "type")]
    pub kind: EngagementKind,
    pub distance: u32,
    #[serde(default)]
    pub positional_modifiers: PositionalModifiers,
}

impl Engagement {
    pub fn involves(&self, unit: &UnitRef) -> bool {
        &self.attacker == unit || &self.defender == unit
    }

    /// The participant that is not `unit`
    pub fn opponent_of(&self, unit: &UnitRef) -> Option<&UnitRef> {
        if &self.attacker == unit {
            Some(&self.defender)
        } else if &self.defender == unit {
            Some(&self.attacker)
        } else {
            None
        }
    }
}

/// Classify the engagement (if any) between two opposing units
pub fn detect_engagement(
    unit_a: &Unit,
    unit_b: &Unit,
    rules: &CombatRules,
) -> Option<(EngagementKind, u32)> {
    // Can't engage if either is broken or has no strength
    if !unit_a.can_fight() || !unit_b.can_fight() {
        return None;
    }

    let distance = unit_a.position.distance(&unit_b.position);
    if distance <= 1 {
        return Some((EngagementKind::Melee, distance));
    }

    let in_band = distance >= rules.ranged_min_distance && distance <= rules.ranged_max_distance;
    if in_band && (unit_a.has_ranged_capability() || unit_b.has_ranged_capability()) {
        return Some((EngagementKind::Ranged, distance));
    }

    None
}

/// Find all engagements between the two sides
///
/// Melee engagements put the player1 unit in the attacker seat; ranged ones
/// seat the unit that can shoot (player1 when both can).
pub fn detect_engagements(
    player1: &[Unit],
    player2: &[Unit],
    rules: &CombatRules,
) -> Vec<Engagement> {
    let mut engagements = Vec::new();

    for a in player1 {
        for b in player2 {
            let Some((kind, distance)) = detect_engagement(a, b, rules) else {
                continue;
            };

            let a_ref = UnitRef::new(Side::Player1, a.unit_id.clone());
            let b_ref = UnitRef::new(Side::Player2, b.unit_id.clone());
            let p2_shoots_alone = kind == EngagementKind::Ranged
                && !a.has_ranged_capability()
                && b.has_ranged_capability();

            let (attacker, defender, location) = if p2_shoots_alone {
                (b_ref, a_ref, a.position)
            } else {
                (a_ref, b_ref, b.position)
            };

            engagements.push(Engagement {
                location,
                attacker,
                defender,
                kind,
                distance,
                positional_modifiers: PositionalModifiers::default(),
            });
        }
    }

    engagements
}

/// Seat the aggressor as attacker in melee engagements where only the
/// player2 unit attacked this turn
pub fn orient_engagements(
    engagements: &mut [Engagement],
    aggressors: &HashSet<UnitRef>,
    position_of: impl Fn(&UnitRef) -> Option<GridCoord>,
) {
    for engagement in engagements.iter_mut() {
        if engagement.kind != EngagementKind::Melee {
            continue;
        }
        let attacker_aggressive = aggressors.contains(&engagement.attacker);
        let defender_aggressive = aggressors.contains(&engagement.defender);
        if defender_aggressive && !attacker_aggressive {
            std::mem::swap(&mut engagement.attacker, &mut engagement.defender);
            if let Some(pos) = position_of(&engagement.defender) {
                engagement.location = pos;
            }
        }
    }
}

/// Units on the attacker's side, other than the attacker, that are next to
/// the defender and engaging it this turn
pub fn count_flankers(
    engagement: &Engagement,
    all: &[Engagement],
    position_of: impl Fn(&UnitRef) -> Option<GridCoord>,
) -> usize {
    let Some(defender_pos) = position_of(&engagement.defender) else {
        return 0;
    };

    let mut flankers: HashSet<&UnitRef> = HashSet::new();
    for other in all {
        let Some(partner) = other.opponent_of(&engagement.defender) else {
            continue;
        };
        if partner == &engagement.attacker || partner.side != engagement.attacker.side {
            continue;
        }
        if position_of(partner).is_some_and(|p| p.is_adjacent(&defender_pos)) {
            flankers.insert(partner);
        }
    }
    flankers.len()
}
