//! Per-side visibility (fog of war)
//!
//! Each side sees the enemy only through its own units. Closer contacts
//! are known in more detail; what a side has seen is remembered by
//! position in its intel memory.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::battle::battle_map::MapDescriptor;
use crate::battle::grid::GridCoord;
use crate::battle::unit_type::UnitType;
use crate::battle::units::Unit;
use crate::combat::environment::Weather;
use crate::core::config::VisionRules;
use crate::core::types::{Turn, UnitId};

/// How much is known about a contact, least to most
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    Spotted,
    Identified,
    Detailed,
}

impl DetailLevel {
    /// Confidence attached to a strength estimate at this tier
    pub fn confidence(&self) -> f32 {
        match self {
            DetailLevel::Spotted => 0.4,
            DetailLevel::Identified => 0.7,
            DetailLevel::Detailed => 0.95,
        }
    }
}

/// One enemy unit as seen this turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SightedEnemy {
    pub position: GridCoord,
    pub detail_level: DetailLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<UnitId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_type: Option<UnitType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_strength: Option<u32>,
    /// Euclidean distance to the nearest observer
    pub distance: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intelligence {
    pub detailed: Vec<SightedEnemy>,
    pub identified: Vec<SightedEnemy>,
    pub spotted: Vec<SightedEnemy>,
}

impl Intelligence {
    pub fn all(&self) -> impl Iterator<Item = &SightedEnemy> {
        self.detailed.iter().chain(self.identified.iter()).chain(self.spotted.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityReport {
    pub visible_enemy_positions: Vec<GridCoord>,
    pub intelligence: Intelligence,
    pub total_enemies_detected: usize,
}

/// Visibility collaborator: what one side can see of the other
pub trait FogOfWar {
    fn compute(
        &self,
        own: &[Unit],
        enemies: &[Unit],
        map: &MapDescriptor,
        weather: Weather,
    ) -> VisibilityReport;
}

/// Detection range of a single observer
pub fn unit_detection_range(unit: &Unit, weather: Weather, rules: &VisionRules) -> f32 {
    let mut range = rules.base_range;

    if unit.unit_type.is_scout() {
        range += rules.scout_bonus;
    }

    match weather {
        Weather::Fog => range -= rules.fog_penalty,
        Weather::Rain => range -= rules.rain_penalty,
        _ => {}
    }

    range.max(rules.min_range)
}

/// Range at which `observer` can see `target`; concealing terrain halves it
fn effective_range(
    observer: &Unit,
    target: &Unit,
    map: &MapDescriptor,
    weather: Weather,
    rules: &VisionRules,
) -> f32 {
    let range = unit_detection_range(observer, weather, rules);
    if map.terrain_at(target.position).provides_concealment() {
        range / 2.0
    } else {
        range
    }
}

fn detail_for(distance: f32, rules: &VisionRules) -> DetailLevel {
    if distance <= rules.detailed_range {
        DetailLevel::Detailed
    } else if distance <= rules.identified_range {
        DetailLevel::Identified
    } else {
        DetailLevel::Spotted
    }
}

fn sighting(enemy: &Unit, distance: f32, detail: DetailLevel) -> SightedEnemy {
    let (unit_id, unit_type, estimated_strength) = match detail {
        DetailLevel::Detailed => (
            Some(enemy.unit_id.clone()),
            Some(enemy.unit_type),
            Some(enemy.current_strength),
        ),
        // Rounded to the nearest ten
        DetailLevel::Identified => (
            Some(enemy.unit_id.clone()),
            Some(enemy.unit_type),
            Some(((enemy.current_strength + 5) / 10) * 10),
        ),
        DetailLevel::Spotted => (None, None, None),
    };

    SightedEnemy {
        position: enemy.position,
        detail_level: detail,
        unit_id,
        unit_type,
        estimated_strength,
        distance,
    }
}

/// Default fog of war: Euclidean detection range per observing unit
#[derive(Debug, Clone, Default)]
pub struct RangeFogOfWar {
    pub rules: VisionRules,
}

impl RangeFogOfWar {
    pub fn new(rules: VisionRules) -> Self {
        Self { rules }
    }
}

impl FogOfWar for RangeFogOfWar {
    fn compute(
        &self,
        own: &[Unit],
        enemies: &[Unit],
        map: &MapDescriptor,
        weather: Weather,
    ) -> VisibilityReport {
        let mut report = VisibilityReport::default();

        for enemy in enemies.iter().filter(|e| e.is_alive() && !e.has_deserted) {
            // Closest observer that can actually see the enemy
            let nearest = own
                .iter()
                .filter(|o| o.is_alive() && !o.has_deserted)
                .map(|o| (o, o.position.euclidean_distance(&enemy.position)))
                .filter(|(o, d)| *d <= effective_range(o, enemy, map, weather, &self.rules))
                .map(|(_, d)| d)
                .fold(None, |best: Option<f32>, d| Some(best.map_or(d, |b| b.min(d))));

            let Some(distance) = nearest else {
                continue;
            };

            let detail = detail_for(distance, &self.rules);
            let seen = sighting(enemy, distance, detail);
            if !report.visible_enemy_positions.contains(&enemy.position) {
                report.visible_enemy_positions.push(enemy.position);
            }
            match detail {
                DetailLevel::Detailed => report.intelligence.detailed.push(seen),
                DetailLevel::Identified => report.intelligence.identified.push(seen),
                DetailLevel::Spotted => report.intelligence.spotted.push(seen),
            }
            report.total_enemies_detected += 1;
        }

        report
    }
}

/// Enemy positions this unit's own sensors place within `threshold`
///
/// Army-wide knowledge does not count; only what this unit can see.
pub fn unit_detects_enemy_within(
    unit: &Unit,
    enemies: &[Unit],
    map: &MapDescriptor,
    weather: Weather,
    rules: &VisionRules,
    threshold: f32,
) -> Vec<GridCoord> {
    enemies
        .iter()
        .filter(|e| e.is_alive() && !e.has_deserted)
        .filter(|e| {
            let distance = unit.position.euclidean_distance(&e.position);
            distance <= threshold && distance <= effective_range(unit, e, map, weather, rules)
        })
        .map(|e| e.position)
        .collect()
}

/// What a side remembers about one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntelRecord {
    pub detail_level: DetailLevel,
    pub last_seen_turn: Turn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_strength: Option<u32>,
    pub confidence: f32,
}

/// Last-known enemy positions for one side, keyed by position
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntelMemory(pub BTreeMap<GridCoord, IntelRecord>);

impl IntelMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, position: &GridCoord) -> Option<&IntelRecord> {
        self.0.get(position)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Upsert this turn's sightings
    ///
    /// The detail level never drops; estimate and confidence come from
    /// whichever sighting is at least as detailed as what was known.
    pub fn merge(&mut self, report: &VisibilityReport, turn: Turn) {
        for seen in report.intelligence.all() {
            let fresh = IntelRecord {
                detail_level: seen.detail_level,
                last_seen_turn: turn,
                estimated_strength: seen.estimated_strength,
                confidence: seen.detail_level.confidence(),
            };

            match self.0.get_mut(&seen.position) {
                Some(known) if known.detail_level > seen.detail_level => {
                    known.last_seen_turn = turn;
                }
                Some(known) => *known = fresh,
                None => {
                    self.0.insert(seen.position, fresh);
                }
            }
        }
    }
}
