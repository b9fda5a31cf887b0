//! Turn movement
//!
//! Units spend movement points along an A* route. A route longer than the
//! remaining allowance is cut at the last affordable tile (a partial
//! move); an explicit order that ends partial leaves a mission behind so
//! the unit keeps going on later turns. Units move one at a time in
//! initiative order and stop short of any tile an enemy holds at that
//! moment.

use std::collections::HashSet;

use ahash::AHashMap;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::battle::battle_map::MapDescriptor;
use crate::battle::grid::GridCoord;
use crate::battle::mission::{Mission, MissionType};
use crate::battle::pathfinding::{find_path, path_cost};
use crate::battle::units::{Army, Unit};
use crate::core::config::MovementRules;
use crate::core::error::{BattleError, Result, UnitFailure};
use crate::core::types::{Side, SidePair, Turn, UnitRef};

/// Slack for comparing summed tile costs against the allowance
const COST_EPSILON: f32 = 1e-4;

/// Outcome of checking a move against terrain and the unit's allowance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementPlan {
    pub final_position: GridCoord,
    /// Tiles the unit will walk this turn, start included
    pub path: Vec<GridCoord>,
    pub cost: f32,
    pub partial: bool,
    pub original_target: GridCoord,
    /// Allowance left after the move; always 0 for a partial move
    pub movement_remaining: f32,
}

/// Movement points a unit starts each turn with
pub fn movement_allowance(unit: &Unit, rules: &MovementRules) -> f32 {
    if unit.is_mounted() {
        rules.mounted_allowance
    } else {
        rules.infantry_allowance
    }
}

/// Start-of-turn reset of allowance and per-turn flags
pub fn reset_for_turn(unit: &mut Unit, rules: &MovementRules) {
    unit.movement_remaining = movement_allowance(unit, rules);
    unit.compression_level = 0;
    unit.in_combat = false;
}

/// Check a move and work out how far the unit gets this turn
pub fn validate_movement(
    unit: &Unit,
    target: GridCoord,
    map: &MapDescriptor,
) -> Result<MovementPlan> {
    let path = find_path(map, unit.position, target)?;
    let budget = unit.movement_remaining.max(0.0);

    if path.cost <= budget + COST_EPSILON {
        return Ok(MovementPlan {
            final_position: target,
            movement_remaining: (budget - path.cost).max(0.0),
            cost: path.cost,
            path: path.nodes,
            partial: false,
            original_target: target,
        });
    }

    // Walk until the next tile is unaffordable
    let mut spent = 0.0;
    let mut walked = Vec::with_capacity(path.nodes.len());
    for (i, node) in path.nodes.iter().enumerate() {
        if i > 0 {
            let step = map.movement_cost(*node);
            if spent + step > budget + COST_EPSILON {
                break;
            }
            spent += step;
        }
        walked.push(*node);
    }

    let final_position = walked.last().copied().unwrap_or(unit.position);
    Ok(MovementPlan {
        final_position,
        path: walked,
        cost: spent,
        partial: true,
        original_target: target,
        movement_remaining: 0.0,
    })
}

/// Where a move order came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderOrigin {
    /// Issued by the player this turn
    Explicit,
    /// Synthesized from an active mission
    MissionContinuation,
}

/// A single unit's move request for the movement phase
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOrder {
    pub unit: UnitRef,
    pub target: GridCoord,
    pub origin: OrderOrigin,
    /// Mission type left behind if the move ends partial
    pub intent: MissionType,
}

impl MoveOrder {
    pub fn explicit(unit: UnitRef, target: GridCoord) -> Self {
        Self {
            unit,
            target,
            origin: OrderOrigin::Explicit,
            intent: MissionType::Move,
        }
    }

    pub fn continuation(unit: UnitRef, target: GridCoord) -> Self {
        Self {
            unit,
            target,
            origin: OrderOrigin::MissionContinuation,
            intent: MissionType::Move,
        }
    }

    pub fn with_intent(mut self, intent: MissionType) -> Self {
        self.intent = intent;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementRecord {
    pub unit: UnitRef,
    pub from: GridCoord,
    pub to: GridCoord,
    pub target: GridCoord,
    pub cost: f32,
    pub partial: bool,
    /// Halted before a tile held by the enemy
    pub stopped_by_enemy: bool,
    pub mission_created: bool,
    pub mission_completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementReport {
    pub movements: Vec<MovementRecord>,
    pub failures: Vec<UnitFailure>,
    /// Units sharing a tile with friends after movement
    pub compressed: Vec<UnitRef>,
}

/// Sort orders fastest tier first; ties are shuffled with `rng`
pub fn initiative_order<R: Rng + ?Sized>(
    orders: Vec<MoveOrder>,
    armies: &SidePair<Army>,
    rng: &mut R,
) -> Vec<MoveOrder> {
    let mut orders = orders;
    orders.shuffle(rng);
    // Stable sort keeps the shuffled order inside a tier
    orders.sort_by_key(|order| {
        armies
            .get(order.unit.side)
            .get_unit(&order.unit.unit_id)
            .map(|u| u.unit_type.initiative_tier())
            .unwrap_or(u8::MAX)
    });
    orders
}

/// Move every ordered unit, both sides together
pub fn execute_movement_phase<R: Rng + ?Sized>(
    armies: &mut SidePair<Army>,
    orders: Vec<MoveOrder>,
    map: &MapDescriptor,
    turn: Turn,
    rng: &mut R,
) -> MovementReport {
    let mut report = MovementReport::default();

    for order in initiative_order(orders, armies, rng) {
        match move_unit(armies, &order, map, turn) {
            Ok(Some(record)) => report.movements.push(record),
            Ok(None) => {}
            Err(err) => {
                warn!(unit = %order.unit, error = %err, "Move failed");
                report.failures.push(UnitFailure::new(order.unit.clone(), &err));
            }
        }
    }

    report.compressed = apply_stacking_compression(armies);
    report
}

fn move_unit(
    armies: &mut SidePair<Army>,
    order: &MoveOrder,
    map: &MapDescriptor,
    turn: Turn,
) -> Result<Option<MovementRecord>> {
    let enemy_tiles: HashSet<GridCoord> = armies
        .get(order.unit.side.opponent())
        .units
        .iter()
        .filter(|u| u.is_alive() && !u.has_deserted)
        .map(|u| u.position)
        .collect();

    let unit = armies
        .get_mut(order.unit.side)
        .get_unit_mut(&order.unit.unit_id)
        .ok_or_else(|| {
            BattleError::MovementBlocked(format!("unit {} is not on the field", order.unit))
        })?;

    if !unit.is_alive() {
        return Ok(None);
    }
    if unit.is_changing_formation() {
        debug!(unit = %unit.unit_id, "Holding position while changing formation");
        return Ok(None);
    }
    if unit.is_broken || unit.is_routing || unit.has_deserted {
        return Err(BattleError::MovementBlocked(format!(
            "{} is broken and will not answer orders",
            unit.unit_id
        )));
    }

    let plan = validate_movement(unit, order.target, map)?;

    // Cut the walk short of the first tile the enemy holds
    let blocked_at = plan
        .path
        .iter()
        .skip(1)
        .position(|node| enemy_tiles.contains(node))
        .map(|i| i + 1);
    let stopped_by_enemy = blocked_at.is_some();
    let walked = match blocked_at {
        Some(end) => &plan.path[..end],
        None => &plan.path[..],
    };

    let from = unit.position;
    let to = walked.last().copied().unwrap_or(from);
    let cost = path_cost(map, walked);

    unit.position = to;
    unit.movement_remaining = if plan.partial && !stopped_by_enemy {
        0.0
    } else {
        (unit.movement_remaining - cost).max(0.0)
    };

    let arrived = to == order.target;
    let mut mission_created = false;
    let mut mission_completed = false;

    if arrived {
        if let Some(mission) = unit.active_mission.as_mut().filter(|m| m.is_active()) {
            mission.complete();
            mission_completed = true;
        }
    } else if plan.partial && !stopped_by_enemy {
        if order.origin == OrderOrigin::Explicit {
            unit.active_mission = Some(Mission::new(order.intent, from, order.target, turn));
            mission_created = true;
        }
        if let Some(mission) = unit.active_mission.as_mut() {
            mission.update_progress(to);
        }
    }

    debug!(
        unit = %order.unit,
        %from,
        %to,
        target = %order.target,
        partial = plan.partial,
        stopped_by_enemy,
        "Unit moved"
    );

    Ok(Some(MovementRecord {
        unit: order.unit.clone(),
        from,
        to,
        target: order.target,
        cost,
        partial: plan.partial || stopped_by_enemy,
        stopped_by_enemy,
        mission_created,
        mission_completed,
    }))
}

/// Charge each unit in a friendly stack depth - 1 movement points
///
/// Returns the units that ended up stacked.
pub fn apply_stacking_compression(armies: &mut SidePair<Army>) -> Vec<UnitRef> {
    let mut compressed = Vec::new();

    for side in Side::all() {
        let army = armies.get_mut(side);
        let mut depth: AHashMap<GridCoord, u32> = AHashMap::new();
        for unit in army.units.iter().filter(|u| u.is_alive()) {
            *depth.entry(unit.position).or_insert(0) += 1;
        }

        for unit in army.units.iter_mut().filter(|u| u.is_alive()) {
            let stack = depth.get(&unit.position).copied().unwrap_or(1);
            let penalty = stack.saturating_sub(1);
            unit.compression_level = penalty;
            if penalty > 0 {
                unit.movement_remaining = (unit.movement_remaining - penalty as f32).max(0.0);
                compressed.push(UnitRef::new(side, unit.unit_id.clone()));
            }
        }
    }

    compressed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::mission::MissionStatus;
    use crate::battle::terrain::Terrain;
    use crate::battle::unit_type::UnitType;
    use crate::battle::units::{FormationChange, Formation};
    use crate::combat::culture::Culture;
    use crate::core::types::{PlayerId, UnitId};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn c(text: &str) -> GridCoord {
        GridCoord::parse(text).unwrap()
    }

    fn ready(id: &str, unit_type: UnitType, pos: &str) -> Unit {
        let mut unit = Unit::new(id, unit_type, c(pos), 100);
        reset_for_turn(&mut unit, &MovementRules::default());
        unit
    }

    fn armies(p1: Vec<Unit>, p2: Vec<Unit>) -> SidePair<Army> {
        SidePair::new(
            Army::new(PlayerId::new("p1"), Culture::Roman, p1),
            Army::new(PlayerId::new("p2"), Culture::Celtic, p2),
        )
    }

    fn p1(id: &str) -> UnitRef {
        UnitRef::new(Side::Player1, UnitId::new(id))
    }

    #[test]
    fn test_allowance_depends_on_mount() {
        let rules = MovementRules::default();
        assert_eq!(movement_allowance(&ready("a", UnitType::Infantry, "A1"), &rules), 3.0);
        assert_eq!(movement_allowance(&ready("b", UnitType::LightCavalry, "A1"), &rules), 5.0);
    }

    #[test]
    fn test_full_move_spends_path_cost() {
        let unit = ready("a", UnitType::Infantry, "E5");
        let plan = validate_movement(&unit, c("E7"), &MapDescriptor::open_field()).unwrap();
        assert!(!plan.partial);
        assert_eq!(plan.final_position, c("E7"));
        assert!((plan.movement_remaining - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_long_move_is_partial() {
        let unit = ready("a", UnitType::Infantry, "A1");
        let plan = validate_movement(&unit, c("T20"), &MapDescriptor::open_field()).unwrap();
        assert!(plan.partial);
        assert_ne!(plan.final_position, c("T20"));
        assert_eq!(plan.movement_remaining, 0.0);
        assert_eq!(plan.original_target, c("T20"));
        assert!(plan.cost <= 3.0);
        let covered = c("A1").distance(&plan.final_position);
        assert!(covered > 0 && covered <= 3);
    }

    #[test]
    fn test_river_blocks_move() {
        let mut map = MapDescriptor::open_field();
        map.set_terrain(c("J10"), Terrain::River);
        let unit = ready("a", UnitType::Infantry, "J9");

        let err = validate_movement(&unit, c("J10"), &map).unwrap_err();
        assert!(matches!(err, BattleError::MovementBlocked(_)));
        assert!(err.to_string().contains("river"));
    }

    #[test]
    fn test_partial_explicit_move_creates_mission() {
        let mut forces = armies(vec![ready("a", UnitType::Infantry, "A1")], vec![]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let report = execute_movement_phase(
            &mut forces,
            vec![MoveOrder::explicit(p1("a"), c("T20"))],
            &MapDescriptor::open_field(),
            4,
            &mut rng,
        );

        assert_eq!(report.movements.len(), 1);
        assert!(report.movements[0].mission_created);
        let unit = forces.player1.get_unit(&UnitId::new("a")).unwrap();
        assert_ne!(unit.position, c("T20"));
        assert_eq!(unit.movement_remaining, 0.0);
        let mission = unit.active_mission.as_ref().unwrap();
        assert_eq!(mission.target, c("T20"));
        assert_eq!(mission.start_turn, 4);
        assert!(mission.is_active());
    }

    #[test]
    fn test_continuation_keeps_mission_and_completes_on_arrival() {
        let mut unit = ready("a", UnitType::Infantry, "A1");
        unit.active_mission = Some(Mission::new(MissionType::Move, c("A1"), c("A5"), 1));
        let mut forces = armies(vec![unit], vec![]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let map = MapDescriptor::open_field();

        let orders = vec![MoveOrder::continuation(p1("a"), c("A5"))];
        execute_movement_phase(&mut forces, orders, &map, 2, &mut rng);
        let unit = forces.player1.get_unit(&UnitId::new("a")).unwrap();
        assert_eq!(unit.position, c("A4"));
        let mission = unit.active_mission.as_ref().unwrap();
        assert_eq!(mission.start_turn, 1);
        assert!(mission.is_active());

        for unit in forces.player1.units.iter_mut() {
            reset_for_turn(unit, &MovementRules::default());
        }
        let orders = vec![MoveOrder::continuation(p1("a"), c("A5"))];
        let report = execute_movement_phase(&mut forces, orders, &map, 3, &mut rng);
        assert!(report.movements[0].mission_completed);
        let unit = forces.player1.get_unit(&UnitId::new("a")).unwrap();
        assert_eq!(unit.position, c("A5"));
        assert_eq!(unit.active_mission.as_ref().map(|m| m.status), Some(MissionStatus::Complete));
    }

    #[test]
    fn test_stops_before_enemy_tile() {
        let mut forces = armies(
            vec![ready("a", UnitType::Infantry, "E1")],
            vec![ready("b", UnitType::Infantry, "E3")],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let report = execute_movement_phase(
            &mut forces,
            vec![MoveOrder::explicit(p1("a"), c("E3"))],
            &MapDescriptor::open_field(),
            1,
            &mut rng,
        );

        let record = &report.movements[0];
        assert!(record.stopped_by_enemy);
        assert!(!record.mission_created);
        assert_eq!(record.to.distance(&c("E3")), 1);
        let unit = forces.player1.get_unit(&UnitId::new("a")).unwrap();
        assert!((unit.movement_remaining - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_changing_formation_holds_position() {
        let mut unit = ready("a", UnitType::HeavyInfantry, "E5");
        unit.formation_change = Some(FormationChange {
            target_formation: Formation::Phalanx,
            remaining_turns: 1,
            defense_penalty: 3,
        });
        let mut forces = armies(vec![unit], vec![]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let report = execute_movement_phase(
            &mut forces,
            vec![MoveOrder::explicit(p1("a"), c("E7"))],
            &MapDescriptor::open_field(),
            1,
            &mut rng,
        );
        assert!(report.movements.is_empty());
        assert_eq!(forces.player1.units[0].position, c("E5"));
    }

    #[test]
    fn test_blocked_unit_does_not_stop_others() {
        let mut map = MapDescriptor::open_field();
        map.set_terrain(c("J10"), Terrain::River);
        let mut forces = armies(
            vec![ready("a", UnitType::Infantry, "J9"), ready("b", UnitType::Infantry, "A1")],
            vec![],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let report = execute_movement_phase(
            &mut forces,
            vec![
                MoveOrder::explicit(p1("a"), c("J10")),
                MoveOrder::explicit(p1("b"), c("A3")),
            ],
            &map,
            1,
            &mut rng,
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].code, "movement_blocked");
        assert_eq!(report.movements.len(), 1);
        assert_eq!(forces.player1.get_unit(&UnitId::new("b")).unwrap().position, c("A3"));
    }

    #[test]
    fn test_initiative_tiers_first_then_seeded_ties() {
        let forces = armies(
            vec![
                ready("inf", UnitType::Infantry, "A1"),
                ready("scout", UnitType::Scouts, "B1"),
                ready("cav", UnitType::LightCavalry, "C1"),
                ready("light", UnitType::LightInfantry, "D1"),
            ],
            vec![],
        );
        let orders: Vec<MoveOrder> = ["inf", "scout", "cav", "light"]
            .iter()
            .map(|id| MoveOrder::explicit(p1(id), c("J10")))
            .collect();

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let sorted = initiative_order(orders.clone(), &forces, &mut rng);
        let ids: Vec<&str> = sorted.iter().map(|o| o.unit.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["scout", "cav", "light", "inf"]);

        // Same seed, same order
        let mut a = ChaCha8Rng::seed_from_u64(5);
        let mut b = ChaCha8Rng::seed_from_u64(5);
        assert_eq!(
            initiative_order(orders.clone(), &forces, &mut a),
            initiative_order(orders, &forces, &mut b)
        );
    }

    #[test]
    fn test_stacking_compression() {
        let mut forces = armies(
            vec![
                ready("a", UnitType::Infantry, "E5"),
                ready("b", UnitType::Infantry, "E5"),
                ready("c", UnitType::Infantry, "E5"),
                ready("d", UnitType::Infantry, "F5"),
            ],
            vec![ready("x", UnitType::Infantry, "E5")],
        );

        let compressed = apply_stacking_compression(&mut forces);
        assert_eq!(compressed.len(), 3);
        for id in ["a", "b", "c"] {
            let unit = forces.player1.get_unit(&UnitId::new(id)).unwrap();
            assert_eq!(unit.compression_level, 2);
            assert!((unit.movement_remaining - 1.0).abs() < 1e-6);
        }
        let lone = forces.player1.get_unit(&UnitId::new("d")).unwrap();
        assert_eq!(lone.compression_level, 0);
        assert_eq!(forces.player2.units[0].compression_level, 0);
    }

    #[test]
    fn test_compression_never_goes_negative() {
        let mut units: Vec<Unit> = (0..6)
            .map(|i| ready(&format!("u{i}"), UnitType::Infantry, "E5"))
            .collect();
        units[0].movement_remaining = 0.5;
        let mut forces = armies(units, vec![]);
        apply_stacking_compression(&mut forces);
        for unit in &forces.player1.units {
            assert!(unit.movement_remaining >= 0.0);
            assert!(unit.movement_remaining <= 3.0);
        }
    }
}
