//! Turn pipeline integration tests
//!
//! Whole turns run through `TurnResolver` with structured orders and the
//! template narrator, so every run is deterministic under a seed.

use grid_tactics::battle::movement::validate_movement;
use grid_tactics::battle::*;
use grid_tactics::combat::Culture;
use grid_tactics::core::config::{ResolutionModel, RulesConfig};
use grid_tactics::core::types::{PlayerId, Side, UnitId};
use grid_tactics::orders::StructuredOrderInterpreter;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::json;

fn c(text: &str) -> GridCoord {
    GridCoord::parse(text).unwrap()
}

fn record(p1: Vec<Unit>, p2: Vec<Unit>) -> BattleRecord {
    let state = BattleState::new(
        Army::new(PlayerId::new("p1"), Culture::Roman, p1),
        Army::new(PlayerId::new("p2"), Culture::Celtic, p2),
    );
    BattleRecord::new(PlayerId::new("p1"), PlayerId::new("p2"), 20, state)
}

async fn resolve_with(rules: RulesConfig, request: &TurnRequest, seed: u64) -> TurnOutcome {
    let resolver = TurnResolver::new(rules, StructuredOrderInterpreter, TemplateNarrator);
    resolver.resolve_turn(request, &mut ChaCha8Rng::seed_from_u64(seed)).await
}

async fn resolve(request: &TurnRequest, seed: u64) -> TurnOutcome {
    resolve_with(RulesConfig::default(), request, seed).await
}

fn river_map() -> MapDescriptor {
    let mut map = MapDescriptor::open_field();
    for column in 'A'..='T' {
        map.set_terrain(c(&format!("{}10", column)), Terrain::River);
    }
    map.set_terrain(c("C10"), Terrain::Ford);
    map
}

#[test]
fn test_river_without_ford_blocks_movement() {
    let map = river_map();
    let mut unit = Unit::new("a", UnitType::Infantry, c("J9"), 100);
    unit.movement_remaining = 3.0;

    let err = validate_movement(&unit, c("J10"), &map).unwrap_err();
    assert_eq!(err.code(), "movement_blocked");
    assert!(err.to_string().contains("river"));
}

#[tokio::test]
async fn test_blocked_move_fails_only_that_unit() {
    let request = TurnRequest::new(
        record(
            vec![
                Unit::new("a", UnitType::Infantry, c("J9"), 100),
                Unit::new("b", UnitType::Infantry, c("E5"), 100),
            ],
            vec![Unit::new("x", UnitType::Infantry, c("J20"), 100)],
        ),
        river_map(),
    )
    .with_orders(
        Side::Player1,
        r#"[
            {"type":"move","unitId":"a","targetPosition":"J10"},
            {"type":"move","unitId":"b","targetPosition":"E6"}
        ]"#,
    );

    let outcome = resolve(&request, 5).await;
    let success = outcome.success().expect("turn should resolve");
    let results = &success.turn_results;

    assert_eq!(results.movements.failures.len(), 1);
    assert_eq!(results.movements.failures[0].unit.unit_id, UnitId::new("a"));
    assert_eq!(results.movements.failures[0].code, "movement_blocked");

    let army = success.new_battle_state.army(Side::Player1);
    assert_eq!(army.get_unit(&UnitId::new("a")).unwrap().position, c("J9"));
    assert_eq!(army.get_unit(&UnitId::new("b")).unwrap().position, c("E6"));
}

#[test]
fn test_long_march_is_partial_with_no_allowance_left() {
    let map = MapDescriptor::open_field();
    let mut unit = Unit::new("a", UnitType::Infantry, c("A1"), 100);
    unit.movement_remaining = 3.0;

    let plan = validate_movement(&unit, c("T20"), &map).unwrap();
    assert!(plan.partial);
    assert_ne!(plan.final_position, c("T20"));
    assert_eq!(plan.movement_remaining, 0.0);
    assert_eq!(plan.original_target, c("T20"));
}

#[tokio::test]
async fn test_long_march_attaches_mission() {
    let request = TurnRequest::new(
        record(
            vec![Unit::new("a", UnitType::Infantry, c("A1"), 100)],
            vec![Unit::new("x", UnitType::Infantry, c("T1"), 100)],
        ),
        MapDescriptor::open_field(),
    )
    .with_orders(Side::Player1, r#"[{"type":"move","unitId":"a","targetPosition":"T20"}]"#);

    let outcome = resolve(&request, 2).await;
    let success = outcome.success().unwrap();
    let movement = &success.turn_results.movements.movements[0];
    assert!(movement.partial);
    assert!(movement.mission_created);

    let unit = &success.new_battle_state.army(Side::Player1).units[0];
    let mission = unit.active_mission.as_ref().unwrap();
    assert_eq!(mission.mission_type, MissionType::Move);
    assert_eq!(mission.target, c("T20"));
    assert_eq!(mission.status, MissionStatus::Active);
}

#[tokio::test]
async fn test_adjacent_units_fight_one_melee() {
    let p1 = vec![Unit::new("a", UnitType::Infantry, c("J9"), 100)];
    let p2 = vec![Unit::new("x", UnitType::Infantry, c("J10"), 100)];

    let engagements = detect_engagements(&p1, &p2, &RulesConfig::default().combat);
    assert_eq!(engagements.len(), 1);
    assert_eq!(engagements[0].kind, EngagementKind::Melee);

    let request = TurnRequest::new(record(p1, p2), MapDescriptor::open_field());
    let outcome = resolve(&request, 11).await;
    let results = &outcome.success().unwrap().turn_results;

    assert_eq!(results.combats.len(), 1);
    assert_eq!(results.combats[0].engagement.kind, EngagementKind::Melee);
    let casualties = results.combats[0].result.casualties;
    assert!(casualties.attacker <= 100 && casualties.defender <= 100);
    assert_eq!(
        results.total_casualties.player1 + results.total_casualties.player2,
        casualties.attacker + casualties.defender
    );
}

#[tokio::test]
async fn test_attack_order_seats_player2_as_attacker() {
    let request = TurnRequest::new(
        record(
            vec![Unit::new("a", UnitType::Infantry, c("J9"), 100)],
            vec![Unit::new("x", UnitType::Infantry, c("J10"), 100)],
        ),
        MapDescriptor::open_field(),
    )
    .with_orders(Side::Player2, r#"[{"type":"attack","unitId":"x","targetUnitId":"a"}]"#);

    let outcome = resolve(&request, 4).await;
    let combat = &outcome.success().unwrap().turn_results.combats[0];
    assert_eq!(combat.engagement.attacker.side, Side::Player2);
    assert_eq!(combat.engagement.defender.side, Side::Player1);
}

#[tokio::test]
async fn test_same_seed_same_turn() {
    let request = TurnRequest::new(
        record(
            vec![
                Unit::new("a", UnitType::Infantry, c("J9"), 100),
                Unit::new("bows", UnitType::Archers, c("J7"), 60),
            ],
            vec![
                Unit::new("x", UnitType::Infantry, c("J10"), 100),
                Unit::new("y", UnitType::LightCavalry, c("L12"), 50),
            ],
        ),
        MapDescriptor::open_field(),
    )
    .with_orders(Side::Player2, r#"[{"type":"move","unitId":"y","targetPosition":"K10"}]"#);

    let first = resolve(&request, 99).await;
    let second = resolve(&request, 99).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_rejected_turn_reports_both_sides() {
    let request = TurnRequest::new(
        record(
            vec![Unit::new("a", UnitType::Infantry, c("B2"), 100)],
            vec![Unit::new("x", UnitType::Infantry, c("S19"), 100)],
        ),
        MapDescriptor::open_field(),
    )
    .with_orders(Side::Player1, r#"[{"type":"hold","unitId":"x"}]"#)
    .with_orders(Side::Player2, r#"[{"type":"teleport","unitId":"x"}]"#);

    let outcome = resolve(&request, 1).await;
    let failure = outcome.failure().unwrap();
    assert_eq!(failure.phase, FailurePhase::ValidationFailed);
    let errors = failure.validation_errors.as_ref().unwrap();
    assert_eq!(errors.player1.len(), 1);
    assert_eq!(errors.player2.len(), 1);
    assert_eq!(errors.player2[0].action_index, 0);
}

#[tokio::test]
async fn test_request_and_result_json_shape() {
    let rec = record(
        vec![Unit::new("a", UnitType::Infantry, c("J9"), 100)],
        vec![Unit::new("x", UnitType::Infantry, c("J12"), 100)],
    );
    let request: TurnRequest = serde_json::from_value(json!({
        "battleRecord": serde_json::to_value(&rec).unwrap(),
        "player1OrderText": "[{\"type\":\"move\",\"unitId\":\"a\",\"targetPosition\":\"J11\"}]",
        "player2OrderText": "",
        "mapDescriptor": { "defaultTerrain": "plains", "terrain": { "C3": "forest" } }
    }))
    .unwrap();
    assert_eq!(request.map_descriptor.terrain_at(c("C3")), Terrain::Forest);

    let outcome = resolve(&request, 8).await;
    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["success"], true);
    assert_eq!(value["newBattleState"]["currentTurn"], 2);
    assert!(value["turnResults"]["combats"].is_array());
    assert!(value["narrativeRequestPayload"]["turn"].is_number());
    assert!(value["narrative"].as_str().unwrap().starts_with("Turn 1"));
    assert_eq!(value["victory"]["achieved"], false);
}

#[tokio::test]
async fn test_last_unit_destroyed_ends_battle() {
    let mut doomed = Unit::new("x", UnitType::Infantry, c("J10"), 100);
    doomed.current_strength = 1;
    let mut veterans = Unit::new("a", UnitType::HeavyInfantry, c("J9"), 200);
    veterans.quality_type = QualityType::Elite;
    let mut rules = RulesConfig::default();
    rules.combat.resolution_model = ResolutionModel::Bucket;

    let request = TurnRequest::new(
        record(vec![veterans], vec![doomed]),
        MapDescriptor::open_field(),
    )
        .with_orders(Side::Player1, r#"[{"type":"attack","unitId":"a","targetUnitId":"x"}]"#);

    let outcome = resolve_with(rules, &request, 21).await;
    let success = outcome.success().unwrap();
    assert_eq!(success.turn_results.destroyed.len(), 1);
    assert!(success.new_battle_state.army(Side::Player2).units.is_empty());
    assert!(success.victory.achieved);
    assert_eq!(success.victory.winner, Some(Winner::Player1));
    assert_eq!(success.victory.reason, Some(VictoryReason::EnemyAnnihilated));
}

#[tokio::test]
async fn test_fog_only_reveals_nearby_enemies() {
    let request = TurnRequest::new(
        record(
            vec![Unit::new("a", UnitType::Infantry, c("B2"), 100)],
            vec![
                Unit::new("near", UnitType::Infantry, c("B5"), 100),
                Unit::new("far", UnitType::Infantry, c("S19"), 100),
            ],
        ),
        MapDescriptor::open_field(),
    );

    let outcome = resolve(&request, 3).await;
    let success = outcome.success().unwrap();
    let seen = &success.new_battle_state.visible_enemy_positions.player1;
    assert!(seen.contains(&c("B5")));
    assert!(!seen.contains(&c("S19")));
    assert!(success.new_battle_state.intel_memory.player1.get(&c("B5")).is_some());
    assert!(success.new_battle_state.intel_memory.player1.get(&c("S19")).is_none());
}

#[tokio::test]
async fn test_rout_counts_destroyed_units_for_stored_records() {
    let mut worn = Unit::new("a", UnitType::Infantry, c("A1"), 100);
    worn.current_strength = 30;
    let mut doomed = Unit::new("b", UnitType::Infantry, c("J9"), 100);
    doomed.current_strength = 2;
    let mut veterans = Unit::new("x", UnitType::HeavyInfantry, c("J10"), 200);
    veterans.quality_type = QualityType::Elite;

    // Stored records may omit the deployed strength
    let mut value = serde_json::to_value(record(vec![worn, doomed], vec![veterans])).unwrap();
    for side in ["player1", "player2"] {
        let army = value["battleState"][side].as_object_mut().unwrap();
        army.remove("startingMaxStrength");
    }
    let stored: BattleRecord = serde_json::from_value(value).unwrap();
    assert_eq!(stored.battle_state.army(Side::Player1).starting_max_strength, 0);

    let mut rules = RulesConfig::default();
    rules.combat.resolution_model = ResolutionModel::Bucket;
    let request = TurnRequest::new(stored, MapDescriptor::open_field())
        .with_orders(Side::Player2, r#"[{"type":"attack","unitId":"x","targetUnitId":"b"}]"#);

    let outcome = resolve_with(rules, &request, 1).await;
    let success = outcome.success().unwrap();
    assert_eq!(success.turn_results.destroyed.len(), 1);
    assert_eq!(success.turn_results.destroyed[0].unit_id, UnitId::new("b"));

    let survivors = success.new_battle_state.army(Side::Player1);
    assert_eq!(survivors.total_strength(), 30);
    assert_eq!(survivors.starting_strength(), 200);
    assert!(success.victory.achieved);
    assert_eq!(success.victory.winner, Some(Winner::Player2));
    assert_eq!(success.victory.reason, Some(VictoryReason::EnemyRouted));
}
