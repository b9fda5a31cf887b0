//! Turn execution
//!
//! One call resolves one turn of one battle:
//! reset -> orders -> gate -> formations -> movement -> contact -> vision
//! -> commanders -> combat -> casualties -> morale -> victory -> narrative
//!
//! Phases run on a private copy of the battle state. The caller's record is
//! never touched; a turn that fails hands nothing back but the reason.

use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::battle::battle_map::MapDescriptor;
use crate::battle::commander::{
    apply_commander_command, evaluate_capture_risk, resolve_capture, CaptureChoice,
    CaptureResolver, CommanderEvent, CommanderStatus, DiceCaptureResolver,
};
use crate::battle::engagement::{detect_engagements, orient_engagements, Engagement};
use crate::battle::formation_change::{
    advance_formation_change, request_formation_change, FormationChangeOutcome,
};
use crate::battle::mission::{synthesize_continuations, MissionType};
use crate::battle::morale::{apply_morale_delta, evaluate_morale, MoraleEvent};
use crate::battle::movement::{execute_movement_phase, reset_for_turn, MoveOrder, MovementReport};
use crate::battle::narrative::{
    CasualtyRecord, NarrativeGenerator, NarrativeRequest, PositionChange, TemplateNarrator,
};
use crate::battle::state::{BattleRecord, BattleState};
use crate::battle::units::Formation;
use crate::battle::victory::{check_victory_conditions, VictoryResult};
use crate::battle::visibility::{FogOfWar, RangeFogOfWar, VisibilityReport};
use crate::combat::adapter::{CombatAdapter, CombatReport, SupportOrder};
use crate::core::config::RulesConfig;
use crate::core::error::{ActionError, BattleError, UnitFailure};
use crate::core::types::{Side, SidePair, Turn, UnitId, UnitRef};
use crate::orders::actions::{normalize_action, Action, CommanderCommand};
use crate::orders::interpreter::{
    detect_mission_interruptions, MissionInterruption, OrderInterpreter,
};
use crate::orders::validation::{resolve_conditionals, validate_actions};

/// Everything needed to resolve one turn
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub battle_record: BattleRecord,
    #[serde(default)]
    pub player1_order_text: String,
    #[serde(default)]
    pub player2_order_text: String,
    pub map_descriptor: MapDescriptor,
    /// Answers for commanders left at risk by the previous turn
    #[serde(default)]
    pub capture_choices: SidePair<Option<CaptureChoice>>,
}

impl TurnRequest {
    pub fn new(battle_record: BattleRecord, map_descriptor: MapDescriptor) -> Self {
        Self {
            battle_record,
            player1_order_text: String::new(),
            player2_order_text: String::new(),
            map_descriptor,
            capture_choices: SidePair::default(),
        }
    }

    pub fn with_orders(mut self, side: Side, text: impl Into<String>) -> Self {
        match side {
            Side::Player1 => self.player1_order_text = text.into(),
            Side::Player2 => self.player2_order_text = text.into(),
        }
        self
    }

    pub fn order_text(&self, side: Side) -> &str {
        match side {
            Side::Player1 => &self.player1_order_text,
            Side::Player2 => &self.player2_order_text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormationChangeRecord {
    pub unit: UnitRef,
    pub requested: Formation,
    pub outcome: FormationChangeOutcome,
}

/// What happened during a resolved turn
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResults {
    pub turn: Turn,
    pub movements: MovementReport,
    pub formation_changes: Vec<FormationChangeRecord>,
    /// Formation changes that finished at the start of the turn
    pub formations_completed: Vec<UnitRef>,
    pub mission_interruptions: SidePair<Vec<MissionInterruption>>,
    pub missions_completed: Vec<UnitRef>,
    pub intelligence: SidePair<VisibilityReport>,
    pub combats: Vec<CombatReport>,
    pub casualties: Vec<CasualtyRecord>,
    pub total_casualties: SidePair<u32>,
    pub destroyed: Vec<UnitRef>,
    pub morale_events: Vec<MoraleEvent>,
    pub commander_events: Vec<CommanderEvent>,
    pub position_changes: Vec<PositionChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnSuccess {
    pub success: bool,
    pub new_battle_state: BattleState,
    pub turn_results: TurnResults,
    pub victory: VictoryResult,
    pub narrative_request_payload: NarrativeRequest,
    pub narrative: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePhase {
    /// Orders were rejected; resubmit corrected orders
    ValidationFailed,
    /// Resolution broke down; the committed state still stands
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnFailure {
    pub success: bool,
    pub phase: FailurePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<SidePair<Vec<ActionError>>>,
    /// Order text the interpreter could not translate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpreter_errors: Option<SidePair<Vec<String>>>,
}

impl TurnFailure {
    fn failed(error: &BattleError) -> Self {
        Self {
            success: false,
            phase: FailurePhase::Failed,
            error: Some(error.to_string()),
            error_code: Some(error.code().to_string()),
            validation_errors: None,
            interpreter_errors: None,
        }
    }

    fn rejected(
        validation_errors: SidePair<Vec<ActionError>>,
        interpreter_errors: SidePair<Vec<String>>,
    ) -> Self {
        let has_interpreter_errors = Side::all()
            .iter()
            .any(|s| !interpreter_errors.get(*s).is_empty());
        Self {
            success: false,
            phase: FailurePhase::ValidationFailed,
            error: None,
            error_code: None,
            validation_errors: Some(validation_errors),
            interpreter_errors: has_interpreter_errors.then_some(interpreter_errors),
        }
    }
}

/// The JSON envelope handed back for a turn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TurnOutcome {
    Resolved(Box<TurnSuccess>),
    Rejected(TurnFailure),
}

impl TurnOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TurnOutcome::Resolved(_))
    }

    pub fn success(&self) -> Option<&TurnSuccess> {
        match self {
            TurnOutcome::Resolved(success) => Some(success),
            TurnOutcome::Rejected(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&TurnFailure> {
        match self {
            TurnOutcome::Resolved(_) => None,
            TurnOutcome::Rejected(failure) => Some(failure),
        }
    }
}

/// Per-turn intents distilled from the validated actions
#[derive(Default)]
struct TurnPlan {
    moves: Vec<MoveOrder>,
    aggressors: HashSet<UnitRef>,
    support: Vec<SupportOrder>,
    formations: Vec<(UnitRef, Formation)>,
    commander_commands: Vec<(Side, CommanderCommand)>,
}

/// Working copy of a battle while a turn resolves
struct TurnContext<'a> {
    state: BattleState,
    map: &'a MapDescriptor,
    rules: &'a RulesConfig,
    turn: Turn,
    plan: TurnPlan,
    engagements: Vec<Engagement>,
    pending_casualties: BTreeMap<UnitRef, u32>,
    pending_morale: BTreeMap<UnitRef, i32>,
    results: TurnResults,
}

/// Resolves turns against a fixed rule set and collaborators
pub struct TurnResolver<I, N> {
    rules: RulesConfig,
    interpreter: I,
    narrator: N,
    fog: Box<dyn FogOfWar + Send + Sync>,
    capture: Box<dyn CaptureResolver + Send + Sync>,
}

impl<I: OrderInterpreter, N: NarrativeGenerator> TurnResolver<I, N> {
    pub fn new(rules: RulesConfig, interpreter: I, narrator: N) -> Self {
        let fog = Box::new(RangeFogOfWar::new(rules.vision.clone()));
        let capture = Box::new(DiceCaptureResolver::new(&rules.commander));
        Self {
            rules,
            interpreter,
            narrator,
            fog,
            capture,
        }
    }

    pub fn with_fog(mut self, fog: impl FogOfWar + Send + Sync + 'static) -> Self {
        self.fog = Box::new(fog);
        self
    }

    pub fn with_capture_resolver(
        mut self,
        capture: impl CaptureResolver + Send + Sync + 'static,
    ) -> Self {
        self.capture = Box::new(capture);
        self
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    /// Resolve one turn
    pub async fn resolve_turn<R: Rng>(&self, request: &TurnRequest, rng: &mut R) -> TurnOutcome {
        let record = &request.battle_record;
        let turn = record.current_turn;
        info!(battle = %record.id, turn, "Resolving turn");

        let mut ctx = TurnContext::new(record, &request.map_descriptor, &self.rules, turn);

        // ===== PHASE 1: RESET =====
        ctx.phase_reset();

        // ===== PHASE 2: ORDERS =====
        let mut actions: SidePair<Vec<Action>> = SidePair::default();
        let mut validation_errors: SidePair<Vec<ActionError>> = SidePair::default();
        let mut interpreter_errors: SidePair<Vec<String>> = SidePair::default();
        let mut interruptions: SidePair<Vec<MissionInterruption>> = SidePair::default();

        for side in Side::all() {
            let interpreted = match self
                .interpreter
                .interpret(request.order_text(side), &ctx.state, side, ctx.map)
                .await
            {
                Ok(interpreted) => interpreted,
                Err(err) => {
                    warn!(side = %side, error = %err, "Order interpretation failed");
                    return TurnOutcome::Rejected(TurnFailure::failed(&err));
                }
            };

            let (normalized, errors) = normalize_all(interpreted.validated_actions);
            *actions.get_mut(side) = normalized;
            validation_errors.get_mut(side).extend(errors);
            interpreter_errors.get_mut(side).extend(interpreted.errors);
            interruptions.get_mut(side).extend(interpreted.mission_interruptions);
        }

        // ===== PHASE 3: VALIDATION GATE =====
        for side in Side::all() {
            let errors = validate_actions(actions.get(side), side, &ctx.state, ctx.rules);
            validation_errors.get_mut(side).extend(errors);
        }
        let rejected = Side::all().iter().any(|s| {
            !validation_errors.get(*s).is_empty() || !interpreter_errors.get(*s).is_empty()
        });
        if rejected {
            info!(battle = %record.id, turn, "Turn rejected by validation");
            let failure = TurnFailure::rejected(validation_errors, interpreter_errors);
            return TurnOutcome::Rejected(failure);
        }

        // ===== PHASE 4: PLAN (conditionals, interruptions, continuations) =====
        for side in Side::all() {
            let planned = std::mem::take(actions.get_mut(side));
            let resolved = resolve_conditionals(planned, side, &ctx.state);
            ctx.plan_side(side, resolved, std::mem::take(interruptions.get_mut(side)));
        }

        // ===== PHASE 5: FORMATIONS AND COMMANDER ORDERS =====
        ctx.phase_formations();
        ctx.phase_commander_orders();

        // ===== PHASE 6: MOVEMENT =====
        let moves = std::mem::take(&mut ctx.plan.moves);
        ctx.results.movements =
            execute_movement_phase(&mut ctx.state.armies, moves, ctx.map, turn, rng);

        // ===== PHASE 7: CONTACT =====
        ctx.phase_contact();

        // ===== PHASE 8: VISIBILITY =====
        ctx.phase_visibility(self.fog.as_ref());

        // ===== PHASE 9: COMMANDERS FOLLOW =====
        ctx.phase_commander_follow();

        // ===== PHASE 10: COMBAT =====
        if let Err(err) = ctx.phase_combat(rng) {
            warn!(battle = %record.id, turn, error = %err, "Combat resolution failed");
            return TurnOutcome::Rejected(TurnFailure::failed(&err));
        }

        // ===== PHASE 11: CASUALTIES =====
        ctx.phase_casualties();

        // ===== PHASE 12: MORALE AND CAPTURE =====
        ctx.phase_morale();
        ctx.phase_capture(&request.capture_choices, self.capture.as_ref(), rng);

        // ===== PHASE 13: VICTORY =====
        let victory = check_victory_conditions(
            &ctx.state.armies,
            turn,
            record.max_turns,
            &self.rules.victory,
        );
        if victory.achieved {
            info!(
                battle = %record.id,
                turn,
                winner = ?victory.winner,
                reason = ?victory.reason,
                "Battle decided"
            );
        }

        // ===== PHASE 14: NARRATIVE =====
        ctx.phase_position_diff(&record.battle_state);
        let payload = ctx.narrative_request(record, &victory);
        let narrative = self.narrate(&payload).await;

        let TurnContext { mut state, results, .. } = ctx;
        state.current_turn = turn + 1;
        info!(
            battle = %record.id,
            turn,
            combats = results.combats.len(),
            destroyed = results.destroyed.len(),
            "Turn resolved"
        );

        TurnOutcome::Resolved(Box::new(TurnSuccess {
            success: true,
            new_battle_state: state,
            turn_results: results,
            victory,
            narrative_request_payload: payload,
            narrative,
        }))
    }

    async fn narrate(&self, payload: &NarrativeRequest) -> String {
        if !self.rules.narrative_enabled {
            return TemplateNarrator::render(payload);
        }
        match self.narrator.generate(payload).await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "Narrative generation failed, using template");
                TemplateNarrator::render(payload)
            }
        }
    }
}

/// Normalize raw actions, reporting each one that does not fit the union
fn normalize_all(raw: Vec<Value>) -> (Vec<Action>, Vec<ActionError>) {
    let mut actions = Vec::with_capacity(raw.len());
    let mut errors = Vec::new();
    for (index, value) in raw.into_iter().enumerate() {
        let unit_id = value
            .get("unitId")
            .or_else(|| value.get("unit_id"))
            .and_then(Value::as_str)
            .map(UnitId::new);
        match normalize_action(value) {
            Ok(action) => actions.push(action),
            Err(err) => errors.push(ActionError::new(index, unit_id, &err)),
        }
    }
    (actions, errors)
}

impl<'a> TurnContext<'a> {
    fn new(
        record: &BattleRecord,
        map: &'a MapDescriptor,
        rules: &'a RulesConfig,
        turn: Turn,
    ) -> Self {
        let mut state = record.battle_state.clone();
        state.current_turn = turn;
        // Pin deployed strength before destroyed units are removed
        for side in Side::all() {
            state.armies.get_mut(side).record_starting_strength();
        }
        Self {
            state,
            map,
            rules,
            turn,
            plan: TurnPlan::default(),
            engagements: Vec::new(),
            pending_casualties: BTreeMap::new(),
            pending_morale: BTreeMap::new(),
            results: TurnResults {
                turn,
                ..TurnResults::default()
            },
        }
    }

    fn phase_reset(&mut self) {
        for side in Side::all() {
            for unit in self.state.armies.get_mut(side).units.iter_mut() {
                reset_for_turn(unit, &self.rules.movement);
                if let Some(formation) = advance_formation_change(unit) {
                    debug!(
                        unit = %unit.unit_id,
                        formation = formation.label(),
                        "Formation assumed"
                    );
                    self.results
                        .formations_completed
                        .push(UnitRef::new(side, unit.unit_id.clone()));
                }
            }
            if let Some(commander) = self.state.commanders.get_mut(side).as_mut() {
                commander.reset_for_turn();
            }
        }
        debug!(turn = self.turn, "Reset complete");
    }

    /// Turn one side's resolved actions into movement, combat and
    /// formation intents
    fn plan_side(&mut self, side: Side, actions: Vec<Action>, reported: Vec<MissionInterruption>) {
        let mut interrupted =
            detect_mission_interruptions(&actions, side, &self.state, self.map, self.rules);
        for extra in reported {
            if !interrupted.iter().any(|i| i.unit_id == extra.unit_id) {
                interrupted.push(extra);
            }
        }
        let held: HashSet<UnitId> = interrupted.iter().map(|i| i.unit_id.clone()).collect();
        for interruption in &interrupted {
            info!(side = %side, unit = %interruption.unit_id, "Mission interrupted by hold order");
        }
        *self.results.mission_interruptions.get_mut(side) = interrupted;

        // Any explicit order replaces a standing mission
        for unit_id in actions.iter().filter_map(Action::unit_id) {
            if held.contains(unit_id) {
                continue;
            }
            if let Some(mission) = self
                .state
                .army_mut(side)
                .get_unit_mut(unit_id)
                .and_then(|u| u.active_mission.as_mut())
                .filter(|m| m.is_active())
            {
                mission.cancel();
                debug!(side = %side, unit = %unit_id, "Mission canceled by new orders");
            }
        }

        let ordered: Vec<&UnitId> = actions.iter().flat_map(Action::ordered_units).collect();
        let continuations = synthesize_continuations(self.state.army(side), &ordered);

        for action in &actions {
            self.plan_action(side, action);
        }

        for action in continuations {
            let Action::Move {
                unit_id,
                target_position,
            } = action
            else {
                continue;
            };
            let intent = self
                .state
                .army(side)
                .get_unit(&unit_id)
                .and_then(|u| u.active_mission.as_ref())
                .map(|m| m.mission_type)
                .unwrap_or_default();
            let unit = UnitRef::new(side, unit_id);
            if intent == MissionType::Attack {
                self.plan.aggressors.insert(unit.clone());
            }
            self.plan
                .moves
                .push(MoveOrder::continuation(unit, target_position).with_intent(intent));
        }
    }

    fn plan_action(&mut self, side: Side, action: &Action) {
        match action {
            Action::Move {
                unit_id,
                target_position,
            } => {
                let unit = UnitRef::new(side, unit_id.clone());
                self.plan
                    .moves
                    .push(MoveOrder::explicit(unit, *target_position));
            }
            Action::Attack {
                unit_id,
                target_unit_id,
                target_position,
            } => {
                let unit = UnitRef::new(side, unit_id.clone());
                let target = target_unit_id
                    .as_ref()
                    .and_then(|t| self.state.army(side.opponent()).get_unit(t))
                    .map(|t| t.position)
                    .or(*target_position);
                self.plan.aggressors.insert(unit.clone());
                if let Some(target) = target {
                    self.plan
                        .moves
                        .push(MoveOrder::explicit(unit, target).with_intent(MissionType::Attack));
                }
            }
            Action::SupportFire {
                unit_id,
                supporting,
                target_unit_id,
            } => self.plan.support.push(SupportOrder {
                supporter: UnitRef::new(side, unit_id.clone()),
                supporting: supporting.clone(),
                target: target_unit_id.clone(),
            }),
            Action::Formation {
                unit_id,
                formation_type,
            } => self
                .plan
                .formations
                .push((UnitRef::new(side, unit_id.clone()), *formation_type)),
            Action::Commander { command } => {
                self.plan.commander_commands.push((side, command.clone()))
            }
            Action::Hold { .. } => {}
            // Already flattened by resolve_conditionals
            Action::Conditional { .. } => {}
        }
    }

    fn phase_formations(&mut self) {
        let requests = std::mem::take(&mut self.plan.formations);
        for (unit_ref, requested) in requests {
            let Some(unit) = self.state.unit_mut(&unit_ref) else {
                continue;
            };
            let outcome = request_formation_change(unit, requested, self.map, self.rules);
            self.results.formation_changes.push(FormationChangeRecord {
                unit: unit_ref,
                requested,
                outcome,
            });
        }
    }

    fn phase_commander_orders(&mut self) {
        let commands = std::mem::take(&mut self.plan.commander_commands);
        for (side, command) in commands {
            let Some(commander) = self.state.commanders.get_mut(side).as_mut() else {
                debug!(side = %side, "Commander order ignored: no commander");
                continue;
            };
            if commander.status.is_lost() {
                continue;
            }
            let army = self.state.armies.get(side);
            let event = apply_commander_command(commander, side, &command, army);
            self.results.commander_events.push(event);
        }
    }

    fn phase_contact(&mut self) {
        let mut engagements = detect_engagements(
            &self.state.armies.player1.units,
            &self.state.armies.player2.units,
            &self.rules.combat,
        );
        let state = &self.state;
        orient_engagements(&mut engagements, &self.plan.aggressors, |r| state.position_of(r));

        let engaged: HashSet<UnitRef> = engagements
            .iter()
            .flat_map(|e| [e.attacker.clone(), e.defender.clone()])
            .collect();
        for unit_ref in &engaged {
            let Some(unit) = self.state.unit_mut(unit_ref) else {
                continue;
            };
            unit.in_combat = true;
            if let Some(mission) = unit.active_mission.as_mut().filter(|m| m.is_active()) {
                mission.complete();
                self.results.missions_completed.push(unit_ref.clone());
            }
        }
        for record in &self.results.movements.movements {
            if record.mission_completed && !self.results.missions_completed.contains(&record.unit) {
                self.results.missions_completed.push(record.unit.clone());
            }
        }

        debug!(count = engagements.len(), "Engagements detected");
        self.engagements = engagements;
    }

    fn phase_visibility(&mut self, fog: &dyn FogOfWar) {
        for side in Side::all() {
            let report = fog.compute(
                &self.state.armies.get(side).units,
                &self.state.armies.get(side.opponent()).units,
                self.map,
                self.state.weather,
            );
            *self.state.visible_enemy_positions.get_mut(side) =
                report.visible_enemy_positions.clone();
            self.state.intel_memory.get_mut(side).merge(&report, self.turn);
            debug!(side = %side, detected = report.total_enemies_detected, "Visibility updated");
            *self.results.intelligence.get_mut(side) = report;
        }
    }

    fn phase_commander_follow(&mut self) {
        for side in Side::all() {
            if let Some(commander) = self.state.commanders.get_mut(side).as_mut() {
                if !commander.status.is_lost() && !commander.follow(self.state.armies.get(side)) {
                    debug!(
                        side = %side,
                        unit = %commander.attached_unit_id,
                        "Commander's unit is gone"
                    );
                }
            }
        }
    }

    fn phase_combat<R: Rng>(&mut self, rng: &mut R) -> crate::core::error::Result<()> {
        let mut engagements = std::mem::take(&mut self.engagements);
        CombatAdapter::new(&self.state, self.map, self.rules).annotate_positional(&mut engagements);

        let mut spent = HashSet::new();
        for engagement in &engagements {
            let report = {
                let adapter = CombatAdapter::new(&self.state, self.map, self.rules);
                let (attacker_support, defender_support) =
                    adapter.supporters_for(engagement, &self.plan.support, &mut spent);
                adapter.resolve(engagement, attacker_support, defender_support, rng)?
            };

            if let Some(update) = report.result.bucket_update {
                if let Some(unit) = self.state.unit_mut(&engagement.attacker) {
                    unit.damage_accumulation = Some(update.attacker);
                }
                if let Some(unit) = self.state.unit_mut(&engagement.defender) {
                    unit.damage_accumulation = Some(update.defender);
                }
            }

            let casualties = &report.result.casualties;
            *self
                .pending_casualties
                .entry(engagement.attacker.clone())
                .or_default() += casualties.attacker;
            *self
                .pending_casualties
                .entry(engagement.defender.clone())
                .or_default() += casualties.defender;
            let morale = &report.result.morale_delta;
            *self.pending_morale.entry(engagement.attacker.clone()).or_default() += morale.attacker;
            *self.pending_morale.entry(engagement.defender.clone()).or_default() += morale.defender;

            self.results.combats.push(report);
        }
        self.engagements = engagements;
        Ok(())
    }

    fn phase_casualties(&mut self) {
        let pending = std::mem::take(&mut self.pending_casualties);
        for (unit_ref, losses) in pending {
            let Some(unit) = self.state.unit_mut(&unit_ref) else {
                continue;
            };
            let taken = losses.min(unit.current_strength);
            unit.current_strength -= taken;
            *self.results.total_casualties.get_mut(unit_ref.side) += taken;
            self.results.casualties.push(CasualtyRecord {
                unit: unit_ref,
                losses: taken,
                remaining: unit.current_strength,
            });
        }

        for side in Side::all() {
            for unit_id in self.state.army_mut(side).remove_destroyed() {
                info!(side = %side, unit = %unit_id, "Unit destroyed");
                self.results.destroyed.push(UnitRef::new(side, unit_id));
            }
        }
    }

    fn phase_morale(&mut self) {
        let deltas = std::mem::take(&mut self.pending_morale);
        for (unit_ref, delta) in deltas {
            if let Some(unit) = self.state.unit_mut(&unit_ref) {
                apply_morale_delta(unit, delta);
            }
        }
        self.results.morale_events = evaluate_morale(&mut self.state.armies, &self.rules.morale);
    }

    fn phase_capture<R: Rng>(
        &mut self,
        choices: &SidePair<Option<CaptureChoice>>,
        resolver: &dyn CaptureResolver,
        rng: &mut R,
    ) {
        for side in Side::all() {
            let Some(commander) = self.state.commanders.get_mut(side).as_mut() else {
                continue;
            };
            let own = self.state.armies.get(side);

            if commander.status == CommanderStatus::AtRisk {
                if let Some(choice) = *choices.get(side) {
                    let event = resolve_capture(commander, side, choice, resolver, own, rng);
                    self.results.commander_events.push(event);
                }
                continue;
            }

            let enemies = self.state.armies.get(side.opponent());
            if commander.status == CommanderStatus::Active
                && evaluate_capture_risk(commander, own, enemies, &self.rules.commander)
            {
                commander.status = CommanderStatus::AtRisk;
                warn!(side = %side, position = %commander.position, "Commander at risk of capture");
                self.results.commander_events.push(CommanderEvent::AtRisk {
                    side,
                    position: commander.position,
                });
            }
        }
    }

    fn phase_position_diff(&mut self, before: &BattleState) {
        let start = before.positions();
        let end = self.state.positions();
        self.results.position_changes = end
            .into_iter()
            .filter_map(|(unit, to)| match start.get(&unit) {
                Some(from) if *from != to => Some(PositionChange { unit, from: *from, to }),
                _ => None,
            })
            .collect();
    }

    fn narrative_request(
        &self,
        record: &BattleRecord,
        victory: &VictoryResult,
    ) -> NarrativeRequest {
        NarrativeRequest {
            battle_id: record.id,
            turn: self.turn,
            weather: self.state.weather,
            terrain: self.state.terrain,
            movements: self.results.movements.movements.clone(),
            combats: self.results.combats.clone(),
            casualties: self.results.casualties.clone(),
            total_casualties: self.results.total_casualties.clone(),
            destroyed: self.results.destroyed.clone(),
            morale_events: self.results.morale_events.clone(),
            commander_events: self.results.commander_events.clone(),
            position_changes: self.results.position_changes.clone(),
            victory: victory.clone(),
        }
    }
}

impl TurnResults {
    /// Per-unit failures that did not stop the turn
    pub fn failures(&self) -> &[UnitFailure] {
        &self.movements.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::commander::Commander;
    use crate::battle::grid::GridCoord;
    use crate::battle::mission::Mission;
    use crate::battle::unit_type::UnitType;
    use crate::battle::units::{Army, Unit};
    use crate::combat::culture::Culture;
    use crate::combat::environment::EnvironmentalEffect;
    use crate::core::types::{BattleId, PlayerId};
    use crate::orders::interpreter::StructuredOrderInterpreter;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn c(text: &str) -> GridCoord {
        GridCoord::parse(text).unwrap()
    }

    fn resolver() -> TurnResolver<StructuredOrderInterpreter, TemplateNarrator> {
        TurnResolver::new(RulesConfig::default(), StructuredOrderInterpreter, TemplateNarrator)
    }

    fn record(p1: Vec<Unit>, p2: Vec<Unit>) -> BattleRecord {
        let state = BattleState::new(
            Army::new(PlayerId::new("p1"), Culture::Roman, p1),
            Army::new(PlayerId::new("p2"), Culture::Celtic, p2),
        );
        BattleRecord::new(PlayerId::new("p1"), PlayerId::new("p2"), 20, state)
    }

    async fn run(request: &TurnRequest, seed: u64) -> TurnOutcome {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        resolver().resolve_turn(request, &mut rng).await
    }

    #[tokio::test]
    async fn test_quiet_turn_advances_counter() {
        let request = TurnRequest::new(
            record(
                vec![Unit::new("a", UnitType::Infantry, c("B2"), 100)],
                vec![Unit::new("b", UnitType::Infantry, c("S19"), 100)],
            ),
            MapDescriptor::open_field(),
        );
        let outcome = run(&request, 1).await;
        let success = outcome.success().unwrap();
        assert_eq!(success.new_battle_state.current_turn, 2);
        assert!(success.turn_results.combats.is_empty());
        assert!(!success.victory.achieved);
        assert!(success.narrative.starts_with("Turn 1"));
    }

    #[tokio::test]
    async fn test_validation_gate_is_atomic() {
        let request = TurnRequest::new(
            record(
                vec![Unit::new("a", UnitType::Infantry, c("B2"), 100)],
                vec![Unit::new("b", UnitType::Infantry, c("S19"), 100)],
            ),
            MapDescriptor::open_field(),
        )
        .with_orders(
            Side::Player1,
            r#"[
                {"type":"move","unitId":"a","targetPosition":"B3"},
                {"type":"move","unitId":"ghost","targetPosition":"B4"}
            ]"#,
        );

        let outcome = run(&request, 1).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.phase, FailurePhase::ValidationFailed);
        let errors = failure.validation_errors.as_ref().unwrap();
        assert_eq!(errors.player1.len(), 1);
        assert_eq!(errors.player1[0].action_index, 1);
        assert!(errors.player2.is_empty());

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["phase"], "validation_failed");
    }

    #[tokio::test]
    async fn test_unparseable_orders_fail_hard() {
        let request = TurnRequest::new(
            record(vec![Unit::new("a", UnitType::Infantry, c("B2"), 100)], vec![]),
            MapDescriptor::open_field(),
        )
        .with_orders(Side::Player2, "charge!");
        let outcome = run(&request, 1).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.phase, FailurePhase::Failed);
        assert_eq!(failure.error_code.as_deref(), Some("interpreter"));
    }

    #[tokio::test]
    async fn test_combat_fault_fails_turn_and_leaves_state() {
        let mut rules = RulesConfig::default();
        rules.tables.environmental_effects = vec![EnvironmentalEffect {
            name: "scorched_field".to_string(),
            weather: None,
            terrain: None,
            multiplier: 0.0,
            ranged_only: false,
        }];
        let request = TurnRequest::new(
            record(
                vec![Unit::new("a", UnitType::Infantry, c("J9"), 100)],
                vec![Unit::new("x", UnitType::Infantry, c("J10"), 100)],
            ),
            MapDescriptor::open_field(),
        );
        let before = request.battle_record.battle_state.clone();

        let resolver = TurnResolver::new(rules, StructuredOrderInterpreter, TemplateNarrator);
        let outcome = resolver
            .resolve_turn(&request, &mut ChaCha8Rng::seed_from_u64(4))
            .await;

        let failure = outcome.failure().unwrap();
        assert_eq!(failure.phase, FailurePhase::Failed);
        assert_eq!(failure.error_code.as_deref(), Some("combat_resolution_failure"));
        assert!(failure.validation_errors.is_none());
        assert_eq!(request.battle_record.battle_state, before);
    }

    #[tokio::test]
    async fn test_long_march_creates_mission_then_continues() {
        let request = TurnRequest::new(
            record(
                vec![Unit::new("a", UnitType::Infantry, c("A1"), 100)],
                vec![Unit::new("b", UnitType::Infantry, c("T1"), 100)],
            ),
            MapDescriptor::open_field(),
        )
        .with_orders(Side::Player1, r#"[{"type":"move","unitId":"a","targetPosition":"T20"}]"#);

        let first = run(&request, 3).await;
        let state = &first.success().unwrap().new_battle_state;
        let unit = &state.army(Side::Player1).units[0];
        assert_ne!(unit.position, c("T20"));
        let mission = unit.active_mission.as_ref().unwrap();
        assert!(mission.is_active());
        assert_eq!(mission.target, c("T20"));

        // No orders next turn: the mission carries the unit on
        let mut next = request.clone();
        next.battle_record.battle_state = state.clone();
        next.battle_record.current_turn = 2;
        next.player1_order_text.clear();
        let second = run(&next, 4).await;
        let results = &second.success().unwrap().turn_results;
        assert_eq!(results.movements.movements.len(), 1);
        assert!(!results.movements.movements[0].mission_created);
        let step = &results.movements.movements[0];
        assert!(step.from.distance(&c("T20")) > step.to.distance(&c("T20")));
    }

    #[tokio::test]
    async fn test_hold_with_enemy_in_sight_keeps_mission() {
        let mut marcher = Unit::new("a", UnitType::Infantry, c("E5"), 100);
        marcher.active_mission = Some(Mission::new(MissionType::Move, c("E1"), c("E15"), 1));
        let request = TurnRequest::new(
            record(vec![marcher], vec![Unit::new("b", UnitType::Infantry, c("E9"), 100)]),
            MapDescriptor::open_field(),
        )
        .with_orders(Side::Player1, r#"[{"type":"hold","unitId":"a"}]"#);

        let outcome = run(&request, 1).await;
        let success = outcome.success().unwrap();
        assert_eq!(success.turn_results.mission_interruptions.player1.len(), 1);
        let unit = &success.new_battle_state.army(Side::Player1).units[0];
        assert_eq!(unit.position, c("E5"));
        assert!(unit.active_mission.as_ref().unwrap().is_active());
    }

    #[tokio::test]
    async fn test_adjacent_units_fight_once() {
        let request = TurnRequest::new(
            record(
                vec![Unit::new("a", UnitType::Infantry, c("E5"), 100)],
                vec![Unit::new("b", UnitType::Infantry, c("E6"), 100)],
            ),
            MapDescriptor::open_field(),
        );
        let outcome = run(&request, 9).await;
        let success = outcome.success().unwrap();
        assert_eq!(success.turn_results.combats.len(), 1);
        let losses: u32 = success.turn_results.casualties.iter().map(|c| c.losses).sum();
        let totals = &success.turn_results.total_casualties;
        assert_eq!(losses, totals.player1 + totals.player2);
        for side in Side::all() {
            for unit in &success.new_battle_state.army(side).units {
                assert!(unit.current_strength <= 100);
            }
        }
        // The input record is untouched
        let original = request.battle_record.battle_state.army(Side::Player1);
        assert_eq!(original.units[0].current_strength, 100);
    }

    #[tokio::test]
    async fn test_commander_detach_is_rejected_without_change() {
        let mut rec = record(
            vec![Unit::new("a", UnitType::Infantry, c("B2"), 100)],
            vec![Unit::new("b", UnitType::Infantry, c("S19"), 100)],
        );
        let unit = rec.battle_state.army(Side::Player1).units[0].clone();
        *rec.battle_state.commanders.get_mut(Side::Player1) =
            Some(Commander::new(BattleId::new(), PlayerId::new("p1"), Culture::Roman, &unit));

        let request = TurnRequest::new(rec, MapDescriptor::open_field())
            .with_orders(Side::Player1, r#"[{"type":"commander","command":"detach"}]"#);
        let outcome = run(&request, 1).await;
        let success = outcome.success().unwrap();
        assert!(matches!(
            success.turn_results.commander_events[0],
            CommanderEvent::OrderRejected { .. }
        ));
        let commander = success.new_battle_state.commanders.player1.as_ref().unwrap();
        assert_eq!(commander.attached_unit_id, UnitId::new("a"));
    }
}
