//! Battle system - one turn of a grid battle, phase by phase
//!
//! The board is a fixed 20x20 grid. Each turn both sides' orders are
//! gated, then movement, contact, vision, combat, casualties, morale and
//! victory are resolved in strict order on a copy of the state.

pub mod battle_map;
pub mod commander;
pub mod constants;
pub mod engagement;
pub mod execution;
pub mod formation_change;
pub mod grid;
pub mod mission;
pub mod morale;
pub mod movement;
pub mod narrative;
pub mod pathfinding;
pub mod positional;
pub mod state;
pub mod terrain;
pub mod unit_type;
pub mod units;
pub mod victory;
pub mod visibility;

// Re-exports for convenient access
pub use battle_map::{MapDescriptor, Objective, TerrainCombatModifier};
pub use commander::{
    CaptureChoice, CaptureResolver, Commander, CommanderEvent, CommanderStatus, DiceCaptureResolver,
};
pub use constants::*;
pub use engagement::{detect_engagements, Engagement, EngagementKind};
pub use execution::{
    FailurePhase, TurnFailure, TurnOutcome, TurnRequest, TurnResolver, TurnResults, TurnSuccess,
};
pub use formation_change::{request_formation_change, FormationChangeOutcome};
pub use grid::{adjacent_coordinates, parse_coordinate, GridCoord};
pub use mission::{Mission, MissionStatus, MissionType};
pub use morale::{check_morale_break, evaluate_morale, MoraleEvent};
pub use movement::{execute_movement_phase, MoveOrder, MovementRecord, MovementReport};
pub use narrative::{NarrativeGenerator, NarrativeRequest, TemplateNarrator};
pub use pathfinding::{find_path, path_cost, Path};
pub use positional::PositionalModifiers;
pub use state::{BattleRecord, BattleState};
pub use terrain::Terrain;
pub use unit_type::{UnitProperties, UnitType};
pub use units::{Army, Formation, QualityType, Training, Unit};
pub use victory::{check_victory_conditions, VictoryReason, VictoryResult, Winner};
pub use visibility::{FogOfWar, IntelMemory, RangeFogOfWar, VisibilityReport};
