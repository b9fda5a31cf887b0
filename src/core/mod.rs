pub mod config;
pub mod error;
pub mod types;

pub use config::{load_rules, ResolutionModel, RulesConfig};
pub use error::{ActionError, BattleError, Result, UnitFailure};
pub use types::{BattleId, PlayerId, Side, SidePair, Turn, UnitId, UnitRef};
