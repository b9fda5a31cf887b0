//! Combat resolution - force ratios, modifiers and casualties

pub mod accumulation;
pub mod adapter;
pub mod culture;
pub mod effectiveness;
pub mod environment;
pub mod formation;
pub mod resolution;
pub mod weapons;

pub use accumulation::DamageAccumulation;
pub use adapter::{CombatAdapter, CombatReport, SupportOrder};
pub use culture::Culture;
pub use environment::Weather;
pub use resolution::{resolve_combat, CombatOutcome, CombatResult};
