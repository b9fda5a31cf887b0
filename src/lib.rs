//! Grid Tactics - turn resolution for two-sided grid battles

pub mod battle;
pub mod combat;
pub mod core;
pub mod llm;
pub mod orders;
