//! Orders: the action union, interpreters and the validation gate

pub mod actions;
pub mod interpreter;
pub mod validation;

pub use actions::{normalize_action, Action, CommanderCommand, Condition};
pub use interpreter::{
    InterpretedOrders, MissionInterruption, OrderInterpreter, StructuredOrderInterpreter,
};
pub use validation::{resolve_conditionals, validate_actions};
