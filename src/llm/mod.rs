//! LLM-backed collaborators: order interpretation and narrative

pub mod client;
pub mod context;
pub mod interpreter;
pub mod narrative;

pub use client::{ApiFormat, LlmClient, LlmConfig};
pub use interpreter::LlmOrderInterpreter;
pub use narrative::LlmNarrator;
