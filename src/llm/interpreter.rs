//! Natural language orders through an LLM
//!
//! The LLM only translates text into actions. Everything it returns still
//! goes through normalization and the validation gate.

use std::future::Future;

use serde_json::Value;
use tracing::debug;

use crate::battle::battle_map::MapDescriptor;
use crate::battle::state::BattleState;
use crate::core::error::{BattleError, Result};
use crate::core::types::Side;
use crate::llm::client::LlmClient;
use crate::llm::context::BattleContext;
use crate::orders::interpreter::{raw_actions, InterpretedOrders, OrderInterpreter};

pub struct LlmOrderInterpreter {
    client: LlmClient,
}

impl LlmOrderInterpreter {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

impl OrderInterpreter for LlmOrderInterpreter {
    fn interpret(
        &self,
        text: &str,
        state: &BattleState,
        side: Side,
        map: &MapDescriptor,
    ) -> impl Future<Output = Result<InterpretedOrders>> + Send {
        let orders = text.trim().to_string();
        let user_prompt = format!(
            "BATTLE:\n{}\nORDERS:\n{}\n\nTranslate these orders into JSON actions:",
            BattleContext::from_state(state, side, map).summary(),
            orders
        );

        async move {
            if orders.is_empty() {
                return Ok(InterpretedOrders::default());
            }
            let system = ORDERS_SYSTEM_PROMPT.trim_start();
            let response = self.client.complete(system, &user_prompt).await?;
            let interpreted = parse_reply(&response)?;
            debug!(count = interpreted.validated_actions.len(), "Orders interpreted");
            Ok(interpreted)
        }
    }
}

/// Read the action list out of an LLM reply
pub fn parse_reply(response: &str) -> Result<InterpretedOrders> {
    let json = extract_json(response)?;
    let mut document: Value = serde_json::from_str(json).map_err(|e| {
        BattleError::Interpreter(format!(
            "Failed to parse actions: {} - Response: {}",
            e, response
        ))
    })?;

    let errors = match document.as_object_mut().and_then(|o| o.remove("errors")) {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(InterpretedOrders {
        validated_actions: raw_actions(document)?,
        errors,
        mission_interruptions: Vec::new(),
    })
}

/// Extract the JSON array or object from an LLM reply (handles surrounding text)
fn extract_json(response: &str) -> Result<&str> {
    let start = response
        .find(['[', '{'])
        .ok_or_else(|| BattleError::Interpreter("No JSON found in response".into()))?;
    let close = if response[start..].starts_with('[') { ']' } else { '}' };
    let end = response
        .rfind(close)
        .filter(|end| *end > start)
        .ok_or_else(|| {
            BattleError::Interpreter(format!("No closing {} found in response", close))
        })?;
    Ok(&response[start..=end])
}

const ORDERS_SYSTEM_PROMPT: &str = r#"
You translate a general's orders for a tactical battle on a 20x20 grid.
Columns are letters A-T, rows are numbers 1-20; a tile is written like "J11".
Only use unit ids listed under YOUR UNITS.

AVAILABLE ACTIONS:
- move: {"type":"move","unitId":"...","targetPosition":"J11"}
- formation: {"type":"formation","unitId":"...","formationType":"..."}
  formation types: line, column, wedge, phalanx, testudo, skirmish, square
- attack: {"type":"attack","unitId":"...","targetUnitId":"..."} or with "targetPosition"
- support_fire: {"type":"support_fire","unitId":"...","supporting":"friendly id"}
  or with "targetUnitId"
- hold: {"type":"hold","unitId":"..."}
- conditional: {"type":"conditional","condition":{...},"ifTrue":[...],"ifFalse":[...]}
  example condition: {"kind":"enemy_within","unitId":"...","distance":3}
  condition kinds: enemy_within{unitId,distance}, strength_below{unitId,ratio},
  enemy_at{position}, turn_at_least{turn}
- commander: {"type":"commander","command":"reattach","unitId":"..."}

OUTPUT FORMAT (JSON only, no explanation):
{"actions": [ ... ], "errors": ["orders you could not translate"]}

Examples:
"legio advance to J11" ->
{"actions":[{"type":"move","unitId":"legio","targetPosition":"J11"}],"errors":[]}
"archers cover the legion" ->
{"actions":[{"type":"support_fire","unitId":"archers","supporting":"legio"}],"errors":[]}
"#;
