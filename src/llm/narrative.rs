//! Battle prose through an LLM

use std::future::Future;

use crate::battle::narrative::{NarrativeGenerator, NarrativeRequest, TemplateNarrator};
use crate::core::error::{BattleError, Result};
use crate::llm::client::LlmClient;

pub struct LlmNarrator {
    client: LlmClient,
}

impl LlmNarrator {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

impl NarrativeGenerator for LlmNarrator {
    fn generate(&self, request: &NarrativeRequest) -> impl Future<Output = Result<String>> + Send {
        let user_prompt = serde_json::to_string_pretty(request).map(|events| {
            format!(
                "TURN EVENTS (JSON):\n{}\n\nPLAIN SUMMARY:\n{}\n\n\
                 Write the chronicle of this turn:",
                events,
                TemplateNarrator::render(request)
            )
        });

        async move {
            let response = self.client.complete(NARRATIVE_SYSTEM_PROMPT, &user_prompt?).await?;
            let text = response.trim();
            if text.is_empty() {
                return Err(BattleError::Narrative("empty narrative".into()));
            }
            Ok(text.to_string())
        }
    }
}

const NARRATIVE_SYSTEM_PROMPT: &str = r#"You are the chronicler of an ancient battle.
Given one turn's events, write two or three short paragraphs of vivid but
accurate prose. Never invent units, positions or losses that are not in
the events. Refer to units by their ids. Do not predict the future."#;
