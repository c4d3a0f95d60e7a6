use std::sync::Arc;

use salesbot_core::domain::dialogue::DialogueState;
use salesbot_core::domain::slots::Slots;
use salesbot_core::domain::transcript::Message;
use salesbot_core::errors::ApplicationError;

use crate::llm::{LlmClient, ModelRequest};
use crate::prompts::PromptLibrary;

pub struct RecommendationGenerator {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
}

impl RecommendationGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLibrary>) -> Self {
        Self { llm, prompts }
    }

    /// One model call without tools; the reply is returned, not appended.
    pub async fn generate(
        &self,
        state: &DialogueState,
        requirements: Option<&Slots>,
    ) -> Result<String, ApplicationError> {
        let system = self
            .prompts
            .recommendation(&state.slots, requirements, state.language)
            .map_err(|error| ApplicationError::Configuration(format!("{error:#}")))?;
        let request = ModelRequest::new(system).with_messages(dialogue_since_completion(state));

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|error| ApplicationError::Backend(format!("{error:#}")))?;
        Ok(response.text.unwrap_or_default())
    }
}

/// User and assistant messages after the latest completion request. Tool traffic is
/// dropped; with no completion request there is no history to pass.
pub fn dialogue_since_completion(state: &DialogueState) -> Vec<Message> {
    let Some(position) = state.last_completion_request() else {
        return Vec::new();
    };
    state.transcript[position + 1..]
        .iter()
        .filter(|message| message.is_dialogue_turn())
        .cloned()
        .collect()
}
