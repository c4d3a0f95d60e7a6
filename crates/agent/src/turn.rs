use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use salesbot_core::domain::session::{Language, SessionId};
use salesbot_core::domain::slots::Slots;
use salesbot_core::domain::tool::{ToolArgsError, ToolCall, ToolName};
use salesbot_core::domain::transcript::Message;
use salesbot_core::errors::ApplicationError;

use crate::llm::{LlmClient, ModelRequest, ModelToolCall};
use crate::prompts::PromptLibrary;
use crate::tools::ToolRegistry;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnContext {
    pub session_id: Option<SessionId>,
    pub language: Language,
}

impl TurnContext {
    pub fn new(session_id: Option<SessionId>, language: Language) -> Self {
        Self { session_id, language }
    }
}

/// Classification of one agent model response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnResult {
    PlainReply(String),
    ToolCallRequest { call_id: String, call: ToolCall },
    CompletionSignal { call_id: String, requirements: Slots },
    InvalidToolCall { call_id: String, name: String, error: ToolArgsError },
}

/// Runs one agent step: persona prompt over the transcript with every tool bound.
pub struct TurnExecutor {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    registry: ToolRegistry,
}

impl TurnExecutor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
        registry: ToolRegistry,
    ) -> Self {
        Self { llm, prompts, registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Appends the model's reply to `transcript` and classifies it. Nothing is appended
    /// when the backend fails.
    pub async fn execute(
        &self,
        context: &TurnContext,
        transcript: &mut Vec<Message>,
        slots: &Slots,
    ) -> Result<TurnResult, ApplicationError> {
        let Some(session_id) = context.session_id.as_ref() else {
            return Err(ApplicationError::Configuration(
                "no session is bound to this conversation".to_string(),
            ));
        };

        let system = self
            .prompts
            .persona(slots, context.language, Utc::now())
            .map_err(|error| ApplicationError::Configuration(format!("{error:#}")))?;
        let request = ModelRequest::new(system)
            .with_messages(transcript.clone())
            .with_tools(self.registry.schemas().to_vec());

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|error| ApplicationError::Backend(format!("{error:#}")))?;

        let text = response.text.filter(|text| !text.trim().is_empty());
        if let Some(text) = &text {
            transcript.push(Message::assistant(text.clone()));
        }

        let Some(selected) = select_tool_call(session_id, response.tool_calls) else {
            return Ok(TurnResult::PlainReply(text.unwrap_or_default()));
        };

        let call_id = if selected.id.trim().is_empty() {
            format!("call_{}", Uuid::new_v4().simple())
        } else {
            selected.id
        };
        transcript.push(Message::tool_request(
            call_id.clone(),
            selected.name.clone(),
            selected.args.clone(),
        ));

        debug!(
            event_name = "dialogue.turn.tool_call",
            session_id = %session_id,
            tool = %selected.name,
            call_id = %call_id,
            "model requested a tool"
        );

        // The completion signal is recognized by name; its arguments cannot reject it.
        let result = match ToolCall::parse(&selected.name, &selected.args) {
            Ok(ToolCall::SlotFilling { requirements }) => {
                TurnResult::CompletionSignal { call_id, requirements }
            }
            Ok(call) => TurnResult::ToolCallRequest { call_id, call },
            Err(error) => TurnResult::InvalidToolCall { call_id, name: selected.name, error },
        };
        Ok(result)
    }
}

/// One call per step: the completion signal wins, otherwise the first call.
fn select_tool_call(session_id: &SessionId, calls: Vec<ModelToolCall>) -> Option<ModelToolCall> {
    if calls.len() > 1 {
        warn!(
            event_name = "dialogue.turn.extra_tool_calls_dropped",
            session_id = %session_id,
            requested = calls.len(),
            "model requested several tools at once; only one is processed"
        );
    }

    let completion = calls.iter().position(|call| call.name == ToolName::SlotFilling.as_str());
    let index = completion.unwrap_or(0);
    calls.into_iter().nth(index)
}
