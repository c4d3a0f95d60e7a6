use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use salesbot_core::domain::transcript::Message;

/// Function schema bound to an agent model call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
}

impl ModelRequest {
    pub fn new(system: impl Into<String>) -> Self {
        Self { system: Some(system.into()), ..Self::default() }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ModelToolCall>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), tool_calls: Vec::new() }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            text: None,
            tool_calls: vec![ModelToolCall { id: id.into(), name: name.into(), args }],
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_tool_call(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        args: Value,
    ) -> Self {
        self.tool_calls.push(ModelToolCall { id: id.into(), name: name.into(), args });
        self
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse>;
}

/// Replays queued responses in order and records every request it receives.
#[derive(Default)]
pub struct ScriptedLlmClient {
    responses: Mutex<VecDeque<Result<ModelResponse, String>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedLlmClient {
    pub fn new(responses: impl IntoIterator<Item = ModelResponse>) -> Self {
        let client = Self::default();
        for response in responses {
            client.push_response(response);
        }
        client
    }

    pub fn push_response(&self, response: ModelResponse) {
        match self.responses.lock() {
            Ok(mut queue) => queue.push_back(Ok(response)),
            Err(poisoned) => poisoned.into_inner().push_back(Ok(response)),
        }
    }

    /// Queues a backend failure; the matching `complete` call returns it as an error.
    pub fn push_failure(&self, message: impl Into<String>) {
        let failure = Err(message.into());
        match self.responses.lock() {
            Ok(mut queue) => queue.push_back(failure),
            Err(poisoned) => poisoned.into_inner().push_back(failure),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests().len()
    }

    pub fn remaining(&self) -> usize {
        match self.responses.lock() {
            Ok(queue) => queue.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse> {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }

        let next = match self.responses.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };

        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted backend has no queued response")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{LlmClient, ModelRequest, ModelResponse, ScriptedLlmClient};
    use salesbot_core::domain::transcript::Message;

    #[tokio::test]
    async fn scripted_client_replays_in_order_and_records_requests() {
        let client = ScriptedLlmClient::new([
            ModelResponse::text("Olá!"),
            ModelResponse::tool_call("call-1", "inform_name", json!({"client_name": "Ana"})),
        ]);

        let first = client
            .complete(ModelRequest::new("persona").with_messages(vec![Message::user("oi")]))
            .await
            .expect("first");
        assert_eq!(first.text.as_deref(), Some("Olá!"));

        let second = client.complete(ModelRequest::new("persona")).await.expect("second");
        assert_eq!(second.tool_calls[0].name, "inform_name");

        assert_eq!(client.request_count(), 2);
        assert_eq!(client.requests()[0].messages, vec![Message::user("oi")]);
        assert_eq!(client.remaining(), 0);
    }

    #[tokio::test]
    async fn exhausted_or_failing_script_is_an_error() {
        let client = ScriptedLlmClient::default();
        client.push_failure("connection reset by peer");

        let failure = client.complete(ModelRequest::default()).await.expect_err("failure");
        assert!(failure.to_string().contains("connection reset"));

        let exhausted = client.complete(ModelRequest::default()).await.expect_err("exhausted");
        assert!(exhausted.to_string().contains("no queued response"));
    }
}
