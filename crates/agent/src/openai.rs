//! OpenAI-compatible chat completions backend (also serves Ollama's `/v1` endpoint).

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use salesbot_core::config::LlmConfig;
use salesbot_core::domain::transcript::Message;

use crate::llm::{LlmClient, ModelRequest, ModelResponse, ModelToolCall, ToolSchema};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDef<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ToolDef<'a> {
    #[serde(rename = "type")]
    typ: &'static str,
    function: FunctionDef<'a>,
}

#[derive(Debug, Serialize)]
struct FunctionDef<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCallOut>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct ToolCallOut {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    typ: String,
    function: FunctionCall,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallOut>>,
}

pub struct OpenAiChatClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: Option<SecretString>,
}

impl OpenAiChatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client for the model backend")?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.effective_base_url()),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse> {
        let tools = (!request.tools.is_empty()).then(|| encode_tools(&request.tools));
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: encode_messages(request.system.as_deref(), &request.messages),
            temperature: self.temperature,
            tool_choice: tools.as_ref().map(|_| "auto"),
            tools,
        };

        debug!(
            event_name = "llm.request",
            model = %self.model,
            message_count = body.messages.len(),
            tool_count = request.tools.len(),
            "sending chat completion"
        );

        let mut http = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key.expose_secret());
        }

        let response = http.send().await.context("model backend request failed")?;
        let status = response.status();
        let text = response.text().await.context("failed to read model backend response")?;
        if !status.is_success() {
            return Err(anyhow!("model backend returned {status}: {text}"));
        }

        decode_response(&text)
    }
}

fn encode_tools(tools: &[ToolSchema]) -> Vec<ToolDef<'_>> {
    tools
        .iter()
        .map(|tool| ToolDef {
            typ: "function",
            function: FunctionDef {
                name: &tool.name,
                description: &tool.description,
                parameters: &tool.parameters,
            },
        })
        .collect()
}

/// Chat-completions requires each tool result to follow its request directly. The
/// transcript may hold other messages in between (the confirmation prompt), so results
/// are moved next to their request here. Requests that never got a result are omitted.
fn encode_messages(system: Option<&str>, messages: &[Message]) -> Vec<ChatMessage> {
    let results = pair_tool_results(messages);

    let mut encoded = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = system {
        encoded.push(ChatMessage::text("system", system));
    }

    for (message, result) in messages.iter().zip(results) {
        match message {
            Message::User { text } => encoded.push(ChatMessage::text("user", text)),
            Message::Assistant { text } => encoded.push(ChatMessage::text("assistant", text)),
            Message::ToolRequest { call_id, name, args } => {
                let Some(content) = result else {
                    continue;
                };
                let arguments = match args {
                    Value::String(raw) => raw.clone(),
                    other => other.to_string(),
                };
                encoded.push(ChatMessage {
                    role: "assistant".to_string(),
                    content: None,
                    tool_calls: Some(vec![ToolCallOut {
                        id: call_id.clone(),
                        typ: function_type(),
                        function: FunctionCall { name: name.clone(), arguments },
                    }]),
                    tool_call_id: None,
                });
                encoded.push(ChatMessage {
                    role: "tool".to_string(),
                    content: Some(content.to_string()),
                    tool_calls: None,
                    tool_call_id: Some(call_id.clone()),
                });
            }
            Message::ToolResult { .. } => {}
        }
    }

    encoded
}

/// For each transcript position, the result answering the request there. A result answers
/// the earliest still-unanswered request with its call id, so reused ids stay paired.
fn pair_tool_results(messages: &[Message]) -> Vec<Option<&str>> {
    let mut answers = vec![None; messages.len()];
    let mut open: HashMap<&str, VecDeque<usize>> = HashMap::new();

    for (index, message) in messages.iter().enumerate() {
        match message {
            Message::ToolRequest { call_id, .. } => {
                open.entry(call_id.as_str()).or_default().push_back(index);
            }
            Message::ToolResult { call_id, content } => {
                if let Some(request) =
                    open.get_mut(call_id.as_str()).and_then(VecDeque::pop_front)
                {
                    answers[request] = Some(content.as_str());
                }
            }
            Message::User { .. } | Message::Assistant { .. } => {}
        }
    }
    answers
}

/// Arguments that are not valid JSON are kept as a raw string so the caller can reject
/// the call and tell the model.
fn decode_response(body: &str) -> Result<ModelResponse> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| anyhow!("model response parse error: {e}; body: {body}"))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("model response has no choices"))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            let raw = call.function.arguments;
            let args = if raw.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&raw).unwrap_or(Value::String(raw))
            };
            ModelToolCall { id: call.id, name: call.function.name, args }
        })
        .collect();

    Ok(ModelResponse { text: choice.message.content, tool_calls })
}
