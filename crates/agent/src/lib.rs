//! Dialogue orchestration for the notebook sales assistant.
//!
//! A turn runs the agent model over the transcript with the slot tools bound, routes the
//! requested tool through the confirmation gate, executes approved slot writes, and once
//! the model signals that every slot is known, announces and generates the
//! recommendation.
//!
//! - `runtime` - `DialogueRuntime`, the per-session turn driver
//! - `turn` - one agent step and the classification of its response
//! - `guardrails` - confirmation policy and gate
//! - `tools` - tool schemas and pure execution
//! - `recommendation` - final recommendation call
//! - `llm` / `openai` - model backend boundary and its OpenAI-compatible client
//!
//! The model never writes state directly: every slot write passes the confirmation gate,
//! and the completion signal is never executed as a tool.

pub mod guardrails;
pub mod llm;
pub mod openai;
pub mod prompts;
pub mod recommendation;
pub mod runtime;
pub mod tools;
pub mod turn;

pub use guardrails::{ConfirmationDecision, ConfirmationGate, ConfirmationPolicy};
pub use llm::{LlmClient, ModelRequest, ModelResponse, ModelToolCall, ScriptedLlmClient, ToolSchema};
pub use openai::OpenAiChatClient;
pub use runtime::{DialogueRuntime, RuntimeSettings, TracingAuditSink, TurnEvent, TurnOutcome};
pub use turn::{TurnContext, TurnExecutor, TurnResult};
