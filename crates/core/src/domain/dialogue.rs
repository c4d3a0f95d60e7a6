//! Serializable dialogue snapshot, checkpointed after every stage transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::session::{Language, SessionId};
use crate::domain::slots::Slots;
use crate::domain::tool::{ToolCall, ToolName};
use crate::domain::transcript::Message;
use crate::errors::DomainError;
use crate::flows::states::DialogueStage;

/// A sensitive tool call captured once per confirmation cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCall {
    pub call_id: String,
    pub call: ToolCall,
}

impl PendingCall {
    pub fn new(call_id: impl Into<String>, call: ToolCall) -> Self {
        Self { call_id: call_id.into(), call }
    }

    pub fn tool_name(&self) -> ToolName {
        self.call.name()
    }

    pub fn args(&self) -> Value {
        self.call.args()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueState {
    pub session_id: SessionId,
    pub language: Language,
    pub transcript: Vec<Message>,
    pub slots: Slots,
    pub completed: bool,
    pub pending_confirmation: Option<PendingCall>,
    pub stage: DialogueStage,
    pub updated_at: DateTime<Utc>,
}

impl DialogueState {
    pub fn new(session_id: SessionId, language: Language) -> Self {
        Self {
            session_id,
            language,
            transcript: Vec::new(),
            slots: Slots::default(),
            completed: false,
            pending_confirmation: None,
            stage: DialogueStage::default(),
            updated_at: Utc::now(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.transcript.push(message);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Queues a call for approval. At most one call may be pending per session.
    pub fn suspend_for_confirmation(&mut self, pending: PendingCall) -> Result<(), DomainError> {
        if let Some(existing) = &self.pending_confirmation {
            return Err(DomainError::InvariantViolation(format!(
                "tool call `{}` is already awaiting confirmation",
                existing.call_id
            )));
        }
        self.pending_confirmation = Some(pending);
        self.touch();
        Ok(())
    }

    pub fn take_pending(&mut self) -> Option<PendingCall> {
        let pending = self.pending_confirmation.take();
        if pending.is_some() {
            self.touch();
        }
        pending
    }

    pub fn is_awaiting_confirmation(&self) -> bool {
        self.pending_confirmation.is_some()
    }

    /// Position of the most recent completion-signal request in the transcript.
    pub fn last_completion_request(&self) -> Option<usize> {
        self.transcript.iter().rposition(|message| {
            matches!(
                message,
                Message::ToolRequest { name, .. } if name == ToolName::SlotFilling.as_str()
            )
        })
    }
}
