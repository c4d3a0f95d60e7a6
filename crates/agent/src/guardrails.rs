use salesbot_core::config::DialogueConfig;
use salesbot_core::domain::tool::ToolName;

pub const CONFIRMATION_PROMPT: &str =
    "Do you approve of the above actions? Type 'yes' to continue; otherwise, explain the requested change.";

/// Tool result recorded for a denied call, so the model can adapt to the user's objection.
pub fn denial_message(reason: &str) -> String {
    format!(
        "API call denied by user. Reasoning: '{reason}'. Continue assisting, accounting for the user's input."
    )
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub confirm_read_only_tools: bool,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self { confirm_read_only_tools: true }
    }
}

impl ConfirmationPolicy {
    pub fn from_config(config: &DialogueConfig) -> Self {
        Self { confirm_read_only_tools: config.confirm_read_only_tools }
    }

    /// Slot writers always need approval. The completion signal never reaches the gate.
    pub fn requires_confirmation(&self, tool: ToolName) -> bool {
        if tool.is_completion_signal() {
            false
        } else if tool.is_read_only() {
            self.confirm_read_only_tools
        } else {
            true
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmationDecision {
    Approved,
    Denied { reason: String },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ConfirmationGate;

impl ConfirmationGate {
    /// Only a literal "yes" (any case, surrounding whitespace ignored) approves. Anything
    /// else is a denial whose reason is the raw input.
    pub fn resolve(&self, input: &str) -> ConfirmationDecision {
        if input.trim().to_lowercase() == "yes" {
            ConfirmationDecision::Approved
        } else {
            ConfirmationDecision::Denied { reason: input.to_string() }
        }
    }
}
