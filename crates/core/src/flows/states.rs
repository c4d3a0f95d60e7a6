use serde::{Deserialize, Serialize};

/// Named stages of the dialogue graph. `End` is both the resting stage between turns
/// and the initial stage of a fresh session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialogueStage {
    Agent,
    Tools,
    Finalize,
    Recommend,
    #[default]
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueEvent {
    UserInputReceived,
    PlainReplyReceived,
    ToolCallRequested,
    ReadOnlyToolRequested,
    InvalidToolCallReceived,
    CompletionSignalled,
    ConfirmationGranted,
    ConfirmationDenied,
    ToolExecuted,
    NoticeEmitted,
    RecommendationEmitted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowContext {
    pub pending_confirmation: bool,
}

impl FlowContext {
    pub fn with_pending(pending_confirmation: bool) -> Self {
        Self { pending_confirmation }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    InvokeModel,
    RequestConfirmation,
    ExecuteTool,
    RecordDenial,
    RejectToolCall,
    AnnounceRecommendation,
    GenerateRecommendation,
    MarkCompleted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: DialogueStage,
    pub to: DialogueStage,
    pub event: DialogueEvent,
    pub actions: Vec<FlowAction>,
}

impl TransitionOutcome {
    /// Whether the turn stops here and waits for the next external input.
    pub fn suspends_turn(&self) -> bool {
        self.to == DialogueStage::End || self.actions.contains(&FlowAction::RequestConfirmation)
    }
}
