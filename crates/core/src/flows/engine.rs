use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::flows::states::{
    DialogueEvent, DialogueStage, FlowAction, FlowContext, TransitionOutcome,
};

pub trait FlowDefinition {
    fn initial_stage(&self) -> DialogueStage;
    fn transition(
        &self,
        current: &DialogueStage,
        event: &DialogueEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Slot-filling interview: agent/tool loop until the completion signal, then the
/// recommendation tail.
#[derive(Clone, Debug, Default)]
pub struct SlotFillingFlow;

impl FlowDefinition for SlotFillingFlow {
    fn initial_stage(&self) -> DialogueStage {
        DialogueStage::End
    }

    fn transition(
        &self,
        current: &DialogueStage,
        event: &DialogueEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_slot_filling(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_stage(&self) -> DialogueStage {
        self.flow.initial_stage()
    }

    pub fn apply(
        &self,
        current: &DialogueStage,
        event: &DialogueEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &DialogueStage,
        event: &DialogueEvent,
        context: &FlowContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    audit
                        .event(
                            "flow.transition_applied",
                            AuditCategory::Flow,
                            AuditOutcome::Success,
                        )
                        .with_metadata("from", format!("{:?}", outcome.from))
                        .with_metadata("to", format!("{:?}", outcome.to))
                        .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    audit
                        .event(
                            "flow.transition_rejected",
                            AuditCategory::Flow,
                            AuditOutcome::Rejected,
                        )
                        .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for FlowEngine<SlotFillingFlow> {
    fn default() -> Self {
        Self::new(SlotFillingFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("no pending tool call to resolve in stage {stage:?} for event {event:?}")]
    MissingPendingCall { stage: DialogueStage, event: DialogueEvent },
    #[error("a tool call is already awaiting confirmation in stage {stage:?}")]
    PendingCallOutstanding { stage: DialogueStage },
    #[error("invalid transition from {stage:?} using event {event:?}")]
    InvalidTransition { stage: DialogueStage, event: DialogueEvent },
}

fn transition_slot_filling(
    current: &DialogueStage,
    event: &DialogueEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use DialogueEvent::{
        CompletionSignalled, ConfirmationDenied, ConfirmationGranted, InvalidToolCallReceived,
        NoticeEmitted, PlainReplyReceived, ReadOnlyToolRequested, RecommendationEmitted,
        ToolCallRequested, ToolExecuted, UserInputReceived,
    };
    use DialogueStage::{Agent, End, Finalize, Recommend, Tools};
    use FlowAction::{
        AnnounceRecommendation, ExecuteTool, GenerateRecommendation, InvokeModel, MarkCompleted,
        RecordDenial, RejectToolCall, RequestConfirmation,
    };

    let (to, actions) = match (current, event) {
        (Tools, ConfirmationGranted) | (Tools, ConfirmationDenied)
            if !context.pending_confirmation =>
        {
            return Err(FlowTransitionError::MissingPendingCall {
                stage: *current,
                event: *event,
            });
        }
        (Agent, ToolCallRequested) if context.pending_confirmation => {
            return Err(FlowTransitionError::PendingCallOutstanding { stage: *current });
        }
        (End, UserInputReceived) => (Agent, vec![InvokeModel]),
        (Agent, PlainReplyReceived) => (End, Vec::new()),
        (Agent, ToolCallRequested) => (Tools, vec![RequestConfirmation]),
        (Agent, ReadOnlyToolRequested) => (Tools, vec![ExecuteTool]),
        (Agent, InvalidToolCallReceived) => (Agent, vec![RejectToolCall, InvokeModel]),
        (Agent, CompletionSignalled) => (Finalize, vec![AnnounceRecommendation]),
        (Tools, ConfirmationGranted) => (Tools, vec![ExecuteTool]),
        (Tools, ConfirmationDenied) => (Agent, vec![RecordDenial, InvokeModel]),
        (Tools, ToolExecuted) => (Agent, vec![InvokeModel]),
        (Finalize, NoticeEmitted) => (Recommend, vec![GenerateRecommendation]),
        (Recommend, RecommendationEmitted) => (End, vec![MarkCompleted]),
        _ => {
            return Err(FlowTransitionError::InvalidTransition { stage: *current, event: *event });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: *event, actions })
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::domain::session::SessionId;
    use crate::flows::engine::{FlowEngine, FlowTransitionError, SlotFillingFlow};
    use crate::flows::states::{DialogueEvent, DialogueStage, FlowAction, FlowContext};

    #[test]
    fn approval_path_returns_to_agent_after_execution() {
        let engine = FlowEngine::default();
        let idle = FlowContext::default();
        let pending = FlowContext::with_pending(true);

        let agent = engine
            .apply(&engine.initial_stage(), &DialogueEvent::UserInputReceived, &idle)
            .expect("end -> agent");
        assert_eq!(agent.to, DialogueStage::Agent);
        assert_eq!(agent.actions, vec![FlowAction::InvokeModel]);

        let gated = engine
            .apply(&agent.to, &DialogueEvent::ToolCallRequested, &idle)
            .expect("agent -> tools");
        assert_eq!(gated.to, DialogueStage::Tools);
        assert!(gated.suspends_turn());

        let granted = engine
            .apply(&gated.to, &DialogueEvent::ConfirmationGranted, &pending)
            .expect("tools -> tools");
        assert_eq!(granted.actions, vec![FlowAction::ExecuteTool]);

        let resumed = engine
            .apply(&granted.to, &DialogueEvent::ToolExecuted, &idle)
            .expect("tools -> agent");
        assert_eq!(resumed.to, DialogueStage::Agent);
    }

    #[test]
    fn completion_signal_routes_to_finalize_never_tools() {
        let engine = FlowEngine::default();
        let context = FlowContext::default();

        let finalize = engine
            .apply(&DialogueStage::Agent, &DialogueEvent::CompletionSignalled, &context)
            .expect("agent -> finalize");
        assert_eq!(finalize.to, DialogueStage::Finalize);
        assert!(!finalize.actions.contains(&FlowAction::ExecuteTool));

        let recommend = engine
            .apply(&finalize.to, &DialogueEvent::NoticeEmitted, &context)
            .expect("finalize -> recommend");
        assert_eq!(recommend.to, DialogueStage::Recommend);

        let end = engine
            .apply(&recommend.to, &DialogueEvent::RecommendationEmitted, &context)
            .expect("recommend -> end");
        assert_eq!(end.to, DialogueStage::End);
        assert_eq!(end.actions, vec![FlowAction::MarkCompleted]);
    }

    #[test]
    fn denial_feeds_back_into_agent() {
        let engine = FlowEngine::default();
        let outcome = engine
            .apply(
                &DialogueStage::Tools,
                &DialogueEvent::ConfirmationDenied,
                &FlowContext::with_pending(true),
            )
            .expect("tools -> agent");

        assert_eq!(outcome.to, DialogueStage::Agent);
        assert_eq!(outcome.actions, vec![FlowAction::RecordDenial, FlowAction::InvokeModel]);
    }

    #[test]
    fn confirmation_without_pending_call_is_rejected() {
        let engine = FlowEngine::default();
        let error = engine
            .apply(
                &DialogueStage::Tools,
                &DialogueEvent::ConfirmationGranted,
                &FlowContext::default(),
            )
            .expect_err("nothing to approve");

        assert!(matches!(error, FlowTransitionError::MissingPendingCall { .. }));
    }

    #[test]
    fn second_sensitive_request_cannot_queue_while_one_is_pending() {
        let engine = FlowEngine::default();
        let error = engine
            .apply(
                &DialogueStage::Agent,
                &DialogueEvent::ToolCallRequested,
                &FlowContext::with_pending(true),
            )
            .expect_err("mutual exclusion");

        assert_eq!(
            error,
            FlowTransitionError::PendingCallOutstanding { stage: DialogueStage::Agent }
        );
    }

    #[test]
    fn new_input_is_not_accepted_while_suspended_in_tools() {
        let engine = FlowEngine::default();
        let error = engine
            .apply(
                &DialogueStage::Tools,
                &DialogueEvent::UserInputReceived,
                &FlowContext::with_pending(true),
            )
            .expect_err("must resolve confirmation first");

        assert!(matches!(
            error,
            FlowTransitionError::InvalidTransition {
                stage: DialogueStage::Tools,
                event: DialogueEvent::UserInputReceived
            }
        ));
    }

    #[test]
    fn invalid_tool_call_reprompts_the_model() {
        let engine = FlowEngine::default();
        let outcome = engine
            .apply(
                &DialogueStage::Agent,
                &DialogueEvent::InvalidToolCallReceived,
                &FlowContext::default(),
            )
            .expect("agent -> agent");

        assert_eq!(outcome.to, DialogueStage::Agent);
        assert_eq!(outcome.actions, vec![FlowAction::RejectToolCall, FlowAction::InvokeModel]);
        assert!(!outcome.suspends_turn());
    }

    #[test]
    fn transition_emits_audit_event() {
        let engine = FlowEngine::default();
        let sink = InMemoryAuditSink::default();

        let _ = engine
            .apply_with_audit(
                &DialogueStage::End,
                &DialogueEvent::UserInputReceived,
                &FlowContext::default(),
                &sink,
                &AuditContext::new(SessionId::parse("7"), "turn-42", "dialogue-runtime"),
            )
            .expect("transition should succeed");

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "turn-42");
        assert_eq!(events[0].session_id.as_ref().map(|id| id.as_str()), Some("7"));
        assert_eq!(events[0].event_type, "flow.transition_applied");
        assert_eq!(events[0].metadata.get("to").map(String::as_str), Some("Agent"));
    }

    #[test]
    fn replay_is_deterministic_for_same_event_sequence() {
        let engine = FlowEngine::default();
        let events = [
            (DialogueEvent::UserInputReceived, false),
            (DialogueEvent::ToolCallRequested, false),
            (DialogueEvent::ConfirmationGranted, true),
            (DialogueEvent::ToolExecuted, false),
            (DialogueEvent::CompletionSignalled, false),
            (DialogueEvent::NoticeEmitted, false),
            (DialogueEvent::RecommendationEmitted, false),
        ];

        let run = |engine: &FlowEngine<SlotFillingFlow>| {
            let mut stage = engine.initial_stage();
            let mut actions = Vec::new();
            for (event, pending) in &events {
                let outcome = engine
                    .apply(&stage, event, &FlowContext::with_pending(*pending))
                    .expect("deterministic run");
                actions.push(outcome.actions);
                stage = outcome.to;
            }
            (stage, actions)
        };

        let first = run(&engine);
        let second = run(&engine);

        assert_eq!(first, second);
        assert_eq!(first.0, DialogueStage::End);
    }
}
