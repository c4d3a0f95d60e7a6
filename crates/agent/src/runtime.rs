use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use salesbot_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink,
};
use salesbot_core::config::DialogueConfig;
use salesbot_core::domain::dialogue::{DialogueState, PendingCall};
use salesbot_core::domain::session::{Language, SessionId};
use salesbot_core::domain::slots::{SlotPatch, Slots};
use salesbot_core::domain::tool::ToolName;
use salesbot_core::domain::transcript::Message;
use salesbot_core::errors::{ApplicationError, DomainError};
use salesbot_core::flows::{
    DialogueEvent, DialogueStage, FlowAction, FlowContext, FlowEngine, SlotFillingFlow,
    TransitionOutcome,
};
use salesbot_db::{DialogueCheckpointRepository, RepositoryError, SlotRepository};

use crate::guardrails::{
    denial_message, ConfirmationDecision, ConfirmationGate, ConfirmationPolicy,
    CONFIRMATION_PROMPT,
};
use crate::llm::{LlmClient, ModelRequest};
use crate::prompts::PromptLibrary;
use crate::recommendation::RecommendationGenerator;
use crate::tools::ToolRegistry;
use crate::turn::{TurnContext, TurnExecutor, TurnResult};

const ACTOR: &str = "dialogue-runtime";
const COMPLETION_ACK: &str = "Requirements received. Preparing the recommendation.";

/// What the presentation layer shows for one turn, in order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum TurnEvent {
    AssistantText(String),
    ToolTrace { name: String, args: Value },
    ConfirmationPrompt(String),
    ToolOutput { name: String, content: String },
}

impl fmt::Display for TurnEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssistantText(text) | Self::ConfirmationPrompt(text) => f.write_str(text),
            Self::ToolTrace { name, args } => {
                write!(f, "Calling function {name} with arguments {args}")
            }
            Self::ToolOutput { name, content } => write!(f, "Output of {name}:\n{content}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    pub session_id: SessionId,
    pub events: Vec<TurnEvent>,
    pub stage: DialogueStage,
    pub completed: bool,
    pub awaiting_confirmation: bool,
}

impl TurnOutcome {
    pub fn assistant_texts(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TurnEvent::AssistantText(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct RuntimeSettings {
    pub max_steps_per_turn: u32,
    pub show_tool_output: bool,
    pub policy: ConfirmationPolicy,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            max_steps_per_turn: 12,
            show_tool_output: false,
            policy: ConfirmationPolicy::default(),
        }
    }
}

impl RuntimeSettings {
    pub fn from_config(config: &DialogueConfig) -> Self {
        Self {
            max_steps_per_turn: config.max_steps_per_turn,
            show_tool_output: config.show_tool_output,
            policy: ConfirmationPolicy::from_config(config),
        }
    }
}

/// Scratch state for one turn; never persisted.
struct TurnRun {
    audit: AuditContext,
    events: Vec<TurnEvent>,
    model_calls: u32,
    staged: Option<PendingCall>,
    rejected: Option<(String, String)>,
    completion: Option<(String, Slots)>,
    denial_reason: Option<String>,
}

impl TurnRun {
    fn new(audit: AuditContext) -> Self {
        Self {
            audit,
            events: Vec::new(),
            model_calls: 0,
            staged: None,
            rejected: None,
            completion: None,
            denial_reason: None,
        }
    }

    fn count_model_call(&mut self, limit: u32) -> Result<(), DomainError> {
        if self.model_calls >= limit {
            return Err(DomainError::StepLimitExceeded { limit });
        }
        self.model_calls += 1;
        Ok(())
    }

    fn trace(&mut self, name: &str, args: Value) {
        debug!(
            event_name = "dialogue.tool.trace",
            correlation_id = %self.audit.correlation_id,
            "Calling function {name} with arguments {args}"
        );
        self.events.push(TurnEvent::ToolTrace { name: name.to_string(), args });
    }
}

/// Drives the dialogue graph for every session: one turn per user input, serialized per
/// session, checkpointed after every stage transition.
pub struct DialogueRuntime {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    executor: TurnExecutor,
    recommender: RecommendationGenerator,
    slot_store: Arc<dyn SlotRepository>,
    checkpoints: Arc<dyn DialogueCheckpointRepository>,
    audit: Arc<dyn AuditSink>,
    engine: FlowEngine<SlotFillingFlow>,
    gate: ConfirmationGate,
    settings: RuntimeSettings,
    session_locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl DialogueRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        slot_store: Arc<dyn SlotRepository>,
        checkpoints: Arc<dyn DialogueCheckpointRepository>,
        settings: RuntimeSettings,
    ) -> Result<Self, ApplicationError> {
        let prompts = Arc::new(
            PromptLibrary::new()
                .map_err(|error| ApplicationError::Configuration(format!("{error:#}")))?,
        );

        Ok(Self {
            executor: TurnExecutor::new(llm.clone(), prompts.clone(), ToolRegistry::default()),
            recommender: RecommendationGenerator::new(llm.clone(), prompts.clone()),
            llm,
            prompts,
            slot_store,
            checkpoints,
            audit: Arc::new(NoopAuditSink),
            engine: FlowEngine::default(),
            gate: ConfirmationGate,
            settings,
            session_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Opening line shown before the first user input.
    pub fn greeting(&self, language: Language) -> &'static str {
        language.greeting()
    }

    /// Ensures an (empty) slot record and a checkpoint exist for the session.
    pub async fn start_session(
        &self,
        session_id: &str,
        language: Language,
    ) -> Result<DialogueState, ApplicationError> {
        let session_id = bind_session(session_id)?;
        let lock = self.session_lock(&session_id).await;
        let _guard = lock.lock().await;

        self.slot_store
            .upsert_slots(&session_id, &SlotPatch::default())
            .await
            .map_err(persistence)?;
        match self.checkpoints.load(&session_id).await.map_err(persistence)? {
            Some(state) => Ok(state),
            None => {
                let state = DialogueState::new(session_id.clone(), language);
                self.checkpoints.save(&state).await.map_err(persistence)?;
                info!(
                    event_name = "dialogue.session.started",
                    session_id = %session_id,
                    language = language.code(),
                    "session started"
                );
                Ok(state)
            }
        }
    }

    /// Forgets the session: slot record, checkpoint and its turn lock. Returns whether
    /// anything existed.
    pub async fn reset_session(&self, session_id: &str) -> Result<bool, ApplicationError> {
        let session_id = bind_session(session_id)?;
        let lock = self.session_lock(&session_id).await;
        let existed = {
            let _guard = lock.lock().await;
            let had_slots =
                self.slot_store.delete_session(&session_id).await.map_err(persistence)?;
            let had_checkpoint =
                self.checkpoints.delete(&session_id).await.map_err(persistence)?;
            had_slots || had_checkpoint
        };
        self.release_session_lock(&session_id, lock).await;

        let audit = AuditContext::new(Some(session_id.clone()), Uuid::new_v4().to_string(), ACTOR);
        self.audit.emit(
            audit
                .event("session.reset", AuditCategory::Persistence, AuditOutcome::Success)
                .with_metadata("existed", existed.to_string()),
        );
        info!(
            event_name = "dialogue.session.reset",
            session_id = %session_id,
            existed,
            "session reset"
        );
        Ok(existed)
    }

    pub async fn slots(&self, session_id: &str) -> Result<Slots, ApplicationError> {
        let session_id = bind_session(session_id)?;
        self.slot_store.get_slots(&session_id).await.map_err(persistence)
    }

    pub async fn snapshot(
        &self,
        session_id: &str,
    ) -> Result<Option<DialogueState>, ApplicationError> {
        let session_id = bind_session(session_id)?;
        self.checkpoints.load(&session_id).await.map_err(persistence)
    }

    /// Runs one turn. With a call awaiting confirmation the input is the user's verdict;
    /// otherwise it is appended as a user message. A failed turn restores the checkpoint
    /// taken when it started.
    pub async fn submit(
        &self,
        session_id: &str,
        user_text: &str,
        language: Language,
    ) -> Result<TurnOutcome, ApplicationError> {
        let correlation_id = Uuid::new_v4().to_string();
        self.submit_with_correlation(session_id, user_text, language, &correlation_id).await
    }

    /// Same as [`DialogueRuntime::submit`], tagging logs and audit events with the caller's
    /// correlation id so a reported failure can be traced.
    pub async fn submit_with_correlation(
        &self,
        session_id: &str,
        user_text: &str,
        language: Language,
        correlation_id: &str,
    ) -> Result<TurnOutcome, ApplicationError> {
        let Some(session_id) = SessionId::parse(session_id) else {
            warn!(
                event_name = "dialogue.turn.unbound_session",
                correlation_id = %correlation_id,
                "turn submitted without a session id"
            );
            return Err(unbound_session());
        };

        let lock = self.session_lock(&session_id).await;
        let _guard = lock.lock().await;

        let mut state = match self.checkpoints.load(&session_id).await.map_err(persistence)? {
            Some(state) => state,
            None => DialogueState::new(session_id.clone(), language),
        };
        if !state.is_awaiting_confirmation() && state.stage != DialogueStage::End {
            warn!(
                event_name = "dialogue.turn.interrupted_stage",
                session_id = %session_id,
                correlation_id = %correlation_id,
                stage = ?state.stage,
                "checkpoint left mid-turn; resuming from End"
            );
            state.stage = DialogueStage::End;
        }
        state.language = language;
        state.slots = self.slot_store.get_slots(&session_id).await.map_err(persistence)?;
        let snapshot = state.clone();

        let audit = AuditContext::new(Some(session_id.clone()), correlation_id, ACTOR);
        let mut run = TurnRun::new(audit);
        info!(
            event_name = "dialogue.turn.started",
            session_id = %session_id,
            correlation_id = %correlation_id,
            stage = ?state.stage,
            awaiting_confirmation = state.is_awaiting_confirmation(),
            "turn started"
        );
        self.audit.emit(run.audit.event(
            "turn.started",
            AuditCategory::Ingress,
            AuditOutcome::Success,
        ));

        match self.drive(&mut state, user_text, &mut run).await {
            Ok(()) => {
                info!(
                    event_name = "dialogue.turn.completed",
                    session_id = %session_id,
                    correlation_id = %correlation_id,
                    stage = ?state.stage,
                    model_calls = run.model_calls,
                    completed = state.completed,
                    awaiting_confirmation = state.is_awaiting_confirmation(),
                    "turn completed"
                );
                self.audit.emit(
                    run.audit
                        .event("turn.completed", AuditCategory::Ingress, AuditOutcome::Success)
                        .with_metadata("stage", format!("{:?}", state.stage))
                        .with_metadata("model_calls", run.model_calls.to_string()),
                );
                Ok(TurnOutcome {
                    session_id,
                    events: run.events,
                    stage: state.stage,
                    completed: state.completed,
                    awaiting_confirmation: state.is_awaiting_confirmation(),
                })
            }
            Err(error) => {
                warn!(
                    event_name = "dialogue.turn.failed",
                    session_id = %session_id,
                    correlation_id = %correlation_id,
                    error_class = error.error_class(),
                    error = %error,
                    "turn failed; restoring turn-start checkpoint"
                );
                if let Err(restore_error) = self.checkpoints.save(&snapshot).await {
                    warn!(
                        event_name = "dialogue.turn.restore_failed",
                        session_id = %session_id,
                        correlation_id = %correlation_id,
                        error = %restore_error,
                        "could not restore turn-start checkpoint"
                    );
                }
                self.audit.emit(
                    run.audit
                        .event("turn.failed", AuditCategory::Ingress, AuditOutcome::Failed)
                        .with_metadata("error_class", error.error_class())
                        .with_metadata("error", error.to_string()),
                );
                Err(error)
            }
        }
    }

    async fn drive(
        &self,
        state: &mut DialogueState,
        user_text: &str,
        run: &mut TurnRun,
    ) -> Result<(), ApplicationError> {
        let mut event = if state.is_awaiting_confirmation() {
            match self.gate.resolve(user_text) {
                ConfirmationDecision::Approved => DialogueEvent::ConfirmationGranted,
                ConfirmationDecision::Denied { reason } => {
                    run.denial_reason = Some(reason);
                    DialogueEvent::ConfirmationDenied
                }
            }
        } else {
            state.push(Message::user(user_text));
            DialogueEvent::UserInputReceived
        };

        loop {
            let outcome = self.transition(state, event, run).await?;

            let mut follow_up = None;
            for action in &outcome.actions {
                if let Some(produced) = self.perform(*action, state, run).await? {
                    follow_up = Some(produced);
                }
            }

            if outcome.suspends_turn() {
                break;
            }
            event = follow_up.ok_or_else(|| {
                DomainError::InvariantViolation(format!(
                    "stage {:?} was entered without a follow-up event",
                    outcome.to
                ))
            })?;
        }

        self.checkpoint(state).await
    }

    async fn transition(
        &self,
        state: &mut DialogueState,
        event: DialogueEvent,
        run: &TurnRun,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let context = FlowContext::with_pending(state.is_awaiting_confirmation());
        let outcome = self
            .engine
            .apply_with_audit(&state.stage, &event, &context, self.audit.as_ref(), &run.audit)
            .map_err(DomainError::from)?;

        debug!(
            event_name = "dialogue.stage.transition",
            session_id = %state.session_id,
            correlation_id = %run.audit.correlation_id,
            from = ?outcome.from,
            to = ?outcome.to,
            event = ?event,
            "stage transition"
        );

        state.stage = outcome.to;
        state.touch();
        self.checkpoint(state).await?;
        Ok(outcome)
    }

    async fn perform(
        &self,
        action: FlowAction,
        state: &mut DialogueState,
        run: &mut TurnRun,
    ) -> Result<Option<DialogueEvent>, ApplicationError> {
        match action {
            FlowAction::InvokeModel => self.invoke_agent(state, run).await.map(Some),
            FlowAction::RequestConfirmation => {
                self.request_confirmation(state, run)?;
                Ok(None)
            }
            FlowAction::ExecuteTool => {
                self.execute_tool(state, run).await?;
                Ok(Some(DialogueEvent::ToolExecuted))
            }
            FlowAction::RecordDenial => {
                self.record_denial(state, run)?;
                Ok(None)
            }
            FlowAction::RejectToolCall => {
                self.reject_tool_call(state, run)?;
                Ok(None)
            }
            FlowAction::AnnounceRecommendation => {
                self.announce_recommendation(state, run).await?;
                Ok(Some(DialogueEvent::NoticeEmitted))
            }
            FlowAction::GenerateRecommendation => {
                self.generate_recommendation(state, run).await?;
                Ok(Some(DialogueEvent::RecommendationEmitted))
            }
            FlowAction::MarkCompleted => {
                state.completed = true;
                state.touch();
                self.audit.emit(run.audit.event(
                    "dialogue.completed",
                    AuditCategory::Flow,
                    AuditOutcome::Success,
                ));
                info!(
                    event_name = "dialogue.completed",
                    session_id = %state.session_id,
                    correlation_id = %run.audit.correlation_id,
                    "recommendation delivered"
                );
                Ok(None)
            }
        }
    }

    async fn invoke_agent(
        &self,
        state: &mut DialogueState,
        run: &mut TurnRun,
    ) -> Result<DialogueEvent, ApplicationError> {
        run.count_model_call(self.settings.max_steps_per_turn)?;

        let context = TurnContext::new(Some(state.session_id.clone()), state.language);
        let slots = state.slots.clone();
        let appended_from = state.transcript.len();
        let result = self.executor.execute(&context, &mut state.transcript, &slots).await?;
        state.touch();

        for message in &state.transcript[appended_from..] {
            if let Message::Assistant { text } = message {
                run.events.push(TurnEvent::AssistantText(text.clone()));
            }
        }

        let event = match result {
            TurnResult::PlainReply(_) => DialogueEvent::PlainReplyReceived,
            TurnResult::ToolCallRequest { call_id, call } => {
                let pending = PendingCall::new(call_id, call);
                run.trace(pending.tool_name().as_str(), pending.args());
                let sensitive = self.settings.policy.requires_confirmation(pending.tool_name());
                run.staged = Some(pending);
                if sensitive {
                    DialogueEvent::ToolCallRequested
                } else {
                    DialogueEvent::ReadOnlyToolRequested
                }
            }
            TurnResult::CompletionSignal { call_id, requirements } => {
                let raw_args = requested_args(&state.transcript, &call_id);
                run.trace(ToolName::SlotFilling.as_str(), raw_args);
                run.completion = Some((call_id, requirements));
                DialogueEvent::CompletionSignalled
            }
            TurnResult::InvalidToolCall { call_id, name, error } => {
                let raw_args = requested_args(&state.transcript, &call_id);
                run.trace(&name, raw_args);
                warn!(
                    event_name = "dialogue.tool.rejected",
                    session_id = %state.session_id,
                    correlation_id = %run.audit.correlation_id,
                    tool = %name,
                    error = %error,
                    "model produced an invalid tool call"
                );
                run.rejected = Some((call_id, error.to_string()));
                DialogueEvent::InvalidToolCallReceived
            }
        };
        Ok(event)
    }

    fn request_confirmation(
        &self,
        state: &mut DialogueState,
        run: &mut TurnRun,
    ) -> Result<(), ApplicationError> {
        let pending = run.staged.take().ok_or_else(|| missing_context("a staged tool call"))?;
        let tool = pending.tool_name();
        let call_id = pending.call_id.clone();
        state.suspend_for_confirmation(pending)?;
        state.push(Message::assistant(CONFIRMATION_PROMPT));
        run.events.push(TurnEvent::ConfirmationPrompt(CONFIRMATION_PROMPT.to_string()));

        self.audit.emit(
            run.audit
                .event("confirmation.requested", AuditCategory::Confirmation, AuditOutcome::Success)
                .with_metadata("tool", tool.as_str())
                .with_metadata("call_id", call_id.clone()),
        );
        info!(
            event_name = "dialogue.confirmation.requested",
            session_id = %state.session_id,
            correlation_id = %run.audit.correlation_id,
            tool = tool.as_str(),
            call_id = %call_id,
            "awaiting user approval"
        );
        Ok(())
    }

    async fn execute_tool(
        &self,
        state: &mut DialogueState,
        run: &mut TurnRun,
    ) -> Result<(), ApplicationError> {
        let pending = match run.staged.take() {
            Some(read_only) => read_only,
            None => {
                let approved =
                    state.take_pending().ok_or_else(|| missing_context("an approved tool call"))?;
                self.audit.emit(
                    run.audit
                        .event(
                            "confirmation.approved",
                            AuditCategory::Confirmation,
                            AuditOutcome::Success,
                        )
                        .with_metadata("tool", approved.tool_name().as_str())
                        .with_metadata("call_id", approved.call_id.clone()),
                );
                approved
            }
        };
        let tool = pending.tool_name();

        let current = self.slot_store.get_slots(&state.session_id).await.map_err(persistence)?;
        let effect = self.executor.registry().execute(&current, &pending.call)?;
        if let Some(patch) = &effect.patch {
            self.slot_store.upsert_slots(&state.session_id, patch).await.map_err(persistence)?;
        }
        state.slots = effect.slots;
        state.push(Message::tool_result(pending.call_id.clone(), effect.output.clone()));

        if self.settings.show_tool_output {
            run.events.push(TurnEvent::ToolOutput {
                name: tool.as_str().to_string(),
                content: effect.output,
            });
        }

        let mut executed = run
            .audit
            .event("tool.executed", AuditCategory::Tool, AuditOutcome::Success)
            .with_metadata("tool", tool.as_str())
            .with_metadata("call_id", pending.call_id.clone());
        if let Some(slot) = tool.owned_slot() {
            executed = executed.with_metadata("slot", slot.as_str());
        }
        self.audit.emit(executed);
        info!(
            event_name = "dialogue.tool.executed",
            session_id = %state.session_id,
            correlation_id = %run.audit.correlation_id,
            tool = tool.as_str(),
            call_id = %pending.call_id,
            "tool executed"
        );
        Ok(())
    }

    fn record_denial(
        &self,
        state: &mut DialogueState,
        run: &mut TurnRun,
    ) -> Result<(), ApplicationError> {
        let pending = state.take_pending().ok_or_else(|| missing_context("a denied tool call"))?;
        let reason = run.denial_reason.take().unwrap_or_default();
        state.push(Message::tool_result(pending.call_id.clone(), denial_message(&reason)));

        self.audit.emit(
            run.audit
                .event("confirmation.denied", AuditCategory::Confirmation, AuditOutcome::Rejected)
                .with_metadata("tool", pending.tool_name().as_str())
                .with_metadata("call_id", pending.call_id.clone()),
        );
        info!(
            event_name = "dialogue.confirmation.denied",
            session_id = %state.session_id,
            correlation_id = %run.audit.correlation_id,
            tool = pending.tool_name().as_str(),
            call_id = %pending.call_id,
            "user denied tool call"
        );
        Ok(())
    }

    fn reject_tool_call(
        &self,
        state: &mut DialogueState,
        run: &mut TurnRun,
    ) -> Result<(), ApplicationError> {
        let (call_id, error) =
            run.rejected.take().ok_or_else(|| missing_context("a rejected tool call"))?;
        state.push(Message::tool_result(
            call_id.clone(),
            format!(
                "Error: {error}. The call was not executed. Ask the client to clarify or call \
                 the tool again with valid arguments."
            ),
        ));

        self.audit.emit(
            run.audit
                .event("tool.rejected", AuditCategory::Tool, AuditOutcome::Rejected)
                .with_metadata("call_id", call_id)
                .with_metadata("error", error),
        );
        Ok(())
    }

    async fn announce_recommendation(
        &self,
        state: &mut DialogueState,
        run: &mut TurnRun,
    ) -> Result<(), ApplicationError> {
        let call_id = run
            .completion
            .as_ref()
            .map(|(call_id, _)| call_id.clone())
            .ok_or_else(|| missing_context("a completion signal"))?;
        state.push(Message::tool_result(call_id, COMPLETION_ACK));

        run.count_model_call(self.settings.max_steps_per_turn)?;
        let notice = self
            .prompts
            .finalize_notice(state.language)
            .map_err(|error| ApplicationError::Configuration(format!("{error:#}")))?;
        let response = self
            .llm
            .complete(ModelRequest::default().with_messages(vec![Message::user(notice)]))
            .await
            .map_err(|error| ApplicationError::Backend(format!("{error:#}")))?;

        if let Some(text) = response.text.filter(|text| !text.trim().is_empty()) {
            state.push(Message::assistant(text.clone()));
            run.events.push(TurnEvent::AssistantText(text));
        }
        Ok(())
    }

    async fn generate_recommendation(
        &self,
        state: &mut DialogueState,
        run: &mut TurnRun,
    ) -> Result<(), ApplicationError> {
        run.count_model_call(self.settings.max_steps_per_turn)?;
        let requirements = run.completion.as_ref().map(|(_, requirements)| requirements);
        let text = self.recommender.generate(state, requirements).await?;

        state.push(Message::assistant(text.clone()));
        run.events.push(TurnEvent::AssistantText(text));
        Ok(())
    }

    async fn checkpoint(&self, state: &DialogueState) -> Result<(), ApplicationError> {
        self.checkpoints.save(state).await.map_err(persistence)
    }

    async fn session_lock(&self, session_id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        locks.entry(session_id.clone()).or_default().clone()
    }

    /// Drops the map entry unless a queued turn still holds the lock.
    async fn release_session_lock(&self, session_id: &SessionId, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut locks = self.session_locks.lock().await;
        if locks.get(session_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(session_id);
        }
    }
}

fn bind_session(raw: &str) -> Result<SessionId, ApplicationError> {
    SessionId::parse(raw).ok_or_else(unbound_session)
}

fn unbound_session() -> ApplicationError {
    ApplicationError::Configuration("no session is bound to this conversation".to_string())
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn missing_context(what: &str) -> DomainError {
    DomainError::InvariantViolation(format!("turn reached this step without {what}"))
}

fn requested_args(transcript: &[Message], call_id: &str) -> Value {
    transcript
        .iter()
        .rev()
        .find_map(|message| match message {
            Message::ToolRequest { call_id: id, args, .. } if id == call_id => Some(args.clone()),
            _ => None,
        })
        .unwrap_or(Value::Null)
}

/// Forwards audit events to the `tracing` pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let session_id = event.session_id.as_ref().map(SessionId::as_str).unwrap_or("-");
        info!(
            event_name = %event.event_type,
            category = ?event.category,
            outcome = ?event.outcome,
            session_id = %session_id,
            correlation_id = %event.correlation_id,
            actor = %event.actor,
            metadata = ?event.metadata,
            "audit"
        );
    }
}
