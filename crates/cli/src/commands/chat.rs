use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use salesbot_agent::guardrails::CONFIRMATION_PROMPT;
use salesbot_agent::{DialogueRuntime, OpenAiChatClient, RuntimeSettings, TracingAuditSink};
use salesbot_core::config::LoadOptions;
use salesbot_core::domain::session::Language;
use salesbot_db::{SqlDialogueCheckpointRepository, SqlSlotRepository};

use crate::commands::{build_runtime, load_config, open_store, CommandResult, StepFailure};
use crate::init_logging;

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub session: Option<String>,
    pub language: Option<String>,
    pub show_tool_output: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    pub session_id: String,
    pub turns: u32,
    pub failed_turns: u32,
    pub completed: bool,
}

pub fn run(mut options: LoadOptions, chat: ChatOptions) -> CommandResult {
    if let Some(raw) = chat.language.as_deref() {
        match raw.parse::<Language>() {
            Ok(language) => options.overrides.default_language = Some(language),
            Err(error) => {
                return CommandResult::failure("chat", "invalid_language", error.to_string(), 2);
            }
        }
    }
    if chat.show_tool_output {
        options.overrides.show_tool_output = Some(true);
    }

    let config = match load_config("chat", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    init_logging(&config.logging);
    let runtime = match build_runtime("chat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let session = chat.session.unwrap_or_else(|| Uuid::new_v4().to_string());

    let result = runtime.block_on(async {
        let pool = open_store(&config.database).await?;
        let llm = OpenAiChatClient::from_config(&config.llm)
            .map_err(|error| ("backend_init", format!("{error:#}"), 6u8))?;
        let dialogue = DialogueRuntime::new(
            Arc::new(llm),
            Arc::new(SqlSlotRepository::new(pool.clone())),
            Arc::new(SqlDialogueCheckpointRepository::new(pool.clone())),
            RuntimeSettings::from_config(&config.dialogue),
        )
        .map_err(|error| ("runtime_init", error.to_string(), 3u8))?
        .with_audit_sink(Arc::new(TracingAuditSink));

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let summary = converse(
            &dialogue,
            &session,
            config.dialogue.default_language,
            stdin.lock(),
            &mut stdout,
        )
        .await
        .map_err(|error| ("io", format!("{error:#}"), 7u8))?;

        pool.close().await;
        Ok::<_, StepFailure>(summary)
    });

    match result {
        Ok(summary) => CommandResult::success_with_data(
            "chat",
            format!("session {} closed after {} turns", summary.session_id, summary.turns),
            serde_json::to_value(&summary).ok(),
        ),
        Err(failure) => CommandResult::from_step("chat", failure),
    }
}

/// Line-oriented conversation loop. Besides chat input it understands `/slots`,
/// `/reset`, and `/quit` (or `/exit`); end of input also ends the conversation.
/// Failed turns are reported and the loop continues with the restored session.
pub async fn converse<R, W>(
    runtime: &DialogueRuntime,
    session: &str,
    language: Language,
    mut input: R,
    output: &mut W,
) -> Result<ConversationSummary>
where
    R: BufRead,
    W: Write,
{
    let state = runtime.start_session(session, language).await.context("failed to open session")?;
    let mut summary = ConversationSummary {
        session_id: state.session_id.to_string(),
        completed: state.completed,
        ..ConversationSummary::default()
    };

    writeln!(output, "{}", runtime.greeting(language))?;
    if state.is_awaiting_confirmation() {
        writeln!(output, "{CONFIRMATION_PROMPT}")?;
    }

    let mut line = String::new();
    loop {
        write!(output, "> ")?;
        output.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        let text = line.trim();
        match text {
            "" => continue,
            "/quit" | "/exit" => break,
            "/slots" => {
                let slots = runtime.slots(session).await.context("failed to read slots")?;
                writeln!(output, "{}", slots.render_table())?;
                continue;
            }
            "/reset" => {
                runtime.reset_session(session).await.context("failed to reset session")?;
                runtime.start_session(session, language).await.context("failed to reopen")?;
                summary.completed = false;
                writeln!(output, "{}", runtime.greeting(language))?;
                continue;
            }
            _ => {}
        }

        let correlation_id = Uuid::new_v4().to_string();
        match runtime.submit_with_correlation(session, text, language, &correlation_id).await {
            Ok(outcome) => {
                summary.turns += 1;
                summary.completed = outcome.completed;
                for event in &outcome.events {
                    writeln!(output, "{event}")?;
                }
            }
            Err(error) => {
                summary.failed_turns += 1;
                warn!(
                    event_name = "cli.chat.turn_failed",
                    session_id = %session,
                    correlation_id = %correlation_id,
                    error_class = error.error_class(),
                    "turn failed"
                );
                let interface = error.into_interface(correlation_id.as_str());
                writeln!(output, "{} (ref {correlation_id})", interface.user_message())?;
            }
        }
    }

    Ok(summary)
}
