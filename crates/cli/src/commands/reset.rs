use salesbot_core::config::LoadOptions;
use salesbot_core::domain::session::SessionId;
use salesbot_db::{
    DialogueCheckpointRepository, SlotRepository, SqlDialogueCheckpointRepository,
    SqlSlotRepository,
};
use tracing::info;

use crate::commands::{build_runtime, load_config, open_store, CommandResult, StepFailure};

pub fn run(options: LoadOptions, session: &str) -> CommandResult {
    let Some(session_id) = SessionId::parse(session) else {
        return CommandResult::failure(
            "reset",
            "invalid_session",
            "session id must not be blank",
            2,
        );
    };
    let config = match load_config("reset", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("reset") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_store(&config.database).await?;
        let persistence = |error: salesbot_db::RepositoryError| {
            ("persistence", error.to_string(), 6u8)
        };
        let had_slots = SqlSlotRepository::new(pool.clone())
            .delete_session(&session_id)
            .await
            .map_err(persistence)?;
        let had_checkpoint = SqlDialogueCheckpointRepository::new(pool.clone())
            .delete(&session_id)
            .await
            .map_err(persistence)?;
        pool.close().await;
        Ok::<_, StepFailure>(had_slots || had_checkpoint)
    });

    match result {
        Ok(existed) => {
            info!(event_name = "cli.session.reset", session_id = %session_id, existed, "reset");
            let message = if existed {
                format!("session {session_id} reset")
            } else {
                format!("session {session_id} had no stored state")
            };
            CommandResult::success("reset", message)
        }
        Err(failure) => CommandResult::from_step("reset", failure),
    }
}
