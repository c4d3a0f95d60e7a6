use salesbot_core::config::LoadOptions;
use salesbot_core::domain::session::SessionId;
use salesbot_db::{SlotRepository, SqlSlotRepository};

use crate::commands::{build_runtime, load_config, open_store, CommandResult, StepFailure};

pub fn run(options: LoadOptions, session: &str) -> CommandResult {
    let Some(session_id) = SessionId::parse(session) else {
        return CommandResult::failure(
            "slots",
            "invalid_session",
            "session id must not be blank",
            2,
        );
    };
    let config = match load_config("slots", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("slots") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_store(&config.database).await?;
        let slots = SqlSlotRepository::new(pool.clone())
            .get_slots(&session_id)
            .await
            .map_err(|error| ("persistence", error.to_string(), 6u8))?;
        pool.close().await;
        Ok::<_, StepFailure>(slots)
    });

    match result {
        Ok(slots) => {
            let missing =
                slots.missing().iter().map(|slot| slot.as_str()).collect::<Vec<_>>().join(", ");
            let message = if missing.is_empty() {
                format!("session {session_id}: every slot is filled")
            } else {
                format!("session {session_id}: missing {missing}")
            };
            CommandResult::success_with_data("slots", message, serde_json::to_value(&slots).ok())
        }
        Err(failure) => CommandResult::from_step("slots", failure),
    }
}
