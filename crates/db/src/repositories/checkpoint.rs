use sqlx::Row;

use salesbot_core::domain::dialogue::DialogueState;
use salesbot_core::domain::session::SessionId;

use super::{DialogueCheckpointRepository, RepositoryError};
use crate::DbPool;

/// Stores the whole dialogue state as JSON; stage and flags are mirrored into columns
/// for inspection.
pub struct SqlDialogueCheckpointRepository {
    pool: DbPool,
}

impl SqlDialogueCheckpointRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DialogueCheckpointRepository for SqlDialogueCheckpointRepository {
    async fn load(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<DialogueState>, RepositoryError> {
        let row = sqlx::query("SELECT state_json FROM dialogue_checkpoints WHERE session_id = ?")
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let state_json: String =
            row.try_get("state_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let state = serde_json::from_str::<DialogueState>(&state_json)
            .map_err(|e| RepositoryError::Decode(format!("invalid checkpoint payload: {e}")))?;
        Ok(Some(state))
    }

    async fn save(&self, state: &DialogueState) -> Result<(), RepositoryError> {
        let state_json =
            serde_json::to_string(state).map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO dialogue_checkpoints (session_id, stage, completed,
                                               awaiting_confirmation, state_json, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                 stage = excluded.stage,
                 completed = excluded.completed,
                 awaiting_confirmation = excluded.awaiting_confirmation,
                 state_json = excluded.state_json,
                 updated_at = excluded.updated_at",
        )
        .bind(state.session_id.as_str())
        .bind(format!("{:?}", state.stage))
        .bind(state.completed)
        .bind(state.is_awaiting_confirmation())
        .bind(&state_json)
        .bind(state.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM dialogue_checkpoints WHERE session_id = ?")
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sqlx::Row;

    use salesbot_core::domain::dialogue::{DialogueState, PendingCall};
    use salesbot_core::domain::session::{Language, SessionId};
    use salesbot_core::domain::tool::ToolCall;
    use salesbot_core::domain::transcript::Message;
    use salesbot_core::flows::DialogueStage;

    use super::SqlDialogueCheckpointRepository;
    use crate::repositories::{DialogueCheckpointRepository, RepositoryError};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn suspended_state() -> DialogueState {
        let mut state = DialogueState::new(SessionId("42".to_string()), Language::English);
        state.push(Message::user("My name is Ana"));
        state.push(Message::tool_request(
            "call-1",
            "inform_name",
            json!({ "client_name": "Ana" }),
        ));
        state
            .suspend_for_confirmation(PendingCall::new(
                "call-1",
                ToolCall::InformName { client_name: "Ana".to_string() },
            ))
            .expect("suspend");
        state.stage = DialogueStage::Tools;
        state
    }

    #[tokio::test]
    async fn save_and_load_restores_suspended_turn() {
        let pool = setup().await;
        let repo = SqlDialogueCheckpointRepository::new(pool.clone());
        let state = suspended_state();

        repo.save(&state).await.expect("save");
        let loaded = repo.load(&state.session_id).await.expect("load").expect("present");

        assert_eq!(loaded, state);
        assert_eq!(loaded.stage, DialogueStage::Tools);
        assert!(loaded.is_awaiting_confirmation());

        let row = sqlx::query(
            "SELECT stage, awaiting_confirmation FROM dialogue_checkpoints WHERE session_id = ?",
        )
        .bind("42")
        .fetch_one(&pool)
        .await
        .expect("row");
        assert_eq!(row.get::<String, _>("stage"), "Tools");
        assert!(row.get::<bool, _>("awaiting_confirmation"));
    }

    #[tokio::test]
    async fn save_overwrites_previous_checkpoint() {
        let repo = SqlDialogueCheckpointRepository::new(setup().await);
        let mut state = suspended_state();
        repo.save(&state).await.expect("first save");

        state.take_pending();
        state.stage = DialogueStage::End;
        state.push(Message::tool_result("call-1", "ok"));
        repo.save(&state).await.expect("second save");

        let loaded = repo.load(&state.session_id).await.expect("load").expect("present");
        assert!(!loaded.is_awaiting_confirmation());
        assert_eq!(loaded.transcript.len(), 3);
    }

    #[tokio::test]
    async fn corrupt_payload_is_a_decode_error() {
        let pool = setup().await;
        sqlx::query(
            "INSERT INTO dialogue_checkpoints (session_id, stage, state_json, updated_at)
             VALUES ('bad', 'End', '{not json', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("insert");

        let repo = SqlDialogueCheckpointRepository::new(pool);
        let error = repo.load(&SessionId("bad".to_string())).await.expect_err("decode");
        assert!(matches!(error, RepositoryError::Decode(_)));
    }

    #[tokio::test]
    async fn delete_reports_whether_checkpoint_existed() {
        let repo = SqlDialogueCheckpointRepository::new(setup().await);
        let state = suspended_state();
        repo.save(&state).await.expect("save");

        assert!(repo.delete(&state.session_id).await.expect("delete"));
        assert!(!repo.delete(&state.session_id).await.expect("delete again"));
        assert!(repo.load(&state.session_id).await.expect("load").is_none());
    }
}
