use std::collections::HashMap;

use tokio::sync::RwLock;

use salesbot_core::domain::dialogue::DialogueState;
use salesbot_core::domain::session::SessionId;
use salesbot_core::domain::slots::{SlotPatch, Slots};

use super::{DialogueCheckpointRepository, RepositoryError, SlotRepository};

#[derive(Default)]
pub struct InMemorySlotRepository {
    records: RwLock<HashMap<String, Slots>>,
}

impl InMemorySlotRepository {
    pub async fn contains(&self, session_id: &SessionId) -> bool {
        self.records.read().await.contains_key(session_id.as_str())
    }
}

#[async_trait::async_trait]
impl SlotRepository for InMemorySlotRepository {
    async fn get_slots(&self, session_id: &SessionId) -> Result<Slots, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(session_id.as_str()).cloned().unwrap_or_default())
    }

    async fn upsert_slots(
        &self,
        session_id: &SessionId,
        patch: &SlotPatch,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.entry(session_id.as_str().to_string()).or_default().merge(patch);
        Ok(())
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<bool, RepositoryError> {
        let mut records = self.records.write().await;
        Ok(records.remove(session_id.as_str()).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryDialogueCheckpointRepository {
    states: RwLock<HashMap<String, DialogueState>>,
}

#[async_trait::async_trait]
impl DialogueCheckpointRepository for InMemoryDialogueCheckpointRepository {
    async fn load(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<DialogueState>, RepositoryError> {
        let states = self.states.read().await;
        Ok(states.get(session_id.as_str()).cloned())
    }

    async fn save(&self, state: &DialogueState) -> Result<(), RepositoryError> {
        let mut states = self.states.write().await;
        states.insert(state.session_id.as_str().to_string(), state.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<bool, RepositoryError> {
        let mut states = self.states.write().await;
        Ok(states.remove(session_id.as_str()).is_some())
    }
}
