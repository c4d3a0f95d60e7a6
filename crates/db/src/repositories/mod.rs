use async_trait::async_trait;
use thiserror::Error;

use salesbot_core::domain::dialogue::DialogueState;
use salesbot_core::domain::session::SessionId;
use salesbot_core::domain::slots::{SlotPatch, Slots};

pub mod checkpoint;
pub mod memory;
pub mod slots;

pub use checkpoint::SqlDialogueCheckpointRepository;
pub use memory::{InMemoryDialogueCheckpointRepository, InMemorySlotRepository};
pub use slots::SqlSlotRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Per-session slot record. Writes merge field by field; unknown sessions read as empty.
#[async_trait]
pub trait SlotRepository: Send + Sync {
    async fn get_slots(&self, session_id: &SessionId) -> Result<Slots, RepositoryError>;

    /// Creates the record if absent, then sets every field that is `Some` in `patch`.
    async fn upsert_slots(
        &self,
        session_id: &SessionId,
        patch: &SlotPatch,
    ) -> Result<(), RepositoryError>;

    /// Returns whether a record existed.
    async fn delete_session(&self, session_id: &SessionId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait DialogueCheckpointRepository: Send + Sync {
    async fn load(&self, session_id: &SessionId)
        -> Result<Option<DialogueState>, RepositoryError>;
    async fn save(&self, state: &DialogueState) -> Result<(), RepositoryError>;
    async fn delete(&self, session_id: &SessionId) -> Result<bool, RepositoryError>;
}
