use chrono::Utc;
use sqlx::Row;

use salesbot_core::domain::session::SessionId;
use salesbot_core::domain::slots::{GpuNeed, SlotPatch, Slots};

use super::{RepositoryError, SlotRepository};
use crate::DbPool;

pub struct SqlSlotRepository {
    pool: DbPool,
}

impl SqlSlotRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_slots(row: &sqlx::sqlite::SqliteRow) -> Result<Slots, RepositoryError> {
    let client_name: Option<String> =
        row.try_get("client_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let age: Option<i64> = row.try_get("age").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let goal: Option<String> =
        row.try_get("goal").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let ram: Option<String> =
        row.try_get("ram").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let needs_gpu: Option<String> =
        row.try_get("needs_gpu").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let age = age
        .map(|value| {
            u32::try_from(value)
                .map_err(|_| RepositoryError::Decode(format!("age `{value}` is out of range")))
        })
        .transpose()?;
    let needs_gpu = needs_gpu
        .map(|value| {
            value
                .parse::<GpuNeed>()
                .map_err(|e| RepositoryError::Decode(e.to_string()))
        })
        .transpose()?;

    Ok(Slots { client_name, age, goal, ram, needs_gpu })
}

#[async_trait::async_trait]
impl SlotRepository for SqlSlotRepository {
    async fn get_slots(&self, session_id: &SessionId) -> Result<Slots, RepositoryError> {
        let row = sqlx::query(
            "SELECT client_name, age, goal, ram, needs_gpu
             FROM client_slots WHERE session_id = ?",
        )
        .bind(session_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => row_to_slots(r),
            None => Ok(Slots::default()),
        }
    }

    async fn upsert_slots(
        &self,
        session_id: &SessionId,
        patch: &SlotPatch,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO client_slots (session_id, client_name, age, goal, ram, needs_gpu,
                                       created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                 client_name = COALESCE(excluded.client_name, client_slots.client_name),
                 age = COALESCE(excluded.age, client_slots.age),
                 goal = COALESCE(excluded.goal, client_slots.goal),
                 ram = COALESCE(excluded.ram, client_slots.ram),
                 needs_gpu = COALESCE(excluded.needs_gpu, client_slots.needs_gpu),
                 updated_at = excluded.updated_at",
        )
        .bind(session_id.as_str())
        .bind(patch.client_name.as_deref())
        .bind(patch.age.map(i64::from))
        .bind(patch.goal.as_deref())
        .bind(patch.ram.as_deref())
        .bind(patch.needs_gpu.map(|gpu| gpu.as_str()))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM client_slots WHERE session_id = ?")
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
