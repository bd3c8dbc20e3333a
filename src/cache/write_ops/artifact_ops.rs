use crate::cache::mappers::now_secs;
use crate::cache::{ExecutionCache, ExecutionUpdate};
use crate::error::{ForgeError, Result};

impl ExecutionCache {
    /// Upserts one row per artifact id. `skip_count` survives the update.
    pub async fn set(&self, update: ExecutionUpdate) -> Result<()> {
        let result = update
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut write = self.begin_write().await?;
        sqlx::query(
            "INSERT INTO artifacts (
                 id, input_hash, spec_hash, status, result, error,
                 executed_at, execution_time_ms, skip_count
             )
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)
             ON CONFLICT(id) DO UPDATE SET
                 input_hash = excluded.input_hash,
                 spec_hash = excluded.spec_hash,
                 status = excluded.status,
                 result = excluded.result,
                 error = excluded.error,
                 executed_at = excluded.executed_at,
                 execution_time_ms = excluded.execution_time_ms,
                 updated_at = unixepoch('now')",
        )
        .bind(&update.artifact_id)
        .bind(&update.input_hash)
        .bind(update.spec_hash.as_deref())
        .bind(update.status.as_str())
        .bind(result)
        .bind(update.error.as_deref())
        .bind(now_secs())
        .bind(update.execution_time_ms.unwrap_or(0.0))
        .execute(&mut *write.tx)
        .await
        .map_err(|e| {
            ForgeError::DatabaseError(format!(
                "Failed to store artifact {}: {e}",
                update.artifact_id
            ))
        })?;
        write.commit().await
    }

    /// Bumps `skip_count` only. Returns false when the artifact has no row.
    pub async fn record_skip(&self, artifact_id: &str) -> Result<bool> {
        let mut write = self.begin_write().await?;
        let affected = sqlx::query(
            "UPDATE artifacts
             SET skip_count = skip_count + 1, updated_at = unixepoch('now')
             WHERE id = ?",
        )
        .bind(artifact_id)
        .execute(&mut *write.tx)
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Failed to record skip: {e}")))?
        .rows_affected();
        write.commit().await?;
        Ok(affected > 0)
    }

    /// Removes the row and every provenance edge touching it.
    pub async fn delete(&self, artifact_id: &str) -> Result<bool> {
        let mut write = self.begin_write().await?;
        sqlx::query("DELETE FROM provenance WHERE from_id = ? OR to_id = ?")
            .bind(artifact_id)
            .bind(artifact_id)
            .execute(&mut *write.tx)
            .await
            .map_err(|e| ForgeError::DatabaseError(format!("Failed to delete provenance: {e}")))?;
        let affected = sqlx::query("DELETE FROM artifacts WHERE id = ?")
            .bind(artifact_id)
            .execute(&mut *write.tx)
            .await
            .map_err(|e| ForgeError::DatabaseError(format!("Failed to delete artifact: {e}")))?
            .rows_affected();
        write.commit().await?;
        Ok(affected > 0)
    }
}
