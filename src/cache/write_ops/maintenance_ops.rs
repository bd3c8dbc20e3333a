use tracing::info;

use crate::cache::ExecutionCache;
use crate::error::{ForgeError, Result};

impl ExecutionCache {
    /// Drops every artifact, edge, run and goal record. Metadata survives.
    pub async fn clear(&self) -> Result<()> {
        let mut write = self.begin_write().await?;
        for table in ["artifacts", "provenance", "execution_runs", "goal_executions"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *write.tx)
                .await
                .map_err(|e| ForgeError::DatabaseError(format!("Failed to clear {table}: {e}")))?;
        }
        write.commit().await?;
        info!("Cleared execution cache");
        Ok(())
    }

    /// VACUUM cannot run inside a transaction, so this only takes the lock.
    pub async fn vacuum(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("VACUUM")
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(|e| ForgeError::DatabaseError(format!("Failed to vacuum cache: {e}")))
    }

    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        let mut write = self.begin_write().await?;
        sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut *write.tx)
            .await
            .map_err(|e| ForgeError::DatabaseError(format!("Failed to write metadata {key}: {e}")))?;
        write.commit().await
    }
}
