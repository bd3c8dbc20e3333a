use crate::cache::mappers::parse_cached_execution;
use crate::cache::{CachedExecution, ExecutionCache};
use crate::error::{ForgeError, Result};
use crate::types::ExecutionStatus;

use super::types::ArtifactRow;

const ARTIFACT_COLUMNS: &str = "id, input_hash, spec_hash, status, result, error, executed_at, \
     execution_time_ms, skip_count, created_at, updated_at";

impl ExecutionCache {
    pub async fn get(&self, artifact_id: &str) -> Result<Option<CachedExecution>> {
        sqlx::query_as::<_, ArtifactRow>(&format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE id = ?"
        ))
        .bind(artifact_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Failed to get artifact {artifact_id}: {e}")))
        .and_then(|row| row.map(parse_cached_execution).transpose())
    }

    /// Most recent row carrying `input_hash`, whichever artifact it belongs to.
    pub async fn get_by_hash(&self, input_hash: &str) -> Result<Option<CachedExecution>> {
        sqlx::query_as::<_, ArtifactRow>(&format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE input_hash = ?
             ORDER BY executed_at DESC LIMIT 1"
        ))
        .bind(input_hash)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Failed to get artifact by hash: {e}")))
        .and_then(|row| row.map(parse_cached_execution).transpose())
    }

    /// Every cached row, newest execution first, optionally narrowed to one status.
    pub async fn list_artifacts(
        &self,
        status: Option<ExecutionStatus>,
    ) -> Result<Vec<CachedExecution>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, ArtifactRow>(&format!(
                    "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE status = ?
                     ORDER BY executed_at DESC, id ASC"
                ))
                .bind(status.as_str())
                .fetch_all(self.pool())
                .await
            }
            None => {
                sqlx::query_as::<_, ArtifactRow>(&format!(
                    "SELECT {ARTIFACT_COLUMNS} FROM artifacts ORDER BY executed_at DESC, id ASC"
                ))
                .fetch_all(self.pool())
                .await
            }
        };

        rows.map_err(|e| ForgeError::DatabaseError(format!("Failed to list artifacts: {e}")))
            .and_then(|rows| {
                rows.into_iter()
                    .map(parse_cached_execution)
                    .collect::<Result<Vec<_>>>()
            })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use crate::cache::{ExecutionCache, ExecutionUpdate};
    use crate::types::ExecutionStatus;
    use serde_json::json;

    #[tokio::test]
    async fn get_returns_none_for_unknown_ids() {
        let cache = ExecutionCache::in_memory().await.unwrap();
        assert!(cache.get("missing").await.unwrap().is_none());
        assert!(cache.get_by_hash("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_by_hash_finds_the_row() {
        let cache = ExecutionCache::in_memory().await.unwrap();
        cache
            .set(
                ExecutionUpdate::new("A", "hash-a", ExecutionStatus::Completed)
                    .with_result(json!({"content": "a"})),
            )
            .await
            .unwrap();

        let found = cache.get_by_hash("hash-a").await.unwrap().unwrap();
        assert_eq!(found.artifact_id, "A");
        assert_eq!(found.result, Some(json!({"content": "a"})));
    }

    #[tokio::test]
    async fn list_artifacts_filters_by_status() {
        let cache = ExecutionCache::in_memory().await.unwrap();
        cache
            .set(ExecutionUpdate::new("A", "a", ExecutionStatus::Completed))
            .await
            .unwrap();
        cache
            .set(ExecutionUpdate::new("B", "b", ExecutionStatus::Failed).with_error("boom"))
            .await
            .unwrap();

        assert_eq!(cache.list_artifacts(None).await.unwrap().len(), 2);

        let failed = cache
            .list_artifacts(Some(ExecutionStatus::Failed))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].artifact_id, "B");
        assert_eq!(failed[0].error.as_deref(), Some("boom"));
    }
}
