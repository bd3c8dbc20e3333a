use crate::cache::mappers::now_secs;
use crate::cache::{ExecutionCache, RunSummary};
use crate::error::{ForgeError, Result};
use crate::types::{GoalHash, RunId, RunStatus};

impl ExecutionCache {
    pub async fn start_run(&self, run_id: &RunId, total_artifacts: usize) -> Result<()> {
        let total = i64::try_from(total_artifacts).unwrap_or(i64::MAX);
        let mut write = self.begin_write().await?;
        sqlx::query(
            "INSERT INTO execution_runs (id, started_at, total_artifacts, executed, skipped, failed, status)
             VALUES (?, ?, ?, 0, 0, 0, ?)",
        )
        .bind(run_id.value())
        .bind(now_secs())
        .bind(total)
        .bind(RunStatus::Running.as_str())
        .execute(&mut *write.tx)
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Failed to start run {run_id}: {e}")))?;
        write.commit().await
    }

    pub async fn finish_run(
        &self,
        run_id: &RunId,
        summary: RunSummary,
        status: RunStatus,
    ) -> Result<()> {
        let mut write = self.begin_write().await?;
        sqlx::query(
            "UPDATE execution_runs
             SET finished_at = ?, executed = ?, skipped = ?, failed = ?, status = ?
             WHERE id = ?",
        )
        .bind(now_secs())
        .bind(i64::from(summary.executed))
        .bind(i64::from(summary.skipped))
        .bind(i64::from(summary.failed))
        .bind(status.as_str())
        .bind(run_id.value())
        .execute(&mut *write.tx)
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Failed to finish run {run_id}: {e}")))?;
        write.commit().await
    }

    /// Links a goal to the artifacts executed for it, replacing any earlier record.
    pub async fn record_goal_execution(
        &self,
        goal_hash: &GoalHash,
        artifact_ids: &[String],
        execution_time_ms: Option<f64>,
    ) -> Result<()> {
        let ids = serde_json::to_string(artifact_ids)?;
        let mut write = self.begin_write().await?;
        sqlx::query(
            "INSERT OR REPLACE INTO goal_executions
                 (goal_hash, artifact_ids, executed_at, execution_time_ms)
             VALUES (?, ?, ?, ?)",
        )
        .bind(goal_hash.value())
        .bind(ids)
        .bind(now_secs())
        .bind(execution_time_ms)
        .execute(&mut *write.tx)
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Failed to record goal execution: {e}")))?;
        write.commit().await
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use crate::cache::{ExecutionCache, RunSummary};
    use crate::hashing::compute_goal_hash;
    use crate::types::{RunId, RunStatus};

    #[tokio::test]
    async fn run_lifecycle_is_recorded() {
        let cache = ExecutionCache::in_memory().await.unwrap();
        let run_id = RunId::generate();

        cache.start_run(&run_id, 4).await.unwrap();
        let started = cache.get_run(&run_id).await.unwrap().unwrap();
        assert_eq!(started.status, RunStatus::Running);
        assert_eq!(started.total_artifacts, 4);
        assert!(started.finished_at.is_none());
        assert_eq!(started.summary, RunSummary::default());

        let summary = RunSummary {
            executed: 2,
            skipped: 1,
            failed: 1,
        };
        cache
            .finish_run(&run_id, summary, RunStatus::Failed)
            .await
            .unwrap();
        let finished = cache.get_run(&run_id).await.unwrap().unwrap();
        assert_eq!(finished.status, RunStatus::Failed);
        assert_eq!(finished.summary, summary);
        assert!(finished.finished_at.unwrap() >= finished.started_at);
    }

    #[tokio::test]
    async fn goal_executions_are_upserted() {
        let cache = ExecutionCache::in_memory().await.unwrap();
        let hash = compute_goal_hash("build a todo app");

        cache
            .record_goal_execution(&hash, &["A".to_string(), "B".to_string()], Some(10.0))
            .await
            .unwrap();
        cache
            .record_goal_execution(&hash, &["A".to_string(), "B".to_string(), "C".to_string()], None)
            .await
            .unwrap();

        let ids = cache.get_artifacts_for_goal(&hash).await.unwrap().unwrap();
        assert_eq!(ids, vec!["A", "B", "C"]);

        let execution = cache.get_goal_execution(&hash).await.unwrap().unwrap();
        assert_eq!(execution.goal_hash, hash);
        assert!(execution.execution_time_ms.is_none());
    }
}
