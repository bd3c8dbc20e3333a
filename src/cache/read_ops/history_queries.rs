use std::collections::HashMap;

use crate::cache::mappers::{parse_execution_run, parse_goal_execution, to_u64_i64};
use crate::cache::{CacheStats, ExecutionCache, ExecutionRun, GoalExecution};
use crate::error::{ForgeError, Result};
use crate::types::{ExecutionStatus, GoalHash, RunId};

use super::types::{ExecutionRunRow, GoalExecutionRow, StatusCountRow, TotalsRow};

impl ExecutionCache {
    pub async fn get_run(&self, run_id: &RunId) -> Result<Option<ExecutionRun>> {
        sqlx::query_as::<_, ExecutionRunRow>(
            "SELECT id, started_at, finished_at, total_artifacts, executed, skipped, failed, status
             FROM execution_runs WHERE id = ?",
        )
        .bind(run_id.value())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Failed to get run {run_id}: {e}")))
        .and_then(|row| row.map(parse_execution_run).transpose())
    }

    /// Most recent runs first.
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<ExecutionRun>> {
        sqlx::query_as::<_, ExecutionRunRow>(
            "SELECT id, started_at, finished_at, total_artifacts, executed, skipped, failed, status
             FROM execution_runs ORDER BY started_at DESC, rowid DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Failed to list runs: {e}")))
        .and_then(|rows| {
            rows.into_iter()
                .map(parse_execution_run)
                .collect::<Result<Vec<_>>>()
        })
    }

    pub async fn get_goal_execution(&self, goal_hash: &GoalHash) -> Result<Option<GoalExecution>> {
        sqlx::query_as::<_, GoalExecutionRow>(
            "SELECT goal_hash, artifact_ids, executed_at, execution_time_ms
             FROM goal_executions WHERE goal_hash = ?",
        )
        .bind(goal_hash.value())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Failed to get goal execution: {e}")))
        .and_then(|row| row.map(parse_goal_execution).transpose())
    }

    pub async fn get_artifacts_for_goal(&self, goal_hash: &GoalHash) -> Result<Option<Vec<String>>> {
        self.get_goal_execution(goal_hash)
            .await
            .map(|execution| execution.map(|execution| execution.artifact_ids))
    }

    pub async fn get_stats(&self) -> Result<CacheStats> {
        let by_status = sqlx::query_as::<_, StatusCountRow>(
            "SELECT status, COUNT(*) AS count FROM artifacts GROUP BY status",
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Failed to count artifacts: {e}")))?
        .into_iter()
        .map(|row| {
            ExecutionStatus::try_from(row.status.as_str())
                .map(|status| (status, to_u64_i64(row.count)))
                .map_err(ForgeError::DatabaseError)
        })
        .collect::<Result<HashMap<_, _>>>()?;

        let totals = sqlx::query_as::<_, TotalsRow>(
            "SELECT
                 COUNT(*) AS total,
                 COALESCE(SUM(skip_count), 0) AS total_skips,
                 COALESCE(
                     (SELECT AVG(execution_time_ms) FROM artifacts WHERE status = 'completed'),
                     0.0
                 ) AS avg_time
             FROM artifacts",
        )
        .fetch_one(self.pool())
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Failed to read cache totals: {e}")))?;

        let total_artifacts = to_u64_i64(totals.total);
        let total_skips = to_u64_i64(totals.total_skips);
        let avg_execution_time_ms = totals.avg_time;
        let estimated_time_saved_ms = if total_skips > 0 && avg_execution_time_ms > 0.0 {
            total_skips as f64 * avg_execution_time_ms
        } else {
            0.0
        };
        let skipped = by_status
            .get(&ExecutionStatus::Skipped)
            .copied()
            .unwrap_or(0);
        let cache_hit_rate = if total_artifacts > 0 {
            skipped as f64 / total_artifacts as f64
        } else {
            0.0
        };

        Ok(CacheStats {
            by_status,
            total_artifacts,
            total_skips,
            avg_execution_time_ms,
            estimated_time_saved_ms,
            cache_hit_rate,
        })
    }

    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| ForgeError::DatabaseError(format!("Failed to read metadata {key}: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use crate::cache::{ExecutionCache, ExecutionUpdate, RunSummary};
    use crate::hashing::compute_goal_hash;
    use crate::types::{ExecutionStatus, RunId, RunStatus};

    #[tokio::test]
    async fn stats_on_empty_cache_are_zero() {
        let cache = ExecutionCache::in_memory().await.unwrap();
        let stats = cache.get_stats().await.unwrap();
        assert_eq!(stats.total_artifacts, 0);
        assert_eq!(stats.total_skips, 0);
        assert!(stats.cache_hit_rate.abs() < f64::EPSILON);
        assert!(stats.estimated_time_saved_ms.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn stats_average_completed_rows_and_estimate_savings() {
        let cache = ExecutionCache::in_memory().await.unwrap();
        cache
            .set(ExecutionUpdate::new("A", "a", ExecutionStatus::Completed).with_execution_time_ms(100.0))
            .await
            .unwrap();
        cache
            .set(ExecutionUpdate::new("B", "b", ExecutionStatus::Completed).with_execution_time_ms(200.0))
            .await
            .unwrap();
        cache
            .set(ExecutionUpdate::new("C", "c", ExecutionStatus::Skipped))
            .await
            .unwrap();
        cache
            .set(ExecutionUpdate::new("D", "d", ExecutionStatus::Failed).with_execution_time_ms(999.0))
            .await
            .unwrap();
        cache.record_skip("A").await.unwrap();
        cache.record_skip("A").await.unwrap();

        let stats = cache.get_stats().await.unwrap();
        assert_eq!(stats.total_artifacts, 4);
        assert_eq!(stats.count(ExecutionStatus::Completed), 2);
        assert_eq!(stats.count(ExecutionStatus::Failed), 1);
        assert_eq!(stats.total_skips, 2);
        assert!((stats.avg_execution_time_ms - 150.0).abs() < 1e-9);
        assert!((stats.estimated_time_saved_ms - 300.0).abs() < 1e-9);
        assert!((stats.cache_hit_rate - 0.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn runs_are_listed_newest_first() {
        let cache = ExecutionCache::in_memory().await.unwrap();
        let first = RunId::new("run-1");
        let second = RunId::new("run-2");
        cache.start_run(&first, 3).await.unwrap();
        cache.start_run(&second, 1).await.unwrap();
        cache
            .finish_run(
                &first,
                RunSummary {
                    executed: 2,
                    skipped: 1,
                    failed: 0,
                },
                RunStatus::Completed,
            )
            .await
            .unwrap();

        let runs = cache.list_runs(10).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, "run-2");
        assert_eq!(runs[0].status, RunStatus::Running);
        assert_eq!(runs[1].status, RunStatus::Completed);
        assert_eq!(runs[1].summary.executed, 2);
    }

    #[tokio::test]
    async fn goal_lookup_misses_cleanly() {
        let cache = ExecutionCache::in_memory().await.unwrap();
        let hash = compute_goal_hash("never ran");
        assert!(cache.get_artifacts_for_goal(&hash).await.unwrap().is_none());
    }
}
