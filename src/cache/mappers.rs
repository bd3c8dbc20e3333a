use crate::error::{ForgeError, Result};
use crate::types::{ExecutionStatus, GoalHash, RunStatus};

use super::models::{CachedExecution, ExecutionRun, GoalExecution, RunSummary};
use super::read_ops::types::{ArtifactRow, ExecutionRunRow, GoalExecutionRow};

/// Current wall-clock time as fractional unix seconds.
pub(super) fn now_secs() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp_micros() as f64 / 1_000_000.0
}

pub(super) fn to_u32_i64(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

pub(super) fn to_u64_i64(value: i64) -> u64 {
    u64::try_from(value.max(0)).unwrap_or(0)
}

pub(super) fn parse_cached_execution(row: ArtifactRow) -> Result<CachedExecution> {
    let status = ExecutionStatus::try_from(row.status.as_str()).map_err(ForgeError::DatabaseError)?;
    let result = row
        .result
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;

    Ok(CachedExecution {
        artifact_id: row.id,
        input_hash: row.input_hash,
        spec_hash: row.spec_hash,
        status,
        result,
        error: row.error,
        executed_at: row.executed_at,
        execution_time_ms: row.execution_time_ms.unwrap_or(0.0),
        skip_count: to_u32_i64(row.skip_count.unwrap_or(0)),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

pub(super) fn parse_execution_run(row: ExecutionRunRow) -> Result<ExecutionRun> {
    let status = row
        .status
        .as_deref()
        .map(RunStatus::try_from)
        .transpose()
        .map_err(ForgeError::DatabaseError)?
        .unwrap_or(RunStatus::Running);

    Ok(ExecutionRun {
        id: row.id,
        started_at: row.started_at,
        finished_at: row.finished_at,
        total_artifacts: to_u32_i64(row.total_artifacts.unwrap_or(0)),
        summary: RunSummary {
            executed: to_u32_i64(row.executed.unwrap_or(0)),
            skipped: to_u32_i64(row.skipped.unwrap_or(0)),
            failed: to_u32_i64(row.failed.unwrap_or(0)),
        },
        status,
    })
}

pub(super) fn parse_goal_execution(row: GoalExecutionRow) -> Result<GoalExecution> {
    let artifact_ids: Vec<String> = serde_json::from_str(&row.artifact_ids)?;
    Ok(GoalExecution {
        goal_hash: GoalHash::new(row.goal_hash),
        artifact_ids,
        executed_at: row.executed_at,
        execution_time_ms: row.execution_time_ms,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::error::ForgeError;

    fn row(status: &str, result: Option<&str>) -> ArtifactRow {
        ArtifactRow {
            id: "A".to_string(),
            input_hash: "h".to_string(),
            spec_hash: None,
            status: status.to_string(),
            result: result.map(str::to_string),
            error: None,
            executed_at: 1.5,
            execution_time_ms: None,
            skip_count: Some(-3),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn malformed_result_json_is_a_serialization_error() {
        let err = parse_cached_execution(row("completed", Some("{not json"))).unwrap_err();
        assert!(matches!(err, ForgeError::SerializationError(_)));
    }

    #[test]
    fn unknown_status_is_a_database_error() {
        let err = parse_cached_execution(row("exploded", None)).unwrap_err();
        assert!(matches!(err, ForgeError::DatabaseError(_)));
    }

    #[test]
    fn negative_counts_clamp_to_zero() {
        let parsed = parse_cached_execution(row("skipped", None)).unwrap();
        assert_eq!(parsed.skip_count, 0);
        assert!(parsed.execution_time_ms.abs() < f64::EPSILON);
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now_secs() > 1_577_836_800.0);
    }
}
