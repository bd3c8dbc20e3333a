use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{ExecutionStatus, GoalHash, RunStatus};

/// One cached artifact execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedExecution {
    pub artifact_id: String,
    pub input_hash: String,
    pub spec_hash: Option<String>,
    pub status: ExecutionStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    /// Unix seconds.
    pub executed_at: f64,
    pub execution_time_ms: f64,
    pub skip_count: u32,
    pub created_at: Option<f64>,
    pub updated_at: Option<f64>,
}

/// Upsert payload for [`crate::cache::ExecutionCache::set`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionUpdate {
    pub artifact_id: String,
    pub input_hash: String,
    pub status: ExecutionStatus,
    pub result: Option<Value>,
    pub execution_time_ms: Option<f64>,
    pub spec_hash: Option<String>,
    pub error: Option<String>,
}

impl ExecutionUpdate {
    pub fn new(
        artifact_id: impl Into<String>,
        input_hash: impl Into<String>,
        status: ExecutionStatus,
    ) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            input_hash: input_hash.into(),
            status,
            result: None,
            execution_time_ms: None,
            spec_hash: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    #[must_use]
    pub const fn with_execution_time_ms(mut self, millis: f64) -> Self {
        self.execution_time_ms = Some(millis);
        self
    }

    #[must_use]
    pub fn with_spec_hash(mut self, spec_hash: impl Into<String>) -> Self {
        self.spec_hash = Some(spec_hash.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvenanceEdge {
    pub from_id: String,
    pub to_id: String,
    pub relation: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub executed: u32,
    pub skipped: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRun {
    pub id: String,
    pub started_at: f64,
    pub finished_at: Option<f64>,
    pub total_artifacts: u32,
    pub summary: RunSummary,
    pub status: RunStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalExecution {
    pub goal_hash: GoalHash,
    pub artifact_ids: Vec<String>,
    pub executed_at: f64,
    pub execution_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub by_status: HashMap<ExecutionStatus, u64>,
    pub total_artifacts: u64,
    pub total_skips: u64,
    pub avg_execution_time_ms: f64,
    pub estimated_time_saved_ms: f64,
    /// Skipped rows over total rows, in `[0, 1]`.
    pub cache_hit_rate: f64,
}

impl CacheStats {
    #[must_use]
    pub fn count(&self, status: ExecutionStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}
