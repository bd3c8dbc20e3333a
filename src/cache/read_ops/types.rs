use sqlx::FromRow;

#[derive(FromRow)]
pub(crate) struct ArtifactRow {
    pub(crate) id: String,
    pub(crate) input_hash: String,
    pub(crate) spec_hash: Option<String>,
    pub(crate) status: String,
    pub(crate) result: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) executed_at: f64,
    pub(crate) execution_time_ms: Option<f64>,
    pub(crate) skip_count: Option<i64>,
    pub(crate) created_at: Option<f64>,
    pub(crate) updated_at: Option<f64>,
}

#[derive(FromRow)]
pub(crate) struct ProvenanceRow {
    pub(crate) from_id: String,
    pub(crate) to_id: String,
    pub(crate) relation: Option<String>,
}

#[derive(FromRow)]
pub(crate) struct ExecutionRunRow {
    pub(crate) id: String,
    pub(crate) started_at: f64,
    pub(crate) finished_at: Option<f64>,
    pub(crate) total_artifacts: Option<i64>,
    pub(crate) executed: Option<i64>,
    pub(crate) skipped: Option<i64>,
    pub(crate) failed: Option<i64>,
    pub(crate) status: Option<String>,
}

#[derive(FromRow)]
pub(crate) struct GoalExecutionRow {
    pub(crate) goal_hash: String,
    pub(crate) artifact_ids: String,
    pub(crate) executed_at: f64,
    pub(crate) execution_time_ms: Option<f64>,
}

#[derive(FromRow)]
pub(crate) struct StatusCountRow {
    pub(crate) status: String,
    pub(crate) count: i64,
}

#[derive(FromRow)]
pub(crate) struct TotalsRow {
    pub(crate) total: i64,
    pub(crate) total_skips: i64,
    pub(crate) avg_time: f64,
}
