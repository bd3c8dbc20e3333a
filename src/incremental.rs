#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;

use futures_util::future::join_all;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::artifact_graph::ArtifactGraph;
use crate::cache::{ExecutionCache, ExecutionUpdate, RunSummary};
use crate::error::Result;
use crate::hashing::{compute_goal_hash, compute_input_hash, compute_spec_hash, UNKNOWN_HASH};
use crate::ports::ArtifactCreator;
use crate::types::{ArtifactSpec, ExecutionStatus, RunId, RunStatus};

/// Why an artifact was, or was not, skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UnchangedSuccess,
    NoCache,
    HashChanged,
    PreviousFailed,
    ForceRerun,
    PreviousIncomplete,
}

impl SkipReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UnchangedSuccess => "unchanged_success",
            Self::NoCache => "no_cache",
            Self::HashChanged => "hash_changed",
            Self::PreviousFailed => "previous_failed",
            Self::ForceRerun => "force_rerun",
            Self::PreviousIncomplete => "previous_incomplete",
        }
    }

    #[must_use]
    pub const fn can_skip(&self) -> bool {
        matches!(self, Self::UnchangedSuccess)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkipDecision {
    pub artifact_id: String,
    pub can_skip: bool,
    pub reason: SkipReason,
    pub current_hash: String,
    pub previous_hash: Option<String>,
    #[serde(skip)]
    pub cached_result: Option<Value>,
}

impl SkipDecision {
    fn new(spec: &ArtifactSpec, reason: SkipReason, current_hash: String) -> Self {
        Self {
            artifact_id: spec.id().to_string(),
            can_skip: reason.can_skip(),
            reason,
            current_hash,
            previous_hash: None,
            cached_result: None,
        }
    }

    fn with_previous(mut self, previous_hash: &str) -> Self {
        self.previous_hash = Some(previous_hash.to_string());
        self
    }
}

/// Skip only when a completed (or skipped) row exists with the same input
/// hash and no rerun was forced.
pub async fn should_skip(
    spec: &ArtifactSpec,
    cache: &ExecutionCache,
    dependency_hashes: &HashMap<String, String>,
    force_rerun: bool,
) -> Result<SkipDecision> {
    let current_hash = compute_input_hash(spec, dependency_hashes);
    if force_rerun {
        return Ok(SkipDecision::new(spec, SkipReason::ForceRerun, current_hash));
    }

    let Some(cached) = cache.get(spec.id()).await? else {
        return Ok(SkipDecision::new(spec, SkipReason::NoCache, current_hash));
    };

    let decision = match cached.status {
        ExecutionStatus::Failed => SkipDecision::new(spec, SkipReason::PreviousFailed, current_hash),
        ExecutionStatus::Pending | ExecutionStatus::Running => {
            SkipDecision::new(spec, SkipReason::PreviousIncomplete, current_hash)
        }
        ExecutionStatus::Completed | ExecutionStatus::Skipped
            if cached.input_hash != current_hash =>
        {
            SkipDecision::new(spec, SkipReason::HashChanged, current_hash)
        }
        ExecutionStatus::Completed | ExecutionStatus::Skipped => {
            let mut decision = SkipDecision::new(spec, SkipReason::UnchangedSuccess, current_hash);
            decision.cached_result = cached.result.clone();
            decision
        }
    };
    Ok(decision.with_previous(&cached.input_hash))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionPlan {
    pub to_execute: Vec<String>,
    pub to_skip: Vec<String>,
    pub decisions: IndexMap<String, SkipDecision>,
    pub computed_hashes: HashMap<String, String>,
}

impl ExecutionPlan {
    #[must_use]
    pub fn total(&self) -> usize {
        self.to_execute.len() + self.to_skip.len()
    }

    /// Share of artifacts that will be skipped, in percent.
    #[must_use]
    pub fn skip_percentage(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        self.to_skip.len() as f64 / self.total() as f64 * 100.0
    }

    #[must_use]
    pub fn will_execute(&self, artifact_id: &str) -> bool {
        self.to_execute.iter().any(|id| id == artifact_id)
    }
}

/// Stored as the cached result of a completed artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactOutput {
    pub artifact_id: String,
    pub content: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncrementalResult {
    pub run_id: RunId,
    pub completed: IndexMap<String, ArtifactOutput>,
    pub failed: IndexMap<String, String>,
    pub skipped: IndexMap<String, Option<Value>>,
    pub duration_ms: f64,
}

impl IncrementalResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len() + self.skipped.len()
    }

    fn summary(&self) -> RunSummary {
        let count = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
        RunSummary {
            executed: count(self.completed.len()),
            skipped: count(self.skipped.len()),
            failed: count(self.failed.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactAnalysis {
    pub artifact: String,
    pub direct_dependents: Vec<String>,
    pub transitive_dependents: Vec<String>,
    pub will_invalidate: Vec<String>,
}

/// Runs an artifact graph wave by wave, skipping artifacts whose inputs are
/// unchanged since their last successful execution.
pub struct IncrementalExecutor<'a> {
    graph: &'a ArtifactGraph,
    cache: &'a ExecutionCache,
    goal: Option<String>,
}

impl<'a> IncrementalExecutor<'a> {
    #[must_use]
    pub const fn new(graph: &'a ArtifactGraph, cache: &'a ExecutionCache) -> Self {
        Self {
            graph,
            cache,
            goal: None,
        }
    }

    /// Record the executed artifact ids under this goal's hash after each run.
    #[must_use]
    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    /// Mirrors every `requires` edge into the cache's provenance table.
    pub async fn sync_provenance(&self) -> Result<()> {
        let edges: Vec<(String, String)> = self
            .graph
            .specs()
            .flat_map(|spec| {
                spec.requires()
                    .iter()
                    .map(|required| (spec.id().to_string(), required.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        self.cache.add_provenance_edges(&edges).await
    }

    /// Hashes artifacts in dependency order so each input hash folds in the
    /// hashes of everything it requires.
    ///
    /// # Errors
    ///
    /// Fails on a cyclic graph or a cache read error.
    pub async fn plan_execution(&self, force_rerun: &HashSet<String>) -> Result<ExecutionPlan> {
        let mut plan = ExecutionPlan::default();

        for artifact_id in self.graph.topological_sort()? {
            let Some(spec) = self.graph.get(&artifact_id) else {
                continue;
            };
            let dependency_hashes: HashMap<String, String> = spec
                .requires()
                .iter()
                .map(|required| {
                    let hash = plan
                        .computed_hashes
                        .get(required)
                        .cloned()
                        .unwrap_or_else(|| UNKNOWN_HASH.to_string());
                    (required.clone(), hash)
                })
                .collect();

            let decision = should_skip(
                spec,
                self.cache,
                &dependency_hashes,
                force_rerun.contains(&artifact_id),
            )
            .await?;
            debug!(artifact_id, reason = %decision.reason, "Skip decision");

            plan.computed_hashes
                .insert(artifact_id.clone(), decision.current_hash.clone());
            if decision.can_skip {
                plan.to_skip.push(artifact_id.clone());
            } else {
                plan.to_execute.push(artifact_id.clone());
            }
            plan.decisions.insert(artifact_id, decision);
        }

        Ok(plan)
    }

    pub async fn execute<C: ArtifactCreator + ?Sized>(
        &self,
        creator: &C,
        force_rerun: &HashSet<String>,
    ) -> Result<IncrementalResult> {
        let started = Instant::now();
        let run_id = RunId::generate();

        self.sync_provenance().await?;
        let plan = self.plan_execution(force_rerun).await?;
        self.cache.start_run(&run_id, plan.total()).await?;
        info!(
            run_id = %run_id,
            cached = plan.to_skip.len(),
            to_execute = plan.to_execute.len(),
            "Starting incremental run"
        );

        let mut result = IncrementalResult {
            run_id: run_id.clone(),
            completed: IndexMap::new(),
            failed: IndexMap::new(),
            skipped: IndexMap::new(),
            duration_ms: 0.0,
        };

        if let Err(error) = self.run_plan(creator, &plan, &mut result).await {
            result.duration_ms = started.elapsed().as_secs_f64() * 1000.0;
            warn!(run_id = %run_id, error = %error, "Incremental run aborted by cache failure");
            if let Err(finish_error) = self
                .cache
                .finish_run(&run_id, result.summary(), RunStatus::Failed)
                .await
            {
                warn!(run_id = %run_id, error = %finish_error, "Could not mark aborted run as failed");
            }
            return Err(error);
        }

        result.duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        let status = if result.success() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        self.cache
            .finish_run(&run_id, result.summary(), status)
            .await?;

        if let Some(goal) = &self.goal {
            let ids: Vec<String> = plan.decisions.keys().cloned().collect();
            self.cache
                .record_goal_execution(&compute_goal_hash(goal), &ids, Some(result.duration_ms))
                .await?;
        }

        info!(
            run_id = %run_id,
            completed = result.completed.len(),
            skipped = result.skipped.len(),
            failed = result.failed.len(),
            "Incremental run finished"
        );
        Ok(result)
    }

    /// Records skips, then executes the plan wave by wave into `result`. Every
    /// outcome of a wave is recorded before the first cache error is returned.
    async fn run_plan<C: ArtifactCreator + ?Sized>(
        &self,
        creator: &C,
        plan: &ExecutionPlan,
        result: &mut IncrementalResult,
    ) -> Result<()> {
        for artifact_id in &plan.to_skip {
            let cached = plan
                .decisions
                .get(artifact_id)
                .and_then(|decision| decision.cached_result.clone());
            result.skipped.insert(artifact_id.clone(), cached);
            self.cache.record_skip(artifact_id).await?;
        }

        for (wave_num, wave) in self.graph.execution_waves().iter().enumerate() {
            let specs: Vec<&ArtifactSpec> = wave
                .iter()
                .filter(|id| plan.will_execute(id))
                .filter_map(|id| self.graph.get(id))
                .collect();
            if specs.is_empty() {
                continue;
            }
            debug!(wave = wave_num, artifacts = specs.len(), "Executing wave");

            let outcomes = join_all(specs.iter().map(|spec| {
                let input_hash = plan
                    .computed_hashes
                    .get(spec.id())
                    .cloned()
                    .unwrap_or_default();
                self.execute_artifact(spec, creator, input_hash)
            }))
            .await;

            let mut cache_error = None;
            for (spec, outcome) in specs.iter().zip(outcomes) {
                match outcome {
                    Ok(Ok(output)) => {
                        result.completed.insert(spec.id().to_string(), output);
                    }
                    Ok(Err(error)) => {
                        result.failed.insert(spec.id().to_string(), error);
                    }
                    Err(error) => {
                        result.failed.insert(spec.id().to_string(), error.to_string());
                        cache_error.get_or_insert(error);
                    }
                }
            }
            if let Some(error) = cache_error {
                return Err(error);
            }
        }
        Ok(())
    }

    /// Outer error: the cache failed. Inner error: the creator failed, already
    /// recorded as a failed row.
    async fn execute_artifact<C: ArtifactCreator + ?Sized>(
        &self,
        spec: &ArtifactSpec,
        creator: &C,
        input_hash: String,
    ) -> Result<std::result::Result<ArtifactOutput, String>> {
        let spec_hash = compute_spec_hash(spec);
        self.cache
            .set(
                ExecutionUpdate::new(spec.id(), &input_hash, ExecutionStatus::Running)
                    .with_spec_hash(&spec_hash),
            )
            .await?;

        let started = Instant::now();
        let created = creator.create(spec).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match created {
            Ok(content) => {
                let output = ArtifactOutput {
                    artifact_id: spec.id().to_string(),
                    content,
                    duration_ms,
                };
                self.cache
                    .set(
                        ExecutionUpdate::new(spec.id(), input_hash, ExecutionStatus::Completed)
                            .with_result(serde_json::to_value(&output)?)
                            .with_execution_time_ms(duration_ms as f64)
                            .with_spec_hash(spec_hash),
                    )
                    .await?;
                Ok(Ok(output))
            }
            Err(e) => {
                let error = e.to_string();
                warn!(artifact_id = spec.id(), error = %error, "Artifact creation failed");
                self.cache
                    .set(
                        ExecutionUpdate::new(spec.id(), input_hash, ExecutionStatus::Failed)
                            .with_execution_time_ms(duration_ms as f64)
                            .with_spec_hash(spec_hash)
                            .with_error(&error),
                    )
                    .await?;
                Ok(Err(error))
            }
        }
    }

    /// What re-running `artifact_id` would invalidate, from recorded provenance.
    pub async fn impact_analysis(&self, artifact_id: &str) -> Result<ImpactAnalysis> {
        self.sync_provenance().await?;
        let direct_dependents = self.cache.get_direct_dependents(artifact_id).await?;
        let transitive_dependents = self.cache.get_downstream(artifact_id, None).await?;

        Ok(ImpactAnalysis {
            artifact: artifact_id.to_string(),
            direct_dependents,
            will_invalidate: transitive_dependents.clone(),
            transitive_dependents,
        })
    }
}
