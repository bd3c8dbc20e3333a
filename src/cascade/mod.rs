#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

mod contracts;
mod execution;
mod tasks;
mod weakness;

pub use contracts::{extract_contract, parse_contract, ExtractedContract};
pub use execution::{CascadeExecution, WaveConfidence, CONTINUE_THRESHOLD};
pub use tasks::{RegenerationTask, TaskMode, VERIFY_TASK_ID};
pub use weakness::{WeaknessScore, WeaknessSignal, WeaknessType, CRITICAL_SEVERITY};

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};

use futures_util::future::join_all;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifact_graph::ArtifactGraph;
use crate::cache::{ExecutionCache, ProvenanceEdge};
use crate::config::CascadeSettings;
use crate::error::{ForgeError, Result};
use crate::ports::{ArtifactRegenerator, VerificationSignal, Verifier};

const LARGE_CASCADE: usize = 20;
const HIGH_FAN_OUT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortLevel {
    Small,
    Medium,
    Large,
    Epic,
}

impl EffortLevel {
    /// Classifies a cascade by the number of artifacts it touches, weak node
    /// included.
    #[must_use]
    pub const fn for_total(total: usize) -> Self {
        match total {
            0..=3 => Self::Small,
            4..=10 => Self::Medium,
            11..=25 => Self::Large,
            _ => Self::Epic,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Epic => "epic",
        }
    }
}

impl fmt::Display for EffortLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What regenerating one weak artifact would touch. Wave 0 is always the
/// weak node alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadePreview {
    pub weak_node: String,
    pub weakness: WeaknessScore,
    pub direct_dependents: BTreeSet<String>,
    /// Disjoint from `direct_dependents`.
    pub transitive_dependents: BTreeSet<String>,
    /// Weak node included.
    pub total_impacted: usize,
    pub estimated_effort: EffortLevel,
    pub files_touched: Vec<String>,
    pub waves: Vec<Vec<String>>,
    pub risk_assessment: String,
    #[serde(default)]
    pub extracted_contracts: Vec<ExtractedContract>,
}

impl CascadePreview {
    #[must_use]
    pub fn contract_for(&self, artifact_id: &str) -> Option<&ExtractedContract> {
        self.extracted_contracts
            .iter()
            .find(|contract| contract.artifact_id == artifact_id)
    }
}

/// Computes cascade previews over an artifact graph and drives their
/// wave-by-wave execution.
pub struct CascadeEngine<'g> {
    graph: &'g ArtifactGraph,
    project_root: PathBuf,
    settings: CascadeSettings,
    /// Recorded provenance, dependency id -> dependents.
    provenance_dependents: HashMap<String, IndexSet<String>>,
    /// Recorded provenance, dependent id -> dependencies.
    provenance_requires: HashMap<String, IndexSet<String>>,
}

impl<'g> CascadeEngine<'g> {
    pub fn new(
        graph: &'g ArtifactGraph,
        project_root: impl Into<PathBuf>,
        settings: CascadeSettings,
    ) -> Self {
        Self {
            graph,
            project_root: project_root.into(),
            settings,
            provenance_dependents: HashMap::new(),
            provenance_requires: HashMap::new(),
        }
    }

    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Merges recorded provenance edges into the dependency view, so
    /// relations the graph does not declare still propagate a cascade.
    #[must_use]
    pub fn with_provenance(mut self, edges: &[ProvenanceEdge]) -> Self {
        for edge in edges {
            self.provenance_dependents
                .entry(edge.to_id.clone())
                .or_default()
                .insert(edge.from_id.clone());
            self.provenance_requires
                .entry(edge.from_id.clone())
                .or_default()
                .insert(edge.to_id.clone());
        }
        self
    }

    pub async fn load_provenance(self, cache: &ExecutionCache) -> Result<Self> {
        let edges = cache.provenance_edges().await?;
        debug!(edges = edges.len(), "Loaded provenance snapshot");
        Ok(self.with_provenance(&edges))
    }

    /// Score skeleton for `artifact_id` with fan-out and depth taken from
    /// the graph.
    #[must_use]
    pub fn weakness_score(&self, artifact_id: &str, signals: Vec<WeaknessSignal>) -> WeaknessScore {
        let file_path = self
            .graph
            .get(artifact_id)
            .and_then(|spec| spec.produces_file())
            .unwrap_or(artifact_id);
        WeaknessScore {
            artifact_id: artifact_id.to_string(),
            file_path: PathBuf::from(file_path),
            signals,
            fan_out: self.dependents(artifact_id).len(),
            depth: self.graph.artifact_depth(artifact_id).unwrap_or(0),
        }
    }

    fn dependents(&self, artifact_id: &str) -> IndexSet<String> {
        let mut dependents: IndexSet<String> = self.graph.dependents(artifact_id).into_iter().collect();
        if let Some(recorded) = self.provenance_dependents.get(artifact_id) {
            dependents.extend(recorded.iter().cloned());
        }
        dependents
    }

    fn dependencies(&self, artifact_id: &str) -> HashSet<String> {
        let mut dependencies: HashSet<String> = self.graph.dependencies(artifact_id).into_iter().collect();
        if let Some(recorded) = self.provenance_requires.get(artifact_id) {
            dependencies.extend(recorded.iter().cloned());
        }
        dependencies
    }

    /// Everything that transitively depends on `weak_id`, breadth first,
    /// excluding `weak_id` itself.
    fn find_impacted(&self, weak_id: &str) -> IndexSet<String> {
        let mut seen: IndexSet<String> = IndexSet::from([weak_id.to_string()]);
        let mut queue = VecDeque::from([weak_id.to_string()]);
        while let Some(current) = queue.pop_front() {
            for dependent in self.dependents(&current) {
                if seen.insert(dependent.clone()) {
                    queue.push_back(dependent);
                }
            }
        }
        seen.shift_remove(weak_id);
        seen
    }

    fn compute_waves(&self, weak_id: &str, impacted: &IndexSet<String>) -> Vec<Vec<String>> {
        let scope: HashSet<&str> = impacted
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(weak_id))
            .collect();
        let in_scope_deps: HashMap<&str, HashSet<String>> = impacted
            .iter()
            .map(|id| {
                let deps = self
                    .dependencies(id)
                    .into_iter()
                    .filter(|dep| scope.contains(dep.as_str()))
                    .collect();
                (id.as_str(), deps)
            })
            .collect();

        let mut waves = vec![vec![weak_id.to_string()]];
        let mut placed: HashSet<String> = HashSet::from([weak_id.to_string()]);
        let mut remaining: Vec<&str> = impacted.iter().map(String::as_str).collect();

        while !remaining.is_empty() {
            let (mut ready, blocked): (Vec<&str>, Vec<&str>) = remaining.into_iter().partition(|id| {
                in_scope_deps
                    .get(id)
                    .is_none_or(|deps| deps.iter().all(|dep| placed.contains(dep)))
            });

            if ready.is_empty() {
                let mut rest: Vec<String> = blocked.iter().map(|id| (*id).to_string()).collect();
                rest.sort();
                warn!(
                    weak_node = weak_id,
                    remaining = %rest.join(", "),
                    "Cascade waves cannot make progress; scheduling the rest as one final wave"
                );
                waves.push(rest);
                break;
            }

            ready.sort_unstable();
            placed.extend(ready.iter().map(|id| (*id).to_string()));
            waves.push(ready.into_iter().map(str::to_string).collect());
            remaining = blocked;
        }
        waves
    }

    fn assess_risk(weakness: &WeaknessScore, impacted: usize) -> String {
        let mut factors = Vec::new();
        if impacted > LARGE_CASCADE {
            factors.push(format!("Large cascade ({impacted} files)"));
        }
        if weakness.fan_out > HIGH_FAN_OUT {
            factors.push(format!("High fan-out ({} dependents)", weakness.fan_out));
        }
        let critical: Vec<&str> = weakness
            .critical_signals()
            .map(|signal| signal.weakness_type.as_str())
            .collect();
        if !critical.is_empty() {
            factors.push(format!("Critical weaknesses: {}", critical.join(", ")));
        }

        if factors.is_empty() {
            "Low risk: Small, isolated change".to_string()
        } else {
            factors.join(" | ")
        }
    }

    fn file_for(&self, artifact_id: &str) -> Option<String> {
        self.graph
            .get(artifact_id)
            .and_then(|spec| spec.produces_file())
            .map(str::to_string)
    }

    fn contract_path(&self, artifact_id: &str) -> PathBuf {
        let relative = self.file_for(artifact_id).unwrap_or_else(|| artifact_id.to_string());
        self.project_root.join(relative)
    }

    #[must_use]
    pub fn preview(&self, weakness: &WeaknessScore) -> CascadePreview {
        let weak_id = weakness.artifact_id.as_str();
        let direct: BTreeSet<String> = self.dependents(weak_id).into_iter().collect();
        let impacted = self.find_impacted(weak_id);
        let transitive: BTreeSet<String> = impacted
            .iter()
            .filter(|id| !direct.contains(*id))
            .cloned()
            .collect();
        let waves = self.compute_waves(weak_id, &impacted);

        let files_touched: Vec<String> = std::iter::once(
            self.file_for(weak_id).unwrap_or_else(|| weak_id.to_string()),
        )
        .chain(impacted.iter().filter_map(|id| self.file_for(id)))
        .collect();

        let total_impacted = impacted.len() + 1;
        let preview = CascadePreview {
            weak_node: weak_id.to_string(),
            weakness: weakness.clone(),
            direct_dependents: direct,
            transitive_dependents: transitive,
            total_impacted,
            estimated_effort: EffortLevel::for_total(total_impacted),
            files_touched,
            waves,
            risk_assessment: Self::assess_risk(weakness, impacted.len()),
            extracted_contracts: Vec::new(),
        };
        info!(
            weak_node = weak_id,
            impacted = total_impacted,
            waves = preview.waves.len(),
            effort = %preview.estimated_effort,
            "Computed cascade preview"
        );
        preview
    }

    /// [`Self::preview`] plus interface snapshots of the weak node and its
    /// direct dependents. Unreadable files are skipped.
    pub async fn preview_with_contracts(&self, weakness: &WeaknessScore) -> CascadePreview {
        let mut preview = self.preview(weakness);
        let candidates: Vec<String> = std::iter::once(preview.weak_node.clone())
            .chain(preview.direct_dependents.iter().cloned())
            .filter(|id| self.graph.contains(id))
            .collect();

        for artifact_id in candidates {
            match extract_contract(&artifact_id, &self.contract_path(&artifact_id)).await {
                Ok(contract) => preview.extracted_contracts.push(contract),
                Err(e) => debug!(artifact_id, error = %e, "Skipping contract extraction"),
            }
        }
        preview
    }

    #[must_use]
    pub fn compute_regeneration_tasks(&self, preview: &CascadePreview) -> Vec<RegenerationTask> {
        preview.regeneration_tasks()
    }

    /// # Errors
    ///
    /// Returns `ForgeError::CascadeError` when the preview touches more
    /// artifacts, or needs more waves after the first, than configured.
    pub fn check_limits(&self, preview: &CascadePreview) -> Result<()> {
        if preview.total_impacted > self.settings.max_cascade_size {
            return Err(ForgeError::CascadeError(format!(
                "Cascade of {} artifacts exceeds limit of {}",
                preview.total_impacted, self.settings.max_cascade_size
            )));
        }
        let depth = preview.waves.len().saturating_sub(1);
        if depth > self.settings.max_cascade_depth {
            return Err(ForgeError::CascadeError(format!(
                "Cascade depth {depth} exceeds limit of {}",
                self.settings.max_cascade_depth
            )));
        }
        Ok(())
    }

    /// Runs waves until one needs approval, the callback declines, or the
    /// cascade completes.
    ///
    /// # Errors
    ///
    /// Only [`Self::check_limits`] failures; verification problems are
    /// recorded as wave confidence.
    pub async fn execute_wave_by_wave<R, V, F>(
        &self,
        preview: CascadePreview,
        auto_approve: bool,
        regenerator: &R,
        verifier: &V,
        on_wave_complete: F,
    ) -> Result<CascadeExecution>
    where
        R: ArtifactRegenerator + ?Sized,
        V: Verifier + ?Sized,
        F: FnMut(&WaveConfidence) -> bool,
    {
        self.check_limits(&preview)?;
        let mut execution = CascadeExecution::new(preview, auto_approve, &self.settings);
        info!(
            weak_node = %execution.preview.weak_node,
            waves = execution.preview.waves.len(),
            auto_approve,
            "Starting cascade"
        );
        self.run_waves(&mut execution, regenerator, verifier, on_wave_complete)
            .await;
        Ok(execution)
    }

    /// Continues a paused execution from its next wave.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::CascadeError` if the execution is still waiting
    /// for [`CascadeExecution::approve_wave`].
    pub async fn resume<R, V, F>(
        &self,
        execution: &mut CascadeExecution,
        regenerator: &R,
        verifier: &V,
        on_wave_complete: F,
    ) -> Result<()>
    where
        R: ArtifactRegenerator + ?Sized,
        V: Verifier + ?Sized,
        F: FnMut(&WaveConfidence) -> bool,
    {
        if execution.is_finished() {
            return Ok(());
        }
        if execution.paused_for_approval {
            return Err(ForgeError::CascadeError(format!(
                "Wave {} is awaiting approval",
                execution.current_wave
            )));
        }
        self.run_waves(execution, regenerator, verifier, on_wave_complete)
            .await;
        Ok(())
    }

    async fn run_waves<R, V, F>(
        &self,
        execution: &mut CascadeExecution,
        regenerator: &R,
        verifier: &V,
        mut on_wave_complete: F,
    ) where
        R: ArtifactRegenerator + ?Sized,
        V: Verifier + ?Sized,
        F: FnMut(&WaveConfidence) -> bool,
    {
        let tasks = execution.preview.regeneration_tasks();
        let waves = execution.preview.waves.clone();
        let snapshots: HashMap<String, ExtractedContract> = execution
            .preview
            .extracted_contracts
            .iter()
            .map(|contract| (contract.artifact_id.clone(), contract.clone()))
            .collect();

        for (wave_num, wave) in waves.iter().enumerate().skip(execution.next_wave()) {
            execution.current_wave = wave_num;
            let wave_tasks: Vec<&RegenerationTask> = tasks
                .iter()
                .filter(|task| task.wave == Some(wave_num))
                .collect();
            let failures = regenerate_wave(regenerator, &wave_tasks).await;

            let tests = if failures.is_empty() {
                signal_or_fail(verifier.run_tests(&self.project_root).await)
            } else {
                VerificationSignal::fail(failures.join("; "))
            };
            let types = signal_or_fail(verifier.type_check(&self.project_root).await);
            let lint = signal_or_fail(verifier.lint(&self.project_root).await);
            let contracts_preserved = self.contracts_preserved(&snapshots, wave).await;

            let confidence = WaveConfidence::compute(
                wave_num,
                wave.clone(),
                &tests,
                &types,
                &lint,
                contracts_preserved,
            );
            info!(
                wave = wave_num,
                confidence = confidence.confidence,
                deductions = %confidence.deductions.join(", "),
                "Cascade wave verified"
            );
            execution.record_wave_completion(confidence.clone());

            if !on_wave_complete(&confidence) {
                execution.abort("User cancelled");
                break;
            }
            if execution.escalated_to_human {
                warn!(wave = wave_num, "Cascade escalated for human review");
            }
            if execution.paused_for_approval || execution.is_finished() {
                break;
            }
        }
    }

    /// True unless some artifact in `wave` lost part of its snapshot
    /// interface. Artifacts that cannot be re-read count as preserved.
    async fn contracts_preserved(
        &self,
        snapshots: &HashMap<String, ExtractedContract>,
        wave: &[String],
    ) -> bool {
        for artifact_id in wave {
            let Some(original) = snapshots.get(artifact_id) else {
                continue;
            };
            match extract_contract(artifact_id, &self.contract_path(artifact_id)).await {
                Ok(current) if !original.is_compatible_with(&current) => {
                    warn!(artifact_id = %artifact_id, "Public interface changed during cascade");
                    return false;
                }
                Ok(_) => {}
                Err(e) => debug!(artifact_id = %artifact_id, error = %e, "Cannot verify contract"),
            }
        }
        true
    }
}

async fn regenerate_wave<R: ArtifactRegenerator + ?Sized>(
    regenerator: &R,
    tasks: &[&RegenerationTask],
) -> Vec<String> {
    let outcomes = join_all(tasks.iter().map(|task| regenerator.regenerate(task))).await;
    tasks
        .iter()
        .zip(outcomes)
        .filter_map(|(task, outcome)| {
            outcome.err().map(|e| {
                let target = task.artifact_id.as_deref().unwrap_or(task.id.as_str());
                warn!(artifact_id = target, error = %e, "Regeneration failed");
                format!("{target}: {e}")
            })
        })
        .collect()
}

fn signal_or_fail(result: Result<VerificationSignal>) -> VerificationSignal {
    result.unwrap_or_else(|e| VerificationSignal::fail(e.to_string()))
}
