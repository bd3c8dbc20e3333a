use std::collections::HashSet;

use indexmap::IndexSet;
use tracing::{debug, info, warn};

use crate::artifact_graph::ArtifactGraph;
use crate::config::DiscoveryLimits;
use crate::error::Result;
use crate::ports::Proposer;
use crate::types::ArtifactSpec;

/// Asks the proposer whether creating `just_created` revealed missing
/// artifacts. Anything already completed is filtered out.
pub async fn discover_new_artifacts<P: Proposer + ?Sized>(
    proposer: &P,
    goal: &str,
    completed: &[String],
    just_created: &ArtifactSpec,
) -> Result<Vec<ArtifactSpec>> {
    let proposed = proposer.discover_new(goal, completed, just_created).await?;
    let completed: HashSet<&str> = completed.iter().map(String::as_str).collect();
    Ok(proposed
        .into_iter()
        .filter(|spec| !completed.contains(spec.id()))
        .collect())
}

/// Grows a graph while it executes. The proposer is asked after every created
/// artifact; only rounds that merge something count against
/// `max_discovery_rounds`, and the graph never grows past `max_artifacts`.
pub struct DynamicDiscovery<'p, P: Proposer + ?Sized> {
    proposer: &'p P,
    goal: String,
    limits: DiscoveryLimits,
    rounds_used: u32,
    completed: IndexSet<String>,
}

impl<'p, P: Proposer + ?Sized> DynamicDiscovery<'p, P> {
    pub fn new(proposer: &'p P, goal: impl Into<String>, limits: DiscoveryLimits) -> Self {
        Self {
            proposer,
            goal: goal.into(),
            limits,
            rounds_used: 0,
            completed: IndexSet::new(),
        }
    }

    #[must_use]
    pub const fn rounds_used(&self) -> u32 {
        self.rounds_used
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.rounds_used >= self.limits.max_discovery_rounds
    }

    /// Records `just_created` as done and merges whatever the proposer says
    /// is now missing. Returns the merged ids; a round that would introduce a
    /// cycle or exceed `max_artifacts` is discarded.
    pub async fn after_artifact(
        &mut self,
        graph: &mut ArtifactGraph,
        just_created: &ArtifactSpec,
    ) -> Result<Vec<String>> {
        self.completed.insert(just_created.id().to_string());
        if self.is_exhausted() {
            debug!(rounds = self.rounds_used, "Dynamic discovery budget exhausted");
            return Ok(Vec::new());
        }

        let completed: Vec<String> = self.completed.iter().cloned().collect();
        let found =
            discover_new_artifacts(self.proposer, &self.goal, &completed, just_created).await?;
        if found.is_empty() {
            return Ok(Vec::new());
        }

        let known: HashSet<String> = graph
            .ids()
            .map(str::to_string)
            .chain(found.iter().map(|spec| spec.id().to_string()))
            .collect();
        let additions: Vec<ArtifactSpec> = found
            .into_iter()
            .map(|spec| spec.retain_requires(|required| known.contains(required)))
            .collect();

        let mut candidate = graph.clone();
        let merged = candidate.merge(additions);
        if let Some(cycle) = candidate.detect_cycle() {
            warn!(
                cycle = %cycle.join(" -> "),
                "Discarding discovered artifacts that would create a cycle"
            );
            return Ok(Vec::new());
        }
        if candidate.len() > self.limits.max_artifacts {
            warn!(
                count = candidate.len(),
                limit = self.limits.max_artifacts,
                discovered = %merged.join(", "),
                "Discarding discovered artifacts that would exceed the artifact limit"
            );
            return Ok(Vec::new());
        }

        *graph = candidate;
        self.rounds_used += 1;
        info!(
            round = self.rounds_used,
            merged = %merged.join(", "),
            "Merged newly discovered artifacts"
        );
        Ok(merged)
    }
}
