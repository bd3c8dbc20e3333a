#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

mod dynamic;

use std::collections::HashSet;
use std::sync::OnceLock;

use itertools::Itertools;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::artifact_graph::ArtifactGraph;
use crate::config::DiscoveryLimits;
use crate::error::{DiscoveryError, DiscoveryFailure};
use crate::ports::Proposer;
use crate::types::ArtifactSpec;

pub use dynamic::{discover_new_artifacts, DynamicDiscovery};

/// Appended to the goal after a proposal came back empty.
pub const EMPTY_RESULT_HINT: &str = "Previous attempt found no artifacts. \
     Be more concrete about what files/components need to be created.";

/// Id of the root added when the proposer cannot supply one.
pub const FALLBACK_ROOT_ID: &str = "Goal";

const ROOT_CANDIDATES: usize = 3;
const DEFAULT_OUTPUT_FILE: &str = "output.py";

fn filename_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(\w+\.(?:py|js|ts|md|txt|json|yaml|yml|rs))\b").ok())
        .as_ref()
}

/// Single-artifact graph for goals too small to decompose.
#[must_use]
pub fn trivial_artifact(goal: &str) -> ArtifactGraph {
    let lowered = goal.to_lowercase();
    let filename = filename_pattern()
        .and_then(|pattern| pattern.captures(&lowered))
        .and_then(|captures| captures.get(1))
        .map_or(DEFAULT_OUTPUT_FILE, |found| found.as_str())
        .to_string();

    let spec = ArtifactSpec::new("main", goal, goal)
        .with_produces_file(filename)
        .with_domain_type("file");

    let mut graph = ArtifactGraph::new();
    graph.upsert(spec);
    graph
}

/// Turns a goal into a valid, acyclic [`ArtifactGraph`] by driving a
/// [`Proposer`] through a bounded retry loop.
pub struct DiscoveryRecovery<'p, P: Proposer + ?Sized> {
    proposer: &'p P,
    limits: DiscoveryLimits,
}

impl<'p, P: Proposer + ?Sized> DiscoveryRecovery<'p, P> {
    pub const fn new(proposer: &'p P, limits: DiscoveryLimits) -> Self {
        Self { proposer, limits }
    }

    #[must_use]
    pub const fn limits(&self) -> DiscoveryLimits {
        self.limits
    }

    pub async fn discover(
        &self,
        goal: &str,
        context: Option<&Value>,
    ) -> Result<ArtifactGraph, DiscoveryError> {
        let attempts = self.limits.max_retries.max(1);
        let mut hint: Option<&str> = None;

        for attempt in 1..=attempts {
            let last_attempt = attempt == attempts;
            let effective_goal =
                hint.map_or_else(|| goal.to_string(), |hint| format!("{goal}\n\n{hint}"));

            let proposed = self.propose(&effective_goal, context, attempt).await;
            if proposed.is_empty() {
                if last_attempt {
                    return Err(DiscoveryError::DiscoveryFailed(
                        DiscoveryFailure::NoArtifacts { attempts },
                    ));
                }
                hint = Some(EMPTY_RESULT_HINT);
                continue;
            }
            self.check_size(proposed.len())?;

            let mut graph = sanitize(proposed);
            if let Some(cycle) = graph.detect_cycle() {
                if last_attempt {
                    return Err(DiscoveryError::CyclicDependency { cycle });
                }
                match self.repair(goal, &graph, &cycle).await? {
                    Some(repaired) => graph = repaired,
                    None => continue,
                }
            }

            if !graph.has_root() {
                self.attach_root(goal, &mut graph).await?;
            }

            let depth = graph.max_depth();
            if depth > self.limits.max_depth {
                return Err(DiscoveryError::DiscoveryFailed(
                    DiscoveryFailure::DepthExceeded {
                        depth,
                        limit: self.limits.max_depth,
                    },
                ));
            }

            let orphans = graph.find_orphans();
            if !orphans.is_empty() {
                warn!(
                    count = orphans.len(),
                    orphans = %orphans.iter().join(", "),
                    "Discovered artifacts not consumed by any root"
                );
            }

            info!(artifacts = graph.len(), depth, attempt, "Discovery complete");
            return Ok(graph);
        }

        Err(DiscoveryError::DiscoveryFailed(
            DiscoveryFailure::NoArtifacts { attempts },
        ))
    }

    /// Adds a root that integrates the graph. The proposer's root is used when
    /// it is new and requires every candidate; otherwise [`FALLBACK_ROOT_ID`].
    pub async fn attach_root(
        &self,
        goal: &str,
        graph: &mut ArtifactGraph,
    ) -> Result<String, DiscoveryError> {
        let candidates = root_candidates(graph);
        let specs: Vec<ArtifactSpec> = graph.specs().cloned().collect();

        let proposed = match self.proposer.synthesize_root(goal, &specs, &candidates).await {
            Ok(root) => root,
            Err(e) => {
                warn!(error = %e, "Root synthesis failed, using fallback root");
                None
            }
        };

        let root = proposed
            .filter(|root| {
                !graph.contains(root.id())
                    && candidates.iter().all(|candidate| root.requires_id(candidate))
            })
            .map(|root| root.retain_requires(|required| graph.contains(required)))
            .unwrap_or_else(|| {
                warn!(candidates = %candidates.iter().join(", "), "Using fallback root artifact");
                fallback_root(goal, graph)
            });

        let root_id = root.id().to_string();
        graph.add(root)?;
        Ok(root_id)
    }

    async fn propose(&self, goal: &str, context: Option<&Value>, attempt: u32) -> Vec<ArtifactSpec> {
        match self.proposer.propose(goal, context).await {
            Ok(artifacts) => {
                debug!(attempt, count = artifacts.len(), "Proposer returned artifacts");
                artifacts
            }
            Err(e) => {
                warn!(attempt, error = %e, "Proposer failed, treating as empty result");
                Vec::new()
            }
        }
    }

    /// Asks the proposer to break `cycle`. `None` means try again from scratch.
    async fn repair(
        &self,
        goal: &str,
        graph: &ArtifactGraph,
        cycle: &[String],
    ) -> Result<Option<ArtifactGraph>, DiscoveryError> {
        info!(cycle = %cycle.join(" -> "), "Asking proposer to break dependency cycle");
        let specs: Vec<ArtifactSpec> = graph.specs().cloned().collect();

        let repaired = match self.proposer.repair_cycle(goal, &specs, cycle).await {
            Ok(repaired) => repaired,
            Err(e) => {
                warn!(error = %e, "Cycle repair failed");
                return Ok(None);
            }
        };
        if repaired.is_empty() {
            return Ok(None);
        }
        self.check_size(repaired.len())?;

        let graph = sanitize(repaired);
        Ok(match graph.detect_cycle() {
            Some(remaining) => {
                warn!(cycle = %remaining.join(" -> "), "Cycle survived repair");
                None
            }
            None => Some(graph),
        })
    }

    fn check_size(&self, count: usize) -> Result<(), DiscoveryError> {
        if count > self.limits.max_artifacts {
            return Err(DiscoveryError::GraphExplosion {
                count,
                limit: self.limits.max_artifacts,
            });
        }
        Ok(())
    }
}

/// First occurrence of each id wins; requirements on unknown ids are dropped.
fn sanitize(proposed: Vec<ArtifactSpec>) -> ArtifactGraph {
    let mut seen: HashSet<String> = HashSet::new();
    let unique: Vec<ArtifactSpec> = proposed
        .into_iter()
        .filter(|spec| {
            let fresh = seen.insert(spec.id().to_string());
            if !fresh {
                warn!(artifact_id = spec.id(), "Dropping duplicate artifact");
            }
            fresh
        })
        .collect();

    let mut graph = ArtifactGraph::new();
    for spec in unique {
        let dangling: Vec<String> = spec
            .requires_ids()
            .into_iter()
            .filter(|required| !seen.contains(required))
            .collect();
        let spec = if dangling.is_empty() {
            spec
        } else {
            warn!(
                artifact_id = spec.id(),
                missing = %dangling.join(", "),
                "Dropping requirements on unknown artifacts"
            );
            spec.retain_requires(|required| seen.contains(required))
        };
        graph.upsert(spec);
    }
    graph
}

/// Most depended-on artifacts, ties in insertion order.
fn root_candidates(graph: &ArtifactGraph) -> Vec<String> {
    graph
        .ids()
        .map(|id| (graph.fan_out(id), id.to_string()))
        .filter(|(dependents, _)| *dependents > 0)
        .sorted_by(|a, b| b.0.cmp(&a.0))
        .take(ROOT_CANDIDATES)
        .map(|(_, id)| id)
        .collect()
}

fn fallback_root(goal: &str, graph: &ArtifactGraph) -> ArtifactSpec {
    let ids: Vec<String> = graph.ids().map(str::to_string).collect();
    let id = std::iter::once(FALLBACK_ROOT_ID.to_string())
        .chain((2..).map(|n| format!("{FALLBACK_ROOT_ID}_{n}")))
        .find(|candidate| !graph.contains(candidate))
        .unwrap_or_else(|| FALLBACK_ROOT_ID.to_string());
    let summary: String = goal.chars().take(50).collect();

    ArtifactSpec::new(
        id,
        format!("Complete: {summary}..."),
        format!("Integration of: {}", ids.iter().take(5).join(", ")),
    )
    .with_requires(ids)
}
