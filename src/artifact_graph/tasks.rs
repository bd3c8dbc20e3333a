use super::ArtifactGraph;
use crate::types::ArtifactSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Scheduling bucket derived from an artifact's depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParallelGroup {
    Contracts,
    Implementations,
    Integration,
}

impl ParallelGroup {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Contracts => "contracts",
            Self::Implementations => "implementations",
            Self::Integration => "integration",
        }
    }

    /// Depth 0 defines contracts, up to 2 implements them, deeper integrates.
    #[must_use]
    pub const fn for_depth(depth: Option<usize>, is_leaf: bool) -> Self {
        match depth {
            Some(0) => Self::Contracts,
            Some(1 | 2) => Self::Implementations,
            Some(_) => Self::Integration,
            None if is_leaf => Self::Contracts,
            None => Self::Implementations,
        }
    }
}

impl fmt::Display for ParallelGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Executor-facing record for one artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactTask {
    pub id: String,
    pub description: String,
    pub contract: String,
    pub target_path: Option<String>,
    pub requires: Vec<String>,
    pub is_contract: bool,
    pub parallel_group: ParallelGroup,
    pub wave: usize,
    pub domain_type: Option<String>,
    pub metadata: Value,
}

impl ArtifactTask {
    fn from_spec(spec: &ArtifactSpec, graph: &ArtifactGraph, wave: usize) -> Self {
        Self {
            id: spec.id().to_string(),
            description: format!("Create {}", spec.description()),
            contract: spec.contract().to_string(),
            target_path: spec.produces_file().map(str::to_string),
            requires: spec.requires_ids(),
            is_contract: spec.is_contract(),
            parallel_group: ParallelGroup::for_depth(graph.artifact_depth(spec.id()), spec.is_leaf()),
            wave,
            domain_type: spec.domain_type().map(str::to_string),
            metadata: spec.metadata().clone(),
        }
    }
}

impl ArtifactGraph {
    /// One task per artifact in wave order, which is always consistent with a
    /// topological order of an acyclic graph.
    #[must_use]
    pub fn to_tasks(&self) -> Vec<ArtifactTask> {
        self.execution_waves()
            .iter()
            .enumerate()
            .flat_map(|(wave, ids)| {
                ids.iter()
                    .filter_map(|id| self.get(id))
                    .map(|spec| ArtifactTask::from_spec(spec, self, wave))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
