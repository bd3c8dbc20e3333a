#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

mod tasks;

pub use tasks::{ArtifactTask, ParallelGroup};

use crate::error::{ForgeError, Result};
use crate::graph::{EdgeKind, GraphNode, NodeKind, StructuralGraph};
use crate::types::ArtifactSpec;
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::warn;

/// Dependency graph of artifacts, keyed by id in insertion order.
///
/// Edges are implied by each spec's `requires` set. A reverse index of
/// dependents is kept alongside so fan-out queries do not rescan the graph.
#[derive(Debug, Clone, Default)]
pub struct ArtifactGraph {
    artifacts: IndexMap<String, ArtifactSpec>,
    dependents: IndexMap<String, IndexSet<String>>,
}

impl ArtifactGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns `ForgeError::ArtifactError` on the first duplicate id.
    pub fn from_specs(specs: impl IntoIterator<Item = ArtifactSpec>) -> Result<Self> {
        let mut graph = Self::new();
        graph.add_all(specs)?;
        Ok(graph)
    }

    /// # Errors
    ///
    /// Returns `ForgeError::ArtifactError` if an artifact with the same id is
    /// already present.
    pub fn add(&mut self, spec: ArtifactSpec) -> Result<()> {
        if self.artifacts.contains_key(spec.id()) {
            return Err(ForgeError::ArtifactError(format!(
                "Duplicate artifact id: {}",
                spec.id()
            )));
        }
        self.index_requires(&spec);
        self.artifacts.insert(spec.id().to_string(), spec);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ForgeError::ArtifactError` on the first duplicate id.
    pub fn add_all(&mut self, specs: impl IntoIterator<Item = ArtifactSpec>) -> Result<()> {
        specs.into_iter().try_for_each(|spec| self.add(spec))
    }

    /// Inserts or wholesale replaces a spec, keeping its original position.
    pub fn upsert(&mut self, spec: ArtifactSpec) {
        if let Some(previous) = self.artifacts.get(spec.id()).cloned() {
            for required in previous.requires().iter() {
                if let Some(entry) = self.dependents.get_mut(required) {
                    entry.shift_remove(previous.id());
                }
            }
        }
        self.index_requires(&spec);
        self.artifacts.insert(spec.id().to_string(), spec);
    }

    /// Upserts every spec and returns the ids that were merged.
    pub fn merge(&mut self, specs: impl IntoIterator<Item = ArtifactSpec>) -> Vec<String> {
        specs
            .into_iter()
            .map(|spec| {
                let id = spec.id().to_string();
                self.upsert(spec);
                id
            })
            .collect()
    }

    fn index_requires(&mut self, spec: &ArtifactSpec) {
        for required in spec.requires().iter() {
            self.dependents
                .entry(required.clone())
                .or_default()
                .insert(spec.id().to_string());
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ArtifactSpec> {
        self.artifacts.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.artifacts.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    pub fn specs(&self) -> impl Iterator<Item = &ArtifactSpec> {
        self.artifacts.values()
    }

    /// Artifacts with no requirements.
    #[must_use]
    pub fn leaves(&self) -> Vec<String> {
        self.artifacts
            .values()
            .filter(|spec| spec.is_leaf())
            .map(|spec| spec.id().to_string())
            .collect()
    }

    /// Artifacts nothing depends on.
    #[must_use]
    pub fn roots(&self) -> Vec<String> {
        self.ids()
            .filter(|id| self.dependents.get(*id).is_none_or(IndexSet::is_empty))
            .map(str::to_string)
            .collect()
    }

    #[must_use]
    pub fn has_root(&self) -> bool {
        self.ids()
            .any(|id| self.dependents.get(id).is_none_or(IndexSet::is_empty))
    }

    /// Artifacts that list `id` in their `requires`.
    #[must_use]
    pub fn dependents(&self, id: &str) -> Vec<String> {
        self.dependents
            .get(id)
            .map(|entry| entry.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Declared requirements of `id`.
    #[must_use]
    pub fn dependencies(&self, id: &str) -> Vec<String> {
        self.get(id).map(ArtifactSpec::requires_ids).unwrap_or_default()
    }

    /// Number of direct requirements.
    #[must_use]
    pub fn fan_in(&self, id: &str) -> usize {
        self.get(id).map_or(0, |spec| spec.requires().size())
    }

    /// Number of direct dependents.
    #[must_use]
    pub fn fan_out(&self, id: &str) -> usize {
        self.dependents.get(id).map_or(0, IndexSet::len)
    }

    /// Requirements that point at ids missing from the graph, as
    /// `(artifact, missing requirement)` pairs.
    #[must_use]
    pub fn dangling_requirements(&self) -> Vec<(String, String)> {
        self.artifacts
            .values()
            .flat_map(|spec| {
                spec.requires()
                    .iter()
                    .filter(|required| !self.contains(required))
                    .map(|required| (spec.id().to_string(), required.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Structural view with one `Requires` edge from each artifact to every
    /// requirement present in the graph.
    #[must_use]
    pub fn structural_graph(&self) -> StructuralGraph {
        let mut graph = StructuralGraph::new();
        let mut indices: HashMap<&str, usize> = HashMap::with_capacity(self.len());
        for spec in self.artifacts.values() {
            let node = GraphNode::new(spec.id(), spec.id(), NodeKind::Artifact);
            let index = graph.add_node(match spec.produces_file() {
                Some(path) => node.with_file_path(path),
                None => node,
            });
            indices.insert(spec.id(), index);
        }
        for spec in self.artifacts.values() {
            let Some(&source) = indices.get(spec.id()) else {
                continue;
            };
            for target in spec
                .requires()
                .iter()
                .filter_map(|required| indices.get(required.as_str()).copied())
            {
                graph.link(source, target, EdgeKind::Requires);
            }
        }
        graph
    }

    fn ids_at(structural: &StructuralGraph, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .filter_map(|&index| structural.node_at(index))
            .map(|node| node.id().to_string())
            .collect()
    }

    /// First dependency cycle, e.g. `[a, b, c, a]` when a requires b requires
    /// c requires a.
    #[must_use]
    pub fn detect_cycle(&self) -> Option<Vec<String>> {
        let structural = self.structural_graph();
        structural
            .algorithms()
            .cycle_indices(Some(EdgeKind::Requires), 1)
            .first()
            .map(|cycle| Self::ids_at(&structural, cycle))
    }

    /// Strongly connected groups of at least `min_size` artifacts.
    #[must_use]
    pub fn find_sccs(&self, min_size: usize) -> Vec<Vec<String>> {
        let structural = self.structural_graph();
        structural
            .algorithms()
            .scc_indices(Some(EdgeKind::Requires), min_size)
            .iter()
            .map(|component| Self::ids_at(&structural, component))
            .collect()
    }

    /// Dependencies before dependents; independent artifacts keep insertion
    /// order.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::GraphError` naming the cycle when one exists.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let structural = self.structural_graph();
        structural
            .algorithms()
            .reverse_topological_indices(EdgeKind::Requires)
            .map(|order| Self::ids_at(&structural, &order))
            .ok_or_else(|| {
                let cycle = self.detect_cycle().unwrap_or_default();
                ForgeError::GraphError(format!("Cyclic dependency: {}", cycle.join(" -> ")))
            })
    }

    /// Groups artifacts into sequential waves; each wave only requires
    /// artifacts from earlier waves.
    ///
    /// When no further artifact can be placed (a cycle or a requirement that
    /// is not in the graph) every remaining artifact goes into one final wave
    /// and a warning is logged.
    #[must_use]
    pub fn execution_waves(&self) -> Vec<Vec<String>> {
        let mut completed: HashSet<&str> = HashSet::new();
        let mut pending: Vec<&ArtifactSpec> = self.artifacts.values().collect();
        let mut waves = Vec::new();

        while !pending.is_empty() {
            let (ready, blocked): (Vec<&ArtifactSpec>, Vec<&ArtifactSpec>) =
                pending.into_iter().partition(|spec| {
                    spec.requires()
                        .iter()
                        .all(|required| completed.contains(required.as_str()))
                });

            if ready.is_empty() {
                warn!(
                    remaining = blocked.len(),
                    artifacts = %blocked.iter().map(|spec| spec.id()).join(", "),
                    "No artifact can make progress; scheduling the rest as one final wave"
                );
                waves.push(blocked.iter().map(|spec| spec.id().to_string()).collect());
                break;
            }

            completed.extend(ready.iter().map(|spec| spec.id()));
            waves.push(ready.iter().map(|spec| spec.id().to_string()).collect());
            pending = blocked;
        }

        waves
    }

    fn depth_table(&self) -> HashMap<&str, Option<usize>> {
        let mut memo: HashMap<&str, Option<usize>> = HashMap::new();
        let mut in_progress: HashSet<&str> = HashSet::new();

        for root in self.artifacts.keys() {
            let mut stack: Vec<(&str, bool)> = vec![(root.as_str(), false)];
            while let Some((id, expanded)) = stack.pop() {
                if memo.contains_key(id) {
                    continue;
                }
                let Some(spec) = self.artifacts.get(id) else {
                    continue;
                };
                let requirements: Vec<&str> = spec
                    .requires()
                    .iter()
                    .map(String::as_str)
                    .filter(|required| self.contains(required))
                    .collect();

                if expanded {
                    in_progress.remove(id);
                    let depth = requirements
                        .iter()
                        .map(|required| memo.get(required).copied().flatten())
                        .collect::<Option<Vec<usize>>>()
                        .map(|depths| depths.into_iter().max().map_or(0, |deepest| deepest + 1));
                    memo.insert(id, depth);
                } else {
                    in_progress.insert(id);
                    stack.push((id, true));
                    stack.extend(
                        requirements
                            .into_iter()
                            .filter(|required| {
                                !memo.contains_key(required) && !in_progress.contains(required)
                            })
                            .map(|required| (required, false)),
                    );
                }
            }
        }

        memo
    }

    /// Length in edges of the longest requirement chain below `id`: 0 for
    /// leaves. `None` for unknown ids and for artifacts on or behind a cycle.
    #[must_use]
    pub fn artifact_depth(&self, id: &str) -> Option<usize> {
        self.depth_table().get(id).copied().flatten()
    }

    /// Largest [`Self::artifact_depth`] in the graph (0 when empty).
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.depth_table()
            .values()
            .filter_map(|depth| *depth)
            .max()
            .unwrap_or(0)
    }

    /// Number of artifacts on the longest dependency chain.
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.max_depth() + 1
        }
    }

    /// Artifacts that no root reaches through `requires`.
    #[must_use]
    pub fn find_orphans(&self) -> Vec<String> {
        let roots = self.roots();
        if roots.is_empty() {
            return Vec::new();
        }

        let mut connected: HashSet<String> = roots.iter().cloned().collect();
        let mut queue: VecDeque<String> = roots.into_iter().collect();
        while let Some(id) = queue.pop_front() {
            if let Some(spec) = self.artifacts.get(&id) {
                for required in spec.requires().iter() {
                    if self.contains(required) && connected.insert(required.clone()) {
                        queue.push_back(required.clone());
                    }
                }
            }
        }

        self.ids()
            .filter(|id| !connected.contains(*id))
            .map(str::to_string)
            .collect()
    }

    /// Human-readable problems: dangling requirements (with a close-match
    /// suggestion), cycles, and orphans. Empty when the graph is sound.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut problems: Vec<String> = self
            .dangling_requirements()
            .into_iter()
            .map(|(artifact, missing)| match self.closest_id(&missing) {
                Some(suggestion) => format!(
                    "Artifact '{artifact}' requires non-existent artifact '{missing}' (did you mean '{suggestion}'?)"
                ),
                None => format!("Artifact '{artifact}' requires non-existent artifact '{missing}'"),
            })
            .collect();

        if let Some(cycle) = self.detect_cycle() {
            problems.push(format!("Cyclic dependency: {}", cycle.join(" -> ")));
        }

        let orphans = self.find_orphans();
        if !orphans.is_empty() {
            problems.push(format!(
                "Orphan artifacts (not connected to any root): {}",
                orphans.join(", ")
            ));
        }

        problems
    }

    fn closest_id(&self, missing: &str) -> Option<&str> {
        self.ids()
            .map(|id| (id, strsim::levenshtein(missing, id)))
            .filter(|(_, distance)| *distance <= 3)
            .min_by_key(|(_, distance)| *distance)
            .map(|(id, _)| id)
    }

    /// Copy restricted to `ids`, with requirements outside the set dropped.
    #[must_use]
    pub fn subgraph(&self, ids: &HashSet<String>) -> Self {
        let mut subgraph = Self::new();
        for spec in self.artifacts.values().filter(|spec| ids.contains(spec.id())) {
            subgraph.upsert(spec.retain_requires(|required| ids.contains(required)));
        }
        subgraph
    }

    /// Mermaid flowchart, dependencies pointing at their dependents.
    #[must_use]
    pub fn to_mermaid(&self) -> String {
        let mut lines = vec!["graph TD".to_string()];
        for spec in self.artifacts.values() {
            let description = spec.description();
            let label = if description.chars().count() > 30 {
                format!("{}...", description.chars().take(30).collect::<String>())
            } else {
                description.to_string()
            };
            lines.push(format!(
                "    {}[\"{}: {}\"]",
                spec.id(),
                spec.id(),
                label.replace('"', "'")
            ));
            for required in spec.requires().iter() {
                lines.push(format!("    {required} --> {}", spec.id()));
            }
        }
        lines.join("\n")
    }

    /// `{"artifacts": {id: spec}, "waves": [[id]]}`.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::SerializationError` if a spec fails to serialize.
    pub fn to_json(&self) -> Result<Value> {
        let artifacts = self
            .artifacts
            .iter()
            .map(|(id, spec)| -> Result<(String, Value)> {
                Ok((id.clone(), serde_json::to_value(spec)?))
            })
            .collect::<Result<serde_json::Map<String, Value>>>()?;
        Ok(json!({
            "artifacts": artifacts,
            "waves": self.execution_waves(),
        }))
    }

    /// # Errors
    ///
    /// Returns `ForgeError::SerializationError` for malformed specs and
    /// `ForgeError::ArtifactError` for duplicates.
    pub fn from_json(value: &Value) -> Result<Self> {
        let specs = value
            .get("artifacts")
            .and_then(Value::as_object)
            .map(|artifacts| {
                artifacts
                    .values()
                    .map(|spec| serde_json::from_value::<ArtifactSpec>(spec.clone()))
                    .collect::<std::result::Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();
        Self::from_specs(specs)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::ArtifactGraph;
    use crate::types::ArtifactSpec;
    use std::collections::HashSet;

    fn spec(id: &str, requires: &[&str]) -> ArtifactSpec {
        ArtifactSpec::new(id, format!("{id} artifact"), format!("{id} contract"))
            .with_requires(requires.iter().copied())
    }

    fn diamond() -> ArtifactGraph {
        ArtifactGraph::from_specs([
            spec("A", &[]),
            spec("B", &["A"]),
            spec("C", &["A"]),
            spec("D", &["B", "C"]),
        ])
        .unwrap()
    }

    #[test]
    fn diamond_scenario_depth_and_waves() {
        let graph = diamond();
        assert!(graph.detect_cycle().is_none());
        assert_eq!(graph.depth(), 3);
        assert_eq!(graph.max_depth(), 2);
        assert_eq!(
            graph.execution_waves(),
            vec![
                vec!["A".to_string()],
                vec!["B".to_string(), "C".to_string()],
                vec!["D".to_string()],
            ]
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut graph = diamond();
        let err = graph.add(spec("A", &[])).unwrap_err();
        assert!(err.to_string().contains("Duplicate artifact id: A"));
    }

    #[test]
    fn leaves_roots_and_fan_metrics() {
        let graph = diamond();
        assert_eq!(graph.leaves(), vec!["A"]);
        assert_eq!(graph.roots(), vec!["D"]);
        assert!(graph.has_root());
        assert_eq!(graph.fan_out("A"), 2);
        assert_eq!(graph.fan_in("D"), 2);
        assert_eq!(graph.dependents("A"), vec!["B", "C"]);
        assert_eq!(graph.dependencies("D"), vec!["B", "C"]);
    }

    #[test]
    fn artifact_depth_counts_edges_from_leaves() {
        let graph = diamond();
        assert_eq!(graph.artifact_depth("A"), Some(0));
        assert_eq!(graph.artifact_depth("B"), Some(1));
        assert_eq!(graph.artifact_depth("D"), Some(2));
        assert_eq!(graph.artifact_depth("missing"), None);
    }

    #[test]
    fn cycle_is_detected_and_blocks_topological_sort() {
        let graph = ArtifactGraph::from_specs([
            spec("A", &["C"]),
            spec("B", &["A"]),
            spec("C", &["B"]),
            spec("Leaf", &[]),
        ])
        .unwrap();

        let cycle = graph.detect_cycle().unwrap();
        assert_eq!(cycle, vec!["A", "C", "B", "A"]);
        assert!(graph.topological_sort().is_err());
        assert_eq!(graph.artifact_depth("A"), None);
        assert_eq!(graph.artifact_depth("Leaf"), Some(0));
        assert_eq!(graph.find_sccs(2).len(), 1);
    }

    #[test]
    fn cyclic_graph_waves_degrade_to_final_wave() {
        let graph = ArtifactGraph::from_specs([
            spec("Base", &[]),
            spec("X", &["Base", "Y"]),
            spec("Y", &["X"]),
        ])
        .unwrap();

        let waves = graph.execution_waves();
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0], vec!["Base"]);
        assert_eq!(waves[1], vec!["X", "Y"]);
    }

    #[test]
    fn waves_partition_every_artifact_exactly_once() {
        let graph = ArtifactGraph::from_specs([
            spec("proto", &[]),
            spec("schema", &[]),
            spec("model", &["proto", "schema"]),
            spec("repo", &["model"]),
            spec("service", &["repo", "proto"]),
            spec("api", &["service"]),
            spec("cli", &["service"]),
            spec("app", &["api", "cli"]),
        ])
        .unwrap();

        let waves = graph.execution_waves();
        let mut seen = HashSet::new();
        for (index, wave) in waves.iter().enumerate() {
            for id in wave {
                assert!(seen.insert(id.clone()), "{id} scheduled twice");
                let earlier: HashSet<&String> = waves[..index].iter().flatten().collect();
                for required in graph.dependencies(id) {
                    assert!(earlier.contains(&required), "{id} before {required}");
                }
            }
        }
        assert_eq!(seen.len(), graph.len());
    }

    #[test]
    fn topological_sort_puts_dependencies_first() {
        let graph = diamond();
        let order = graph.topological_sort().unwrap();
        let position = |id: &str| order.iter().position(|other| other == id).unwrap();
        assert!(position("A") < position("B"));
        assert!(position("A") < position("C"));
        assert!(position("B") < position("D"));
        assert!(position("C") < position("D"));
    }

    #[test]
    fn topological_sort_keeps_insertion_order_for_independent_artifacts() {
        let graph = ArtifactGraph::from_specs([
            spec("Zeta", &[]),
            spec("Yank", &[]),
            spec("Xray", &["Zeta"]),
            spec("Whisk", &[]),
        ])
        .unwrap();
        let order = graph.topological_sort().unwrap();
        assert_eq!(order, vec!["Zeta", "Yank", "Whisk", "Xray"]);
        let flattened: Vec<String> = graph.execution_waves().into_iter().flatten().collect();
        assert_eq!(order, flattened);
    }

    #[test]
    fn structural_view_skips_requirements_outside_the_graph() {
        let graph = ArtifactGraph::from_specs([
            spec("A", &[]),
            spec("B", &["A", "Missing"]),
        ])
        .unwrap();
        let structural = graph.structural_graph();
        assert_eq!(structural.node_count(), 2);
        assert_eq!(structural.edge_count(), 1);
        assert_eq!(graph.topological_sort().unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn orphans_are_unreachable_from_roots() {
        let graph = ArtifactGraph::from_specs([
            spec("A", &["B"]),
            spec("B", &["A"]),
            spec("Leaf", &[]),
            spec("App", &["Leaf"]),
        ])
        .unwrap();
        assert_eq!(graph.roots(), vec!["App"]);
        assert_eq!(graph.find_orphans(), vec!["A", "B"]);
    }

    #[test]
    fn validate_suggests_close_ids_for_dangling_requirements() {
        let graph = ArtifactGraph::from_specs([
            spec("UserModel", &[]),
            spec("UserService", &["UserModle"]),
        ])
        .unwrap();
        let problems = graph.validate();
        assert!(problems
            .iter()
            .any(|problem| problem.contains("did you mean 'UserModel'")));
        assert_eq!(graph.dangling_requirements().len(), 1);
    }

    #[test]
    fn upsert_replaces_spec_and_reindexes_dependents() {
        let mut graph = diamond();
        graph.upsert(spec("D", &["B"]));
        assert_eq!(graph.dependents("C"), Vec::<String>::new());
        assert_eq!(graph.fan_out("B"), 1);
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.ids().last(), Some("D"));
    }

    #[test]
    fn subgraph_drops_requirements_outside_selection() {
        let graph = diamond();
        let keep: HashSet<String> = ["B", "D"].iter().map(ToString::to_string).collect();
        let sub = graph.subgraph(&keep);
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.dependencies("B"), Vec::<String>::new());
        assert_eq!(sub.dependencies("D"), vec!["B"]);
    }

    #[test]
    fn mermaid_lists_nodes_and_edges() {
        let graph = diamond();
        let diagram = graph.to_mermaid();
        assert!(diagram.starts_with("graph TD"));
        assert!(diagram.contains("    A[\"A: A artifact\"]"));
        assert!(diagram.contains("    B --> D"));
    }

    #[test]
    fn json_export_roundtrips_specs() {
        let graph = diamond();
        let value = graph.to_json().unwrap();
        assert_eq!(value["waves"][1], serde_json::json!(["B", "C"]));
        let restored = ArtifactGraph::from_json(&value).unwrap();
        assert_eq!(restored.len(), 4);
        assert_eq!(restored.get("D"), graph.get("D"));
    }
}
