#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

mod algorithms;

pub use algorithms::{FanMetrics, GraphAlgorithms, SubgraphResult};

use crate::error::{ForgeError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relationship carried by a structural edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Contains,
    Defines,
    Calls,
    Imports,
    Inherits,
    Uses,
    Requires,
}

impl EdgeKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Defines => "defines",
            Self::Calls => "calls",
            Self::Imports => "imports",
            Self::Inherits => "inherits",
            Self::Uses => "uses",
            Self::Requires => "requires",
        }
    }

    /// Structural edges pulled in from the parent side during subgraph
    /// extraction.
    #[must_use]
    pub const fn is_containment(&self) -> bool {
        matches!(self, Self::Contains | Self::Defines)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for EdgeKind {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value {
            "contains" => Ok(Self::Contains),
            "defines" => Ok(Self::Defines),
            "calls" => Ok(Self::Calls),
            "imports" => Ok(Self::Imports),
            "inherits" => Ok(Self::Inherits),
            "uses" => Ok(Self::Uses),
            "requires" => Ok(Self::Requires),
            _ => Err(format!("Unknown edge kind: {value}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Module,
    Class,
    Function,
    Method,
    Variable,
    Artifact,
}

impl NodeKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Function => "function",
            Self::Method => "method",
            Self::Variable => "variable",
            Self::Artifact => "artifact",
        }
    }
}

impl TryFrom<&str> for NodeKind {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value {
            "module" => Ok(Self::Module),
            "class" => Ok(Self::Class),
            "function" => Ok(Self::Function),
            "method" => Ok(Self::Method),
            "variable" => Ok(Self::Variable),
            "artifact" => Ok(Self::Artifact),
            _ => Err(format!("Unknown node kind: {value}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    id: String,
    name: String,
    kind: NodeKind,
    file_path: Option<String>,
}

impl GraphNode {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            file_path: None,
        }
    }

    #[must_use]
    pub fn with_file_path(self, file_path: impl Into<String>) -> Self {
        Self {
            file_path: Some(file_path.into()),
            ..self
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    #[must_use]
    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

/// One adjacency entry: the node on the other end plus the edge that got us
/// there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Link {
    pub(crate) node: usize,
    pub(crate) kind: EdgeKind,
    pub(crate) edge: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EdgeSlot {
    source: usize,
    target: usize,
    kind: EdgeKind,
}

/// Directed graph of typed nodes and typed edges.
///
/// Nodes live in an insertion-ordered arena so every algorithm can work on
/// small integer indices and iterate deterministically.
#[derive(Debug, Clone, Default)]
pub struct StructuralGraph {
    nodes: IndexMap<String, GraphNode>,
    edges: Vec<EdgeSlot>,
    outgoing: Vec<Vec<Link>>,
    incoming: Vec<Vec<Link>>,
}

impl StructuralGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node, replacing the payload of an existing node with the same
    /// id while keeping its position and edges.
    pub fn add_node(&mut self, node: GraphNode) -> usize {
        let (index, previous) = self.nodes.insert_full(node.id.clone(), node);
        if previous.is_none() {
            self.outgoing.push(Vec::new());
            self.incoming.push(Vec::new());
        }
        index
    }

    /// Adds `source -> target`. Re-adding an identical edge is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::GraphError` when either endpoint is unknown.
    pub fn add_edge(&mut self, source: &str, target: &str, kind: EdgeKind) -> Result<()> {
        let source_index = self.require_index(source)?;
        let target_index = self.require_index(target)?;
        self.link(source_index, target_index, kind);
        Ok(())
    }

    /// Index-based [`Self::add_edge`] for callers holding indices returned by
    /// [`Self::add_node`].
    pub(crate) fn link(&mut self, source_index: usize, target_index: usize, kind: EdgeKind) {
        let duplicate = self.outgoing[source_index]
            .iter()
            .any(|link| link.node == target_index && link.kind == kind);
        if duplicate {
            return;
        }

        let edge = self.edges.len();
        self.edges.push(EdgeSlot {
            source: source_index,
            target: target_index,
            kind,
        });
        self.outgoing[source_index].push(Link {
            node: target_index,
            kind,
            edge,
        });
        self.incoming[target_index].push(Link {
            node: source_index,
            kind,
            edge,
        });
    }

    fn require_index(&self, id: &str) -> Result<usize> {
        self.nodes
            .get_index_of(id)
            .ok_or_else(|| ForgeError::GraphError(format!("Unknown node: {id}")))
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.get_index_of(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Case-insensitive substring match over node names, in insertion order.
    #[must_use]
    pub fn find_nodes(&self, name: &str) -> Vec<&GraphNode> {
        self.find_nodes_of_kind(name, None)
    }

    #[must_use]
    pub fn find_nodes_of_kind(&self, name: &str, kind: Option<NodeKind>) -> Vec<&GraphNode> {
        let needle = name.to_lowercase();
        self.nodes
            .values()
            .filter(|node| node.name.to_lowercase().contains(&needle))
            .filter(|node| kind.is_none_or(|wanted| node.kind == wanted))
            .collect()
    }

    /// Nodes reachable over one outgoing edge, optionally of a single kind.
    #[must_use]
    pub fn successors(&self, id: &str, kind: Option<EdgeKind>) -> Vec<&GraphNode> {
        self.neighbours(id, kind, &self.outgoing)
    }

    /// Nodes with an edge pointing at `id`, optionally of a single kind.
    #[must_use]
    pub fn predecessors(&self, id: &str, kind: Option<EdgeKind>) -> Vec<&GraphNode> {
        self.neighbours(id, kind, &self.incoming)
    }

    fn neighbours<'a>(
        &'a self,
        id: &str,
        kind: Option<EdgeKind>,
        adjacency: &'a [Vec<Link>],
    ) -> Vec<&'a GraphNode> {
        self.index_of(id)
            .map(|index| {
                adjacency[index]
                    .iter()
                    .filter(|link| kind.is_none_or(|wanted| link.kind == wanted))
                    .filter_map(|link| self.node_at(link.node))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn node_at(&self, index: usize) -> Option<&GraphNode> {
        self.nodes.get_index(index).map(|(_, node)| node)
    }

    pub(crate) fn out_links(&self, index: usize) -> &[Link] {
        self.outgoing.get(index).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn in_links(&self, index: usize) -> &[Link] {
        self.incoming.get(index).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn edge_at(&self, edge: usize) -> Option<GraphEdge> {
        self.edges.get(edge).and_then(|slot| {
            let source = self.node_at(slot.source)?;
            let target = self.node_at(slot.target)?;
            Some(GraphEdge {
                source: source.id.clone(),
                target: target.id.clone(),
                kind: slot.kind,
            })
        })
    }

    #[must_use]
    pub const fn algorithms(&self) -> GraphAlgorithms<'_> {
        GraphAlgorithms::new(self)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::{EdgeKind, GraphNode, NodeKind, StructuralGraph};

    fn function(id: &str) -> GraphNode {
        GraphNode::new(id, id, NodeKind::Function)
    }

    #[test]
    fn add_edge_rejects_unknown_endpoints() {
        let mut graph = StructuralGraph::new();
        graph.add_node(function("main"));
        let err = graph
            .add_edge("main", "ghost", EdgeKind::Calls)
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn duplicate_edges_are_ignored() {
        let mut graph = StructuralGraph::new();
        graph.add_node(function("a"));
        graph.add_node(function("b"));
        graph.add_edge("a", "b", EdgeKind::Calls).unwrap();
        graph.add_edge("a", "b", EdgeKind::Calls).unwrap();
        graph.add_edge("a", "b", EdgeKind::Uses).unwrap();
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn re_adding_node_keeps_position_and_edges() {
        let mut graph = StructuralGraph::new();
        graph.add_node(function("a"));
        graph.add_node(function("b"));
        graph.add_edge("a", "b", EdgeKind::Calls).unwrap();

        let index = graph.add_node(function("a").with_file_path("src/a.py"));
        assert_eq!(index, 0);
        assert_eq!(graph.node("a").and_then(GraphNode::file_path), Some("src/a.py"));
        assert_eq!(graph.successors("a", None).len(), 1);
    }

    #[test]
    fn find_nodes_is_case_insensitive_substring() {
        let mut graph = StructuralGraph::new();
        graph.add_node(GraphNode::new("f1", "load_Config", NodeKind::Function));
        graph.add_node(GraphNode::new("c1", "ConfigLoader", NodeKind::Class));
        graph.add_node(GraphNode::new("f2", "main", NodeKind::Function));

        let ids: Vec<&str> = graph.find_nodes("config").iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec!["f1", "c1"]);

        let classes = graph.find_nodes_of_kind("config", Some(NodeKind::Class));
        assert_eq!(classes.len(), 1);
    }

    #[test]
    fn predecessors_filter_by_kind() {
        let mut graph = StructuralGraph::new();
        for id in ["a", "b", "c"] {
            graph.add_node(function(id));
        }
        graph.add_edge("a", "c", EdgeKind::Calls).unwrap();
        graph.add_edge("b", "c", EdgeKind::Imports).unwrap();

        let callers = graph.predecessors("c", Some(EdgeKind::Calls));
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].id(), "a");
        assert_eq!(EdgeKind::try_from("imports"), Ok(EdgeKind::Imports));
    }
}
