use super::{EdgeKind, GraphEdge, GraphNode, Link, NodeKind, StructuralGraph};
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};

pub const DEFAULT_IMPACT_EDGES: [EdgeKind; 4] = [
    EdgeKind::Calls,
    EdgeKind::Uses,
    EdgeKind::Inherits,
    EdgeKind::Requires,
];
pub const DEFAULT_DEPENDENCY_EDGES: [EdgeKind; 4] = [
    EdgeKind::Calls,
    EdgeKind::Uses,
    EdgeKind::Imports,
    EdgeKind::Requires,
];

type LinkAccessor = fn(&StructuralGraph, usize) -> &[Link];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanMetrics {
    pub node_id: String,
    pub fan_in: usize,
    pub fan_out: usize,
    pub call_in: usize,
    pub call_out: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubgraphResult {
    pub center_node_id: Option<String>,
    pub nodes: IndexMap<String, GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub depth: usize,
}

/// Read-only algorithms over a [`StructuralGraph`].
///
/// Traversals are iterative over arena indices; results come back in a
/// deterministic order derived from node insertion order and edge order.
#[derive(Debug, Clone, Copy)]
pub struct GraphAlgorithms<'g> {
    graph: &'g StructuralGraph,
}

impl<'g> GraphAlgorithms<'g> {
    #[must_use]
    pub const fn new(graph: &'g StructuralGraph) -> Self {
        Self { graph }
    }

    fn nodes_at(&self, indices: &[usize]) -> Vec<&'g GraphNode> {
        indices
            .iter()
            .filter_map(|&index| self.graph.node_at(index))
            .collect()
    }

    fn indices_for(&self, name: &str) -> Vec<usize> {
        self.graph
            .find_nodes(name)
            .iter()
            .filter_map(|node| self.graph.index_of(node.id()))
            .collect()
    }

    // Fan-in / fan-out

    #[must_use]
    pub fn fan_out(&self, node_id: &str, kind: Option<EdgeKind>) -> usize {
        self.graph.index_of(node_id).map_or(0, |index| {
            count_links(self.graph.out_links(index), kind)
        })
    }

    #[must_use]
    pub fn fan_in(&self, node_id: &str, kind: Option<EdgeKind>) -> usize {
        self.graph.index_of(node_id).map_or(0, |index| {
            count_links(self.graph.in_links(index), kind)
        })
    }

    #[must_use]
    pub fn fan_metrics(&self, node_id: &str) -> Option<FanMetrics> {
        self.graph.node(node_id).map(|node| FanMetrics {
            node_id: node.id().to_string(),
            fan_in: self.fan_in(node_id, None),
            fan_out: self.fan_out(node_id, None),
            call_in: self.fan_in(node_id, Some(EdgeKind::Calls)),
            call_out: self.fan_out(node_id, Some(EdgeKind::Calls)),
        })
    }

    /// Nodes with the most outgoing edges, highest first.
    #[must_use]
    pub fn most_complex(
        &self,
        top_n: usize,
        kind: Option<NodeKind>,
        internal_only: bool,
    ) -> Vec<FanMetrics> {
        self.ranked(top_n, kind, internal_only, |metrics| metrics.fan_out)
    }

    /// Nodes with the most incoming edges, highest first.
    #[must_use]
    pub fn most_depended_on(
        &self,
        top_n: usize,
        kind: Option<NodeKind>,
        internal_only: bool,
    ) -> Vec<FanMetrics> {
        self.ranked(top_n, kind, internal_only, |metrics| metrics.fan_in)
    }

    fn ranked(
        &self,
        top_n: usize,
        kind: Option<NodeKind>,
        internal_only: bool,
        key: impl Fn(&FanMetrics) -> usize,
    ) -> Vec<FanMetrics> {
        let mut results: Vec<FanMetrics> = self
            .graph
            .nodes()
            .filter(|node| kind.is_none_or(|wanted| node.kind() == wanted))
            .filter(|node| !internal_only || node.file_path().is_some())
            .filter_map(|node| self.fan_metrics(node.id()))
            .filter(|metrics| key(metrics) > 0)
            .collect();
        results.sort_by_key(|metrics| std::cmp::Reverse(key(metrics)));
        results.truncate(top_n);
        results
    }

    // Impact analysis

    /// Everything that transitively depends on nodes matching `name`,
    /// following incoming edges. The matched nodes are part of the result.
    #[must_use]
    pub fn get_impact(
        &self,
        name: &str,
        max_depth: usize,
        edge_kinds: Option<&[EdgeKind]>,
    ) -> Vec<&'g GraphNode> {
        let starts = self.indices_for(name);
        self.impact_from_indices(&starts, max_depth, edge_kinds.unwrap_or(&DEFAULT_IMPACT_EDGES))
    }

    /// [`Self::get_impact`] keyed by exact node ids instead of a name query.
    #[must_use]
    pub fn impact_of(
        &self,
        ids: &[&str],
        max_depth: usize,
        edge_kinds: &[EdgeKind],
    ) -> Vec<&'g GraphNode> {
        let starts: Vec<usize> = ids.iter().filter_map(|id| self.graph.index_of(id)).collect();
        self.impact_from_indices(&starts, max_depth, edge_kinds)
    }

    fn impact_from_indices(
        &self,
        starts: &[usize],
        max_depth: usize,
        edge_kinds: &[EdgeKind],
    ) -> Vec<&'g GraphNode> {
        let reached = self.bfs(starts, max_depth, edge_kinds, |graph, index| {
            graph.in_links(index)
        });
        let mut ordered = starts.to_vec();
        ordered.extend(reached);
        dedup_in_order(&mut ordered);
        self.nodes_at(&ordered)
    }

    /// Everything nodes matching `name` transitively depend on, following
    /// outgoing edges. The matched nodes themselves are excluded.
    #[must_use]
    pub fn get_dependencies(
        &self,
        name: &str,
        max_depth: usize,
        edge_kinds: Option<&[EdgeKind]>,
    ) -> Vec<&'g GraphNode> {
        let starts = self.indices_for(name);
        let reached = self.bfs(
            &starts,
            max_depth,
            edge_kinds.unwrap_or(&DEFAULT_DEPENDENCY_EDGES),
            |graph, index| graph.out_links(index),
        );
        self.nodes_at(&reached)
    }

    /// [`Self::get_dependencies`] keyed by exact node ids.
    #[must_use]
    pub fn dependencies_of(
        &self,
        ids: &[&str],
        max_depth: usize,
        edge_kinds: &[EdgeKind],
    ) -> Vec<&'g GraphNode> {
        let starts: Vec<usize> = ids.iter().filter_map(|id| self.graph.index_of(id)).collect();
        let reached = self.bfs(&starts, max_depth, edge_kinds, |graph, index| {
            graph.out_links(index)
        });
        self.nodes_at(&reached)
    }

    /// Breadth-first walk returning newly reached indices in visit order.
    /// Nodes deeper than `max_depth` hops are never visited.
    fn bfs(
        &self,
        starts: &[usize],
        max_depth: usize,
        edge_kinds: &[EdgeKind],
        links: impl Fn(&'g StructuralGraph, usize) -> &'g [Link],
    ) -> Vec<usize> {
        let mut visited = vec![false; self.graph.node_count()];
        let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
        let mut reached = Vec::new();

        for &start in starts {
            if !visited[start] {
                visited[start] = true;
                queue.push_back((start, 0));
            }
        }

        while let Some((index, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for link in links(self.graph, index) {
                if edge_kinds.contains(&link.kind) && !visited[link.node] {
                    visited[link.node] = true;
                    reached.push(link.node);
                    queue.push_back((link.node, depth + 1));
                }
            }
        }

        reached
    }

    // Path finding

    /// Shortest path (in edges) from any node matching `start_name` to any
    /// node matching `end_name`. Paths longer than `max_depth` nodes are not
    /// explored.
    #[must_use]
    pub fn find_path(
        &self,
        start_name: &str,
        end_name: &str,
        max_depth: usize,
        edge_kinds: Option<&[EdgeKind]>,
    ) -> Option<Vec<&'g GraphNode>> {
        let starts = self.indices_for(start_name);
        let ends: HashSet<usize> = self.indices_for(end_name).into_iter().collect();
        if starts.is_empty() || ends.is_empty() {
            return None;
        }

        starts.into_iter().find_map(|start| {
            let mut visited = vec![false; self.graph.node_count()];
            visited[start] = true;
            let mut queue: VecDeque<Vec<usize>> = VecDeque::from([vec![start]]);

            while let Some(path) = queue.pop_front() {
                if path.len() > max_depth {
                    continue;
                }
                let current = *path.last()?;
                if ends.contains(&current) {
                    return Some(self.nodes_at(&path));
                }
                for link in self.graph.out_links(current) {
                    if edge_kinds.is_some_and(|kinds| !kinds.contains(&link.kind)) {
                        continue;
                    }
                    if !visited[link.node] {
                        visited[link.node] = true;
                        let mut next = path.clone();
                        next.push(link.node);
                        queue.push_back(next);
                    }
                }
            }
            None
        })
    }

    // Subgraph extraction

    /// Neighbourhood of nodes matching `name` within `depth` hops, following
    /// outgoing edges plus incoming containment edges for structure.
    #[must_use]
    pub fn get_subgraph(&self, name: &str, depth: usize) -> SubgraphResult {
        let mut result = SubgraphResult {
            depth,
            ..SubgraphResult::default()
        };
        let starts = self.indices_for(name);
        let Some(&center) = starts.first() else {
            return result;
        };
        result.center_node_id = self.graph.node_at(center).map(|node| node.id().to_string());

        let mut visited = vec![false; self.graph.node_count()];
        let mut seen_edges = HashSet::new();
        let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
        for &start in &starts {
            visited[start] = true;
            queue.push_back((start, 0));
        }

        while let Some((index, current_depth)) = queue.pop_front() {
            if let Some(node) = self.graph.node_at(index) {
                result.nodes.insert(node.id().to_string(), node.clone());
            }
            if current_depth >= depth {
                continue;
            }

            let outgoing = self.graph.out_links(index).iter();
            let containing = self
                .graph
                .in_links(index)
                .iter()
                .filter(|link| link.kind.is_containment());
            for link in outgoing.chain(containing) {
                if seen_edges.insert(link.edge) {
                    if let Some(edge) = self.graph.edge_at(link.edge) {
                        result.edges.push(edge);
                    }
                }
                if !visited[link.node] {
                    visited[link.node] = true;
                    queue.push_back((link.node, current_depth + 1));
                }
            }
        }

        result
    }

    // Cycle detection

    /// Up to `max_cycles` cycles found by a three-colour depth-first search in
    /// node insertion order. Each cycle starts at the node that closes it and
    /// repeats that node at the end.
    #[must_use]
    pub fn find_cycles(&self, kind: Option<EdgeKind>, max_cycles: usize) -> Vec<Vec<&'g GraphNode>> {
        self.cycle_indices(kind, max_cycles)
            .iter()
            .map(|cycle| self.nodes_at(cycle))
            .collect()
    }

    pub(crate) fn cycle_indices(&self, kind: Option<EdgeKind>, max_cycles: usize) -> Vec<Vec<usize>> {
        let count = self.graph.node_count();
        let mut color = vec![Color::White; count];
        let mut cycles: Vec<Vec<usize>> = Vec::new();

        for root in 0..count {
            if cycles.len() >= max_cycles {
                break;
            }
            if color[root] != Color::White {
                continue;
            }

            let mut path = vec![root];
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            color[root] = Color::Gray;

            while let Some(&(node, cursor)) = stack.last() {
                let Some(link) = self.graph.out_links(node).get(cursor).copied() else {
                    stack.pop();
                    path.pop();
                    color[node] = Color::Black;
                    continue;
                };
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                if kind.is_some_and(|wanted| link.kind != wanted) {
                    continue;
                }

                match color[link.node] {
                    Color::Gray => {
                        if let Some(start) = path.iter().position(|&p| p == link.node) {
                            if cycles.len() < max_cycles {
                                let mut cycle = path[start..].to_vec();
                                cycle.push(link.node);
                                cycles.push(cycle);
                            }
                        }
                    }
                    Color::White if cycles.len() < max_cycles => {
                        color[link.node] = Color::Gray;
                        path.push(link.node);
                        stack.push((link.node, 0));
                    }
                    Color::White | Color::Black => {}
                }
            }
        }

        cycles
    }

    // Strongly connected components

    /// Tarjan's algorithm without recursion. Components smaller than
    /// `min_size` are dropped; the rest are sorted largest first.
    #[must_use]
    pub fn find_sccs(&self, kind: Option<EdgeKind>, min_size: usize) -> Vec<Vec<&'g GraphNode>> {
        self.scc_indices(kind, min_size)
            .iter()
            .map(|component| self.nodes_at(component))
            .collect()
    }

    pub(crate) fn scc_indices(&self, kind: Option<EdgeKind>, min_size: usize) -> Vec<Vec<usize>> {
        let count = self.graph.node_count();
        let mut index: Vec<Option<usize>> = vec![None; count];
        let mut lowlink = vec![0_usize; count];
        let mut on_stack = vec![false; count];
        let mut scc_stack: Vec<usize> = Vec::new();
        let mut counter = 0_usize;
        let mut components: Vec<Vec<usize>> = Vec::new();

        for root in 0..count {
            if index[root].is_some() {
                continue;
            }

            index[root] = Some(counter);
            lowlink[root] = counter;
            counter += 1;
            scc_stack.push(root);
            on_stack[root] = true;
            let mut work: Vec<(usize, usize)> = vec![(root, 0)];

            while let Some(&(node, cursor)) = work.last() {
                if let Some(link) = self.graph.out_links(node).get(cursor).copied() {
                    if let Some(top) = work.last_mut() {
                        top.1 += 1;
                    }
                    if kind.is_some_and(|wanted| link.kind != wanted) {
                        continue;
                    }
                    let target = link.node;
                    match index[target] {
                        None => {
                            index[target] = Some(counter);
                            lowlink[target] = counter;
                            counter += 1;
                            scc_stack.push(target);
                            on_stack[target] = true;
                            work.push((target, 0));
                        }
                        Some(target_index) if on_stack[target] => {
                            lowlink[node] = lowlink[node].min(target_index);
                        }
                        Some(_) => {}
                    }
                    continue;
                }

                work.pop();
                if let Some(&(parent, _)) = work.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[node]);
                }
                if index[node] == Some(lowlink[node]) {
                    let mut component = Vec::new();
                    while let Some(member) = scc_stack.pop() {
                        on_stack[member] = false;
                        component.push(member);
                        if member == node {
                            break;
                        }
                    }
                    if component.len() >= min_size {
                        components.push(component);
                    }
                }
            }
        }

        components.sort_by_key(|component| std::cmp::Reverse(component.len()));
        components
    }

    // Topological sort

    /// Kahn's algorithm over edges of one kind, optionally restricted to one
    /// node kind. An edge `a -> b` places `a` before `b`. Returns `None` when
    /// the filtered subgraph has a cycle.
    #[must_use]
    pub fn topological_sort(
        &self,
        kind: EdgeKind,
        node_kind: Option<NodeKind>,
    ) -> Option<Vec<&'g GraphNode>> {
        self.topological_indices(kind, node_kind)
            .map(|order| self.nodes_at(&order))
    }

    pub(crate) fn topological_indices(
        &self,
        kind: EdgeKind,
        node_kind: Option<NodeKind>,
    ) -> Option<Vec<usize>> {
        self.kahn_indices(kind, node_kind, false)
    }

    /// Like [`Self::topological_indices`] but an edge `a -> b` places `b`
    /// first. Ties keep insertion order.
    pub(crate) fn reverse_topological_indices(&self, kind: EdgeKind) -> Option<Vec<usize>> {
        self.kahn_indices(kind, None, true)
    }

    fn kahn_indices(
        &self,
        kind: EdgeKind,
        node_kind: Option<NodeKind>,
        reversed: bool,
    ) -> Option<Vec<usize>> {
        let count = self.graph.node_count();
        let relevant: Vec<bool> = (0..count)
            .map(|index| {
                self.graph
                    .node_at(index)
                    .is_some_and(|node| node_kind.is_none_or(|wanted| node.kind() == wanted))
            })
            .collect();
        let relevant_total = relevant.iter().filter(|flag| **flag).count();
        let (blockers, unblocks) = if reversed {
            (StructuralGraph::out_links as LinkAccessor, StructuralGraph::in_links as LinkAccessor)
        } else {
            (StructuralGraph::in_links as LinkAccessor, StructuralGraph::out_links as LinkAccessor)
        };

        let mut in_degree = vec![0_usize; count];
        for index in (0..count).filter(|&index| relevant[index]) {
            in_degree[index] = blockers(self.graph, index)
                .iter()
                .filter(|link| link.kind == kind && relevant[link.node])
                .count();
        }

        let mut queue: VecDeque<usize> = (0..count)
            .filter(|&index| relevant[index] && in_degree[index] == 0)
            .collect();
        let mut order = Vec::with_capacity(relevant_total);

        while let Some(index) = queue.pop_front() {
            order.push(index);
            for link in unblocks(self.graph, index) {
                if link.kind == kind && relevant[link.node] {
                    in_degree[link.node] = in_degree[link.node].saturating_sub(1);
                    if in_degree[link.node] == 0 {
                        queue.push_back(link.node);
                    }
                }
            }
        }

        (order.len() == relevant_total).then_some(order)
    }

    // Convenience

    #[must_use]
    pub fn get_callers(&self, name: &str) -> Vec<&'g GraphNode> {
        self.graph
            .find_nodes(name)
            .iter()
            .flat_map(|node| self.graph.predecessors(node.id(), Some(EdgeKind::Calls)))
            .collect()
    }

    #[must_use]
    pub fn get_callees(&self, name: &str) -> Vec<&'g GraphNode> {
        self.graph
            .find_nodes(name)
            .iter()
            .flat_map(|node| self.graph.successors(node.id(), Some(EdgeKind::Calls)))
            .collect()
    }
}

fn count_links(links: &[Link], kind: Option<EdgeKind>) -> usize {
    links
        .iter()
        .filter(|link| kind.is_none_or(|wanted| link.kind == wanted))
        .count()
}

fn dedup_in_order(indices: &mut Vec<usize>) {
    let mut seen = HashSet::new();
    indices.retain(|index| seen.insert(*index));
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::super::{EdgeKind, GraphNode, NodeKind, StructuralGraph};

    fn graph_with(nodes: &[&str], edges: &[(&str, &str, EdgeKind)]) -> StructuralGraph {
        let mut graph = StructuralGraph::new();
        for id in nodes {
            graph.add_node(GraphNode::new(*id, *id, NodeKind::Function).with_file_path("m.py"));
        }
        for (source, target, kind) in edges {
            graph.add_edge(source, target, *kind).unwrap();
        }
        graph
    }

    fn ids(nodes: &[&GraphNode]) -> Vec<String> {
        nodes.iter().map(|node| node.id().to_string()).collect()
    }

    #[test]
    fn find_cycles_reports_single_three_node_cycle() {
        let graph = graph_with(
            &["A", "B", "C"],
            &[
                ("A", "B", EdgeKind::Imports),
                ("B", "C", EdgeKind::Imports),
                ("C", "A", EdgeKind::Imports),
            ],
        );
        let cycles = graph.algorithms().find_cycles(None, 10);
        assert_eq!(cycles.len(), 1);
        assert_eq!(ids(&cycles[0]), vec!["A", "B", "C", "A"]);
        assert_eq!(cycles[0].len() - 1, 3);
    }

    #[test]
    fn find_cycles_respects_limit_and_edge_filter() {
        let graph = graph_with(
            &["A", "B", "C", "D"],
            &[
                ("A", "B", EdgeKind::Calls),
                ("B", "A", EdgeKind::Calls),
                ("C", "D", EdgeKind::Imports),
                ("D", "C", EdgeKind::Imports),
            ],
        );
        let algos = graph.algorithms();
        assert_eq!(algos.find_cycles(None, 10).len(), 2);
        assert_eq!(algos.find_cycles(None, 1).len(), 1);

        let imports_only = algos.find_cycles(Some(EdgeKind::Imports), 10);
        assert_eq!(imports_only.len(), 1);
        assert_eq!(ids(&imports_only[0]), vec!["C", "D", "C"]);
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let graph = graph_with(
            &["A", "B", "C"],
            &[("A", "B", EdgeKind::Calls), ("A", "C", EdgeKind::Calls), ("B", "C", EdgeKind::Calls)],
        );
        assert!(graph.algorithms().find_cycles(None, 10).is_empty());
    }

    #[test]
    fn sccs_are_sorted_by_size_and_filtered() {
        let graph = graph_with(
            &["A", "B", "C", "D", "E", "F"],
            &[
                ("A", "B", EdgeKind::Calls),
                ("B", "A", EdgeKind::Calls),
                ("C", "D", EdgeKind::Calls),
                ("D", "E", EdgeKind::Calls),
                ("E", "C", EdgeKind::Calls),
                ("E", "F", EdgeKind::Calls),
            ],
        );
        let sccs = graph.algorithms().find_sccs(None, 2);
        assert_eq!(sccs.len(), 2);
        assert_eq!(sccs[0].len(), 3);
        assert_eq!(sccs[1].len(), 2);

        let mut largest = ids(&sccs[0]);
        largest.sort();
        assert_eq!(largest, vec!["C", "D", "E"]);

        let singletons = graph.algorithms().find_sccs(None, 1);
        assert_eq!(singletons.len(), 3);
    }

    #[test]
    fn topological_sort_orders_sources_first_and_detects_cycles() {
        let graph = graph_with(
            &["main", "util", "io"],
            &[
                ("main", "util", EdgeKind::Imports),
                ("util", "io", EdgeKind::Imports),
                ("io", "main", EdgeKind::Calls),
            ],
        );
        let order = graph
            .algorithms()
            .topological_sort(EdgeKind::Imports, None)
            .expect("imports are acyclic");
        assert_eq!(ids(&order), vec!["main", "util", "io"]);

        assert!(graph.algorithms().topological_sort(EdgeKind::Calls, None).is_some());

        let cyclic = graph_with(
            &["a", "b"],
            &[("a", "b", EdgeKind::Imports), ("b", "a", EdgeKind::Imports)],
        );
        assert!(cyclic.algorithms().topological_sort(EdgeKind::Imports, None).is_none());
    }

    #[test]
    fn topological_sort_breaks_ties_by_insertion_order() {
        let graph = graph_with(&["z", "y", "x"], &[]);
        let order = graph
            .algorithms()
            .topological_sort(EdgeKind::Imports, None)
            .unwrap();
        assert_eq!(ids(&order), vec!["z", "y", "x"]);
    }

    #[test]
    fn topological_sort_filters_node_kind() {
        let mut graph = StructuralGraph::new();
        graph.add_node(GraphNode::new("m1", "m1", NodeKind::Module));
        graph.add_node(GraphNode::new("f1", "f1", NodeKind::Function));
        graph.add_node(GraphNode::new("m2", "m2", NodeKind::Module));
        graph.add_edge("m2", "m1", EdgeKind::Imports).unwrap();
        graph.add_edge("f1", "m2", EdgeKind::Imports).unwrap();

        let order = graph
            .algorithms()
            .topological_sort(EdgeKind::Imports, Some(NodeKind::Module))
            .unwrap();
        assert_eq!(ids(&order), vec!["m2", "m1"]);
    }

    #[test]
    fn impact_follows_incoming_edges_within_depth() {
        let graph = graph_with(
            &["core", "service", "handler", "main"],
            &[
                ("service", "core", EdgeKind::Calls),
                ("handler", "service", EdgeKind::Calls),
                ("main", "handler", EdgeKind::Calls),
            ],
        );
        let algos = graph.algorithms();
        let impact = algos.get_impact("core", 2, None);
        assert_eq!(ids(&impact), vec!["core", "service", "handler"]);

        let full = algos.get_impact("core", 10, None);
        assert_eq!(full.len(), 4);

        let none = algos.get_impact("core", 10, Some(&[EdgeKind::Imports]));
        assert_eq!(ids(&none), vec!["core"]);
    }

    #[test]
    fn dependencies_follow_outgoing_edges_and_exclude_start() {
        let graph = graph_with(
            &["main", "handler", "service"],
            &[
                ("main", "handler", EdgeKind::Calls),
                ("handler", "service", EdgeKind::Uses),
            ],
        );
        let deps = graph.algorithms().get_dependencies("main", 5, None);
        assert_eq!(ids(&deps), vec!["handler", "service"]);
        assert!(graph.algorithms().get_dependencies("nothing", 5, None).is_empty());
    }

    #[test]
    fn find_path_returns_shortest_route_or_none() {
        let graph = graph_with(
            &["main", "a", "b", "target"],
            &[
                ("main", "a", EdgeKind::Calls),
                ("a", "b", EdgeKind::Calls),
                ("b", "target", EdgeKind::Calls),
                ("main", "target", EdgeKind::Imports),
            ],
        );
        let algos = graph.algorithms();
        let direct = algos.find_path("main", "target", 10, None).unwrap();
        assert_eq!(ids(&direct), vec!["main", "target"]);

        let calls = algos
            .find_path("main", "target", 10, Some(&[EdgeKind::Calls]))
            .unwrap();
        assert_eq!(ids(&calls), vec!["main", "a", "b", "target"]);

        assert!(algos
            .find_path("main", "target", 3, Some(&[EdgeKind::Calls]))
            .is_none());
        assert!(algos.find_path("target", "main", 10, None).is_none());
    }

    #[test]
    fn subgraph_includes_containment_parents() {
        let mut graph = StructuralGraph::new();
        graph.add_node(GraphNode::new("mod", "app_module", NodeKind::Module));
        graph.add_node(GraphNode::new("cls", "Handler", NodeKind::Class));
        graph.add_node(GraphNode::new("fn", "helper", NodeKind::Function));
        graph.add_node(GraphNode::new("far", "far_away", NodeKind::Function));
        graph.add_edge("mod", "cls", EdgeKind::Contains).unwrap();
        graph.add_edge("cls", "fn", EdgeKind::Calls).unwrap();
        graph.add_edge("fn", "far", EdgeKind::Calls).unwrap();

        let sub = graph.algorithms().get_subgraph("Handler", 1);
        assert_eq!(sub.center_node_id.as_deref(), Some("cls"));
        let mut node_ids: Vec<&str> = sub.nodes.keys().map(String::as_str).collect();
        node_ids.sort_unstable();
        assert_eq!(node_ids, vec!["cls", "fn", "mod"]);
        assert_eq!(sub.edges.len(), 2);

        let empty = graph.algorithms().get_subgraph("missing", 2);
        assert!(empty.nodes.is_empty());
        assert!(empty.center_node_id.is_none());
    }

    #[test]
    fn fan_metrics_and_rankings() {
        let graph = graph_with(
            &["hub", "a", "b", "c"],
            &[
                ("hub", "a", EdgeKind::Calls),
                ("hub", "b", EdgeKind::Calls),
                ("hub", "c", EdgeKind::Uses),
                ("a", "c", EdgeKind::Calls),
            ],
        );
        let algos = graph.algorithms();
        let metrics = algos.fan_metrics("hub").unwrap();
        assert_eq!(metrics.fan_out, 3);
        assert_eq!(metrics.call_out, 2);
        assert_eq!(metrics.fan_in, 0);

        let complex = algos.most_complex(1, None, true);
        assert_eq!(complex[0].node_id, "hub");

        let depended = algos.most_depended_on(5, None, true);
        assert_eq!(depended[0].node_id, "c");
        assert_eq!(depended[0].fan_in, 2);

        assert_eq!(ids(&algos.get_callers("c")), vec!["a"]);
        assert_eq!(ids(&algos.get_callees("hub")), vec!["a", "b"]);
    }
}
