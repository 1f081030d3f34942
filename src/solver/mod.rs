//! Shift-assignment solvers (§4.5): all consume a [`TrafficModel`] and
//! produce `{job -> delay}`, handed to [`crate::traffic::TrafficModel::update_time_periods`].
//!
//! The shared bipartite representation (jobs vs. links, weighted by the
//! per-link heuristic shift) is built once here and reused by `cassini` and
//! `steiner`, mirroring `original_source/solver/graph_constructor.py`'s
//! `construct_bigraph_from_traffic_manager` but built on `petgraph` instead
//! of `networkx` (§9 "Bipartite graph").

pub mod cassini;
pub mod heuristic;
pub mod maxkcut;
pub mod steiner;

use std::collections::HashMap;

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;

use crate::topology::Link;
use crate::traffic::TrafficModel;

/// A node in the jobs-vs-links bipartite graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BipartiteNode {
    Job(String),
    Link(Link),
}

/// Undirected jobs/links graph; edge weight is the per-link heuristic shift
/// for that (job, link) pair.
pub type BiGraph = UnGraph<BipartiteNode, f64>;

/// Build the full bipartite graph for the current traffic model, weighted by
/// the per-link time-shift heuristic (§4.5.1 feeds §4.5.2/§4.5.3).
///
/// Links and job names are visited in sorted order so `NodeIndex` assignment
/// (and everything downstream that depends on node iteration order, e.g. BFS
/// start selection) is stable across runs rather than following
/// `HashMap` iteration order (§5 "Determinism", §8 scenario 6).
pub fn build_bigraph(traffic: &TrafficModel) -> BiGraph {
    let link_shifts = heuristic::cal_time_shifts(traffic);
    let mut graph = BiGraph::new_undirected();
    let mut index_of: HashMap<BipartiteNode, NodeIndex> = HashMap::new();

    let mut links: Vec<&Link> = traffic.link_traffic_pattern().keys().collect();
    links.sort_by_key(|link| link.canonical());

    for link in links {
        let jobs = &traffic.link_traffic_pattern()[link];
        let link_idx = node_index(&mut graph, &mut index_of, BipartiteNode::Link(link.clone()));
        let mut job_names: Vec<&String> = jobs.keys().collect();
        job_names.sort();
        for job in job_names {
            let job_idx = node_index(&mut graph, &mut index_of, BipartiteNode::Job(job.clone()));
            let weight = link_shifts
                .get(link)
                .and_then(|m| m.get(job))
                .copied()
                .unwrap_or(0) as f64;
            graph.update_edge(job_idx, link_idx, weight);
        }
    }
    graph
}

fn node_index(
    graph: &mut BiGraph,
    index_of: &mut HashMap<BipartiteNode, NodeIndex>,
    node: BipartiteNode,
) -> NodeIndex {
    if let Some(&idx) = index_of.get(&node) {
        return idx;
    }
    let idx = graph.add_node(node.clone());
    index_of.insert(node, idx);
    idx
}

/// Split a graph into its connected components, each as a list of node
/// indices (mirrors `networkx.connected_components` + `subgraph`).
pub fn connected_components_of(graph: &BiGraph) -> Vec<Vec<NodeIndex>> {
    let mut seen = vec![false; graph.node_count()];
    let mut components = Vec::new();

    for start in graph.node_indices() {
        if seen[start.index()] {
            continue;
        }
        let mut component = Vec::new();
        let mut bfs = Bfs::new(graph, start);
        while let Some(node) = bfs.next(graph) {
            if !seen[node.index()] {
                seen[node.index()] = true;
                component.push(node);
            }
        }
        components.push(component);
    }
    components
}

pub(crate) fn job_name(graph: &BiGraph, idx: NodeIndex) -> Option<&str> {
    match &graph[idx] {
        BipartiteNode::Job(name) => Some(name.as_str()),
        BipartiteNode::Link(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Interval;

    #[test]
    fn bigraph_splits_into_independent_components() {
        let mut tm = TrafficModel::new();
        tm.add_job("A", 0, 100);
        tm.add_job("B", 0, 100);
        tm.add(Link::new("ToR-0", "Spine-0"), "A", Interval::new(0, 2), 10).unwrap();
        tm.add(Link::new("ToR-1", "Spine-1"), "B", Interval::new(0, 2), 10).unwrap();

        let graph = build_bigraph(&tm);
        let components = connected_components_of(&graph);
        assert_eq!(components.len(), 2);
    }

    #[test]
    fn bigraph_keeps_shared_link_jobs_in_one_component() {
        let mut tm = TrafficModel::new();
        tm.add_job("A", 0, 100);
        tm.add_job("B", 0, 100);
        let link = Link::new("ToR-0", "Spine-0");
        tm.add(link.clone(), "A", Interval::new(0, 2), 10).unwrap();
        tm.add(link, "B", Interval::new(2, 4), 10).unwrap();

        let graph = build_bigraph(&tm);
        let components = connected_components_of(&graph);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].len(), 3); // 2 jobs + 1 link
    }
}
