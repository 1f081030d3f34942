//! Cassini-like BFS reconciliation (§4.5.2).
//!
//! Grounded on `original_source/solver/unify_time_shifts.py::bfs_unify_time_shift`
//! and `solver/solve.py::solve_by_cassini`, restated over a `petgraph` graph.

use std::collections::{HashMap, VecDeque};

use petgraph::graph::NodeIndex;

use crate::solver::{connected_components_of, job_name, BiGraph};
use crate::traffic::TrafficModel;

use super::build_bigraph;

fn edge_weight(graph: &BiGraph, a: NodeIndex, b: NodeIndex) -> i64 {
    graph
        .find_edge(a, b)
        .and_then(|e| graph.edge_weight(e))
        .copied()
        .unwrap_or(0.0) as i64
}

/// BFS from the lexicographically smallest job name in the component,
/// assigning it shift 0 and propagating `shift(b) = shift(a) + weight(link,b)
/// - weight(link,a)` along two-hop `job - link - job` steps. The start must
/// be chosen deterministically — not "arbitrary" in the sense of whatever a
/// graph traversal happens to visit first — since every other job's absolute
/// shift, and hence `job_time_period`, is computed relative to it (§5
/// "Determinism", §8 scenario 6).
pub fn bfs_unify_time_shift(graph: &BiGraph, component: &[NodeIndex]) -> HashMap<String, i64> {
    let Some(start) = component
        .iter()
        .filter_map(|&n| job_name(graph, n).map(|name| (name, n)))
        .min_by_key(|(name, _)| *name)
        .map(|(_, n)| n)
    else {
        return HashMap::new();
    };

    let mut shift: HashMap<NodeIndex, i64> = HashMap::new();
    shift.insert(start, 0);
    let mut queue = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        let current_shift = shift[&current];
        for neighbor1 in graph.neighbors(current) {
            for neighbor2 in graph.neighbors(neighbor1) {
                if shift.contains_key(&neighbor2) {
                    continue;
                }
                let w1 = edge_weight(graph, current, neighbor1);
                let w2 = edge_weight(graph, neighbor1, neighbor2);
                shift.insert(neighbor2, current_shift + w2 - w1);
                queue.push_back(neighbor2);
            }
        }
    }

    shift
        .into_iter()
        .filter_map(|(idx, s)| job_name(graph, idx).map(|name| (name.to_string(), s)))
        .collect()
}

/// Run BFS reconciliation over every connected component of the full
/// bipartite graph (§4.5.2, "solve_by_cassini").
pub fn solve(traffic: &TrafficModel) -> HashMap<String, i64> {
    let graph = build_bigraph(traffic);
    let mut shifts = HashMap::new();
    for component in connected_components_of(&graph) {
        shifts.extend(bfs_unify_time_shift(&graph, &component));
    }
    shifts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Interval;
    use crate::topology::Link;

    #[test]
    fn single_job_component_gets_zero_shift() {
        let mut tm = TrafficModel::new();
        tm.add_job("A", 0, 100);
        tm.add(Link::new("ToR-0", "Spine-0"), "A", Interval::new(0, 2), 10).unwrap();
        let shifts = solve(&tm);
        assert_eq!(shifts["A"], 0);
    }

    #[test]
    fn two_jobs_on_shared_link_get_reconciled() {
        let mut tm = TrafficModel::new();
        tm.add_job("A", 0, 100);
        tm.add_job("B", 0, 100);
        let link = Link::new("ToR-0", "Spine-0");
        tm.add(link.clone(), "A", Interval::new(0, 2), 10).unwrap();
        tm.add(link, "B", Interval::new(4, 6), 10).unwrap();
        let shifts = solve(&tm);
        assert!(shifts.contains_key("A"));
        assert!(shifts.contains_key("B"));
    }
}
