//! Steiner-tree ("ours") solver (§4.5.3) and its external-process contract
//! (§6.2).
//!
//! Grounded on `original_source/solver/generate_stp_file.py`,
//! `solver/graph_constructor.py::construct_bigraph_from_solution_file`,
//! `solver/solve.py::solve`, and `utils/run_stp_solver.py::run_scipstp`. The
//! subprocess boundary is reified as a trait (§9 "Subprocess boundary") so a
//! [`NoopSteinerSolver`] can exercise the fallback path in tests.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use petgraph::graph::NodeIndex;
use tracing::warn;

use crate::error::SolverError;
use crate::solver::{build_bigraph, cassini, connected_components_of, job_name, BiGraph, BipartiteNode};
use crate::topology::Link;
use crate::traffic::TrafficModel;

/// Emit the `.stp` problem file for one connected component (§6 "Steiner-tree
/// problem file"): jobs are terminals `1..=J`, links are Steiner vertices
/// `J+1..=J+L`, edge cost is `1/duration`, and every node's `MaximumDegree`
/// equals the size of the opposite partition.
pub fn generate_stp_file(
    jobs: &[String],
    links: &[Link],
    job_duration_by_link: &HashMap<Link, HashMap<String, i64>>,
    path: &Path,
) -> std::io::Result<()> {
    let mut edges = Vec::new();
    for (job_id, job) in jobs.iter().enumerate() {
        for (link_id, link) in links.iter().enumerate() {
            let duration = job_duration_by_link
                .get(link)
                .and_then(|m| m.get(job))
                .copied()
                .unwrap_or(0);
            if duration == 0 {
                continue;
            }
            edges.push((job_id + 1, jobs.len() + link_id + 1, 1.0 / duration as f64));
        }
    }

    let mut file = fs::File::create(path)?;
    writeln!(file, "33d32945 STP File, STP Format Version  1.00\n")?;
    writeln!(file, "SECTION Graph")?;
    writeln!(file, "Nodes {}", jobs.len() + links.len())?;
    writeln!(file, "Edges {}", edges.len())?;
    for (u, v, cost) in &edges {
        writeln!(file, "E {u} {v} {cost}")?;
    }
    writeln!(file, "END\n")?;

    writeln!(file, "SECTION Terminals")?;
    writeln!(file, "Terminals {}", jobs.len())?;
    for job_id in 1..=jobs.len() {
        writeln!(file, "T {job_id}")?;
    }
    writeln!(file, "END\n")?;

    writeln!(file, "SECTION MaximumDegrees")?;
    for _ in jobs {
        writeln!(file, "MD {}", links.len())?;
    }
    for _ in links {
        writeln!(file, "MD {}", jobs.len())?;
    }
    writeln!(file, "END\n")?;

    writeln!(file, "EOF")?;
    Ok(())
}

/// Parse a solution file (§6 "Steiner solution file") and return the subset
/// of `links` selected by the solver. `node_list` is `jobs ++ links`,
/// 0-indexed, matching the original's `x_<i>_<j>` node-id convention.
pub fn parse_solution_file(
    path: &Path,
    jobs: &[String],
    links: &[Link],
) -> Result<HashSet<Link>, SolverError> {
    let content = fs::read_to_string(path).map_err(|_| SolverError::ParseFailure(path.to_path_buf()))?;
    let node_count = jobs.len() + links.len();
    let mut selected = HashSet::new();

    for line in content.lines() {
        let mut tokens = line.split_whitespace();
        let Some(edge_tok) = tokens.next() else { continue };
        let Some(value_tok) = tokens.next() else { continue };
        if value_tok != "1" {
            continue;
        }
        let Some(rest) = edge_tok.strip_prefix("x_") else { continue };
        let mut parts = rest.split('_');
        let (Some(a), Some(b)) = (parts.next(), parts.next()) else { continue };
        let (Ok(a), Ok(b)) = (a.parse::<usize>(), b.parse::<usize>()) else { continue };
        if a >= node_count || b >= node_count {
            continue;
        }
        for idx in [a, b] {
            if idx >= jobs.len() {
                selected.insert(links[idx - jobs.len()].clone());
            }
        }
    }
    Ok(selected)
}

/// Behind this trait so tests and solver-less environments can swap in a
/// fallback (§9 "Subprocess boundary", §6.2).
pub trait SteinerSolver {
    fn solve(&self, problem_file: &Path, solution_file: &Path) -> Result<PathBuf, SolverError>;
}

/// Configuration for the default subprocess-based solver.
#[derive(Debug, Clone)]
pub struct SteinerSolverConfig {
    pub executable_path: PathBuf,
    pub timeout: Duration,
}

impl Default for SteinerSolverConfig {
    fn default() -> Self {
        SteinerSolverConfig {
            executable_path: PathBuf::from("scipstp"),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Shells out to `scipstp`, mirroring `utils/run_stp_solver.py::run_scipstp`'s
/// command line exactly, with a polling wall-clock timeout (§5 "Timeouts").
pub struct ScipStpSolver {
    config: SteinerSolverConfig,
}

impl ScipStpSolver {
    pub fn new(config: SteinerSolverConfig) -> Self {
        ScipStpSolver { config }
    }
}

impl SteinerSolver for ScipStpSolver {
    fn solve(&self, problem_file: &Path, solution_file: &Path) -> Result<PathBuf, SolverError> {
        if let Some(parent) = solution_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut child = Command::new(&self.config.executable_path)
            .arg("-c")
            .arg("set stp reduction 0")
            .arg("-c")
            .arg(format!("read {}", problem_file.display()))
            .arg("-c")
            .arg("optimize")
            .arg("-c")
            .arg(format!("write solution {}", solution_file.display()))
            .arg("-c")
            .arg("quit")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|_| SolverError::Unavailable)?;

        let deadline = Instant::now() + self.config.timeout;
        loop {
            match child.try_wait()? {
                Some(_) => break,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(SolverError::Timeout(self.config.timeout));
                }
                None => std::thread::sleep(Duration::from_millis(20)),
            }
        }

        if solution_file.exists() {
            Ok(solution_file.to_path_buf())
        } else {
            Err(SolverError::ParseFailure(solution_file.to_path_buf()))
        }
    }
}

/// Always reports the solver as unavailable, exercising the BFS fallback
/// (§7.1, §8 scenario 5).
pub struct NoopSteinerSolver;

impl SteinerSolver for NoopSteinerSolver {
    fn solve(&self, _problem_file: &Path, _solution_file: &Path) -> Result<PathBuf, SolverError> {
        Err(SolverError::Unavailable)
    }
}

fn links_in_component(graph: &BiGraph, component: &[NodeIndex]) -> Vec<Link> {
    component
        .iter()
        .filter_map(|&idx| match &graph[idx] {
            BipartiteNode::Link(link) => Some(link.clone()),
            BipartiteNode::Job(_) => None,
        })
        .collect()
}

fn jobs_in_component(graph: &BiGraph, component: &[NodeIndex]) -> Vec<String> {
    component
        .iter()
        .filter_map(|&idx| job_name(graph, idx).map(|s| s.to_string()))
        .collect()
}

/// Build a component-local subgraph retaining only the chosen links, then
/// run §4.5.2 BFS over it.
fn bfs_over_chosen_links(
    graph: &BiGraph,
    component: &[NodeIndex],
    chosen: &HashSet<Link>,
) -> HashMap<String, i64> {
    let mut sub = BiGraph::new_undirected();
    let mut index_of = HashMap::new();
    for &idx in component {
        let node = graph[idx].clone();
        let keep = match &node {
            BipartiteNode::Job(_) => true,
            BipartiteNode::Link(link) => chosen.contains(link),
        };
        if keep {
            index_of.insert(idx, sub.add_node(node));
        }
    }
    for &idx in component {
        let Some(&u) = index_of.get(&idx) else { continue };
        for neighbor in graph.neighbors(idx) {
            let Some(&v) = index_of.get(&neighbor) else { continue };
            if let Some(edge) = graph.find_edge(idx, neighbor) {
                let weight = *graph.edge_weight(edge).unwrap_or(&0.0);
                sub.update_edge(u, v, weight);
            }
        }
    }
    let sub_component: Vec<NodeIndex> = sub.node_indices().collect();
    cassini::bfs_unify_time_shift(&sub, &sub_component)
}

/// §4.5.3: for each connected component, emit an `.stp` problem, dispatch it
/// to `solver`, and BFS over the chosen-link solution subgraph. On any
/// solver failure, falls back to BFS over the full component graph (§7.1,
/// §8 scenario 5: identical to running `cassini` on the whole graph).
pub fn solve(
    traffic: &TrafficModel,
    solver: &dyn SteinerSolver,
    stp_dir: &Path,
    solution_dir: &Path,
) -> HashMap<String, i64> {
    let graph = build_bigraph(traffic);
    let job_duration_by_link = traffic.job_duration_by_link();
    let mut shifts = HashMap::new();

    for (i, component) in connected_components_of(&graph).into_iter().enumerate() {
        let jobs = jobs_in_component(&graph, &component);
        let links = links_in_component(&graph, &component);
        if jobs.is_empty() || links.is_empty() {
            shifts.extend(cassini::bfs_unify_time_shift(&graph, &component));
            continue;
        }

        let problem_file = stp_dir.join(format!("{}_{i}.stp", traffic.current_time));
        let solution_file = solution_dir.join(format!("{}_{i}.txt", traffic.current_time));

        let outcome = fs::create_dir_all(stp_dir)
            .and_then(|_| generate_stp_file(&jobs, &links, &job_duration_by_link, &problem_file))
            .map_err(SolverError::from)
            .and_then(|_| solver.solve(&problem_file, &solution_file))
            .and_then(|sol_path| parse_solution_file(&sol_path, &jobs, &links));

        match outcome {
            Ok(chosen) => shifts.extend(bfs_over_chosen_links(&graph, &component, &chosen)),
            Err(err) => {
                warn!(error = %err, "steiner solver unavailable, falling back to full-graph BFS");
                shifts.extend(cassini::bfs_unify_time_shift(&graph, &component));
            }
        }
    }
    shifts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Interval;

    #[test]
    fn solution_file_parsing_selects_link_endpoints() {
        let jobs = vec!["A".to_string(), "B".to_string()];
        let links = vec![Link::new("ToR-0", "Spine-0"), Link::new("ToR-1", "Spine-1")];
        let dir = std::env::temp_dir().join("clustersim_test_steiner_parse");
        fs::create_dir_all(&dir).unwrap();
        let sol_path = dir.join("sol.txt");
        fs::write(&sol_path, "x_0_2 1 (obj:0.500000)\nx_1_2 0 (obj:0.0)\n").unwrap();

        let chosen = parse_solution_file(&sol_path, &jobs, &links).unwrap();
        assert!(chosen.contains(&links[0]));
        assert!(!chosen.contains(&links[1]));
    }

    #[test]
    fn noop_solver_triggers_cassini_equivalent_fallback() {
        let mut tm = TrafficModel::new();
        tm.add_job("A", 0, 100);
        tm.add_job("B", 0, 100);
        let link = Link::new("ToR-0", "Spine-0");
        tm.add(link.clone(), "A", Interval::new(0, 2), 10).unwrap();
        tm.add(link, "B", Interval::new(4, 6), 10).unwrap();

        let dir = std::env::temp_dir().join("clustersim_test_steiner_noop");
        let stp_dir = dir.join("stp");
        let sol_dir = dir.join("sol");

        let ours = solve(&tm, &NoopSteinerSolver, &stp_dir, &sol_dir);
        let cassini_shifts = cassini::solve(&tm);
        assert_eq!(ours, cassini_shifts);
    }

    #[test]
    fn stp_file_omits_zero_duration_edges() {
        let jobs = vec!["A".to_string()];
        let links = vec![Link::new("ToR-0", "Spine-0")];
        let mut job_duration_by_link = HashMap::new();
        job_duration_by_link.insert(links[0].clone(), HashMap::from([("A".to_string(), 0i64)]));

        let dir = std::env::temp_dir().join("clustersim_test_steiner_zero");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("zero.stp");
        generate_stp_file(&jobs, &links, &job_duration_by_link, &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("E 1 2"));
        assert!(content.contains("Edges 0"));
    }
}
