//! The time-stepped simulation loop (§4.6).
//!
//! Grounded on `original_source/simulate/simulator.py::Simulator`, restated
//! around the crate's owned types (`GpuPool`, `TrafficModel`, `ClosTopology`)
//! instead of the original's loosely-typed dict state, and using the
//! simplified `method: SolverMethod` dispatch from `SimConfig` instead of the
//! original's string comparison.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::{SimConfig, SolverMethod};
use crate::error::ClusterSimError;
use crate::gpu_pool::GpuPool;
use crate::metrics::{now_ms, write_snapshot, SimSnapshot};
use crate::model::Job;
use crate::solver::{cassini, steiner};
use crate::topology::{gpu_name, ClosTopology};
use crate::traffic::TrafficModel;
use crate::workload::Workload;

/// Where the Steiner solver reads/writes its problem and solution files
/// (§6.2); mirrors the original's `stp_file_dir`/`stp_solution_dir` globals,
/// reified as simulator construction parameters instead of module constants.
#[derive(Debug, Clone)]
pub struct SteinerPaths {
    pub stp_dir: PathBuf,
    pub solution_dir: PathBuf,
}

impl Default for SteinerPaths {
    fn default() -> Self {
        SteinerPaths {
            stp_dir: PathBuf::from("save/stp_files"),
            solution_dir: PathBuf::from("save/stp_solutions"),
        }
    }
}

/// Owns the full simulation state: configuration, the three per-step
/// collaborators (GPU pool, traffic model, topology), and job lifecycle
/// queues (§3 "Ownership": "The simulator owns the workload ... and the
/// solver selection").
pub struct Simulator {
    config: SimConfig,
    topology: ClosTopology,
    gpu_pool: GpuPool,
    traffic: TrafficModel,
    jobs: std::collections::HashMap<String, Job>,
    waiting: Vec<Job>,
    steiner_paths: SteinerPaths,
    steiner_solver: Box<dyn steiner::SteinerSolver>,
    step: u64,
}

impl Simulator {
    pub fn new(config: SimConfig, workload: Workload) -> Self {
        let gpu_pool = GpuPool::new(config.num_gpu);
        let topology = ClosTopology::new(config.topology);
        let waiting = workload.jobs_by_arrival();
        Simulator {
            config,
            topology,
            gpu_pool,
            traffic: TrafficModel::new(),
            jobs: workload.jobs,
            waiting,
            steiner_paths: SteinerPaths::default(),
            steiner_solver: Box::new(steiner::ScipStpSolver::new(Default::default())),
            step: 0,
        }
    }

    pub fn with_steiner_paths(mut self, paths: SteinerPaths) -> Self {
        self.steiner_paths = paths;
        self
    }

    pub fn with_steiner_solver(mut self, solver: Box<dyn steiner::SteinerSolver>) -> Self {
        self.steiner_solver = solver;
        self
    }

    pub fn current_time(&self) -> i64 {
        self.traffic.current_time
    }

    pub fn ended_count(&self) -> usize {
        self.traffic.ended_jobs().len()
    }

    pub fn running_count(&self) -> usize {
        self.traffic.running_jobs().len()
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    pub fn penalty_time(&self) -> &std::collections::HashMap<String, i64> {
        self.traffic.penalty_time()
    }

    /// `deploy_time = max(arrival_time, current_time)`, then attempt GPU
    /// assignment and traffic registration; returns whether deployment
    /// succeeded (§4.6 step 2).
    fn deploy(&mut self, job: &Job) -> Result<bool, ClusterSimError> {
        let current_time = self.traffic.current_time;
        let deploy_time = job.arrival_time.max(current_time);
        if !self.gpu_pool.assign(&job.name, job.size as usize, deploy_time) {
            return Ok(false);
        }

        let model = self
            .config
            .model_types
            .get(&job.model_type)
            .cloned()
            .ok_or_else(|| ClusterSimError::WorkloadMalformed(format!("unknown model_type {}", job.model_type)))?;

        self.traffic.add_job(&job.name, deploy_time, deploy_time + job.duration);

        let mut gpu_ids = self.gpu_pool.gpus_for_job(&job.name);
        gpu_ids.sort_unstable();
        let gpu_list: Vec<String> = gpu_ids.into_iter().map(gpu_name).collect();

        for link in self.topology.hd_link_list(&gpu_list) {
            self.traffic.add(link, &job.name, model.interval, model.t)?;
        }
        Ok(true)
    }

    /// Run one full `[current_time, t_next)` step: release, deploy,
    /// unify, solve, advance (§4.6).
    pub fn step(&mut self, t_next: i64) -> Result<SimSnapshot, ClusterSimError> {
        let released = self.traffic.release_jobs(t_next);
        for job in &released {
            self.gpu_pool.release(job, t_next);
        }

        let mut last_deployed = None;
        let waiting_now: Vec<Job> = self
            .waiting
            .iter()
            .take_while(|job| job.arrival_time < t_next)
            .cloned()
            .collect();
        for job in &waiting_now {
            if self.deploy(job)? {
                last_deployed = Some(job.name.clone());
                self.waiting.retain(|j| j.name != job.name);
            } else {
                break;
            }
        }

        self.traffic.unify();

        let conflicts = self.traffic.update_traffic(t_next);
        let conflict_total: i64 = conflicts.values().sum();

        let shifts = match self.config.method {
            SolverMethod::None => std::collections::HashMap::new(),
            SolverMethod::Cassini => cassini::solve(&self.traffic),
            SolverMethod::Ours => steiner::solve(
                &self.traffic,
                self.steiner_solver.as_ref(),
                &self.steiner_paths.stp_dir,
                &self.steiner_paths.solution_dir,
            ),
        };
        let shift_count = shifts.values().filter(|&&s| s != 0).count();
        self.traffic.update_time_periods(&shifts);

        self.step += 1;
        info!(
            step = self.step,
            time = t_next,
            conflicts = conflict_total,
            released = released.len(),
            "simulator step"
        );

        let link_job_counts = self
            .traffic
            .link_traffic_pattern()
            .iter()
            .map(|(link, jobs)| (link.to_string(), jobs.len()))
            .collect();

        let snapshot = SimSnapshot {
            step: self.step,
            simulated_time: self.traffic.current_time,
            waiting: self.waiting.len(),
            running: self.traffic.running_jobs().len(),
            ended: self.traffic.ended_jobs().len(),
            total: self.jobs.len(),
            last_deployed_job: last_deployed,
            last_conflict_total: conflict_total,
            method: format!("{:?}", self.config.method).to_lowercase(),
            last_shift_count: shift_count,
            job_npu_occupied: self.gpu_pool.job_occupation_counts(),
            penalty_time: self.traffic.penalty_time().clone(),
            link_job_counts,
            timestamp_ms: now_ms(),
        };
        write_snapshot(&snapshot);
        Ok(snapshot)
    }

    /// Run until every job has ended (§4.6 "Loop terminates when `|ended| == |jobs|`").
    pub fn run(&mut self) -> Result<(), ClusterSimError> {
        if self.jobs.is_empty() {
            return Ok(());
        }
        while self.traffic.ended_jobs().len() < self.jobs.len() {
            let t_next = self.traffic.current_time + self.config.update_time_interval;
            self.step(t_next)?;
            if self.waiting.is_empty()
                && self.traffic.running_jobs().is_empty()
                && self.traffic.ended_jobs().len() < self.jobs.len()
            {
                warn!("no jobs running or waiting but not all jobs ended; stopping to avoid an infinite loop");
                break;
            }
        }
        Ok(())
    }

    /// GPU-count-weighted average JCT inflation over multi-server jobs
    /// (§3.1 "Weighted-average JCT inflation metric").
    pub fn weighted_average_inflation(&self) -> f64 {
        let penalty = self.traffic.penalty_time();
        let mut total_weighted = 0.0;
        let mut total_size = 0.0;

        for job in self.jobs.values() {
            if job.size <= 8 {
                continue;
            }
            let rate = penalty.get(&job.name).copied().unwrap_or(0) as f64 / job.duration as f64;
            total_weighted += rate * job.size as f64;
            total_size += job.size as f64;
        }

        if total_size == 0.0 {
            0.0
        } else {
            total_weighted / total_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Interval, ModelType};
    use crate::solver::steiner::NoopSteinerSolver;

    fn config() -> SimConfig {
        SimConfig::new(64).with_model_type(
            "default",
            ModelType::new(Interval::new(0, 2), 10, 1024),
        )
    }

    #[test]
    fn single_job_runs_to_completion_with_no_solver() {
        // §8 scenario 1 shape: one job, no conflicts expected.
        let mut workload = Workload::new();
        workload.jobs.insert(
            "A".to_string(),
            Job { name: "A".to_string(), arrival_time: 0, duration: 100, size: 16, model_type: "default".to_string() },
        );
        let mut sim = Simulator::new(config().with_method(SolverMethod::None), workload)
            .with_steiner_solver(Box::new(NoopSteinerSolver));
        sim.run().unwrap();
        assert_eq!(sim.ended_count(), 1);
        assert_eq!(sim.penalty_time().get("A").copied().unwrap_or(0), 0);
    }

    #[test]
    fn cassini_reduces_total_penalty_versus_no_solver() {
        let mut workload = Workload::new();
        for name in ["A", "B"] {
            workload.jobs.insert(
                name.to_string(),
                Job { name: name.to_string(), arrival_time: 0, duration: 200, size: 48, model_type: "default".to_string() },
            );
        }
        let mut sim_none = Simulator::new(config().with_method(SolverMethod::None), workload.clone())
            .with_steiner_solver(Box::new(NoopSteinerSolver));
        sim_none.run().unwrap();
        let penalty_none: i64 = sim_none.penalty_time().values().sum();

        let mut sim_cassini = Simulator::new(config().with_method(SolverMethod::Cassini), workload)
            .with_steiner_solver(Box::new(NoopSteinerSolver));
        sim_cassini.run().unwrap();
        let penalty_cassini: i64 = sim_cassini.penalty_time().values().sum();

        assert!(penalty_cassini <= penalty_none);
    }

    #[test]
    fn weighted_average_inflation_is_zero_with_only_small_jobs() {
        let mut workload = Workload::new();
        workload.jobs.insert(
            "A".to_string(),
            Job { name: "A".to_string(), arrival_time: 0, duration: 100, size: 8, model_type: "default".to_string() },
        );
        let mut sim = Simulator::new(config().with_method(SolverMethod::None), workload)
            .with_steiner_solver(Box::new(NoopSteinerSolver));
        sim.run().unwrap();
        assert_eq!(sim.weighted_average_inflation(), 0.0);
    }
}
