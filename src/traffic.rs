//! Periodic traffic model: per-link per-job interval records, job-level
//! unification, and job time periods/penalties (§4.3).
//!
//! Grounded on `original_source/simulate/network_traffic_management.py`'s
//! `TrafficManager`, restructured into the teacher's typed-struct-plus-method
//! style (cf. `cluster.rs`'s `Cluster`).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conflict::cal_job_conflicts;
use crate::error::ClusterSimError;
use crate::model::Interval;
use crate::topology::Link;

/// A per-(link, job) traffic record (§3 "TrafficPattern").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficPattern {
    pub interval: Interval,
    #[serde(rename = "T")]
    pub t: i64,
}

impl TrafficPattern {
    fn validate(&self, job: &str) -> Result<(), ClusterSimError> {
        let iv = self.interval;
        if !(0 <= iv.lo && iv.lo < iv.hi && iv.hi <= self.t) {
            return Err(ClusterSimError::PeriodInvariant {
                job: job.to_string(),
                lo: iv.lo,
                hi: iv.hi,
                period: self.t,
            });
        }
        Ok(())
    }
}

/// `[start_time, end_time)` per job (§3 "JobTimePeriod").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTimePeriod {
    pub start_time: i64,
    pub end_time: i64,
}

/// Owns all per-step traffic bookkeeping: link records, the unified per-job
/// pattern, job time periods, penalties, and the running/ended lifecycle
/// (§3 "Ownership").
#[derive(Debug, Clone)]
pub struct TrafficModel {
    pub current_time: i64,
    link_traffic_pattern: HashMap<Link, HashMap<String, TrafficPattern>>,
    job_traffic_pattern: HashMap<String, TrafficPattern>,
    job_time_period: HashMap<String, JobTimePeriod>,
    penalty_time: HashMap<String, i64>,
    running_jobs: Vec<String>,
    ended_jobs: Vec<String>,
}

impl Default for TrafficModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficModel {
    pub fn new() -> Self {
        TrafficModel {
            current_time: 0,
            link_traffic_pattern: HashMap::new(),
            job_traffic_pattern: HashMap::new(),
            job_time_period: HashMap::new(),
            penalty_time: HashMap::new(),
            running_jobs: Vec::new(),
            ended_jobs: Vec::new(),
        }
    }

    /// Register a newly-deployed job's time window. Must be called before
    /// the first [`TrafficModel::add`] for that job.
    pub fn add_job(&mut self, job: &str, start_time: i64, end_time: i64) {
        self.running_jobs.push(job.to_string());
        self.job_time_period
            .insert(job.to_string(), JobTimePeriod { start_time, end_time });
    }

    /// Record (or widen) a traffic pattern for `job` on `link` (§4.3 "Add-pattern").
    pub fn add(
        &mut self,
        link: Link,
        job: &str,
        interval: Interval,
        t: i64,
    ) -> Result<(), ClusterSimError> {
        let jobs = self.link_traffic_pattern.entry(link).or_default();
        match jobs.get_mut(job) {
            None => {
                let pattern = TrafficPattern { interval, t };
                pattern.validate(job)?;
                jobs.insert(job.to_string(), pattern);
            }
            Some(existing) => {
                let length = interval.len();
                existing.interval.lo -= length;
                existing.validate(job)?;
            }
        }
        Ok(())
    }

    /// Normalize every `(link, job)` record for each job to share the
    /// minimum `lo` observed across its links (§4.3 "Unify").
    pub fn unify(&mut self) {
        let mut lo_min: HashMap<String, i64> = HashMap::new();
        for jobs in self.link_traffic_pattern.values() {
            for (job, pattern) in jobs {
                lo_min
                    .entry(job.clone())
                    .and_modify(|m| *m = (*m).min(pattern.interval.lo))
                    .or_insert(pattern.interval.lo);
            }
        }
        for jobs in self.link_traffic_pattern.values_mut() {
            for (job, pattern) in jobs.iter_mut() {
                if let Some(&lo) = lo_min.get(job) {
                    pattern.interval.lo = lo;
                }
            }
        }
        for (job, &lo) in &lo_min {
            if let Some(job_pattern) = self.link_pattern_for(job) {
                self.job_traffic_pattern.insert(
                    job.clone(),
                    TrafficPattern { interval: Interval::new(lo, job_pattern.interval.hi), t: job_pattern.t },
                );
            }
        }
    }

    fn link_pattern_for(&self, job: &str) -> Option<TrafficPattern> {
        self.link_traffic_pattern
            .values()
            .find_map(|jobs| jobs.get(job).cloned())
    }

    /// Compute per-job conflicts in `[current_time, t_next)`, accumulate them
    /// into `penalty_time`, and advance `current_time` (§4.3 "Update-traffic").
    pub fn update_traffic(&mut self, t_next: i64) -> HashMap<String, i64> {
        let conflicts = cal_job_conflicts(
            &self.link_traffic_pattern,
            &self.job_time_period,
            self.current_time,
            t_next,
        );
        for (job, &c) in &conflicts {
            *self.penalty_time.entry(job.clone()).or_insert(0) += c;
            // §3 "JobTimePeriod": end_time moves forward as conflicts
            // accumulate, so end - start stays >= duration(j) with equality
            // iff no conflict was ever assigned (§8 invariant).
            if c != 0 {
                if let Some(period) = self.job_time_period.get_mut(job) {
                    period.end_time += c;
                }
            }
        }
        debug!(step_conflicts = conflicts.len(), "update_traffic");
        self.current_time = t_next;
        conflicts
    }

    /// Shift `start_time` and `end_time` for each `(job, delay)` pair by
    /// `delay mod T_job` (§4.3 "Update-time-periods"). Faithful to the
    /// original's application to *both* bounds — see DESIGN.md §9 Open
    /// Question on `update_job_time_periods`.
    pub fn update_time_periods(&mut self, delays: &HashMap<String, i64>) {
        for (job, &delay) in delays {
            let Some(t) = self.link_pattern_for(job).map(|p| p.t) else {
                continue;
            };
            if t == 0 {
                continue;
            }
            let shift = delay.rem_euclid(t);
            if let Some(period) = self.job_time_period.get_mut(job) {
                period.start_time += shift;
                period.end_time += shift;
            }
        }
    }

    /// Release every running job whose `end_time <= t_next`: drop its link
    /// records, prune emptied links, move it to `ended`, and return the set
    /// released (§4.3 "Release-jobs").
    pub fn release_jobs(&mut self, t_next: i64) -> Vec<String> {
        let mut released = Vec::new();
        for job in self.running_jobs.clone() {
            if self.job_time_period[&job].end_time <= t_next {
                self.release_single_job(&job);
                released.push(job);
            }
        }
        released
    }

    fn release_single_job(&mut self, job: &str) {
        for jobs in self.link_traffic_pattern.values_mut() {
            jobs.remove(job);
        }
        self.link_traffic_pattern.retain(|_, jobs| !jobs.is_empty());
        self.job_traffic_pattern.remove(job);
        self.running_jobs.retain(|j| j != job);
        self.ended_jobs.push(job.to_string());
    }

    pub fn job_list(&self) -> HashSet<String> {
        self.link_traffic_pattern
            .values()
            .flat_map(|jobs| jobs.keys().cloned())
            .collect()
    }

    pub fn link_list(&self) -> Vec<Link> {
        self.link_traffic_pattern.keys().cloned().collect()
    }

    /// `{link: {job: total active-phase duration within its current period}}`,
    /// used by the Steiner-tree edge-cost formula (§4.5.3 step 1).
    pub fn job_duration_by_link(&self) -> HashMap<Link, HashMap<String, i64>> {
        self.link_traffic_pattern
            .iter()
            .map(|(link, jobs)| {
                let durations = jobs
                    .iter()
                    .map(|(job, pattern)| (job.clone(), pattern.interval.len().max(0)))
                    .collect();
                (link.clone(), durations)
            })
            .collect()
    }

    pub fn link_traffic_pattern(&self) -> &HashMap<Link, HashMap<String, TrafficPattern>> {
        &self.link_traffic_pattern
    }

    pub fn job_time_period(&self) -> &HashMap<String, JobTimePeriod> {
        &self.job_time_period
    }

    pub fn penalty_time(&self) -> &HashMap<String, i64> {
        &self.penalty_time
    }

    pub fn running_jobs(&self) -> &[String] {
        &self.running_jobs
    }

    pub fn ended_jobs(&self) -> &[String] {
        &self.ended_jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> Link {
        Link::new("ToR-0", "Spine-0")
    }

    #[test]
    fn interval_merge_on_readd() {
        // §8 scenario 4.
        let mut tm = TrafficModel::new();
        tm.add_job("A", 0, 100);
        tm.add(link(), "A", Interval::new(5, 7), 10).unwrap();
        tm.add(link(), "A", Interval::new(0, 2), 10).unwrap();
        let pattern = tm.link_traffic_pattern()[&link()]["A"].clone();
        assert_eq!(pattern.interval, Interval::new(3, 7));
    }

    #[test]
    fn unify_sets_common_lo_and_is_idempotent() {
        let mut tm = TrafficModel::new();
        let link_b = Link::new("ToR-1", "Spine-0");
        tm.add_job("A", 0, 100);
        tm.add(link(), "A", Interval::new(4, 6), 10).unwrap();
        tm.add(link_b.clone(), "A", Interval::new(1, 3), 10).unwrap();
        tm.unify();
        let lo_1 = tm.link_traffic_pattern()[&link()]["A"].interval.lo;
        let lo_2 = tm.link_traffic_pattern()[&link_b]["A"].interval.lo;
        assert_eq!(lo_1, lo_2);
        assert_eq!(lo_1, 1);

        let snapshot = tm.link_traffic_pattern().clone();
        tm.unify();
        assert_eq!(tm.link_traffic_pattern(), &snapshot);
    }

    #[test]
    fn release_removes_all_job_traces() {
        let mut tm = TrafficModel::new();
        tm.add_job("A", 0, 10);
        tm.add(link(), "A", Interval::new(0, 2), 10).unwrap();
        let released = tm.release_jobs(10);
        assert_eq!(released, vec!["A".to_string()]);
        assert!(tm.link_list().is_empty());
        assert!(!tm.running_jobs().contains(&"A".to_string()));
        assert!(tm.ended_jobs().contains(&"A".to_string()));
    }

    #[test]
    fn conflicting_jobs_push_end_time_forward_by_the_conflict() {
        // §3 "JobTimePeriod" + §8 invariant: end - start >= duration, with
        // equality iff no conflict was ever assigned.
        let mut tm = TrafficModel::new();
        tm.add_job("A", 0, 100);
        tm.add_job("B", 0, 100);
        let l = link();
        tm.add(l.clone(), "A", Interval::new(0, 2), 10).unwrap();
        tm.add(l, "B", Interval::new(1, 3), 10).unwrap();
        tm.unify();
        let conflicts = tm.update_traffic(10);
        let c_a = conflicts["A"];
        assert!(c_a > 0);
        assert_eq!(tm.job_time_period()["A"].end_time, 100 + c_a);
        assert_eq!(tm.penalty_time()["A"], c_a);
    }

    #[test]
    fn single_job_on_link_has_zero_conflict() {
        let mut tm = TrafficModel::new();
        tm.add_job("A", 0, 100);
        tm.add(link(), "A", Interval::new(0, 2), 10).unwrap();
        tm.unify();
        let conflicts = tm.update_traffic(20);
        assert_eq!(conflicts.get("A").copied().unwrap_or(0), 0);
    }

    #[test]
    fn period_invariant_violation_is_rejected() {
        let mut tm = TrafficModel::new();
        tm.add_job("A", 0, 100);
        let err = tm.add(link(), "A", Interval::new(5, 5), 10);
        assert!(err.is_err());
    }
}
