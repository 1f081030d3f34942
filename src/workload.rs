//! Workload generation and JSON load/save (§6 "Jobs JSON", out of scope per
//! §1 but specified at its interface; implemented here since it is the
//! ambient glue a complete crate needs).
//!
//! Grounded on `original_source/utils/random_generate.py` (geometric
//! inter-arrival times, CDF sampling) and `simulate/simulator.py::generate_random_jobs`
//! / `load_jobs_from_json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand_distr::{Distribution, Geometric};
use serde::{Deserialize, Serialize};

use crate::error::ClusterSimError;
use crate::model::Job;

/// `{job_name -> Job}`, the on-disk Jobs JSON shape (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workload {
    pub jobs: HashMap<String, Job>,
}

impl Workload {
    pub fn new() -> Self {
        Workload::default()
    }

    pub fn load_from_json(path: &Path) -> Result<Self, ClusterSimError> {
        let data = std::fs::read_to_string(path)?;
        let jobs: HashMap<String, Job> = serde_json::from_str(&data)?;
        for (name, job) in &jobs {
            if job.duration <= 0 || job.size == 0 {
                return Err(ClusterSimError::WorkloadMalformed(format!(
                    "job {name} has non-positive duration or zero size"
                )));
            }
        }
        Ok(Workload { jobs })
    }

    /// Save to `save/jobs/jobs_data_<timestamp>.json` (§6), `timestamp`
    /// formatted by the caller (e.g. `chrono`'s `%Y%m%d_%H%M%S`) so this
    /// function stays free of wall-clock reads.
    pub fn save_to_json(&self, save_dir: &Path, timestamp: &str) -> Result<PathBuf, ClusterSimError> {
        std::fs::create_dir_all(save_dir)?;
        let path = save_dir.join(format!("jobs_data_{timestamp}.json"));
        let json = serde_json::to_string_pretty(&self.jobs)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Jobs sorted by arrival time, for the simulator's waiting queue. Ties
    /// break on job name so deploy order (and hence GPU slot assignment) is
    /// reproducible rather than following `HashMap` iteration order (§5
    /// "Determinism").
    pub fn jobs_by_arrival(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.arrival_time.cmp(&b.arrival_time).then_with(|| a.name.cmp(&b.name)));
        jobs
    }
}

/// Cumulative geometric-interarrival start times (§"generate_start_times"):
/// `start[i] = start[i-1] + Geometric(1/arrival_rate)`.
///
/// `numpy.random.geometric` counts trials-to-first-success, support `{1, 2,
/// ...}`; `rand_distr::Geometric` counts failures-before-success, support
/// `{0, 1, ...}`. The `+ 1` below reconciles the two so inter-arrival gaps
/// are always `>= 1`, matching the original's guarantee of strictly
/// increasing start times.
pub fn generate_start_times(n: usize, arrival_rate: f64, rng: &mut impl Rng) -> Vec<i64> {
    let dist = Geometric::new((1.0 / arrival_rate).clamp(1e-6, 1.0)).expect("valid geometric rate");
    let mut cumulative = 0i64;
    (0..n)
        .map(|_| {
            cumulative += dist.sample(rng) as i64 + 1;
            cumulative
        })
        .collect()
}

/// Sample `size` discrete values from `values` according to `cdf_values`
/// (§"sample_from_cdf"): draw `u ~ Uniform(0,1)`, pick the first index whose
/// CDF entry is `>= u`.
pub fn sample_from_cdf(values: &[i64], cdf_values: &[f64], size: usize, rng: &mut impl Rng) -> Vec<i64> {
    (0..size)
        .map(|_| {
            let u: f64 = rng.gen_range(0.0..1.0);
            let idx = cdf_values.partition_point(|&c| c <= u).min(values.len() - 1);
            values[idx]
        })
        .collect()
}

/// Continuous CDF sampling via linear interpolation (§"sample_from_cdf_continuous").
pub fn sample_from_cdf_continuous(values: &[i64], cdf_values: &[f64], size: usize, rng: &mut impl Rng) -> Vec<i64> {
    (0..size)
        .map(|_| {
            let u: f64 = rng.gen_range(0.0..1.0);
            interpolate(cdf_values, values, u).round() as i64
        })
        .collect()
}

fn interpolate(xs: &[f64], ys: &[i64], x: f64) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    if x <= xs[0] {
        return ys[0] as f64;
    }
    if x >= *xs.last().unwrap() {
        return *ys.last().unwrap() as f64;
    }
    for window in xs.windows(2).zip(ys.windows(2)) {
        let ((x0, x1), (y0, y1)) = ((window.0[0], window.0[1]), (window.1[0], window.1[1]));
        if x >= x0 && x <= x1 {
            let t = (x - x0) / (x1 - x0);
            return y0 as f64 + t * (y1 - y0) as f64;
        }
    }
    *ys.last().unwrap() as f64
}

/// Generate a random workload (§"generate_random_jobs"): geometric arrival
/// times, durations/sizes sampled from CDFs, model types chosen uniformly.
pub fn generate_random_jobs(
    job_num: usize,
    arrival_rate: f64,
    durations: &[i64],
    cdf_durations: &[f64],
    sizes: &[i64],
    cdf_sizes: &[f64],
    model_type_names: &[String],
    rng: &mut impl Rng,
) -> Workload {
    let arrival_times = generate_start_times(job_num, arrival_rate, rng);
    let job_durations = sample_from_cdf(durations, cdf_durations, job_num, rng);
    let job_sizes = sample_from_cdf(sizes, cdf_sizes, job_num, rng);

    let mut jobs = HashMap::new();
    for i in 0..job_num {
        let name = (i + 1).to_string();
        let model_type = model_type_names[rng.gen_range(0..model_type_names.len())].clone();
        jobs.insert(
            name.clone(),
            Job {
                name,
                arrival_time: arrival_times[i],
                duration: job_durations[i],
                size: job_sizes[i] as u32,
                model_type,
            },
        );
    }
    Workload { jobs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn arrival_times_are_strictly_increasing() {
        let mut rng = StdRng::seed_from_u64(42);
        let times = generate_start_times(10, 5.0, &mut rng);
        for window in times.windows(2) {
            assert!(window[1] > window[0]);
        }
    }

    #[test]
    fn cdf_sampling_only_returns_listed_values() {
        let mut rng = StdRng::seed_from_u64(7);
        let values = vec![8, 16, 32];
        let cdf = vec![0.3, 0.7, 1.0];
        let sampled = sample_from_cdf(&values, &cdf, 50, &mut rng);
        assert!(sampled.iter().all(|v| values.contains(v)));
    }

    #[test]
    fn workload_json_round_trips() {
        let mut workload = Workload::new();
        workload.jobs.insert(
            "A".to_string(),
            Job { name: "A".to_string(), arrival_time: 0, duration: 100, size: 16, model_type: "m".to_string() },
        );
        let dir = std::env::temp_dir().join("clustersim_test_workload");
        let path = workload.save_to_json(&dir, "20260726_120000").unwrap();
        let loaded = Workload::load_from_json(&path).unwrap();
        assert_eq!(loaded.jobs["A"], workload.jobs["A"]);
    }

    #[test]
    fn malformed_workload_is_rejected() {
        let dir = std::env::temp_dir().join("clustersim_test_workload_bad");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(&path, r#"{"A": {"name":"A","arrival_time":0,"duration":0,"size":16,"model_type":"m"}}"#).unwrap();
        assert!(Workload::load_from_json(&path).is_err());
    }
}
