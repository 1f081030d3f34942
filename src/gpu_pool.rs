//! GPU pool: contiguous-fit allocation and release over a fixed slot vector
//! (§4.2). Grounded on the teacher's `gpu.rs`/`occupancy.rs` resource-tracking
//! style and the original `simulate/gpu_manager.py` (with its `job_name`
//! shadowing bug fixed — the original's `assign_gpu_to_job` and
//! `release_gpu` both shadow their own parameter inside the loop variable,
//! which is why `assign_job_name` is referenced but never defined; this is a
//! bug in the source, not a behavior to preserve).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Snapshot of pool occupancy for reporting, matching the original's
/// `GPUManager.save_snapshot` (§3.1 "Job description snapshot").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// job_name -> number of GPU slots it occupies.
    pub job_npu_occupied: HashMap<String, usize>,
    /// job_name -> elapsed ticks since deployment, for currently-deployed jobs.
    pub job_description: HashMap<String, i64>,
    /// The raw slot vector: `None` for a free slot, `Some(job_name)` otherwise.
    pub job_deployment: Vec<Option<String>>,
}

/// A fixed-size, ordered sequence of GPU slots. First-fit contiguous-free
/// allocation, not compacting (§4.2 "Contract").
#[derive(Debug, Clone)]
pub struct GpuPool {
    slots: Vec<Option<String>>,
    deployed_time: HashMap<String, i64>,
    released_time: HashMap<String, i64>,
}

impl GpuPool {
    pub fn new(num_gpu: usize) -> Self {
        GpuPool {
            slots: vec![None; num_gpu],
            deployed_time: HashMap::new(),
            released_time: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn num_free(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    /// Try to claim `k` free slots for `job`, in index order. Returns `false`
    /// (no error) if fewer than `k` slots are free — the single failure
    /// signal per §4.2 "Failure mode".
    pub fn assign(&mut self, job: &str, k: usize, t: i64) -> bool {
        if self.num_free() < k {
            return false;
        }
        let mut claimed = 0;
        for slot in self.slots.iter_mut() {
            if slot.is_none() {
                *slot = Some(job.to_string());
                claimed += 1;
                if claimed == k {
                    break;
                }
            }
        }
        self.deployed_time.insert(job.to_string(), t);
        true
    }

    /// Clear every slot holding `job` and record the release time.
    pub fn release(&mut self, job: &str, t: i64) {
        for slot in self.slots.iter_mut() {
            if slot.as_deref() == Some(job) {
                *slot = None;
            }
        }
        self.released_time.insert(job.to_string(), t);
    }

    /// GPU slot indices currently held by `job`, in index order.
    pub fn gpus_for_job(&self, job: &str) -> Vec<u32> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| (s.as_deref() == Some(job)).then_some(i as u32))
            .collect()
    }

    /// Number of slots occupied by each job currently in the pool.
    pub fn job_occupation_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for slot in self.slots.iter().flatten() {
            *counts.entry(slot.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Ticks elapsed since deployment, for every job deployed but not yet
    /// released as of `t`.
    pub fn elapsed_since_deploy(&self, t: i64) -> HashMap<String, i64> {
        self.deployed_time
            .iter()
            .filter(|(job, _)| !self.released_time.contains_key(*job))
            .map(|(job, &deployed)| (job.clone(), t - deployed))
            .collect()
    }

    pub fn snapshot(&self, t: i64) -> PoolSnapshot {
        PoolSnapshot {
            job_npu_occupied: self.job_occupation_counts(),
            job_description: self.elapsed_since_deploy(t),
            job_deployment: self.slots.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_fails_when_pool_is_full() {
        let mut pool = GpuPool::new(8);
        assert!(pool.assign("A", 8, 0));
        assert!(!pool.assign("B", 1, 0));
    }

    #[test]
    fn release_clears_every_slot_for_the_job() {
        let mut pool = GpuPool::new(4);
        pool.assign("A", 4, 0);
        pool.release("A", 10);
        assert_eq!(pool.num_free(), 4);
        assert!(pool.gpus_for_job("A").is_empty());
    }

    #[test]
    fn gpu_fragmentation_scenario() {
        // §8 scenario 3.
        let mut pool = GpuPool::new(24);
        assert!(pool.assign("A", 16, 0));
        pool.release("A", 1);
        assert!(pool.assign("B", 8, 1));
        assert!(pool.assign("C", 16, 2));
        let mut c_gpus = pool.gpus_for_job("C");
        c_gpus.sort();
        assert_eq!(c_gpus.len(), 16);
        // First 16 free slots in index order, with B occupying 8 of the
        // original 24 after A's release freed all of them.
        assert_eq!(c_gpus, (0..24).filter(|g| !pool.gpus_for_job("B").contains(g)).collect::<Vec<_>>());
    }

    #[test]
    fn assigned_job_occupies_exactly_size_slots() {
        let mut pool = GpuPool::new(32);
        pool.assign("A", 16, 0);
        assert_eq!(*pool.job_occupation_counts().get("A").unwrap(), 16);
    }
}
