//! Live snapshot for the TUI visualizer (§6.1).
//!
//! The simulator loop writes a JSON snapshot to `METRICS_PATH` after every
//! step. The `viz` binary polls this file and re-renders the dashboard.
//! Writes are atomic (write to `.tmp` then rename) to avoid torn reads.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const METRICS_PATH: &str = "/tmp/clustersim_live.json";

/// One step's worth of reporting state (§6.1).
#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct SimSnapshot {
    pub step: u64,
    pub simulated_time: i64,
    pub waiting: usize,
    pub running: usize,
    pub ended: usize,
    pub total: usize,
    /// Name of the last job successfully deployed this step, if any.
    pub last_deployed_job: Option<String>,
    /// Sum of per-job conflicts observed this step.
    pub last_conflict_total: i64,
    /// The configured solver method, rendered for display ("none", "cassini", "ours").
    pub method: String,
    /// Number of jobs the solver assigned a non-zero shift to this step.
    pub last_shift_count: usize,
    /// Number of GPU slots currently occupied, per job.
    pub job_npu_occupied: HashMap<String, usize>,
    /// Cumulative penalty time per job so far.
    pub penalty_time: HashMap<String, i64>,
    /// Number of jobs currently routed over each link, keyed by its
    /// `Display` rendering (`"ToR-0 <-> Spine-3"`), for the dashboard's
    /// per-link occupancy gauge (§6.1).
    pub link_job_counts: HashMap<String, usize>,
    /// Unix timestamp in ms when this snapshot was written.
    pub timestamp_ms: u64,
}

/// Atomically write a snapshot to [`METRICS_PATH`].
pub fn write_snapshot(snapshot: &SimSnapshot) {
    if let Ok(json) = serde_json::to_string(snapshot) {
        let tmp = format!("{METRICS_PATH}.tmp");
        if std::fs::write(&tmp, &json).is_ok() {
            let _ = std::fs::rename(&tmp, METRICS_PATH);
        }
    }
}

/// Read the latest snapshot. Returns `None` if no simulation has run yet or
/// the file can't be parsed.
pub fn read_snapshot() -> Option<SimSnapshot> {
    let data = std::fs::read_to_string(METRICS_PATH).ok()?;
    serde_json::from_str(&data).ok()
}

/// Returns current Unix time in milliseconds.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut snapshot = SimSnapshot {
            step: 3,
            simulated_time: 300,
            waiting: 1,
            running: 2,
            ended: 4,
            total: 7,
            last_deployed_job: Some("A".to_string()),
            last_conflict_total: 5,
            method: "cassini".to_string(),
            last_shift_count: 2,
            ..Default::default()
        };
        snapshot.job_npu_occupied.insert("A".to_string(), 16);
        snapshot.penalty_time.insert("A".to_string(), 5);

        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: SimSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.step, snapshot.step);
        assert_eq!(restored.job_npu_occupied, snapshot.job_npu_occupied);
    }
}
