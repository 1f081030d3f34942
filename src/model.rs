//! Job and model-type data types (§3 "Job", "Model type").

use serde::{Deserialize, Serialize};

/// The `[lo, hi)` active window within one period, in ticks. Shared invariant
/// across the crate: `0 <= lo < hi <= T` for the `T` it's paired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub lo: i64,
    pub hi: i64,
}

impl Interval {
    pub fn new(lo: i64, hi: i64) -> Self {
        Interval { lo, hi }
    }

    pub fn len(&self) -> i64 {
        self.hi - self.lo
    }

    pub fn is_empty(&self) -> bool {
        self.hi <= self.lo
    }
}

/// Attributes shared by every job of a given model type (§3 "Model type").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelType {
    /// Active-phase window within one period.
    pub interval: Interval,
    /// Period length in ticks.
    #[serde(rename = "T")]
    pub t: i64,
    /// Bytes transferred per phase.
    pub msg_len: u64,
}

impl ModelType {
    pub fn new(interval: Interval, t: i64, msg_len: u64) -> Self {
        ModelType { interval, t, msg_len }
    }
}

/// A single training job (§3 "Job"). Lifecycle state lives in [`crate::simulator::Simulator`]
/// and [`crate::traffic::TrafficModel`], not on the struct itself — this is
/// just the immutable description loaded from the workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub arrival_time: i64,
    pub duration: i64,
    pub size: u32,
    pub model_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_len_and_emptiness() {
        let iv = Interval::new(2, 7);
        assert_eq!(iv.len(), 5);
        assert!(!iv.is_empty());
        assert!(Interval::new(4, 4).is_empty());
    }
}
