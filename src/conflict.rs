//! Conflict calculator (§4.4): per-link, per-job-pair overlap within a step
//! window, aggregated to a per-job conflict (sum per link, max across links).
//!
//! Grounded on `original_source/utils/cal_job_conflicts.py`, rasterizing each
//! job's active mask with a `Vec<bool>` instead of `numpy`.

use std::collections::HashMap;

use crate::topology::Link;
use crate::traffic::{JobTimePeriod, TrafficPattern};

/// Rasterize one job's periodic active mask into `[current_time, new_time)`
/// and count ticks where both jobs are simultaneously active (§4.4 "Method").
fn cal_overlap(
    pattern_1: &TrafficPattern,
    pattern_2: &TrafficPattern,
    period_1: JobTimePeriod,
    period_2: JobTimePeriod,
    current_time: i64,
    new_time: i64,
) -> i64 {
    let window = (new_time - current_time).max(0) as usize;
    let mut mask_1 = vec![false; window];
    let mut mask_2 = vec![false; window];

    rasterize(pattern_1, period_1, current_time, new_time, &mut mask_1);
    rasterize(pattern_2, period_2, current_time, new_time, &mut mask_2);

    mask_1
        .iter()
        .zip(mask_2.iter())
        .filter(|(a, b)| **a && **b)
        .count() as i64
}

/// Mark ticks active for one job's periodic interval within the window,
/// starting from `start_time + lo` and unrolling by `T` (§4.4 "Method",
/// "Edge cases").
fn rasterize(
    pattern: &TrafficPattern,
    period: JobTimePeriod,
    current_time: i64,
    new_time: i64,
    mask: &mut [bool],
) {
    let t = pattern.t;
    if t <= 0 {
        return;
    }
    let mut start = period.start_time + pattern.interval.lo;
    let mut end = period.start_time + pattern.interval.hi;

    while start < new_time.min(period.end_time) {
        if end <= current_time {
            start += t;
            end += t;
            continue;
        }
        let low = current_time.max(start) - current_time;
        let high = new_time.min(end) - current_time;
        if high > low {
            for tick in low..high {
                if let Some(slot) = mask.get_mut(tick as usize) {
                    *slot = true;
                }
            }
        }
        start += t;
        end += t;
    }
}

/// Conflict for every ordered pair of distinct jobs sharing one link, then
/// summed per job on that link (§4.4 "Aggregation").
fn cal_link_job_conflicts(
    jobs: &HashMap<String, TrafficPattern>,
    job_time_period: &HashMap<String, JobTimePeriod>,
    current_time: i64,
    new_time: i64,
) -> HashMap<String, i64> {
    let mut link_job_conflicts: HashMap<String, i64> =
        jobs.keys().map(|j| (j.clone(), 0)).collect();

    let names: Vec<&String> = jobs.keys().collect();
    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            let (job_a, job_b) = (names[i], names[j]);
            let (Some(period_a), Some(period_b)) =
                (job_time_period.get(job_a), job_time_period.get(job_b))
            else {
                continue;
            };
            let overlap = cal_overlap(
                &jobs[job_a],
                &jobs[job_b],
                *period_a,
                *period_b,
                current_time,
                new_time,
            );
            *link_job_conflicts.get_mut(job_a).unwrap() += overlap;
            *link_job_conflicts.get_mut(job_b).unwrap() += overlap;
        }
    }
    link_job_conflicts
}

/// Per-job conflict across all links in `[current_time, new_time)`: the
/// bottleneck (maximum) across the links each job touches (§4.4 "Aggregation").
///
/// Note: each link's calculation depends only on read-only inputs, so an
/// implementation may parallelize this loop across links and combine results
/// with per-job `max` (§5) — not done here, kept single-threaded to match the
/// teacher's `rayon`-free baseline.
pub fn cal_job_conflicts(
    link_traffic_pattern: &HashMap<Link, HashMap<String, TrafficPattern>>,
    job_time_period: &HashMap<String, JobTimePeriod>,
    current_time: i64,
    new_time: i64,
) -> HashMap<String, i64> {
    let mut job_conflicts: HashMap<String, i64> = HashMap::new();
    for jobs in link_traffic_pattern.values() {
        let link_conflicts = cal_link_job_conflicts(jobs, job_time_period, current_time, new_time);
        for (job, conflict) in link_conflicts {
            job_conflicts
                .entry(job)
                .and_modify(|c| *c = (*c).max(conflict))
                .or_insert(conflict);
        }
    }
    job_conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Interval;

    fn pattern(lo: i64, hi: i64, t: i64) -> TrafficPattern {
        TrafficPattern { interval: Interval::new(lo, hi), t }
    }

    #[test]
    fn no_conflict_with_single_job_on_link() {
        let mut jobs = HashMap::new();
        jobs.insert("A".to_string(), pattern(0, 2, 10));
        let mut periods = HashMap::new();
        periods.insert("A".to_string(), JobTimePeriod { start_time: 0, end_time: 100 });
        let conflicts = cal_link_job_conflicts(&jobs, &periods, 0, 20);
        assert_eq!(conflicts["A"], 0);
    }

    #[test]
    fn overlapping_jobs_conflict() {
        let mut jobs = HashMap::new();
        jobs.insert("A".to_string(), pattern(0, 2, 10));
        jobs.insert("B".to_string(), pattern(1, 3, 10));
        let mut periods = HashMap::new();
        periods.insert("A".to_string(), JobTimePeriod { start_time: 0, end_time: 100 });
        periods.insert("B".to_string(), JobTimePeriod { start_time: 0, end_time: 100 });
        let conflicts = cal_link_job_conflicts(&jobs, &periods, 0, 10);
        // A active [0,2), B active [1,3): overlap tick 1 only -> 1 tick.
        assert_eq!(conflicts["A"], 1);
        assert_eq!(conflicts["B"], 1);
    }

    #[test]
    fn job_ending_before_window_contributes_nothing() {
        let mut jobs = HashMap::new();
        jobs.insert("A".to_string(), pattern(0, 2, 10));
        jobs.insert("B".to_string(), pattern(0, 2, 10));
        let mut periods = HashMap::new();
        periods.insert("A".to_string(), JobTimePeriod { start_time: 0, end_time: 5 });
        periods.insert("B".to_string(), JobTimePeriod { start_time: 0, end_time: 100 });
        let conflicts = cal_link_job_conflicts(&jobs, &periods, 10, 20);
        assert_eq!(conflicts["A"], 0);
    }

    #[test]
    fn final_job_conflict_is_max_across_links() {
        let mut link1 = HashMap::new();
        link1.insert("A".to_string(), pattern(0, 2, 10));
        link1.insert("B".to_string(), pattern(0, 2, 10));

        let mut link2 = HashMap::new();
        link2.insert("A".to_string(), pattern(0, 5, 10));
        link2.insert("C".to_string(), pattern(0, 5, 10));

        let mut ltp = HashMap::new();
        ltp.insert(Link::new("x", "y"), link1);
        ltp.insert(Link::new("p", "q"), link2);

        let mut periods = HashMap::new();
        for j in ["A", "B", "C"] {
            periods.insert(j.to_string(), JobTimePeriod { start_time: 0, end_time: 100 });
        }

        let conflicts = cal_job_conflicts(&ltp, &periods, 0, 10);
        // Link1: full overlap [0,2) -> 2. Link2: full overlap [0,5) -> 5.
        assert_eq!(conflicts["A"], 5);
    }
}
