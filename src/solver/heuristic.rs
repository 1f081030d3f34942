//! Per-link time-shift heuristic (§4.5.1).
//!
//! Grounded on `original_source/solver/time_shifts.py::cal_time_shifts` (the
//! only non-dead-code variant — see DESIGN.md on the Open Question about the
//! source's multiple incompatible versions), restated per the spec's
//! equally-spaced-offset formulation.

use std::collections::HashMap;

use crate::topology::Link;
use crate::traffic::TrafficModel;

/// `{link: {job: shift}}`: for each link with `m` jobs, packs jobs (sorted
/// ascending by period `T`) into offsets `0, T_min/m, 2*T_min/m, ...` and
/// returns the modular shift each job would need to land on its offset.
pub fn cal_time_shifts(traffic: &TrafficModel) -> HashMap<Link, HashMap<String, i64>> {
    let mut time_shifts = HashMap::new();

    for (link, jobs) in traffic.link_traffic_pattern() {
        let mut link_shifts = HashMap::new();
        let m = jobs.len() as i64;
        if m == 0 {
            time_shifts.insert(link.clone(), link_shifts);
            continue;
        }
        let t_min = jobs.values().map(|p| p.t).min().unwrap_or(1).max(1);

        let mut sorted: Vec<&String> = jobs.keys().collect();
        sorted.sort_by_key(|job| jobs[*job].t);

        for (i, job) in sorted.into_iter().enumerate() {
            let pattern = &jobs[job];
            let offset = (i as i64) * t_min / m;
            let start = traffic
                .job_time_period()
                .get(job)
                .map(|p| p.start_time)
                .unwrap_or(0);
            let shift = (offset - (start + pattern.interval.lo)).rem_euclid(pattern.t.max(1));
            link_shifts.insert(job.clone(), shift);
        }
        time_shifts.insert(link.clone(), link_shifts);
    }
    time_shifts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Interval;

    #[test]
    fn single_job_gets_zero_offset() {
        let mut tm = TrafficModel::new();
        tm.add_job("A", 0, 100);
        tm.add(Link::new("ToR-0", "Spine-0"), "A", Interval::new(0, 2), 10).unwrap();
        let shifts = cal_time_shifts(&tm);
        let link_shifts = &shifts[&Link::new("ToR-0", "Spine-0")];
        assert_eq!(link_shifts["A"], 0);
    }

    #[test]
    fn shifts_stay_within_period() {
        let mut tm = TrafficModel::new();
        tm.add_job("A", 3, 100);
        tm.add_job("B", 7, 100);
        let link = Link::new("ToR-0", "Spine-0");
        tm.add(link.clone(), "A", Interval::new(0, 2), 10).unwrap();
        tm.add(link.clone(), "B", Interval::new(0, 2), 12).unwrap();
        let shifts = cal_time_shifts(&tm);
        let link_shifts = &shifts[&link];
        assert!(link_shifts["A"] >= 0 && link_shifts["A"] < 10);
        assert!(link_shifts["B"] >= 0 && link_shifts["B"] < 12);
    }
}
