//! NetSim input-file emitter (§6 "NetSim input"), an external collaborator
//! interface: out of scope per §1 but specified down to the wire format, so
//! implemented here as thin glue over [`crate::topology::ClosTopology::job_rdma_operate_tuples`].

use std::fs;
use std::path::{Path, PathBuf};

use crate::topology::{gpu_name, ClosTopology};

/// Gap, in literal NetSim ticks, inserted between successive AllReduce
/// phases within one emitted file.
const PHASE_GAP: &str = "phase:3000";

/// Scale factor applied to a phase's tick offset before writing it
/// (`phase:<delta_ticks * 1e7>`), matching NetSim's finer internal clock.
const PHASE_TIME_SCALE: f64 = 1e7;

/// Emit `save/netsim_input/<job>/rdma_operate_<i>.txt` for every AllReduce
/// group of `job_gpu_list`, one file per group (§6). Gated on `size > 8`
/// (size-8 jobs are intra-server) by the caller — this function emits
/// unconditionally for whatever GPU list it's given.
pub fn emit_job_netsim_input(
    topology: &ClosTopology,
    job: &str,
    job_gpu_list: &[String],
    msg_len: u64,
    phase_delta_ticks: i64,
    out_dir: &Path,
) -> std::io::Result<Vec<PathBuf>> {
    let job_dir = out_dir.join(job);
    fs::create_dir_all(&job_dir)?;

    let groups = topology.job_rdma_operate_tuples(job_gpu_list, msg_len);
    let mut written = Vec::new();
    for (i, phases) in groups.into_iter().enumerate() {
        let path = job_dir.join(format!("rdma_operate_{i}.txt"));
        let content = render_rdma_operate_file(&phases, phase_delta_ticks);
        fs::write(&path, content)?;
        written.push(path);
    }
    Ok(written)
}

fn render_rdma_operate_file(phases: &[Vec<(String, String, u64)>], phase_delta_ticks: i64) -> String {
    let mut out = String::from("stat rdma operate:\n");
    for (i, phase) in phases.iter().enumerate() {
        let offset = (i as i64) * phase_delta_ticks;
        out.push_str(&format!("phase:{}\n", (offset as f64 * PHASE_TIME_SCALE) as i64));
        for (src, dst, msg_len) in phase {
            out.push_str(&format!(
                "Type:rdma_send, src_node:{}, src_port:0, dst_node:{}, dst_port:0, priority:4, msg_len:{}\n",
                gpu_node_id(src),
                gpu_node_id(dst),
                msg_len
            ));
        }
        if i + 1 < phases.len() {
            out.push_str(PHASE_GAP);
            out.push('\n');
        }
    }
    out
}

fn gpu_node_id(gpu_name_str: &str) -> String {
    gpu_name_str.strip_prefix("GPU-").unwrap_or(gpu_name_str).to_string()
}

/// Whether `job` of `size` GPUs should get NetSim files emitted (§6, §8.1
/// "NetSim emission gating"): size-8 jobs are intra-server only.
pub fn should_emit(size: u32) -> bool {
    size > 8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClosParams;

    #[test]
    fn size_eight_job_is_not_gated_in() {
        assert!(!should_emit(8));
        assert!(should_emit(9));
    }

    #[test]
    fn emits_one_file_per_allreduce_group() {
        let topo = ClosTopology::new(ClosParams::default());
        let gpus: Vec<String> = (0..16).map(gpu_name).collect();
        let dir = std::env::temp_dir().join("clustersim_test_netsim");
        let files = emit_job_netsim_input(&topo, "job-1", &gpus, 1024, 10, &dir).unwrap();
        assert_eq!(files.len(), 8); // dp_ways=2, per_way=8 groups of size 2
        for f in &files {
            let content = std::fs::read_to_string(f).unwrap();
            assert!(content.starts_with("stat rdma operate:\n"));
            assert!(content.contains("phase:0"));
        }
    }
}
