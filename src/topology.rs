//! Clos fabric addressing, routing, and collective-traffic → link-set mapping.
//!
//! Topology:
//!   Spine-0 .. Spine-{num_spines-1}
//!   ToR-0 .. ToR-{num_tors-1}, each serving `servers_per_tor` servers
//!   Server-0 .. , each hosting `gpus_per_server` GPUs
//!
//! Intra-ToR traffic is not modeled at the fabric level (§4.1 "Routing rule"):
//! GPUs sharing a ToR communicate over an empty route.

use std::collections::HashSet;

use crate::config::ClosParams;

/// An unordered pair of node names. `Link(a, b) == Link(b, a)` and both hash
/// identically (§3 "Topology (Clos)", §8 invariant). This is the one place in
/// the crate where endpoint order is deliberately erased even though routing
/// arithmetic elsewhere talks about `from -> to`.
#[derive(Debug, Clone, Eq)]
pub struct Link {
    a: String,
    b: String,
}

impl Link {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Link { a: x.into(), b: y.into() }
    }

    pub fn endpoints(&self) -> (&str, &str) {
        (&self.a, &self.b)
    }

    /// Endpoints in a fixed (lexicographic) order, independent of how the
    /// link was constructed — a stable sort key since `Link` itself has no
    /// natural `Ord` (its identity is the unordered pair).
    pub fn canonical(&self) -> (&str, &str) {
        if self.a <= self.b {
            (&self.a, &self.b)
        } else {
            (&self.b, &self.a)
        }
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        (self.a == other.a && self.b == other.b) || (self.a == other.b && self.b == other.a)
    }
}

impl std::hash::Hash for Link {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Hash the lexicographically-sorted pair so order never affects the hash.
        if self.a <= self.b {
            self.a.hash(state);
            self.b.hash(state);
        } else {
            self.b.hash(state);
            self.a.hash(state);
        }
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <-> {}", self.a, self.b)
    }
}

/// A three-tier Clos fabric: GPUs under servers under ToRs, ToRs under spines.
#[derive(Debug, Clone)]
pub struct ClosTopology {
    params: ClosParams,
}

impl ClosTopology {
    pub fn new(params: ClosParams) -> Self {
        ClosTopology { params }
    }

    pub fn server(&self, gpu: u32) -> u32 {
        gpu / self.params.gpus_per_server
    }

    pub fn tor(&self, gpu: u32) -> u32 {
        gpu / (self.params.servers_per_tor * self.params.gpus_per_server)
    }

    /// Route taken from `gpu_a` to `gpu_b`, as an ordered list of links.
    /// Empty if both GPUs share a ToR (§4.1 "Routing rule").
    pub fn route(&self, gpu_a: u32, gpu_b: u32) -> Vec<Link> {
        let tor_a = self.tor(gpu_a);
        let tor_b = self.tor(gpu_b);
        if tor_a == tor_b {
            return Vec::new();
        }
        let server_a = self.server(gpu_a) as u64;
        let spine = ((2_u64.pow(31) - 1) * server_a) % self.params.num_spines as u64;
        vec![
            Link::new(format!("ToR-{tor_a}"), format!("Spine-{spine}")),
            Link::new(format!("Spine-{spine}"), format!("ToR-{tor_b}")),
        ]
    }

    fn route_named(&self, gpu_a: &str, gpu_b: &str) -> Vec<Link> {
        self.route(gpu_id(gpu_a), gpu_id(gpu_b))
    }

    /// Halving-doubling communication pairs within one AllReduce group
    /// (§4.1 "Collective-traffic mapping"). `(GPU-0, GPU-1)` and
    /// `(GPU-1, GPU-0)` are distinct ordered pairs.
    pub fn hd_comm_pairs(&self, gpu_group: &[String]) -> Vec<(String, String)> {
        let n = gpu_group.len();
        if n <= 1 {
            return Vec::new();
        }

        let mut pairs = Vec::new();
        let pow2 = 1usize << (n as f64).log2().floor() as u32;
        let r = n - pow2;

        // Stage 1: reduce the `r` odd survivors into their even partner.
        for i in 0..r {
            pairs.push((gpu_group[2 * i].clone(), gpu_group[2 * i + 1].clone()));
            pairs.push((gpu_group[2 * i + 1].clone(), gpu_group[2 * i].clone()));
        }
        let removed: HashSet<&String> = (0..r).map(|i| &gpu_group[2 * i + 1]).collect();
        let remain: Vec<String> = gpu_group
            .iter()
            .filter(|g| !removed.contains(g))
            .cloned()
            .collect();

        // Stage 2: recursive halving-doubling over the survivors.
        let mut step = 1usize;
        while step < n - r {
            let mut i = 0;
            while i < n - r {
                for j in 0..step {
                    pairs.push((remain[i + j].clone(), remain[i + j + step].clone()));
                    pairs.push((remain[i + j + step].clone(), remain[i + j].clone()));
                }
                i += step * 2;
            }
            step *= 2;
        }
        pairs
    }

    fn hd_comm_link_set(&self, gpu_group: &[String]) -> HashSet<Link> {
        let mut set = HashSet::new();
        for (a, b) in self.hd_comm_pairs(gpu_group) {
            for link in self.route_named(&a, &b) {
                set.insert(link);
            }
        }
        set
    }

    /// Split a job's GPUs into data-parallel AllReduce groups by striding
    /// (§4.1 step 1-2): `dp_ways = min(G / gpus_per_server, 4)`, `per_way = G / dp_ways`,
    /// group `i = gpus[i :: per_way]`.
    pub fn dp_allreduce_groups(&self, job_gpu_list: &[String]) -> Vec<Vec<String>> {
        let g = job_gpu_list.len();
        if g == 0 {
            return Vec::new();
        }
        let dp_ways = (g as u32 / self.params.gpus_per_server).min(4).max(1) as usize;
        let per_way = g / dp_ways;
        (0..per_way)
            .map(|i| job_gpu_list.iter().skip(i).step_by(per_way).cloned().collect())
            .collect()
    }

    /// Links occupied by a job's HD AllReduce, duplicates retained across
    /// groups (§4.1 step 4).
    pub fn hd_link_list(&self, job_gpu_list: &[String]) -> Vec<Link> {
        self.dp_allreduce_groups(job_gpu_list)
            .into_iter()
            .flat_map(|group| self.hd_comm_link_set(&group).into_iter())
            .collect()
    }

    /// Per-phase RDMA 3-tuples `(src, dst, msg_len)` for a single AllReduce
    /// group of size 1, 2, or 4 (§4.1 "RDMA tuple emission"). Other sizes
    /// return no phases.
    pub fn rdma_operate_tuples(
        &self,
        gpu_group: &[String],
        msg_len: u64,
    ) -> Vec<Vec<(String, String, u64)>> {
        match gpu_group.len() {
            2 => {
                let (a, b) = (gpu_group[0].clone(), gpu_group[1].clone());
                vec![
                    vec![(a.clone(), b.clone(), msg_len), (b.clone(), a.clone(), msg_len)],
                    vec![(a.clone(), b.clone(), msg_len * 2), (b.clone(), a.clone(), msg_len * 2)],
                ]
            }
            4 => {
                let (a, b, c, d) = (
                    gpu_group[0].clone(),
                    gpu_group[1].clone(),
                    gpu_group[2].clone(),
                    gpu_group[3].clone(),
                );
                vec![
                    vec![
                        (a.clone(), b.clone(), msg_len),
                        (b.clone(), a.clone(), msg_len),
                        (c.clone(), d.clone(), msg_len),
                        (d.clone(), c.clone(), msg_len),
                    ],
                    vec![
                        (a.clone(), c.clone(), msg_len),
                        (c.clone(), a.clone(), msg_len),
                        (b.clone(), d.clone(), msg_len),
                        (d.clone(), b.clone(), msg_len),
                    ],
                    vec![
                        (a.clone(), c.clone(), msg_len * 2),
                        (c.clone(), a.clone(), msg_len * 2),
                        (b.clone(), d.clone(), msg_len * 2),
                        (d.clone(), b.clone(), msg_len * 2),
                    ],
                    vec![
                        (a.clone(), b.clone(), msg_len * 2),
                        (b.clone(), a.clone(), msg_len * 2),
                        (c.clone(), d.clone(), msg_len * 2),
                        (d.clone(), c.clone(), msg_len * 2),
                    ],
                ]
            }
            _ => Vec::new(),
        }
    }

    /// Per-job RDMA phase tuples, one entry per AllReduce group.
    pub fn job_rdma_operate_tuples(
        &self,
        job_gpu_list: &[String],
        msg_len: u64,
    ) -> Vec<Vec<Vec<(String, String, u64)>>> {
        self.dp_allreduce_groups(job_gpu_list)
            .into_iter()
            .map(|group| self.rdma_operate_tuples(&group, msg_len))
            .collect()
    }
}

/// Parse `"GPU-{id}"` into its numeric id.
fn gpu_id(name: &str) -> u32 {
    name.strip_prefix("GPU-")
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("malformed GPU name: {name}"))
}

/// Format a GPU index as its canonical name.
pub fn gpu_name(id: u32) -> String {
    format!("GPU-{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topo() -> ClosTopology {
        ClosTopology::new(ClosParams {
            num_spines: 12,
            num_tors: 64,
            servers_per_tor: 6,
            gpus_per_server: 8,
        })
    }

    #[test]
    fn link_equality_and_hash_are_unordered() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let a = Link::new("ToR-0", "Spine-1");
        let b = Link::new("Spine-1", "ToR-0");
        assert_eq!(a, b);

        let mut ha = DefaultHasher::new();
        let mut hb = DefaultHasher::new();
        a.hash(&mut ha);
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn intra_tor_route_is_empty() {
        let t = topo();
        // GPUs 0 and 1 share Server-0 and ToR-0.
        assert!(t.route(0, 1).is_empty());
    }

    #[test]
    fn inter_tor_route_has_two_links_through_a_spine() {
        let t = topo();
        // servers_per_tor * gpus_per_server = 48 GPUs per ToR.
        let route = t.route(0, 48);
        assert_eq!(route.len(), 2);
    }

    #[test]
    fn size_one_job_has_no_inter_server_route() {
        let t = topo();
        let pairs = t.hd_comm_pairs(&[gpu_name(0)]);
        assert!(pairs.is_empty());
    }

    #[test]
    fn hd_group_size_for_size_16_job() {
        let t = topo();
        let gpus: Vec<String> = (0..16).map(gpu_name).collect();
        let groups = t.dp_allreduce_groups(&gpus);
        // dp_ways = min(16/8, 4) = 2, per_way = 8
        assert_eq!(groups.len(), 8);
        for g in &groups {
            assert_eq!(g.len(), 2);
        }
    }

    #[test]
    fn single_job_two_tors_scenario_yields_empty_link_set() {
        // §8 scenario 1: size-16 job, all GPUs on one server -> all intra-server.
        let t = topo();
        let gpus: Vec<String> = (0..16).map(gpu_name).collect();
        let links = t.hd_link_list(&gpus);
        assert!(links.is_empty(), "expected no inter-ToR links, got {links:?}");
    }

    #[test]
    fn rdma_tuples_only_emitted_for_groups_of_1_2_4() {
        let t = topo();
        assert!(t.rdma_operate_tuples(&[gpu_name(0)], 100).is_empty());
        assert_eq!(t.rdma_operate_tuples(&[gpu_name(0), gpu_name(1)], 100).len(), 2);
        assert_eq!(
            t.rdma_operate_tuples(&[gpu_name(0), gpu_name(1), gpu_name(2), gpu_name(3)], 100)
                .len(),
            3
        );
        assert!(t
            .rdma_operate_tuples(&(0..3).map(gpu_name).collect::<Vec<_>>(), 100)
            .is_empty());
    }
}
