//! Immutable simulation configuration.
//!
//! The original Python kept `job_num`, `arrival_rate`, the period tables,
//! `update_time_interval`, and the all-reduce mode as module-level globals in
//! `params.py`. Per the design note on global mutable state, all of that is
//! reified here into one struct built once and passed to [`crate::simulator::Simulator`]
//! at construction.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::ModelType;

/// All-reduce implementation the topology should use when mapping a job's
/// GPUs to links. Only halving-doubling is implemented; ring is out of scope
/// per the Open Question in §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllReduceImplementation {
    HalvingDoubling,
}

impl Default for AllReduceImplementation {
    fn default() -> Self {
        AllReduceImplementation::HalvingDoubling
    }
}

/// Which shift-assignment solver the simulator loop invokes after each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverMethod {
    /// No mitigation: conflicts accumulate unchecked.
    None,
    /// §4.5.2 — Cassini-like BFS reconciliation over the full bipartite graph.
    Cassini,
    /// §4.5.3 — Steiner-tree subset selection, then BFS over the solution subgraph.
    Ours,
}

/// Clos fabric parameters (§3 "Topology (Clos)").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClosParams {
    pub num_spines: u32,
    pub num_tors: u32,
    pub servers_per_tor: u32,
    pub gpus_per_server: u32,
}

impl Default for ClosParams {
    fn default() -> Self {
        ClosParams {
            num_spines: 12,
            num_tors: 64,
            servers_per_tor: 6,
            gpus_per_server: 8,
        }
    }
}

/// Top-level, immutable simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Total GPU slots in the pool.
    pub num_gpu: usize,
    /// Window length (ticks) of one simulator step.
    pub update_time_interval: i64,
    /// Model-type name -> traffic pattern shared by all jobs of that type.
    pub model_types: HashMap<String, ModelType>,
    /// Clos fabric parameters.
    pub topology: ClosParams,
    /// Which collective implementation the topology maps jobs onto.
    pub all_reduce_implement: AllReduceImplementation,
    /// Shift solver used by the simulator loop each step.
    pub method: SolverMethod,
    /// Number of classes used by the optional max-k-cut solver (§4.5.4).
    pub max_k_cut_classes: usize,
}

impl SimConfig {
    /// A reasonable default configuration for quick experiments and tests:
    /// a modest pool, the default Clos parameters, and no model types (the
    /// caller is expected to add at least one before generating a workload).
    pub fn new(num_gpu: usize) -> Self {
        SimConfig {
            num_gpu,
            update_time_interval: 100,
            model_types: HashMap::new(),
            topology: ClosParams::default(),
            all_reduce_implement: AllReduceImplementation::HalvingDoubling,
            method: SolverMethod::Cassini,
            max_k_cut_classes: 8,
        }
    }

    pub fn with_model_type(mut self, name: impl Into<String>, model: ModelType) -> Self {
        self.model_types.insert(name.into(), model);
        self
    }

    pub fn with_method(mut self, method: SolverMethod) -> Self {
        self.method = method;
        self
    }
}
