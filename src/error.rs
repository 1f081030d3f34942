//! Crate-wide error types.
//!
//! Two error enums mirror the two failure classes of §7 that actually need a
//! `Result`: workload/config problems abort the whole run (`ClusterSimError`),
//! while Steiner-solver problems are recoverable and are swallowed by the
//! simulator loop, which falls back to BFS (`SolverError`). GPU-pool capacity
//! denial is not an error at all — `GpuPool::assign` just returns `bool`.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors — abort the run.
#[derive(Debug, Error)]
pub enum ClusterSimError {
    /// A job record in the workload JSON is missing a required field or
    /// references a `model_type` that isn't in the model table.
    #[error("malformed workload: {0}")]
    WorkloadMalformed(String),

    /// A `(link, job)` traffic record violated `0 <= lo < hi <= T`.
    #[error("period invariant violated for job {job}: lo={lo} hi={hi} T={period}")]
    PeriodInvariant {
        job: String,
        lo: i64,
        hi: i64,
        period: i64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Recoverable errors from the external Steiner-tree solver (§6.2, §7.1).
/// Caught by the simulator loop and converted into a BFS-only fallback.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("steiner solver executable unavailable")]
    Unavailable,

    #[error("steiner solver timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("failed to parse steiner solution file at {0}")]
    ParseFailure(PathBuf),

    #[error("I/O error running steiner solver: {0}")]
    Io(#[from] std::io::Error),
}
