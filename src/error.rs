//! Error types for the branch-and-bound engine.

use thiserror::Error;

use crate::math::optimization::LpError;

/// Errors surfaced to callers of the solver.
///
/// Expected relaxation failures (infeasible or singular subproblems) never
/// appear here; they are absorbed by the search as pruning decisions.
#[derive(Error, Debug)]
pub enum Error {
    /// The problem data is inconsistent (dimension mismatches and the like).
    #[error("invalid problem: {0}")]
    InvalidProblem(String),

    /// At least one worker is required to run a search.
    #[error("invalid worker count {0}: at least one worker is required")]
    InvalidWorkerCount(usize),

    /// A relaxation failed in a way the search cannot recover from.
    #[error("relaxation of subproblem {node} failed: {source}")]
    Relaxation {
        /// Identifier of the subproblem whose relaxation failed.
        node: u64,
        /// The underlying solver failure.
        #[source]
        source: LpError,
    },

    /// The worker pool could not be started.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, Error>;
