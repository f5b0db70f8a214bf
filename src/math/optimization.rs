//! Linear programming layer used for branch-and-bound relaxations.
//!
//! The search engine only talks to a [`RelaxationSolver`]. [`SimplexSolver`]
//! is the default implementation; anything else that can solve a continuous
//! [`LinearProgram`] and classify its failures can be plugged in instead.

pub mod simplex;

pub use simplex::SimplexSolver;

use ndarray::{Array1, Array2};
use thiserror::Error;

/// Configuration options for the linear programming solver.
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    /// Maximum number of pivots across both simplex phases
    pub max_iterations: usize,
    /// Pivot and reduced cost tolerance
    pub tolerance: f64,
    /// Largest phase one residual still accepted as feasible
    pub feasibility_tolerance: f64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            tolerance: 1e-9,
            feasibility_tolerance: 1e-7,
        }
    }
}

/// A continuous linear program in general form.
///
/// ```text
/// minimize    cᵀx
/// subject to  A x  = b
///             G x <= h
/// ```
///
/// Variables are free; sign restrictions are expressed as rows of `G`.
#[derive(Debug, Clone)]
pub struct LinearProgram {
    /// The objective function coefficients (c in min cᵀx)
    pub objective: Array1<f64>,
    /// The equality constraint matrix (A in Ax = b)
    pub eq_matrix: Array2<f64>,
    /// The equality right-hand side (b in Ax = b)
    pub eq_rhs: Array1<f64>,
    /// The inequality constraint matrix (G in Gx ≤ h)
    pub ineq_matrix: Array2<f64>,
    /// The inequality right-hand side (h in Gx ≤ h)
    pub ineq_rhs: Array1<f64>,
}

impl LinearProgram {
    /// Number of decision variables.
    pub fn num_vars(&self) -> usize {
        self.objective.len()
    }

    /// Checks that every matrix and right-hand side agrees on its dimensions.
    pub fn validate(&self) -> Result<(), LpError> {
        let n = self.num_vars();
        if self.eq_matrix.nrows() > 0 && self.eq_matrix.ncols() != n {
            return Err(LpError::DimensionMismatch(format!(
                "equality matrix has {} columns, expected {}",
                self.eq_matrix.ncols(),
                n
            )));
        }
        if self.ineq_matrix.nrows() > 0 && self.ineq_matrix.ncols() != n {
            return Err(LpError::DimensionMismatch(format!(
                "inequality matrix has {} columns, expected {}",
                self.ineq_matrix.ncols(),
                n
            )));
        }
        if self.eq_matrix.nrows() != self.eq_rhs.len() {
            return Err(LpError::DimensionMismatch(format!(
                "equality matrix has {} rows but rhs has {} entries",
                self.eq_matrix.nrows(),
                self.eq_rhs.len()
            )));
        }
        if self.ineq_matrix.nrows() != self.ineq_rhs.len() {
            return Err(LpError::DimensionMismatch(format!(
                "inequality matrix has {} rows but rhs has {} entries",
                self.ineq_matrix.nrows(),
                self.ineq_rhs.len()
            )));
        }
        Ok(())
    }

    /// Evaluates the objective at `x`.
    pub fn objective_at(&self, x: &[f64]) -> f64 {
        self.objective
            .iter()
            .zip(x.iter())
            .map(|(&c, &xi)| c * xi)
            .sum()
    }
}

/// An optimal vertex of a linear program.
#[derive(Debug, Clone)]
pub struct LpSolution {
    /// The optimal point found
    pub x: Vec<f64>,
    /// The value of the objective function at the optimal point
    pub objective_value: f64,
    /// Number of pivots performed
    pub iterations: usize,
}

/// Classified failures of a relaxation solve.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LpError {
    /// The feasible region is empty.
    #[error("linear program is infeasible")]
    Infeasible,

    /// The objective decreases without bound over the feasible region.
    #[error("linear program is unbounded")]
    Unbounded,

    /// The equality system is rank deficient.
    #[error("constraint matrix is singular")]
    Singular,

    /// The pivot budget ran out before an optimal basis was reached.
    #[error("iteration limit of {0} pivots reached")]
    IterationLimit(usize),

    /// The program's matrices disagree on their dimensions.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
}

/// Solves a single continuous linear program.
///
/// Implementations are called concurrently from every search worker, so they
/// must not keep per-call state behind shared references.
pub trait RelaxationSolver: Send + Sync {
    /// Returns an optimal solution of `lp` or a classified failure.
    fn solve(&self, lp: &LinearProgram) -> Result<LpSolution, LpError>;
}
