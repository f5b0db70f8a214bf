//! Mixed-integer linear programming by concurrent branch and bound.
//!
//! A [`MilpProblem`] is solved by [`BranchAndBoundSolver`], which decomposes it
//! into a tree of continuous relaxations explored by a pool of workers sharing
//! one work queue and one incumbent.
//!
//! ```
//! use milp_bnb::math::integer_linear::{
//!     BranchAndBoundSolver, CancellationToken, MilpProblem, MilpStatus,
//! };
//! use ndarray::array;
//!
//! // minimize x + y
//! // subject to:
//! //   x + y ≥ 1.5
//! //   x, y ≥ 0
//! //   x, y integer
//! let problem = MilpProblem::new(array![1.0, 1.0], vec![true, true]).with_inequalities(
//!     array![[-1.0, -1.0], [-1.0, 0.0], [0.0, -1.0]],
//!     array![-1.5, 0.0, 0.0],
//! );
//!
//! let solver = BranchAndBoundSolver::default();
//! let result = solver.solve(&problem, 2, &CancellationToken::new()).unwrap();
//!
//! assert_eq!(result.status, MilpStatus::Optimal);
//! assert!((result.objective_value().unwrap() - 2.0).abs() < 1e-6);
//! ```

pub mod branch_and_bound;
pub mod branching;
pub mod cancellation;
pub mod enumeration;
pub mod incumbent;
pub mod instrumentation;
pub mod subproblem;


use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

pub use branch_and_bound::{classify_failure, BranchAndBoundSolver};
pub use branching::{BranchContext, BranchHeuristic, BranchingStrategy};
pub use cancellation::{CancelCause, CancellationToken};
pub use enumeration::SearchStats;
pub use incumbent::SharedIncumbent;
pub use instrumentation::{BnbDecision, LogObserver, NoOpObserver, NodeEvent, SearchObserver};
pub use subproblem::{BoundConstraint, BoundDirection, Subproblem};

/// A mixed-integer linear program in minimisation form.
///
/// ```text
/// minimize    cᵀx
/// subject to  A x  = b
///             G x <= h
///             x_i integer where integrality[i]
/// ```
///
/// Variables are free unless bounded by rows of `G`.
#[derive(Clone)]
pub struct MilpProblem {
    pub objective: Array1<f64>,
    pub eq_matrix: Array2<f64>,
    pub eq_rhs: Array1<f64>,
    pub ineq_matrix: Array2<f64>,
    pub ineq_rhs: Array1<f64>,
    /// Which variables must take integer values, in the same order as `objective`.
    pub integrality: Vec<bool>,
    /// Picks the variable to split on at every fractional node.
    pub branching: Arc<dyn BranchingStrategy>,
}

impl MilpProblem {
    /// Creates an unconstrained problem using the default branching heuristic.
    pub fn new(objective: Array1<f64>, integrality: Vec<bool>) -> Self {
        let n = objective.len();
        Self {
            objective,
            eq_matrix: Array2::zeros((0, n)),
            eq_rhs: Array1::zeros(0),
            ineq_matrix: Array2::zeros((0, n)),
            ineq_rhs: Array1::zeros(0),
            integrality,
            branching: Arc::new(BranchHeuristic::default()),
        }
    }

    /// Sets the equality constraints `A x = b`.
    pub fn with_equalities(mut self, matrix: Array2<f64>, rhs: Array1<f64>) -> Self {
        self.eq_matrix = matrix;
        self.eq_rhs = rhs;
        self
    }

    /// Sets the inequality constraints `G x <= h`.
    pub fn with_inequalities(mut self, matrix: Array2<f64>, rhs: Array1<f64>) -> Self {
        self.ineq_matrix = matrix;
        self.ineq_rhs = rhs;
        self
    }

    /// Replaces the branching strategy.
    pub fn with_branching<B>(mut self, strategy: B) -> Self
    where
        B: BranchingStrategy + 'static,
    {
        self.branching = Arc::new(strategy);
        self
    }

    pub fn num_vars(&self) -> usize {
        self.objective.len()
    }

    /// Rejects inconsistent problem data before any search starts.
    pub fn validate(&self) -> Result<()> {
        let n = self.num_vars();
        if self.integrality.len() != n {
            return Err(Error::InvalidProblem(format!(
                "integrality vector has length {} but the objective has {} coefficients",
                self.integrality.len(),
                n
            )));
        }
        check_rows("equality", &self.eq_matrix, &self.eq_rhs, n)?;
        check_rows("inequality", &self.ineq_matrix, &self.ineq_rhs, n)?;

        let all_finite = self
            .objective
            .iter()
            .chain(self.eq_matrix.iter())
            .chain(self.eq_rhs.iter())
            .chain(self.ineq_matrix.iter())
            .chain(self.ineq_rhs.iter())
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(Error::InvalidProblem(
                "problem data contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_rows(kind: &str, matrix: &Array2<f64>, rhs: &Array1<f64>, n: usize) -> Result<()> {
    if matrix.nrows() > 0 && matrix.ncols() != n {
        return Err(Error::InvalidProblem(format!(
            "{} matrix has {} columns but the problem has {} variables",
            kind,
            matrix.ncols(),
            n
        )));
    }
    if matrix.nrows() != rhs.len() {
        return Err(Error::InvalidProblem(format!(
            "{} matrix has {} rows but its right-hand side has {} entries",
            kind,
            matrix.nrows(),
            rhs.len()
        )));
    }
    Ok(())
}

impl fmt::Debug for MilpProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MilpProblem")
            .field("objective", &self.objective)
            .field("eq_matrix", &self.eq_matrix)
            .field("eq_rhs", &self.eq_rhs)
            .field("ineq_matrix", &self.ineq_matrix)
            .field("ineq_rhs", &self.ineq_rhs)
            .field("integrality", &self.integrality)
            .field("branching", &self.branching.name())
            .finish()
    }
}

/// A point together with its objective value.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub x: Vec<f64>,
    pub objective_value: f64,
}

impl Solution {
    pub fn new(x: Vec<f64>, objective_value: f64) -> Self {
        Self { x, objective_value }
    }
}

/// Returns `true` if every flagged entry of `x` lies within `tolerance` of an integer.
pub fn is_integer_feasible(integrality: &[bool], x: &[f64], tolerance: f64) -> bool {
    integrality.len() == x.len()
        && integrality
            .iter()
            .zip(x.iter())
            .filter(|(flagged, _)| **flagged)
            .all(|(_, &value)| is_integer(value, tolerance))
}

pub(crate) fn is_integer(value: f64, tolerance: f64) -> bool {
    (value - value.round()).abs() <= tolerance
}

/// How a search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilpStatus {
    /// The tree was exhausted and the incumbent is optimal.
    Optimal,
    /// The tree was exhausted without finding an integer-feasible point.
    NoIntegerFeasibleSolution,
    /// Even the continuous relaxation of the root has no feasible point.
    InitialRelaxationInfeasible,
    /// The search stopped early; any solution is the best found so far.
    Cancelled(CancelCause),
}

/// Result of a branch-and-bound search.
#[derive(Debug, Clone)]
pub struct MilpSolution {
    /// The incumbent, if one was found.
    pub solution: Option<Solution>,
    pub status: MilpStatus,
    pub stats: SearchStats,
}

impl MilpSolution {
    pub fn is_optimal(&self) -> bool {
        self.status == MilpStatus::Optimal
    }

    pub fn objective_value(&self) -> Option<f64> {
        self.solution.as_ref().map(|s| s.objective_value)
    }
}

/// Order in which pending subproblems are taken from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeOrder {
    /// Newest node first. Dives quickly towards integer-feasible leaves.
    #[default]
    DepthFirst,
    /// Oldest node first.
    BreadthFirst,
}

/// Configuration options for the branch-and-bound search.
#[derive(Debug, Clone)]
pub struct BranchAndBoundConfig {
    /// A value is treated as integral if it lies this close to an integer
    pub integrality_tolerance: f64,
    /// Queue discipline for pending subproblems
    pub node_order: NodeOrder,
    /// Stop after this many subproblems have been dequeued
    pub max_nodes: Option<usize>,
    /// Longest an idle worker sleeps before re-checking for cancellation
    pub idle_poll: Duration,
}

impl Default for BranchAndBoundConfig {
    fn default() -> Self {
        Self {
            integrality_tolerance: 1e-6,
            node_order: NodeOrder::default(),
            max_nodes: None,
            idle_poll: Duration::from_millis(5),
        }
    }
}

impl BranchAndBoundConfig {
    pub fn with_integrality_tolerance(mut self, tolerance: f64) -> Self {
        self.integrality_tolerance = tolerance;
        self
    }

    pub fn with_node_order(mut self, order: NodeOrder) -> Self {
        self.node_order = order;
        self
    }

    pub fn with_max_nodes(mut self, nodes: usize) -> Self {
        self.max_nodes = Some(nodes);
        self
    }

    pub fn with_idle_poll(mut self, poll: Duration) -> Self {
        self.idle_poll = poll;
        self
    }
}
