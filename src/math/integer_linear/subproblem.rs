use std::fmt;

use ndarray::{s, Array1, Array2};

use crate::math::integer_linear::MilpProblem;
use crate::math::optimization::LinearProgram;

/// Side of a bound constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundDirection {
    /// `x_i ≤ threshold`
    AtMost,
    /// `x_i ≥ threshold`
    AtLeast,
}

impl BoundDirection {
    /// Coefficient of `x_i` in the row `± x_i ≤ ± threshold`.
    fn row_sign(self) -> f64 {
        match self {
            BoundDirection::AtMost => 1.0,
            BoundDirection::AtLeast => -1.0,
        }
    }
}

/// A single-variable bound added by a branching decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundConstraint {
    pub var: usize,
    pub threshold: f64,
    pub direction: BoundDirection,
}

impl BoundConstraint {
    pub fn at_most(var: usize, threshold: f64) -> Self {
        Self {
            var,
            threshold,
            direction: BoundDirection::AtMost,
        }
    }

    pub fn at_least(var: usize, threshold: f64) -> Self {
        Self {
            var,
            threshold,
            direction: BoundDirection::AtLeast,
        }
    }
}

impl fmt::Display for BoundConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.direction {
            BoundDirection::AtMost => "<=",
            BoundDirection::AtLeast => ">=",
        };
        write!(f, "x{} {} {}", self.var, op, self.threshold)
    }
}

/// A node of the enumeration tree: the original problem plus the bounds
/// accumulated on the path from the root.
///
/// Subproblems are never modified once built; branching creates new values
/// with [`Subproblem::derive_child`].
#[derive(Debug, Clone)]
pub struct Subproblem<'a> {
    id: u64,
    problem: &'a MilpProblem,
    bounds: Vec<BoundConstraint>,
}

impl<'a> Subproblem<'a> {
    /// The root relaxation: identifier 0 and no bounds.
    pub fn root(problem: &'a MilpProblem) -> Self {
        Self {
            id: 0,
            problem,
            bounds: Vec::new(),
        }
    }

    /// Returns a new subproblem carrying this one's bounds plus `constraint`.
    pub fn derive_child(&self, constraint: BoundConstraint, id: u64) -> Self {
        let mut bounds = Vec::with_capacity(self.bounds.len() + 1);
        bounds.extend_from_slice(&self.bounds);
        bounds.push(constraint);
        Self {
            id,
            problem: self.problem,
            bounds,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of branching decisions between the root and this node.
    pub fn depth(&self) -> usize {
        self.bounds.len()
    }

    pub fn bounds(&self) -> &[BoundConstraint] {
        &self.bounds
    }

    /// Assembles the continuous relaxation of this node.
    ///
    /// The inequality block holds the problem's own rows followed by one row
    /// per bound constraint, in the order the bounds were added. Integrality
    /// is dropped.
    pub fn to_relaxation(&self) -> LinearProgram {
        let problem = self.problem;
        let n = problem.num_vars();
        let base = problem.ineq_matrix.nrows();
        let rows = base + self.bounds.len();

        let mut ineq_matrix = Array2::zeros((rows, n));
        let mut ineq_rhs = Array1::zeros(rows);
        if base > 0 {
            ineq_matrix
                .slice_mut(s![..base, ..])
                .assign(&problem.ineq_matrix);
            ineq_rhs.slice_mut(s![..base]).assign(&problem.ineq_rhs);
        }
        for (r, bound) in self.bounds.iter().enumerate() {
            let sign = bound.direction.row_sign();
            ineq_matrix[[base + r, bound.var]] = sign;
            ineq_rhs[base + r] = sign * bound.threshold;
        }

        LinearProgram {
            objective: problem.objective.clone(),
            eq_matrix: problem.eq_matrix.clone(),
            eq_rhs: problem.eq_rhs.clone(),
            ineq_matrix,
            ineq_rhs,
        }
    }
}
