use log::trace;
use ndarray::{Array2, Axis};

use crate::math::optimization::{
    LinearProgram, LpError, LpSolution, OptimizationConfig, RelaxationSolver,
};

const EPSILON: f64 = 1e-12;

/// Dense two-phase tableau simplex.
///
/// The general-form program is rewritten into standard form before pivoting:
/// every free variable `x_k` is split into `u_k - v_k` with `u, v ≥ 0`, every
/// inequality row receives a slack column, and rows with a negative right-hand
/// side are negated. Phase one minimises the sum of artificial variables to
/// find a feasible basis; phase two optimises the real objective from there.
/// Both phases use Bland's rule, so the method cannot cycle on degenerate
/// vertices.
///
/// # Examples
///
/// ```
/// use milp_bnb::math::optimization::{LinearProgram, RelaxationSolver, SimplexSolver};
/// use ndarray::{array, Array1, Array2};
///
/// // minimize -x - y
/// // subject to:
/// //   x + y ≤ 1
/// //   x, y ≥ 0
/// let lp = LinearProgram {
///     objective: array![-1.0, -1.0],
///     eq_matrix: Array2::zeros((0, 2)),
///     eq_rhs: Array1::zeros(0),
///     ineq_matrix: array![[1.0, 1.0], [-1.0, 0.0], [0.0, -1.0]],
///     ineq_rhs: array![1.0, 0.0, 0.0],
/// };
///
/// let result = SimplexSolver::default().solve(&lp).unwrap();
/// assert!((result.objective_value + 1.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimplexSolver {
    config: OptimizationConfig,
}

impl SimplexSolver {
    pub fn new(config: OptimizationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }
}

impl RelaxationSolver for SimplexSolver {
    fn solve(&self, lp: &LinearProgram) -> Result<LpSolution, LpError> {
        lp.validate()?;

        let mut tableau = Tableau::standard_form(lp);
        let mut iterations = 0;

        if tableau.num_artificial() > 0 {
            tableau.phase_one(&self.config, &mut iterations)?;
        }
        tableau.phase_two(lp, &self.config, &mut iterations)?;

        let x = tableau.primal();
        let objective_value = lp.objective_at(&x);
        trace!(
            "simplex finished after {} pivots with objective {}",
            iterations,
            objective_value
        );

        Ok(LpSolution {
            x,
            objective_value,
            iterations,
        })
    }
}

/// Rows `0..m` hold the constraints, row `m` holds the reduced costs.
/// The last column is the right-hand side; the objective row's entry there is `-z`.
struct Tableau {
    t: Array2<f64>,
    basis: Vec<usize>,
    num_vars: usize,
    structural: usize,
}

impl Tableau {
    fn standard_form(lp: &LinearProgram) -> Self {
        let n = lp.num_vars();
        let m_eq = lp.eq_rhs.len();
        let m_in = lp.ineq_rhs.len();
        let m = m_eq + m_in;
        let structural = 2 * n + m_in;
        let num_artificial = m_eq + lp.ineq_rhs.iter().filter(|&&h| h < 0.0).count();
        let rhs = structural + num_artificial;

        let mut t = Array2::zeros((m + 1, rhs + 1));
        let mut basis = Vec::with_capacity(m);
        let mut next_artificial = structural;

        for i in 0..m_eq {
            let sign = if lp.eq_rhs[i] < 0.0 { -1.0 } else { 1.0 };
            for k in 0..n {
                t[[i, k]] = sign * lp.eq_matrix[[i, k]];
                t[[i, n + k]] = -sign * lp.eq_matrix[[i, k]];
            }
            t[[i, rhs]] = sign * lp.eq_rhs[i];
            t[[i, next_artificial]] = 1.0;
            basis.push(next_artificial);
            next_artificial += 1;
        }

        for r in 0..m_in {
            let i = m_eq + r;
            let sign = if lp.ineq_rhs[r] < 0.0 { -1.0 } else { 1.0 };
            for k in 0..n {
                t[[i, k]] = sign * lp.ineq_matrix[[r, k]];
                t[[i, n + k]] = -sign * lp.ineq_matrix[[r, k]];
            }
            t[[i, 2 * n + r]] = sign;
            t[[i, rhs]] = sign * lp.ineq_rhs[r];
            if sign > 0.0 {
                basis.push(2 * n + r);
            } else {
                t[[i, next_artificial]] = 1.0;
                basis.push(next_artificial);
                next_artificial += 1;
            }
        }

        Self {
            t,
            basis,
            num_vars: n,
            structural,
        }
    }

    fn rows(&self) -> usize {
        self.basis.len()
    }

    fn rhs_col(&self) -> usize {
        self.t.ncols() - 1
    }

    fn num_artificial(&self) -> usize {
        self.rhs_col() - self.structural
    }

    /// Loads `cost` into the objective row and prices out the current basis.
    fn price(&mut self, cost: &[f64]) {
        let m = self.rows();
        {
            let mut objective = self.t.row_mut(m);
            objective.fill(0.0);
            for (j, &c) in cost.iter().enumerate() {
                objective[j] = c;
            }
        }
        for i in 0..m {
            let basic_cost = cost[self.basis[i]];
            if basic_cost != 0.0 {
                let row = self.t.row(i).to_owned();
                self.t.row_mut(m).scaled_add(-basic_cost, &row);
            }
        }
    }

    fn pivot(&mut self, leaving_row: usize, entering_col: usize) {
        let pivot_element = self.t[[leaving_row, entering_col]];
        self.t
            .row_mut(leaving_row)
            .mapv_inplace(|v| v / pivot_element);
        let pivot_row = self.t.row(leaving_row).to_owned();

        for (i, mut row) in self.t.axis_iter_mut(Axis(0)).enumerate() {
            if i == leaving_row {
                continue;
            }
            let factor = row[entering_col];
            if factor != 0.0 {
                row.scaled_add(-factor, &pivot_row);
                row.mapv_inplace(|v| if v.abs() < EPSILON { 0.0 } else { v });
                row[entering_col] = 0.0;
            }
        }
        self.t[[leaving_row, entering_col]] = 1.0;
        self.basis[leaving_row] = entering_col;
    }

    /// Pivots with Bland's rule until no column accepted by `eligible` has a
    /// negative reduced cost.
    fn iterate(
        &mut self,
        eligible: impl Fn(usize) -> bool,
        config: &OptimizationConfig,
        iterations: &mut usize,
    ) -> Result<(), LpError> {
        let m = self.rows();
        let rhs = self.rhs_col();

        loop {
            let entering = (0..rhs).find(|&j| eligible(j) && self.t[[m, j]] < -config.tolerance);
            let Some(entering_col) = entering else {
                return Ok(());
            };

            let mut leaving: Option<(usize, f64)> = None;
            for i in 0..m {
                let coef = self.t[[i, entering_col]];
                if coef <= config.tolerance {
                    continue;
                }
                let ratio = self.t[[i, rhs]] / coef;
                let better = match leaving {
                    None => true,
                    Some((best, best_ratio)) => {
                        ratio < best_ratio - config.tolerance
                            || (ratio <= best_ratio + config.tolerance
                                && self.basis[i] < self.basis[best])
                    }
                };
                if better {
                    leaving = Some((i, ratio));
                }
            }

            let Some((leaving_row, _)) = leaving else {
                return Err(LpError::Unbounded);
            };
            if *iterations >= config.max_iterations {
                return Err(LpError::IterationLimit(config.max_iterations));
            }

            self.pivot(leaving_row, entering_col);
            *iterations += 1;
        }
    }

    fn phase_one(
        &mut self,
        config: &OptimizationConfig,
        iterations: &mut usize,
    ) -> Result<(), LpError> {
        let rhs = self.rhs_col();
        let cost: Vec<f64> = (0..rhs)
            .map(|j| if j >= self.structural { 1.0 } else { 0.0 })
            .collect();
        self.price(&cost);
        self.iterate(|_| true, config, iterations)?;

        let residual = -self.t[[self.rows(), rhs]];
        trace!("phase one residual {}", residual);
        if residual > config.feasibility_tolerance {
            return Err(LpError::Infeasible);
        }

        self.drive_out_artificials(config.feasibility_tolerance)
    }

    /// Replaces artificial variables left in the basis at zero level. A row
    /// with no structural entry to pivot on is a linear combination of the
    /// other equality rows.
    fn drive_out_artificials(&mut self, pivot_tolerance: f64) -> Result<(), LpError> {
        let rhs = self.rhs_col();
        for i in 0..self.rows() {
            if self.basis[i] < self.structural {
                continue;
            }
            let entering = (0..self.structural).find(|&j| self.t[[i, j]].abs() > pivot_tolerance);
            match entering {
                Some(j) => {
                    self.t[[i, rhs]] = 0.0;
                    self.pivot(i, j);
                }
                None => return Err(LpError::Singular),
            }
        }
        Ok(())
    }

    fn phase_two(
        &mut self,
        lp: &LinearProgram,
        config: &OptimizationConfig,
        iterations: &mut usize,
    ) -> Result<(), LpError> {
        let n = self.num_vars;
        let mut cost = vec![0.0; self.rhs_col()];
        for k in 0..n {
            cost[k] = lp.objective[k];
            cost[n + k] = -lp.objective[k];
        }
        self.price(&cost);

        let structural = self.structural;
        self.iterate(|j| j < structural, config, iterations)
    }

    /// Recovers `x = u - v` from the basic columns.
    fn primal(&self) -> Vec<f64> {
        let n = self.num_vars;
        let rhs = self.rhs_col();
        let mut x = vec![0.0; n];
        for (i, &j) in self.basis.iter().enumerate() {
            let value = self.t[[i, rhs]];
            if j < n {
                x[j] += value;
            } else if j < 2 * n {
                x[j - n] -= value;
            }
        }
        x
    }
}
