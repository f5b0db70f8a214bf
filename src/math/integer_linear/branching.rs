//! Branching variable selection.
//!
//! A [`BranchingStrategy`] is consulted at every node whose relaxation has at
//! least one fractional integer variable. Strategies are chosen when the
//! problem is built, so new heuristics never touch the search loop.

use ndarray::ArrayView1;

use crate::math::integer_linear::is_integer;

/// What a strategy sees when asked for a branching variable.
#[derive(Debug, Clone, Copy)]
pub struct BranchContext<'a> {
    /// The relaxed solution of the node being branched.
    pub relaxed: &'a [f64],
    /// Integrality flags of the problem.
    pub integrality: &'a [bool],
    /// Objective coefficients of the problem.
    pub objective: ArrayView1<'a, f64>,
    /// Integrality tolerance of the search.
    pub tolerance: f64,
}

impl<'a> BranchContext<'a> {
    /// Returns `true` if variable `i` is flagged and not integral.
    pub fn is_fractional(&self, i: usize) -> bool {
        i < self.relaxed.len()
            && self.integrality.get(i).copied().unwrap_or(false)
            && !is_integer(self.relaxed[i], self.tolerance)
    }

    /// Indices of the fractional flagged variables, ascending.
    pub fn fractional(&self) -> impl Iterator<Item = usize> + 'a {
        let ctx = *self;
        (0..ctx.relaxed.len()).filter(move |&i| ctx.is_fractional(i))
    }

    /// Distance of variable `i` to its nearest integer, in `[0, 0.5]`.
    pub fn fractionality(&self, i: usize) -> f64 {
        let value = self.relaxed[i];
        (value - value.round()).abs()
    }
}

/// Selects the variable to split on.
///
/// Called only when at least one flagged variable is fractional, and must
/// return the index of such a variable. Implementations are shared by every
/// worker.
pub trait BranchingStrategy: Send + Sync {
    fn select(&self, ctx: &BranchContext<'_>) -> usize;

    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> BranchingStrategy for F
where
    F: Fn(&BranchContext<'_>) -> usize + Send + Sync,
{
    fn select(&self, ctx: &BranchContext<'_>) -> usize {
        self(ctx)
    }
}

/// Fixes the signature of a closure so it can be used as a [`BranchingStrategy`].
///
/// ```
/// use milp_bnb::math::integer_linear::branching::{from_fn, BranchingStrategy};
///
/// let last = from_fn(|ctx| ctx.fractional().last().unwrap_or(0));
/// assert_eq!(last.name(), "custom");
/// ```
pub fn from_fn<F>(f: F) -> F
where
    F: Fn(&BranchContext<'_>) -> usize + Send + Sync,
{
    f
}

/// Built-in branching heuristics. Ties go to the lowest index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BranchHeuristic {
    /// Largest absolute objective coefficient.
    #[default]
    MaxFun,
    /// Fractional part closest to one half.
    MostFractional,
    /// Fractional part closest to an integer.
    LeastFractional,
    /// Lowest index.
    FirstFractional,
}

impl BranchingStrategy for BranchHeuristic {
    fn select(&self, ctx: &BranchContext<'_>) -> usize {
        let choice = match self {
            BranchHeuristic::MaxFun => best_by(ctx, |i| ctx.objective[i].abs()),
            BranchHeuristic::MostFractional => best_by(ctx, |i| ctx.fractionality(i)),
            BranchHeuristic::LeastFractional => best_by(ctx, |i| -ctx.fractionality(i)),
            BranchHeuristic::FirstFractional => ctx.fractional().next(),
        };
        choice.unwrap_or(0)
    }

    fn name(&self) -> &str {
        match self {
            BranchHeuristic::MaxFun => "max-fun",
            BranchHeuristic::MostFractional => "most-fractional",
            BranchHeuristic::LeastFractional => "least-fractional",
            BranchHeuristic::FirstFractional => "first-fractional",
        }
    }
}

/// Highest-scoring fractional variable; the first one wins on ties.
fn best_by(ctx: &BranchContext<'_>, score: impl Fn(usize) -> f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for i in ctx.fractional() {
        let s = score(i);
        match best {
            Some((_, best_score)) if s <= best_score => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fractional_candidates() {
        let objective = array![1.0, 1.0, 1.0, 1.0];
        let ctx = BranchContext {
            relaxed: &[0.5, 1.0, 2.3, 0.7],
            integrality: &[true, true, true, false],
            objective: objective.view(),
            tolerance: 1e-6,
        };

        assert_eq!(ctx.fractional().collect::<Vec<_>>(), vec![0, 2]);
        assert!(!ctx.is_fractional(3));
        assert!(!ctx.is_fractional(10));
    }

    fn fractional_of<'a>(
        relaxed: &'a [f64],
        integrality: &'a [bool],
        objective: ArrayView1<'a, f64>,
    ) -> impl Iterator<Item = usize> + 'a {
        BranchContext {
            relaxed,
            integrality,
            objective,
            tolerance: 1e-6,
        }
        .fractional()
    }

    #[test]
    fn test_fractional_outlives_context() {
        let objective = array![1.0, 1.0, 1.0];
        let relaxed = [1.5, 2.0, 0.25];
        let integrality = [true, true, true];

        let candidates: Vec<usize> =
            fractional_of(&relaxed, &integrality, objective.view()).collect();

        assert_eq!(candidates, vec![0, 2]);
    }

    #[test]
    fn test_max_fun_prefers_largest_coefficient() {
        let objective = array![1.0, -5.0, 3.0, 10.0];
        let ctx = BranchContext {
            relaxed: &[0.5, 0.5, 0.5, 2.0],
            integrality: &[true, true, true, true],
            objective: objective.view(),
            tolerance: 1e-6,
        };

        assert_eq!(BranchHeuristic::MaxFun.select(&ctx), 1);
    }

    #[test]
    fn test_fractionality_heuristics() {
        let objective = array![1.0, 1.0, 1.0];
        let ctx = BranchContext {
            relaxed: &[0.1, 0.45, 2.8],
            integrality: &[true, true, true],
            objective: objective.view(),
            tolerance: 1e-6,
        };

        assert_eq!(BranchHeuristic::MostFractional.select(&ctx), 1);
        assert_eq!(BranchHeuristic::LeastFractional.select(&ctx), 0);
        assert_eq!(BranchHeuristic::FirstFractional.select(&ctx), 0);
    }

    #[test]
    fn test_ties_go_to_lowest_index() {
        let objective = array![2.0, 2.0, 2.0];
        let ctx = BranchContext {
            relaxed: &[1.0, 0.5, 0.5],
            integrality: &[true, true, true],
            objective: objective.view(),
            tolerance: 1e-6,
        };

        assert_eq!(BranchHeuristic::MaxFun.select(&ctx), 1);
        assert_eq!(BranchHeuristic::MostFractional.select(&ctx), 1);
    }

    #[test]
    fn test_closure_strategy() {
        let last = from_fn(|ctx| ctx.fractional().last().unwrap_or(0));
        let objective = array![1.0, 1.0, 1.0];
        let ctx = BranchContext {
            relaxed: &[0.5, 0.5, 1.0],
            integrality: &[true, true, true],
            objective: objective.view(),
            tolerance: 1e-6,
        };

        assert_eq!(last.select(&ctx), 1);
        assert_eq!(last.name(), "custom");
    }
}
