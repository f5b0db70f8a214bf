use log::{debug, info, warn};
use rayon::ThreadPoolBuilder;

use crate::error::{Error, Result};
use crate::math::integer_linear::cancellation::CancellationToken;
use crate::math::integer_linear::enumeration::{EnumerationTree, SearchOutcome};
use crate::math::integer_linear::instrumentation::{BnbDecision, NoOpObserver, SearchObserver};
use crate::math::integer_linear::{
    is_integer_feasible, BranchAndBoundConfig, MilpProblem, MilpSolution, MilpStatus,
};
use crate::math::optimization::{LpError, RelaxationSolver, SimplexSolver};

/// Maps a relaxation failure to the pruning decision it stands for.
///
/// Infeasible and singular relaxations are expected inside a search and only
/// prune their node. Anything else returns `None` and aborts the search.
pub fn classify_failure(error: &LpError) -> Option<BnbDecision> {
    match error {
        LpError::Infeasible => Some(BnbDecision::SubproblemNotFeasible),
        LpError::Singular => Some(BnbDecision::SubproblemIsDegenerate),
        _ => None,
    }
}

/// Concurrent branch-and-bound solver for [`MilpProblem`]s.
///
/// Every call to [`solve`](Self::solve) runs on its own pool of `workers`
/// threads which share a single work queue and incumbent. With the tree fully
/// explored the returned objective does not depend on the number of workers,
/// although the solution vector may differ between equally good optima.
#[derive(Debug, Clone)]
pub struct BranchAndBoundSolver<S = SimplexSolver> {
    config: BranchAndBoundConfig,
    relaxation: S,
}

impl BranchAndBoundSolver<SimplexSolver> {
    pub fn new(config: BranchAndBoundConfig) -> Self {
        Self {
            config,
            relaxation: SimplexSolver::default(),
        }
    }
}

impl Default for BranchAndBoundSolver<SimplexSolver> {
    fn default() -> Self {
        Self::new(BranchAndBoundConfig::default())
    }
}

impl<S: RelaxationSolver> BranchAndBoundSolver<S> {
    /// Uses `relaxation` to solve the continuous relaxation of every node.
    pub fn with_relaxation_solver(config: BranchAndBoundConfig, relaxation: S) -> Self {
        Self { config, relaxation }
    }

    pub fn config(&self) -> &BranchAndBoundConfig {
        &self.config
    }

    /// Solves `problem` with `workers` threads.
    ///
    /// Returns an error if the problem is malformed, `workers` is zero, or a
    /// relaxation fails in a way that is neither infeasibility nor
    /// degeneracy. Cancellation through `token` is not an error: the result
    /// carries [`MilpStatus::Cancelled`] and the best solution found so far.
    pub fn solve(
        &self,
        problem: &MilpProblem,
        workers: usize,
        token: &CancellationToken,
    ) -> Result<MilpSolution> {
        self.solve_with_observer(problem, workers, token, &NoOpObserver)
    }

    /// Like [`solve`](Self::solve), reporting the fate of every processed
    /// subproblem to `observer`.
    pub fn solve_with_observer(
        &self,
        problem: &MilpProblem,
        workers: usize,
        token: &CancellationToken,
        observer: &dyn SearchObserver,
    ) -> Result<MilpSolution> {
        if workers == 0 {
            return Err(Error::InvalidWorkerCount(workers));
        }
        problem.validate()?;

        info!(
            "starting branch and bound: {} variables ({} integer), {} equality and {} inequality rows, {} workers, branching {}",
            problem.num_vars(),
            problem.integrality.iter().filter(|&&flag| flag).count(),
            problem.eq_matrix.nrows(),
            problem.ineq_matrix.nrows(),
            workers,
            problem.branching.name()
        );

        let tree = EnumerationTree::new(problem, &self.relaxation, observer, &self.config);
        run_workers(&tree, workers, token)?;
        let outcome = tree.into_outcome();

        let result = self.assemble(problem, outcome)?;
        info!(
            "branch and bound finished: {:?}, objective {:?}, {} nodes explored",
            result.status,
            result.objective_value(),
            result.stats.nodes_explored
        );
        Ok(result)
    }

    fn assemble(&self, problem: &MilpProblem, outcome: SearchOutcome) -> Result<MilpSolution> {
        let SearchOutcome {
            incumbent,
            failure,
            cancelled,
            root_infeasible,
            stats,
        } = outcome;

        if let Some((node, source)) = failure {
            return Err(Error::Relaxation { node, source });
        }

        if let Some(cause) = cancelled {
            return Ok(MilpSolution {
                solution: incumbent,
                status: MilpStatus::Cancelled(cause),
                stats,
            });
        }

        if root_infeasible {
            return Ok(MilpSolution {
                solution: None,
                status: MilpStatus::InitialRelaxationInfeasible,
                stats,
            });
        }

        let Some(solution) = incumbent else {
            debug!("search exhausted without an integer-feasible point");
            return Ok(MilpSolution {
                solution: None,
                status: MilpStatus::NoIntegerFeasibleSolution,
                stats,
            });
        };

        if !is_integer_feasible(
            &problem.integrality,
            &solution.x,
            self.config.integrality_tolerance,
        ) {
            warn!("incumbent failed the final integrality check; discarding it");
            return Ok(MilpSolution {
                solution: None,
                status: MilpStatus::NoIntegerFeasibleSolution,
                stats,
            });
        }

        Ok(MilpSolution {
            solution: Some(solution),
            status: MilpStatus::Optimal,
            stats,
        })
    }
}

/// Runs `workers` copies of the worker loop on a dedicated pool and waits
/// for all of them to return.
fn run_workers(
    tree: &EnumerationTree<'_>,
    workers: usize,
    token: &CancellationToken,
) -> Result<()> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("bnb-worker-{i}"))
        .build()?;

    pool.scope(|scope| {
        for worker in 0..workers {
            scope.spawn(move |_| tree.work(worker, token));
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::integer_linear::enumeration::SearchStats;
    use crate::math::integer_linear::{CancelCause, Solution};
    use ndarray::array;

    fn outcome() -> SearchOutcome {
        SearchOutcome {
            incumbent: Some(Solution::new(vec![1.0, 1.0], 2.0)),
            failure: None,
            cancelled: None,
            root_infeasible: false,
            stats: SearchStats::default(),
        }
    }

    fn problem() -> MilpProblem {
        MilpProblem::new(array![1.0, 1.0], vec![true, true])
    }

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure(&LpError::Infeasible),
            Some(BnbDecision::SubproblemNotFeasible)
        );
        assert_eq!(
            classify_failure(&LpError::Singular),
            Some(BnbDecision::SubproblemIsDegenerate)
        );
        assert_eq!(classify_failure(&LpError::Unbounded), None);
        assert_eq!(classify_failure(&LpError::IterationLimit(10)), None);
    }

    #[test]
    fn test_assemble_optimal() {
        let solver = BranchAndBoundSolver::default();
        let result = solver.assemble(&problem(), outcome()).unwrap();

        assert_eq!(result.status, MilpStatus::Optimal);
        assert_eq!(result.solution, Some(Solution::new(vec![1.0, 1.0], 2.0)));
    }

    #[test]
    fn test_assemble_failure_wins_over_cancellation() {
        let solver = BranchAndBoundSolver::default();
        let mut outcome = outcome();
        outcome.failure = Some((4, LpError::Unbounded));
        outcome.cancelled = Some(CancelCause::Cancelled);

        match solver.assemble(&problem(), outcome) {
            Err(Error::Relaxation { node, source }) => {
                assert_eq!(node, 4);
                assert_eq!(source, LpError::Unbounded);
            }
            other => panic!("expected relaxation error, got {:?}", other),
        }
    }

    #[test]
    fn test_assemble_cancelled_keeps_incumbent() {
        let solver = BranchAndBoundSolver::default();
        let mut outcome = outcome();
        outcome.cancelled = Some(CancelCause::DeadlineExceeded);

        let result = solver.assemble(&problem(), outcome).unwrap();

        assert_eq!(
            result.status,
            MilpStatus::Cancelled(CancelCause::DeadlineExceeded)
        );
        assert_eq!(result.objective_value(), Some(2.0));
    }

    #[test]
    fn test_assemble_root_infeasible() {
        let solver = BranchAndBoundSolver::default();
        let mut outcome = outcome();
        outcome.incumbent = None;
        outcome.root_infeasible = true;

        let result = solver.assemble(&problem(), outcome).unwrap();

        assert_eq!(result.status, MilpStatus::InitialRelaxationInfeasible);
        assert!(result.solution.is_none());
    }

    #[test]
    fn test_assemble_without_incumbent() {
        let solver = BranchAndBoundSolver::default();
        let mut outcome = outcome();
        outcome.incumbent = None;

        let result = solver.assemble(&problem(), outcome).unwrap();

        assert_eq!(result.status, MilpStatus::NoIntegerFeasibleSolution);
    }

    #[test]
    fn test_assemble_rejects_fractional_incumbent() {
        let solver = BranchAndBoundSolver::default();
        let mut outcome = outcome();
        outcome.incumbent = Some(Solution::new(vec![0.5, 1.0], 1.5));

        let result = solver.assemble(&problem(), outcome).unwrap();

        assert_eq!(result.status, MilpStatus::NoIntegerFeasibleSolution);
        assert!(result.solution.is_none());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let solver = BranchAndBoundSolver::default();
        let result = solver.solve(&problem(), 0, &CancellationToken::new());

        assert!(matches!(result, Err(Error::InvalidWorkerCount(0))));
    }
}
