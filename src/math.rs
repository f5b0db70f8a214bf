pub mod integer_linear;
pub mod optimization;

pub use optimization::{
    LinearProgram, LpError, LpSolution, OptimizationConfig, RelaxationSolver, SimplexSolver,
};

pub use integer_linear::{
    BnbDecision, BranchAndBoundConfig, BranchAndBoundSolver, BranchHeuristic, BranchingStrategy,
    CancelCause, CancellationToken, MilpProblem, MilpSolution, MilpStatus, NodeOrder,
    SearchObserver, SearchStats, Solution,
};
