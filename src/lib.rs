pub mod error;
pub mod math;

pub use error::{Error, Result};
pub use math::integer_linear::{
    BranchAndBoundConfig, BranchAndBoundSolver, CancellationToken, MilpProblem, MilpSolution,
    MilpStatus, Solution,
};
