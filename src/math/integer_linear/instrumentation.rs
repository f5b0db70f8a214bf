//! Per-node notifications from the search.
//!
//! Observers are told what happened to every processed subproblem. They run
//! on the worker thread that made the decision and cannot influence it, so
//! they should return quickly.

use std::fmt;

use log::debug;

use crate::math::optimization::LpSolution;

/// What the search did with a subproblem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BnbDecision {
    /// The relaxation is infeasible; the node is pruned.
    SubproblemNotFeasible,
    /// The relaxation is singular; the node is pruned.
    SubproblemIsDegenerate,
    /// The relaxed objective cannot beat the incumbent; the node is pruned.
    WorseThanIncumbent,
    /// The relaxation is integer-feasible and became the new incumbent.
    BetterThanIncumbentFeasible,
    /// The relaxation is integer-feasible but another worker got there first
    /// with an objective at least as good.
    FeasibleNotImproving,
    /// The relaxation is fractional; two children were enqueued.
    BetterThanIncumbentBranching,
    /// The relaxation failed unexpectedly and the search is aborted.
    SolverFailure,
}

impl fmt::Display for BnbDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BnbDecision::SubproblemNotFeasible => "subproblem not feasible",
            BnbDecision::SubproblemIsDegenerate => "subproblem is degenerate",
            BnbDecision::WorseThanIncumbent => "worse than incumbent",
            BnbDecision::BetterThanIncumbentFeasible => "better than incumbent, feasible",
            BnbDecision::FeasibleNotImproving => "feasible, not improving",
            BnbDecision::BetterThanIncumbentBranching => "better than incumbent, branching",
            BnbDecision::SolverFailure => "solver failure",
        };
        f.write_str(text)
    }
}

/// The outcome of one processed subproblem.
#[derive(Debug, Clone, Copy)]
pub struct NodeEvent<'a> {
    pub id: u64,
    pub depth: usize,
    pub decision: BnbDecision,
    /// The relaxed solution, when the relaxation was solved.
    pub relaxation: Option<&'a LpSolution>,
}

impl NodeEvent<'_> {
    pub fn relaxed_objective(&self) -> Option<f64> {
        self.relaxation.map(|r| r.objective_value)
    }
}

pub trait SearchObserver: Send + Sync {
    fn on_node(&self, event: &NodeEvent<'_>);
}

impl<F> SearchObserver for F
where
    F: Fn(&NodeEvent<'_>) + Send + Sync,
{
    fn on_node(&self, event: &NodeEvent<'_>) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl SearchObserver for NoOpObserver {
    fn on_node(&self, _event: &NodeEvent<'_>) {}
}

/// Forwards every node event to the `log` facade at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl SearchObserver for LogObserver {
    fn on_node(&self, event: &NodeEvent<'_>) {
        match event.relaxed_objective() {
            Some(objective) => debug!(
                "node {} (depth {}): {} at relaxed objective {}",
                event.id, event.depth, event.decision, objective
            ),
            None => debug!(
                "node {} (depth {}): {}",
                event.id, event.depth, event.decision
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn observer_fn<F>(f: F) -> F
    where
        F: Fn(&NodeEvent<'_>) + Send + Sync,
    {
        f
    }

    #[test]
    fn test_closure_observer_receives_events() {
        let seen = Mutex::new(Vec::new());
        let observer = observer_fn(|event| seen.lock().unwrap().push((event.id, event.decision)));
        let relaxation = LpSolution {
            x: vec![1.5],
            objective_value: 1.5,
            iterations: 2,
        };

        observer.on_node(&NodeEvent {
            id: 0,
            depth: 0,
            decision: BnbDecision::BetterThanIncumbentBranching,
            relaxation: Some(&relaxation),
        });
        observer.on_node(&NodeEvent {
            id: 1,
            depth: 1,
            decision: BnbDecision::SubproblemNotFeasible,
            relaxation: None,
        });

        assert_eq!(
            seen.into_inner().unwrap(),
            vec![
                (0, BnbDecision::BetterThanIncumbentBranching),
                (1, BnbDecision::SubproblemNotFeasible)
            ]
        );
    }

    #[test]
    fn test_relaxed_objective() {
        let relaxation = LpSolution {
            x: vec![],
            objective_value: -4.0,
            iterations: 0,
        };
        let event = NodeEvent {
            id: 3,
            depth: 2,
            decision: BnbDecision::WorseThanIncumbent,
            relaxation: Some(&relaxation),
        };

        assert_eq!(event.relaxed_objective(), Some(-4.0));
        LogObserver.on_node(&event);
        NoOpObserver.on_node(&event);
    }

    #[test]
    fn test_decision_display() {
        assert_eq!(
            BnbDecision::SubproblemIsDegenerate.to_string(),
            "subproblem is degenerate"
        );
    }
}
