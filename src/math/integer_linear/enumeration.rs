//! The enumeration tree shared by all search workers.
//!
//! The tree owns the queue of pending subproblems, the incumbent and the
//! bookkeeping needed to tell when the search is over. Workers call
//! [`EnumerationTree::work`], which repeatedly takes a node, decides its fate
//! and feeds any children back into the queue.
//!
//! The search is complete once the queue is empty and no worker is holding a
//! node, since only a node in flight can still produce children.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use log::{debug, trace, warn};

use crate::math::integer_linear::branch_and_bound::classify_failure;
use crate::math::integer_linear::branching::BranchContext;
use crate::math::integer_linear::cancellation::{CancelCause, CancellationToken};
use crate::math::integer_linear::incumbent::SharedIncumbent;
use crate::math::integer_linear::instrumentation::{BnbDecision, NodeEvent, SearchObserver};
use crate::math::integer_linear::subproblem::{BoundConstraint, Subproblem};
use crate::math::integer_linear::{BranchAndBoundConfig, MilpProblem, NodeOrder, Solution};
use crate::math::optimization::{LpError, LpSolution, RelaxationSolver};

/// Counters describing a finished search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Subproblems whose relaxation was solved.
    pub nodes_explored: u64,
    pub pruned_infeasible: u64,
    pub pruned_degenerate: u64,
    pub pruned_by_bound: u64,
    pub branched: u64,
    pub incumbent_updates: u64,
    pub max_depth: usize,
}

#[derive(Debug, Default)]
struct Counters {
    nodes_explored: AtomicU64,
    pruned_infeasible: AtomicU64,
    pruned_degenerate: AtomicU64,
    pruned_by_bound: AtomicU64,
    branched: AtomicU64,
    incumbent_updates: AtomicU64,
    max_depth: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SearchStats {
        SearchStats {
            nodes_explored: self.nodes_explored.load(Ordering::Relaxed),
            pruned_infeasible: self.pruned_infeasible.load(Ordering::Relaxed),
            pruned_degenerate: self.pruned_degenerate.load(Ordering::Relaxed),
            pruned_by_bound: self.pruned_by_bound.load(Ordering::Relaxed),
            branched: self.branched.load(Ordering::Relaxed),
            incumbent_updates: self.incumbent_updates.load(Ordering::Relaxed),
            max_depth: self.max_depth.load(Ordering::Relaxed),
        }
    }
}

struct WorkQueue<'a> {
    pending: VecDeque<Subproblem<'a>>,
    /// Nodes taken by a worker and not yet completed.
    in_flight: usize,
    /// Nodes handed out since the search started.
    dequeued: usize,
}

impl<'a> WorkQueue<'a> {
    fn pop(&mut self, order: NodeOrder) -> Option<Subproblem<'a>> {
        match order {
            NodeOrder::DepthFirst => self.pending.pop_back(),
            NodeOrder::BreadthFirst => self.pending.pop_front(),
        }
    }

    fn is_quiescent(&self) -> bool {
        self.pending.is_empty() && self.in_flight == 0
    }
}

/// Everything the search leaves behind for result assembly.
#[derive(Debug)]
pub(crate) struct SearchOutcome {
    pub incumbent: Option<Solution>,
    /// First unexpected relaxation failure, with the node it happened at.
    pub failure: Option<(u64, LpError)>,
    pub cancelled: Option<CancelCause>,
    pub root_infeasible: bool,
    pub stats: SearchStats,
}

pub(crate) struct EnumerationTree<'a> {
    problem: &'a MilpProblem,
    solver: &'a dyn RelaxationSolver,
    observer: &'a dyn SearchObserver,
    config: &'a BranchAndBoundConfig,
    queue: Mutex<WorkQueue<'a>>,
    available: Condvar,
    incumbent: SharedIncumbent,
    next_id: AtomicU64,
    counters: Counters,
    /// Set once no further node may be started.
    halted: AtomicBool,
    failure: Mutex<Option<(u64, LpError)>>,
    cancelled: Mutex<Option<CancelCause>>,
    root_infeasible: AtomicBool,
}

impl<'a> EnumerationTree<'a> {
    /// Creates a tree whose queue holds exactly the root subproblem.
    pub fn new(
        problem: &'a MilpProblem,
        solver: &'a dyn RelaxationSolver,
        observer: &'a dyn SearchObserver,
        config: &'a BranchAndBoundConfig,
    ) -> Self {
        let mut pending = VecDeque::new();
        pending.push_back(Subproblem::root(problem));

        Self {
            problem,
            solver,
            observer,
            config,
            queue: Mutex::new(WorkQueue {
                pending,
                in_flight: 0,
                dequeued: 0,
            }),
            available: Condvar::new(),
            incumbent: SharedIncumbent::new(),
            next_id: AtomicU64::new(1),
            counters: Counters::default(),
            halted: AtomicBool::new(false),
            failure: Mutex::new(None),
            cancelled: Mutex::new(None),
            root_infeasible: AtomicBool::new(false),
        }
    }

    /// Worker loop: runs until the search completes, is cancelled or aborts.
    pub fn work(&self, worker: usize, token: &CancellationToken) {
        trace!("worker {} started", worker);
        while let Some(node) = self.next_node(token) {
            let children = self.process(&node);
            self.complete(children);
        }
        trace!("worker {} finished", worker);
    }

    pub fn into_outcome(self) -> SearchOutcome {
        SearchOutcome {
            stats: self.counters.snapshot(),
            failure: self
                .failure
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
            cancelled: self
                .cancelled
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
            root_infeasible: self.root_infeasible.into_inner(),
            incumbent: self.incumbent.into_inner(),
        }
    }

    fn lock_queue(&self) -> MutexGuard<'_, WorkQueue<'a>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Blocks until a node is available, returning `None` once the worker
    /// should exit.
    fn next_node(&self, token: &CancellationToken) -> Option<Subproblem<'a>> {
        let mut queue = self.lock_queue();
        loop {
            if self.halted.load(Ordering::Acquire) {
                return None;
            }
            if let Some(cause) = token.cause() {
                self.cancel(cause);
                return None;
            }
            if queue.is_quiescent() {
                self.available.notify_all();
                return None;
            }
            if let Some(limit) = self.config.max_nodes {
                if queue.dequeued >= limit && !queue.pending.is_empty() {
                    self.cancel(CancelCause::NodeLimit);
                    return None;
                }
            }
            if let Some(node) = queue.pop(self.config.node_order) {
                queue.in_flight += 1;
                queue.dequeued += 1;
                return Some(node);
            }

            // Other workers still hold nodes that may produce children.
            let wait = token
                .remaining()
                .map_or(self.config.idle_poll, |left| left.min(self.config.idle_poll));
            queue = self
                .available
                .wait_timeout(queue, wait)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Returns a finished node's children to the queue.
    fn complete(&self, children: Vec<Subproblem<'a>>) {
        let mut queue = self.lock_queue();
        queue.in_flight -= 1;
        let produced = !children.is_empty();
        queue.pending.extend(children);
        if produced || queue.is_quiescent() {
            self.available.notify_all();
        }
    }

    /// Records the first cancellation cause and stops all workers.
    /// Called with the queue lock held.
    fn cancel(&self, cause: CancelCause) {
        let mut cancelled = self
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if cancelled.is_none() {
            debug!("stopping search: {}", cause);
            *cancelled = Some(cause);
        }
        self.halted.store(true, Ordering::Release);
        self.available.notify_all();
    }

    /// Records the first fatal relaxation failure and stops all workers.
    fn abort(&self, node: u64, error: LpError) {
        {
            let mut failure = self
                .failure
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if failure.is_none() {
                warn!(
                    "aborting search: relaxation of node {} failed: {}",
                    node, error
                );
                *failure = Some((node, error));
            }
        }
        let _queue = self.lock_queue();
        self.halted.store(true, Ordering::Release);
        self.available.notify_all();
    }

    fn notify(
        &self,
        node: &Subproblem<'_>,
        decision: BnbDecision,
        relaxation: Option<&LpSolution>,
    ) {
        self.observer.on_node(&NodeEvent {
            id: node.id(),
            depth: node.depth(),
            decision,
            relaxation,
        });
    }

    /// Applies the per-node decision procedure and returns the children to enqueue.
    fn process(&self, node: &Subproblem<'a>) -> Vec<Subproblem<'a>> {
        if self.halted.load(Ordering::Acquire) {
            return Vec::new();
        }
        Counters::bump(&self.counters.nodes_explored);
        self.counters
            .max_depth
            .fetch_max(node.depth(), Ordering::Relaxed);

        let relaxed = match self.solver.solve(&node.to_relaxation()) {
            Ok(relaxed) => relaxed,
            Err(error) => {
                self.reject(node, error);
                return Vec::new();
            }
        };

        // Descendants only add constraints, so none of them can do better
        // than this relaxation.
        if relaxed.objective_value >= self.incumbent.objective_bound() {
            Counters::bump(&self.counters.pruned_by_bound);
            self.notify(node, BnbDecision::WorseThanIncumbent, Some(&relaxed));
            return Vec::new();
        }

        let ctx = BranchContext {
            relaxed: &relaxed.x,
            integrality: &self.problem.integrality,
            objective: self.problem.objective.view(),
            tolerance: self.config.integrality_tolerance,
        };
        let Some(first_fractional) = ctx.fractional().next() else {
            let candidate = Solution::new(relaxed.x.clone(), relaxed.objective_value);
            let decision = if self.incumbent.try_install(&candidate) {
                Counters::bump(&self.counters.incumbent_updates);
                debug!(
                    "node {} set a new incumbent with objective {}",
                    node.id(),
                    candidate.objective_value
                );
                BnbDecision::BetterThanIncumbentFeasible
            } else {
                BnbDecision::FeasibleNotImproving
            };
            self.notify(node, decision, Some(&relaxed));
            return Vec::new();
        };

        let mut var = self.problem.branching.select(&ctx);
        if !ctx.is_fractional(var) {
            warn!(
                "branching strategy {} chose x{}, which is not fractional; using x{}",
                self.problem.branching.name(),
                var,
                first_fractional
            );
            var = first_fractional;
        }

        let value = relaxed.x[var];
        let down = node.derive_child(
            BoundConstraint::at_most(var, value.floor()),
            self.fresh_id(),
        );
        let up = node.derive_child(
            BoundConstraint::at_least(var, value.ceil()),
            self.fresh_id(),
        );
        Counters::bump(&self.counters.branched);
        trace!(
            "node {} branches on x{} = {} into {} and {}",
            node.id(),
            var,
            value,
            down.id(),
            up.id()
        );
        self.notify(node, BnbDecision::BetterThanIncumbentBranching, Some(&relaxed));

        // The last pushed node is taken first under depth-first order.
        vec![up, down]
    }

    fn reject(&self, node: &Subproblem<'_>, error: LpError) {
        match classify_failure(&error) {
            Some(decision) => {
                match decision {
                    BnbDecision::SubproblemNotFeasible => {
                        Counters::bump(&self.counters.pruned_infeasible);
                        if node.id() == 0 {
                            self.root_infeasible.store(true, Ordering::Release);
                        }
                    }
                    _ => Counters::bump(&self.counters.pruned_degenerate),
                }
                self.notify(node, decision, None);
            }
            None => {
                self.notify(node, BnbDecision::SolverFailure, None);
                self.abort(node.id(), error);
            }
        }
    }
}
