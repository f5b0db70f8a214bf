//! Shared holder for the best integer-feasible solution found so far.
//!
//! The solution itself lives behind a `Mutex` and is the source of truth.
//! Its objective is mirrored into an `AtomicU64` (as `f64` bits) so that
//! bound-dominance checks can read it without locking. A reader of the
//! mirror may see an older, larger value than the one just committed; that
//! only makes pruning more conservative.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::math::integer_linear::Solution;

#[derive(Debug)]
pub struct SharedIncumbent {
    /// Objective of the installed solution, `+inf` while none exists.
    bound: AtomicU64,
    solution: Mutex<Option<Solution>>,
}

impl Default for SharedIncumbent {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedIncumbent {
    pub fn new() -> Self {
        Self {
            bound: AtomicU64::new(f64::INFINITY.to_bits()),
            solution: Mutex::new(None),
        }
    }

    /// Objective of the current incumbent, or `f64::INFINITY` if there is none.
    #[inline]
    pub fn objective_bound(&self) -> f64 {
        f64::from_bits(self.bound.load(Ordering::Acquire))
    }

    pub fn snapshot(&self) -> Option<Solution> {
        self.solution
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Installs `candidate` if its objective is strictly lower than the
    /// incumbent's. Returns `true` if it was installed.
    ///
    /// An equal objective never replaces the incumbent, so among tied
    /// candidates the first to arrive is kept.
    pub fn try_install(&self, candidate: &Solution) -> bool {
        let objective = candidate.objective_value;
        // Cheap rejection; `!(a < b)` also turns away NaN.
        if !(objective < self.objective_bound()) {
            return false;
        }

        let mut guard = self.solution.lock().unwrap_or_else(PoisonError::into_inner);
        // Someone may have installed a better solution while we waited.
        if let Some(current) = guard.as_ref() {
            if !(objective < current.objective_value) {
                return false;
            }
        }

        *guard = Some(candidate.clone());
        self.bound.store(objective.to_bits(), Ordering::Release);
        true
    }

    pub fn into_inner(self) -> Option<Solution> {
        self.solution
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
