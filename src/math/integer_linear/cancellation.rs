use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a search stopped before exhausting the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// [`CancellationToken::cancel`] was called.
    Cancelled,
    /// The token's deadline passed.
    DeadlineExceeded,
    /// The configured node budget was used up.
    NodeLimit,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::Cancelled => write!(f, "search cancelled"),
            CancelCause::DeadlineExceeded => write!(f, "deadline exceeded"),
            CancelCause::NodeLimit => write!(f, "node limit reached"),
        }
    }
}

/// Cooperative cancellation signal for a running search.
///
/// Clones share the same flag, so a clone handed to another thread can stop a
/// search in progress. Workers poll the token before taking each new node.
///
/// ```
/// use milp_bnb::math::integer_linear::{CancelCause, CancellationToken};
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// assert_eq!(token.cause(), None);
///
/// handle.cancel();
/// assert_eq!(token.cause(), Some(CancelCause::Cancelled));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline `timeout` from now. Timeouts too large to represent
    /// leave the token without a deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cause().is_some()
    }

    /// The reason the token has fired, if it has. An explicit cancel takes
    /// precedence over an expired deadline.
    pub fn cause(&self) -> Option<CancelCause> {
        if self.flag.load(Ordering::Acquire) {
            return Some(CancelCause::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelCause::DeadlineExceeded),
            _ => None,
        }
    }

    /// Time left until the deadline, `None` without one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
