//! Trial cancellation.
//!
//! A [`CancelToken`] fires when its real-time deadline passes or when any
//! clone of it (or of its parent) is explicitly cancelled. The job state
//! machine checks it before every simulated-minute poll.

use core::fmt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Why a trial was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancelReason {
    /// The real-time deadline elapsed.
    Deadline,
    /// The search requested cancellation (e.g. another seed already failed).
    Requested,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deadline => f.write_str("deadline elapsed"),
            Self::Requested => f.write_str("cancellation requested"),
        }
    }
}

/// A cancellation signal with an optional real-time deadline.
///
/// Clones share the explicit-cancel flag. [`child_until`] creates a token
/// that shares the flag but carries its own deadline, which is how a search
/// cancels every in-flight trial at once.
///
/// [`child_until`]: CancelToken::child_until
#[derive(Debug, Clone)]
pub struct CancelToken {
    deadline: Option<Instant>,
    requested: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that only fires on explicit [`cancel`](Self::cancel).
    #[must_use]
    pub fn never() -> Self {
        Self {
            deadline: None,
            requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A token sharing this token's cancel flag that also fires at
    /// `deadline`.
    ///
    /// `None` means the deadline is too far away to represent; the child then
    /// only fires on explicit cancellation.
    #[must_use]
    pub fn child_until(&self, deadline: Option<Instant>) -> Self {
        Self {
            deadline,
            requested: Arc::clone(&self.requested),
        }
    }

    /// Requests cancellation of this token and every token sharing its flag.
    pub fn cancel(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Returns the reason this token has fired, or `None` if it has not.
    ///
    /// An explicit request takes precedence over the deadline.
    #[inline]
    #[must_use]
    pub fn check(&self) -> Option<CancelReason> {
        if self.requested.load(Ordering::Acquire) {
            return Some(CancelReason::Requested);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::Deadline),
            _ => None,
        }
    }

    /// Returns true if the token has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.check().is_some()
    }

    /// Returns the real-time deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}
