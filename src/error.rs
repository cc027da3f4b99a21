//! Error types for trials, jobs and configuration.
//!
//! A trial ends in exactly one of two ways:
//!
//! - **Cancelled**: the real-time deadline elapsed (or the search asked the
//!   trial to stop) before the job failed. Inconclusive, never a bug.
//! - **Job failure**: the job under test returned an error. This is the bug
//!   being searched for and is always surfaced with its seed.
//!
//! Configuration problems are a separate type, [`ConfigError`], reported
//! before any trial starts.

use crate::lab::cancel::CancelReason;
use serde::{Deserialize, Serialize};

/// A failure reported by the job under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct JobError {
    message: String,
}

impl JobError {
    /// Creates a job error with a description of what went wrong.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The kind of trial error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The trial was cancelled before the job failed.
    Cancelled,
    /// The job under test failed.
    JobFailure,
}

impl ErrorKind {
    /// Returns what a seed search should do after a trial ends with this kind.
    #[must_use]
    pub const fn search_action(self) -> SearchAction {
        match self {
            Self::Cancelled => SearchAction::NextSeed,
            Self::JobFailure => SearchAction::Report,
        }
    }
}

/// What the search does with a finished trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchAction {
    /// Absorb the result and move on to another seed.
    NextSeed,
    /// Hand the result to the reporter.
    Report,
}

/// Terminal error of a trial.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrialError {
    /// The trial was cancelled before the job failed.
    #[error("trial cancelled: {reason}")]
    Cancelled {
        /// Why the trial was cancelled.
        reason: CancelReason,
    },
    /// The job under test failed.
    #[error("job failed: {0}")]
    JobFailure(#[from] JobError),
}

impl TrialError {
    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::JobFailure(_) => ErrorKind::JobFailure,
        }
    }

    /// Returns true if the trial was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns true if the job failed.
    #[must_use]
    pub const fn is_job_failure(&self) -> bool {
        matches!(self, Self::JobFailure(_))
    }

    /// Returns the job error, if the job failed.
    #[must_use]
    pub const fn job_error(&self) -> Option<&JobError> {
        match self {
            Self::JobFailure(err) => Some(err),
            Self::Cancelled { .. } => None,
        }
    }

    /// Returns the cancellation reason, if the trial was cancelled.
    #[must_use]
    pub const fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            Self::Cancelled { reason } => Some(*reason),
            Self::JobFailure(_) => None,
        }
    }
}

/// Invalid search configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The per-trial deadline is zero.
    #[error("trial deadline must be positive")]
    NonPositiveDeadline,
    /// The deadline growth factor is below 1 or not finite.
    #[error("deadline growth must be a finite factor >= 1.0, got {0}")]
    InvalidDeadlineGrowth(f64),
    /// The deadline cap is below the initial deadline.
    #[error("deadline cap {max_ms}ms is below the initial deadline {initial_ms}ms")]
    DeadlineCapBelowInitial {
        /// Initial deadline in milliseconds.
        initial_ms: u128,
        /// Cap in milliseconds.
        max_ms: u128,
    },
    /// The worker pool is empty.
    #[error("worker_count must be > 0")]
    InvalidWorkerCount,
    /// A bounded seed range holds no seeds.
    #[error("seed range is empty")]
    EmptySeedRange,
    /// A parallel search over unbounded seeds would never finish.
    #[error("parallel search over an unbounded seed range must stop at the first failure")]
    UnboundedParallelSearch,
    /// An override key is not recognized.
    #[error("unknown override: {0}")]
    UnknownOverride(String),
    /// An override value could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidOverride {
        /// The override key.
        key: String,
        /// The rejected value.
        value: String,
    },
}
