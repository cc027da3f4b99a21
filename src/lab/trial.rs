//! Single-seed trial execution.
//!
//! A trial builds a fresh [`JobMachine`] (fresh clock, fresh RNG seeded from
//! the trial seed, fresh job), arms a real-time deadline, runs the machine
//! to a terminal state and measures how long that took on the wall clock.
//! The deadline bounds the real cost of a search, not simulated time.

use super::cancel::CancelToken;
use super::job::Job;
use super::machine::{JobMachine, TraceCertificate};
use crate::error::{JobError, TrialError};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// One `(seed, deadline)` attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trial {
    seed: u64,
    deadline: Duration,
}

impl Trial {
    /// Creates a trial.
    ///
    /// # Panics
    ///
    /// Panics if `deadline` is zero: a zero deadline is a caller bug, not an
    /// inconclusive trial.
    #[must_use]
    pub fn new(seed: u64, deadline: Duration) -> Self {
        assert!(!deadline.is_zero(), "trial deadline must be positive");
        Self { seed, deadline }
    }

    /// Returns the seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the real-time deadline.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }
}

/// How a trial ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialOutcome {
    /// The trial that ran.
    pub trial: Trial,
    /// Terminal error; a trial always ends in one.
    pub error: TrialError,
    /// Wall-clock time from start to terminal state.
    pub elapsed: Duration,
    /// Simulated time from start to terminal state.
    pub virtual_elapsed: Duration,
    /// Identity of the simulated run.
    pub certificate: TraceCertificate,
}

impl TrialOutcome {
    /// Returns the seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.trial.seed
    }

    /// Returns true if the job failed.
    #[must_use]
    pub const fn is_bug(&self) -> bool {
        self.error.is_job_failure()
    }

    /// Converts a job failure into a bug report.
    #[must_use]
    pub fn to_bug_report(&self) -> Option<BugReport> {
        let error = self.error.job_error()?.clone();
        Some(BugReport {
            seed: self.trial.seed,
            deadline: self.trial.deadline,
            elapsed: self.elapsed,
            virtual_elapsed: self.virtual_elapsed,
            error,
            certificate: self.certificate,
        })
    }
}

/// A reproducible failure: everything needed to replay it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugReport {
    /// Seed that reproduces the failure.
    pub seed: u64,
    /// Deadline the trial ran under.
    pub deadline: Duration,
    /// Wall-clock time until the failure.
    pub elapsed: Duration,
    /// Simulated time until the failure.
    pub virtual_elapsed: Duration,
    /// The job's error.
    pub error: JobError,
    /// Identity of the simulated run.
    pub certificate: TraceCertificate,
}

/// Replay failed to confirm a seed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// A run was cancelled, so there is nothing to compare.
    #[error("seed {seed} did not fail within its deadline")]
    Inconclusive {
        /// The replayed seed.
        seed: u64,
    },
    /// Two runs of the same seed ended differently.
    #[error(
        "replay divergence at seed {seed}: \
         first(fingerprint={}, polls={}, executions={}) != \
         second(fingerprint={}, polls={}, executions={})",
        .first.fingerprint, .first.polls, .first.executions,
        .second.fingerprint, .second.polls, .second.executions
    )]
    Divergence {
        /// The replayed seed.
        seed: u64,
        /// Certificate of the first run.
        first: TraceCertificate,
        /// Certificate of the second run.
        second: TraceCertificate,
    },
}

/// Runs trials for jobs built by `make_job`.
///
/// `make_job` is called once per trial, so no job state survives from one
/// trial to the next.
#[derive(Debug, Clone)]
pub struct TrialExecutor<F> {
    make_job: F,
}

impl<F, J> TrialExecutor<F>
where
    F: Fn() -> J,
    J: Job,
{
    /// Creates an executor.
    #[must_use]
    pub const fn new(make_job: F) -> Self {
        Self { make_job }
    }

    /// Runs `seed` until the job fails or `deadline` elapses in real time.
    ///
    /// # Panics
    ///
    /// Panics if `deadline` is zero.
    #[must_use]
    pub fn run(&self, seed: u64, deadline: Duration) -> TrialOutcome {
        self.run_with_token(Trial::new(seed, deadline), &CancelToken::never())
    }

    /// Runs `trial` under `parent`, which can cancel it early.
    ///
    /// The trial's deadline is armed from the same instant its elapsed time
    /// is measured from, so a trial cancelled for its deadline always reports
    /// `elapsed >= deadline`.
    #[must_use]
    pub fn run_with_token(&self, trial: Trial, parent: &CancelToken) -> TrialOutcome {
        let started = Instant::now();
        let token = parent.child_until(started.checked_add(trial.deadline));
        let mut machine = JobMachine::new(trial.seed, (self.make_job)());
        let error = machine.run_to_terminal(&token);
        let elapsed = started.elapsed();
        let certificate = machine.certificate();
        TrialOutcome {
            trial,
            error,
            elapsed,
            virtual_elapsed: certificate.virtual_elapsed,
            certificate,
        }
    }

    /// Runs `seed` twice and checks that both runs fail identically.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Inconclusive`] if either run is cancelled and
    /// [`ReplayError::Divergence`] if the runs differ.
    pub fn replay(&self, seed: u64, deadline: Duration) -> Result<TrialOutcome, ReplayError> {
        let first = self.run(seed, deadline);
        if !first.is_bug() {
            return Err(ReplayError::Inconclusive { seed });
        }
        let second = self.run(seed, deadline);
        if !second.is_bug() {
            return Err(ReplayError::Inconclusive { seed });
        }
        if first.error != second.error || first.certificate != second.certificate {
            return Err(ReplayError::Divergence {
                seed,
                first: first.certificate,
                second: second.certificate,
            });
        }
        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::cancel::CancelReason;
    use crate::lab::job::FaultInjector;
    use crate::lab::machine::COOLDOWN;
    use crate::util::DetRng;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    const SHORT: Duration = Duration::from_millis(100);

    #[test]
    fn always_failing_job_is_a_bug() {
        init_test("always_failing_job_is_a_bug");
        let executor = TrialExecutor::new(FaultInjector::always);
        let outcome = executor.run(42, Duration::from_secs(5));
        assert!(outcome.is_bug());
        assert_eq!(outcome.seed(), 42);
        assert_eq!(outcome.certificate.executions, 1);
        assert!(outcome.virtual_elapsed < COOLDOWN);
        crate::assert_with_log!(
            outcome.elapsed < Duration::from_secs(1),
            "elapsed",
            "< 1s",
            outcome.elapsed
        );

        let bug = outcome.to_bug_report().expect("bug report");
        assert_eq!(bug.seed, 42);
        assert_eq!(bug.error.message(), FaultInjector::FAILURE_MESSAGE);
        crate::test_complete!("always_failing_job_is_a_bug");
    }

    #[test]
    fn never_failing_job_is_cancelled_at_deadline() {
        init_test("never_failing_job_is_cancelled_at_deadline");
        let executor = TrialExecutor::new(FaultInjector::never);
        let outcome = executor.run(1, SHORT);
        assert_eq!(
            outcome.error,
            TrialError::Cancelled {
                reason: CancelReason::Deadline
            }
        );
        assert!(outcome.elapsed >= SHORT);
        assert!(outcome.to_bug_report().is_none());
        crate::test_complete!("never_failing_job_is_cancelled_at_deadline");
    }

    #[test]
    fn deadline_cancellation_never_undercounts_elapsed() {
        init_test("deadline_cancellation_never_undercounts_elapsed");
        let executor = TrialExecutor::new(FaultInjector::never);
        let deadline = Duration::from_micros(2);
        for seed in 0..20_000 {
            let outcome = executor.run(seed, deadline);
            assert_eq!(outcome.error.cancel_reason(), Some(CancelReason::Deadline));
            crate::assert_with_log!(
                outcome.elapsed >= deadline,
                "elapsed covers the deadline",
                deadline,
                outcome.elapsed
            );
        }
        crate::test_complete!("deadline_cancellation_never_undercounts_elapsed");
    }

    #[test]
    fn each_trial_gets_a_fresh_job() {
        init_test("each_trial_gets_a_fresh_job");
        let executor = TrialExecutor::new(|| {
            let mut calls = 0u32;
            move |_: &mut DetRng| {
                calls += 1;
                if calls == 2 {
                    Err(JobError::new("second execution"))
                } else {
                    Ok(())
                }
            }
        });
        let first = executor.run(5, Duration::from_secs(5));
        let second = executor.run(5, Duration::from_secs(5));
        assert_eq!(first.certificate.executions, 2);
        assert_eq!(second.certificate.executions, 2);
        assert_eq!(first.certificate, second.certificate);
        crate::test_complete!("each_trial_gets_a_fresh_job");
    }

    #[test]
    fn pre_cancelled_token_ends_trial_immediately() {
        init_test("pre_cancelled_token_ends_trial_immediately");
        let executor = TrialExecutor::new(FaultInjector::never);
        let token = CancelToken::never();
        token.cancel();
        let outcome = executor.run_with_token(Trial::new(3, SHORT), &token);
        assert_eq!(outcome.error.cancel_reason(), Some(CancelReason::Requested));
        assert_eq!(outcome.certificate.polls, 0);
        crate::test_complete!("pre_cancelled_token_ends_trial_immediately");
    }

    #[test]
    fn replay_confirms_failing_seed() {
        init_test("replay_confirms_failing_seed");
        let executor = TrialExecutor::new(|| FaultInjector::new(0.2));
        let outcome = executor
            .replay(17, Duration::from_secs(5))
            .expect("replay should confirm");
        assert!(outcome.is_bug());
        crate::test_complete!("replay_confirms_failing_seed");
    }

    #[test]
    fn replay_of_passing_seed_is_inconclusive() {
        init_test("replay_of_passing_seed_is_inconclusive");
        let executor = TrialExecutor::new(FaultInjector::never);
        let err = executor.replay(17, SHORT).unwrap_err();
        assert_eq!(err, ReplayError::Inconclusive { seed: 17 });
        crate::test_complete!("replay_of_passing_seed_is_inconclusive");
    }

    #[test]
    fn divergence_message_names_seed() {
        init_test("divergence_message_names_seed");
        let err = ReplayError::Divergence {
            seed: 9,
            first: TraceCertificate::default(),
            second: TraceCertificate {
                polls: 3,
                ..TraceCertificate::default()
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("seed 9"), "{msg}");
        assert!(msg.contains("divergence"), "{msg}");
        crate::test_complete!("divergence_message_names_seed");
    }

    #[test]
    #[should_panic(expected = "trial deadline must be positive")]
    fn zero_deadline_panics() {
        let _ = Trial::new(1, Duration::ZERO);
    }
}
