//! The job state machine under test.
//!
//! ```text
//!   ChoosingTarget ──▶ PollingForTarget ──▶ Executing ──▶ CoolingDown
//!         ▲               │  ▲  (advance 1m)      │            │
//!         │               └──┘                    │            │
//!         └───────────────────────────────────────┼────────────┘ (advance 1h)
//!                         │                       │
//!                         ▼                       ▼
//!                    Cancelled                 Failed
//! ```
//!
//! The machine picks a random minute of the hour, polls the clock once per
//! simulated minute until that minute arrives, runs the job, then sleeps an
//! hour and starts over. It has no success exit: it runs until the job
//! fails or the cancel token fires, so callers must always supply a token
//! that will eventually fire.
//!
//! Everything the machine observes comes from its own [`Clock`] and
//! [`DetRng`], which makes a run a pure function of `(seed, job)` up to the
//! point where cancellation interrupts it.

use super::cancel::{CancelReason, CancelToken};
use super::clock::{Clock, VirtualClock};
use super::job::Job;
use crate::error::{JobError, TrialError};
use crate::types::Time;
use crate::util::{DetHasher, DetRng};
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use std::time::Duration;

/// Number of distinct target minutes.
pub const MINUTES_PER_HOUR: u32 = 60;

/// How far the clock advances between polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// How far the clock advances after a successful execution.
pub const COOLDOWN: Duration = Duration::from_secs(60 * 60);

/// State of a [`JobMachine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// About to draw the next target minute.
    ChoosingTarget,
    /// Waiting for the clock to reach `target_minute`.
    PollingForTarget {
        /// Minute of the hour the job will run at.
        target_minute: u32,
    },
    /// The target minute has arrived; the job runs on the next step.
    Executing {
        /// Minute of the hour the job is running at.
        target_minute: u32,
    },
    /// The job succeeded; the clock sleeps an hour on the next step.
    CoolingDown,
    /// Terminal: the job failed.
    Failed(JobError),
    /// Terminal: the cancel token fired while polling.
    Cancelled(CancelReason),
}

impl JobState {
    /// Returns true for `Failed` and `Cancelled`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Cancelled(_))
    }

    /// Returns a short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ChoosingTarget => "choosing_target",
            Self::PollingForTarget { .. } => "polling_for_target",
            Self::Executing { .. } => "executing",
            Self::CoolingDown => "cooling_down",
            Self::Failed(_) => "failed",
            Self::Cancelled(_) => "cancelled",
        }
    }
}

/// Compact identity of a machine run.
///
/// Two runs with the same seed and job that reach the same terminal state
/// produce equal certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TraceCertificate {
    /// Target minutes drawn.
    pub cycles: u64,
    /// Clock checks made while polling.
    pub polls: u64,
    /// Job executions, including a failing one.
    pub executions: u64,
    /// Simulated time since the machine started.
    pub virtual_elapsed: Duration,
    /// Hash over every drawn target minute and every per-cycle poll count.
    pub fingerprint: u64,
}

#[derive(Debug, Clone, Default)]
struct TraceRecorder {
    hasher: DetHasher,
    cycles: u64,
    polls: u64,
    cycle_polls: u64,
    executions: u64,
}

impl TraceRecorder {
    fn target_chosen(&mut self, target_minute: u32) {
        self.hasher.write_u32(target_minute);
        self.cycles += 1;
        self.cycle_polls = 0;
    }

    fn polled(&mut self) {
        self.polls += 1;
        self.cycle_polls += 1;
    }

    fn executed(&mut self) {
        self.hasher.write_u64(self.cycle_polls);
        self.executions += 1;
    }

    fn certificate(&self, virtual_elapsed: Duration) -> TraceCertificate {
        TraceCertificate {
            cycles: self.cycles,
            polls: self.polls,
            executions: self.executions,
            virtual_elapsed,
            fingerprint: self.hasher.finish(),
        }
    }
}

/// The scheduled-job loop, driven one transition at a time.
///
/// Owns its clock, RNG and job outright; nothing inside is shared with any
/// other machine.
#[derive(Debug)]
pub struct JobMachine<J, C = VirtualClock> {
    job: J,
    clock: C,
    rng: DetRng,
    state: JobState,
    started_at: Time,
    recorder: TraceRecorder,
}

impl<J: Job> JobMachine<J, VirtualClock> {
    /// Creates a machine on a fresh [`VirtualClock`] with its RNG seeded
    /// from `seed`.
    #[must_use]
    pub fn new(seed: u64, job: J) -> Self {
        Self::with_clock(seed, job, VirtualClock::new())
    }
}

impl<J: Job, C: Clock> JobMachine<J, C> {
    /// Creates a machine on the given clock.
    #[must_use]
    pub fn with_clock(seed: u64, job: J, clock: C) -> Self {
        let started_at = clock.now();
        Self {
            job,
            clock,
            rng: DetRng::new(seed),
            state: JobState::ChoosingTarget,
            started_at,
            recorder: TraceRecorder::default(),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> &JobState {
        &self.state
    }

    /// Returns the current virtual time.
    #[must_use]
    pub fn now(&self) -> Time {
        self.clock.now()
    }

    /// Returns the simulated time since the machine was created.
    #[must_use]
    pub fn virtual_elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started_at)
    }

    /// Returns the certificate of the run so far.
    #[must_use]
    pub fn certificate(&self) -> TraceCertificate {
        self.recorder.certificate(self.virtual_elapsed())
    }

    /// Performs one transition and returns the new state.
    ///
    /// The cancel token is consulted only in `PollingForTarget`, before the
    /// clock is read. Stepping a terminal machine does nothing.
    pub fn step(&mut self, cancel: &CancelToken) -> &JobState {
        let next = match self.state {
            JobState::ChoosingTarget => {
                let target_minute = self.rng.next_u32_below(MINUTES_PER_HOUR);
                self.recorder.target_chosen(target_minute);
                JobState::PollingForTarget { target_minute }
            }
            JobState::PollingForTarget { target_minute } => {
                if let Some(reason) = cancel.check() {
                    JobState::Cancelled(reason)
                } else {
                    self.recorder.polled();
                    if self.clock.now().minute_of_hour() == target_minute {
                        JobState::Executing { target_minute }
                    } else {
                        self.clock.advance(POLL_INTERVAL);
                        JobState::PollingForTarget { target_minute }
                    }
                }
            }
            JobState::Executing { .. } => {
                self.recorder.executed();
                match self.job.execute(&mut self.rng) {
                    Ok(()) => JobState::CoolingDown,
                    Err(err) => JobState::Failed(err),
                }
            }
            JobState::CoolingDown => {
                self.clock.advance(COOLDOWN);
                JobState::ChoosingTarget
            }
            JobState::Failed(_) | JobState::Cancelled(_) => return &self.state,
        };
        self.state = next;
        &self.state
    }

    /// Steps until a terminal state and returns it as an error.
    ///
    /// Never returns unless the job fails or `cancel` fires.
    pub fn run_to_terminal(&mut self, cancel: &CancelToken) -> TrialError {
        loop {
            match self.step(cancel) {
                JobState::Failed(err) => return TrialError::JobFailure(err.clone()),
                JobState::Cancelled(reason) => return TrialError::Cancelled { reason: *reason },
                _ => {}
            }
        }
    }
}
