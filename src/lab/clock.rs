//! Virtual clock.
//!
//! The job under test sees time only through [`Clock`]. In a trial that clock
//! is a [`VirtualClock`]: reading it is free, and "sleeping" just moves its
//! single `now` field forward, so an hour of simulated polling costs
//! microseconds of real time.

use crate::types::Time;
use std::time::Duration;

/// A time source the job state machine polls and sleeps on.
pub trait Clock {
    /// Returns the current time without side effects.
    fn now(&self) -> Time;

    /// Moves the current time forward by exactly `by`.
    fn advance(&mut self, by: Duration);
}

/// A clock that only moves when told to.
///
/// Owned by exactly one job state machine; never shared between trials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualClock {
    start: Time,
    now: Time,
}

impl VirtualClock {
    /// Creates a clock at [`Time::EPOCH`].
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(Time::EPOCH)
    }

    /// Creates a clock at `start`.
    #[must_use]
    pub const fn starting_at(start: Time) -> Self {
        Self { start, now: start }
    }

    /// Returns the time the clock started at.
    #[must_use]
    pub const fn start(&self) -> Time {
        self.start
    }

    /// Returns how far the clock has advanced since it started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.now.saturating_duration_since(self.start)
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    #[inline]
    fn now(&self) -> Time {
        self.now
    }

    #[inline]
    fn advance(&mut self, by: Duration) {
        self.now = self.now.saturating_add(by);
    }
}
