//! Virtual timestamps.
//!
//! A [`Time`] is an offset from a fixed, arbitrary epoch. The epoch sits on
//! an hour boundary, so [`Time::EPOCH`] has minute-of-hour `0`. Nothing in
//! this module reads the wall clock.

use core::fmt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SECS_PER_MINUTE: u64 = 60;
const MINUTES_PER_HOUR: u64 = 60;
const SECS_PER_HOUR: u64 = SECS_PER_MINUTE * MINUTES_PER_HOUR;

/// A point in virtual time.
///
/// Stored as a [`Duration`] since the epoch so that centuries of simulated
/// time fit without overflow.
///
/// # Example
///
/// ```
/// use seedsweep::types::Time;
/// use std::time::Duration;
///
/// let t = Time::EPOCH.saturating_add(Duration::from_secs(61 * 60));
/// assert_eq!(t.minute_of_hour(), 1);
/// assert_eq!(t.hours_since_epoch(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Time(Duration);

impl Time {
    /// The epoch every trial clock starts from.
    pub const EPOCH: Self = Self(Duration::ZERO);

    /// The latest representable time.
    pub const MAX: Self = Self(Duration::MAX);

    /// Creates a time `offset` after the epoch.
    #[must_use]
    pub const fn from_offset(offset: Duration) -> Self {
        Self(offset)
    }

    /// Creates a time `secs` seconds after the epoch.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// Creates a time `minutes` minutes after the epoch.
    #[must_use]
    pub const fn from_minutes(minutes: u64) -> Self {
        Self(Duration::from_secs(minutes.saturating_mul(SECS_PER_MINUTE)))
    }

    /// Returns whole seconds since the epoch.
    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0.as_secs()
    }

    /// Returns the minute within the current hour, in `0..60`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn minute_of_hour(self) -> u32 {
        ((self.0.as_secs() / SECS_PER_MINUTE) % MINUTES_PER_HOUR) as u32
    }

    /// Returns whole hours since the epoch.
    #[must_use]
    pub const fn hours_since_epoch(self) -> u64 {
        self.0.as_secs() / SECS_PER_HOUR
    }

    /// Adds `by`, clamping at [`Time::MAX`].
    #[must_use]
    pub fn saturating_add(self, by: Duration) -> Self {
        Self(self.0.saturating_add(by))
    }

    /// Returns the time elapsed since `earlier`, or zero if `earlier` is later.
    #[must_use]
    pub fn saturating_duration_since(self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        let hours = secs / SECS_PER_HOUR;
        let minutes = (secs / SECS_PER_MINUTE) % MINUTES_PER_HOUR;
        let seconds = secs % SECS_PER_MINUTE;
        write!(f, "T+{hours}h{minutes:02}m{seconds:02}s")
    }
}
