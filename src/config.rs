//! Search configuration.
//!
//! [`SearchConfig`] holds the search parameters: strategy, per-trial
//! deadline, seed range, worker count and stop policy. It uses a move-based
//! builder, so options chain:
//!
//! ```
//! use seedsweep::config::{SearchConfig, StopPolicy};
//! use std::time::Duration;
//!
//! let config = SearchConfig::parallel()
//!     .deadline(Duration::from_secs(10))
//!     .seeds(0, 1_000)
//!     .worker_count(8)
//!     .stop(StopPolicy::Exhaust);
//! assert!(config.validate().is_ok());
//! ```
//!
//! [`ConfigLoader`] layers environment variables and programmatic overrides
//! on top of a base configuration:
//!
//! 1. Base configuration (lowest)
//! 2. `SEEDSWEEP_*` environment variables
//! 3. Programmatic overrides (highest)
//!
//! | Key | Value |
//! |---|---|
//! | `SEEDSWEEP_MODE` | `sequential` or `parallel` |
//! | `SEEDSWEEP_DEADLINE_MS` | per-trial deadline |
//! | `SEEDSWEEP_DEADLINE_GROWTH` | factor applied after each inconclusive sequential trial |
//! | `SEEDSWEEP_DEADLINE_MAX_MS` | cap for the escalated deadline |
//! | `SEEDSWEEP_SEED_START` | first seed |
//! | `SEEDSWEEP_SEED_COUNT` | number of seeds, or `unbounded` |
//! | `SEEDSWEEP_WORKERS` | parallel worker count |
//! | `SEEDSWEEP_STOP` | `first-failure` or `exhaust` |
//!
//! Both layers are merged before anything is applied, and the three deadline
//! keys are applied together: deadline, then growth, then cap. An explicit
//! cap is used as given, so a cap below the deadline is rejected. Growth
//! above `1` without a cap uses [`DeadlinePolicy::DEFAULT_CAP_FACTOR`] times
//! the deadline, unless the base policy already escalates to a cap that still
//! bounds the deadline.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Prefix of environment variables read by [`ConfigLoader`].
pub const ENV_PREFIX: &str = "SEEDSWEEP_";

/// Search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// One trial at a time on the calling thread.
    Sequential,
    /// A fixed pool of worker threads pulling seeds from a shared queue.
    Parallel,
}

/// What the search does after finding a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopPolicy {
    /// Stop at the first bug.
    FirstFailure,
    /// Keep searching until the seed range is exhausted.
    Exhaust,
}

/// Per-trial real-time deadline, optionally escalating.
///
/// Sequential searches multiply the deadline by `growth` after every
/// inconclusive trial, up to `max`. Parallel searches always use `initial`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeadlinePolicy {
    /// Deadline of the first trial.
    pub initial: Duration,
    /// Factor applied after each inconclusive trial (`1.0` keeps it fixed).
    pub growth: f64,
    /// Upper bound for the escalated deadline.
    pub max: Duration,
}

impl DeadlinePolicy {
    /// Cap, as a multiple of the initial deadline, used when growth is
    /// configured without one.
    pub const DEFAULT_CAP_FACTOR: u32 = 16;

    /// A deadline that never changes.
    #[must_use]
    pub const fn fixed(deadline: Duration) -> Self {
        Self {
            initial: deadline,
            growth: 1.0,
            max: deadline,
        }
    }

    /// A deadline that grows by `growth` per inconclusive trial up to `max`.
    #[must_use]
    pub const fn escalating(initial: Duration, growth: f64, max: Duration) -> Self {
        Self {
            initial,
            growth,
            max,
        }
    }

    /// Returns the deadline to use after an inconclusive trial at `current`.
    #[must_use]
    pub fn escalate(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.growth)
            .map_or(self.max, |next| next.min(self.max))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.initial.is_zero() {
            return Err(ConfigError::NonPositiveDeadline);
        }
        if !self.growth.is_finite() || self.growth < 1.0 {
            return Err(ConfigError::InvalidDeadlineGrowth(self.growth));
        }
        if self.max < self.initial {
            return Err(ConfigError::DeadlineCapBelowInitial {
                initial_ms: self.initial.as_millis(),
                max_ms: self.max.as_millis(),
            });
        }
        Ok(())
    }
}

/// Seeds to try, in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeedRange {
    /// First seed.
    pub start: u64,
    /// Number of seeds, or `None` for "until `u64::MAX`".
    pub count: Option<u64>,
}

impl SeedRange {
    /// `count` seeds starting at `start`.
    #[must_use]
    pub const fn bounded(start: u64, count: u64) -> Self {
        Self {
            start,
            count: Some(count),
        }
    }

    /// Every seed from `start` on.
    #[must_use]
    pub const fn unbounded(start: u64) -> Self {
        Self { start, count: None }
    }

    /// Returns true if the range has an end.
    #[must_use]
    pub const fn is_bounded(&self) -> bool {
        self.count.is_some()
    }

    /// Iterates the seeds in order. Stops at `u64::MAX` rather than wrapping.
    pub fn iter(&self) -> impl Iterator<Item = u64> + use<> {
        let limit = self
            .count
            .map_or(usize::MAX, |count| usize::try_from(count).unwrap_or(usize::MAX));
        std::iter::successors(Some(self.start), |seed| seed.checked_add(1)).take(limit)
    }
}

/// Search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Strategy.
    pub mode: SearchMode,
    /// Per-trial deadline.
    pub deadline: DeadlinePolicy,
    /// Seeds to try.
    pub seed_range: SeedRange,
    /// Parallel worker count. Ignored by sequential searches.
    pub worker_count: usize,
    /// What to do after a bug.
    pub stop: StopPolicy,
}

impl SearchConfig {
    /// Default per-trial deadline of a sequential search.
    pub const SEQUENTIAL_DEADLINE: Duration = Duration::from_secs(5);
    /// Default per-trial deadline of a parallel search.
    pub const PARALLEL_DEADLINE: Duration = Duration::from_secs(10);
    /// Default seed count of a parallel search.
    pub const PARALLEL_SEED_COUNT: u64 = 1_000;

    /// Sequential search over every seed from 0, stopping at the first bug.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            mode: SearchMode::Sequential,
            deadline: DeadlinePolicy::fixed(Self::SEQUENTIAL_DEADLINE),
            seed_range: SeedRange::unbounded(0),
            worker_count: available_parallelism(),
            stop: StopPolicy::FirstFailure,
        }
    }

    /// Parallel search over seeds `0..1000`, reporting every bug.
    #[must_use]
    pub fn parallel() -> Self {
        Self {
            mode: SearchMode::Parallel,
            deadline: DeadlinePolicy::fixed(Self::PARALLEL_DEADLINE),
            seed_range: SeedRange::bounded(0, Self::PARALLEL_SEED_COUNT),
            worker_count: available_parallelism(),
            stop: StopPolicy::Exhaust,
        }
    }

    /// Sets the strategy.
    #[must_use]
    pub const fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets a fixed per-trial deadline.
    #[must_use]
    pub const fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = DeadlinePolicy::fixed(deadline);
        self
    }

    /// Sets the deadline policy.
    #[must_use]
    pub const fn deadline_policy(mut self, policy: DeadlinePolicy) -> Self {
        self.deadline = policy;
        self
    }

    /// Searches `count` seeds starting at `start`.
    #[must_use]
    pub const fn seeds(mut self, start: u64, count: u64) -> Self {
        self.seed_range = SeedRange::bounded(start, count);
        self
    }

    /// Searches every seed from `start` on.
    #[must_use]
    pub const fn unbounded_seeds(mut self, start: u64) -> Self {
        self.seed_range = SeedRange::unbounded(start);
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub const fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Sets the stop policy.
    #[must_use]
    pub const fn stop(mut self, stop: StopPolicy) -> Self {
        self.stop = stop;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.deadline.validate()?;
        if self.seed_range.count == Some(0) {
            return Err(ConfigError::EmptySeedRange);
        }
        if self.mode == SearchMode::Parallel {
            if self.worker_count == 0 {
                return Err(ConfigError::InvalidWorkerCount);
            }
            if !self.seed_range.is_bounded() && self.stop == StopPolicy::Exhaust {
                return Err(ConfigError::UnboundedParallelSearch);
            }
        }
        Ok(())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::sequential()
    }
}

/// Configuration loader with layered sources.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    base: SearchConfig,
    read_env: bool,
    overrides: BTreeMap<String, String>,
}

impl ConfigLoader {
    /// Creates a loader over [`SearchConfig::default`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: SearchConfig::default(),
            read_env: true,
            overrides: BTreeMap::new(),
        }
    }

    /// Sets the base configuration.
    #[must_use]
    pub fn base(mut self, base: SearchConfig) -> Self {
        self.base = base;
        self
    }

    /// Skips the environment layer.
    #[must_use]
    pub fn without_env(mut self) -> Self {
        self.read_env = false;
        self
    }

    /// Adds a programmatic override (highest precedence).
    #[must_use]
    pub fn override_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Loads and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown `SEEDSWEEP_*` keys, unparsable values
    /// or an invalid result.
    pub fn load(&self) -> Result<SearchConfig, ConfigError> {
        let mut merged = BTreeMap::new();
        if self.read_env {
            merged.extend(std::env::vars().filter(|(key, _)| key.starts_with(ENV_PREFIX)));
        }
        merged.extend(
            self.overrides
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        let mut config = self.base.clone();
        apply_overrides(&mut config, &merged)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map_or(1, std::num::NonZeroUsize::get)
        .max(1)
}

fn apply_overrides(
    config: &mut SearchConfig,
    overrides: &BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    for (key, value) in overrides {
        if !DEADLINE_KEYS.contains(&key.as_str()) {
            apply_override(config, key, value)?;
        }
    }
    apply_deadline_overrides(&mut config.deadline, overrides)
}

const DEADLINE_MS: &str = "SEEDSWEEP_DEADLINE_MS";
const DEADLINE_GROWTH: &str = "SEEDSWEEP_DEADLINE_GROWTH";
const DEADLINE_MAX_MS: &str = "SEEDSWEEP_DEADLINE_MAX_MS";
const DEADLINE_KEYS: [&str; 3] = [DEADLINE_MS, DEADLINE_GROWTH, DEADLINE_MAX_MS];

fn apply_deadline_overrides(
    policy: &mut DeadlinePolicy,
    overrides: &BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    let initial = parse_entry(overrides, DEADLINE_MS)?.map(Duration::from_millis);
    let growth: Option<f64> = parse_entry(overrides, DEADLINE_GROWTH)?;
    let max = parse_entry(overrides, DEADLINE_MAX_MS)?.map(Duration::from_millis);
    if initial.is_none() && growth.is_none() && max.is_none() {
        return Ok(());
    }

    let base_escalates = policy.max > policy.initial;
    if let Some(initial) = initial {
        policy.initial = initial;
    }
    if let Some(growth) = growth {
        policy.growth = growth;
    }
    policy.max = match max {
        Some(max) => max,
        None if base_escalates && policy.max >= policy.initial => policy.max,
        None if policy.growth > 1.0 => policy
            .initial
            .saturating_mul(DeadlinePolicy::DEFAULT_CAP_FACTOR),
        None => policy.initial,
    };
    Ok(())
}

fn apply_override(config: &mut SearchConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "SEEDSWEEP_MODE" => {
            config.mode = match value.trim().to_ascii_lowercase().as_str() {
                "sequential" => SearchMode::Sequential,
                "parallel" => SearchMode::Parallel,
                _ => return Err(invalid(key, value)),
            };
        }
        "SEEDSWEEP_SEED_START" => {
            config.seed_range.start = parse(key, value)?;
        }
        "SEEDSWEEP_SEED_COUNT" => {
            config.seed_range.count = if value.trim().eq_ignore_ascii_case("unbounded") {
                None
            } else {
                Some(parse(key, value)?)
            };
        }
        "SEEDSWEEP_WORKERS" => {
            config.worker_count = parse(key, value)?;
        }
        "SEEDSWEEP_STOP" => {
            config.stop = match value.trim().to_ascii_lowercase().as_str() {
                "first-failure" | "first_failure" => StopPolicy::FirstFailure,
                "exhaust" => StopPolicy::Exhaust,
                _ => return Err(invalid(key, value)),
            };
        }
        _ => return Err(ConfigError::UnknownOverride(key.to_string())),
    }
    Ok(())
}

fn parse_entry<T: std::str::FromStr>(
    overrides: &BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    overrides.get(key).map(|value| parse(key, value)).transpose()
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidOverride {
        key: key.to_string(),
        value: value.to_string(),
    }
}
