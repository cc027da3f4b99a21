//! Deterministic seed search for periodic jobs.
//!
//! `seedsweep` re-executes a scheduled-job state machine under a virtual
//! clock and a seeded pseudo-random source, and searches the seed space for
//! a seed that makes the job fail. Because the clock never reads wall time
//! and every random draw comes from the trial's own [`DetRng`], a reported
//! seed reproduces the failure exactly.
//!
//! # Layout
//!
//! - [`types`]: the virtual [`Time`] value
//! - [`util`]: deterministic RNG and hashing
//! - [`lab`]: clock, cancellation, job state machine, trial executor, search
//! - [`config`]: search parameters and their layered loader
//! - [`error`]: trial and job error types
//! - [`cli`]: exit codes and structured errors for the `seedsweep` binary
//!
//! # Example
//!
//! ```
//! use seedsweep::lab::{CollectingReporter, FaultInjector, SeedSearch, TrialExecutor};
//! use seedsweep::config::SearchConfig;
//! use std::time::Duration;
//!
//! let config = SearchConfig::sequential()
//!     .deadline(Duration::from_millis(200))
//!     .seeds(0, 4);
//! let executor = TrialExecutor::new(|| FaultInjector::always());
//! let search = SeedSearch::new(config, executor).expect("valid config");
//!
//! let mut reporter = CollectingReporter::new();
//! let report = search.run(&mut reporter);
//! assert_eq!(report.first_bug().map(|bug| bug.seed), Some(0));
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod lab;
#[doc(hidden)]
pub mod test_utils;
pub mod types;
pub mod util;

pub use config::{ConfigLoader, SearchConfig, SearchMode};
pub use error::{ConfigError, JobError, TrialError};
pub use lab::{
    BugReport, CancelReason, CancelToken, Clock, Job, JobMachine, JobState, SearchReport,
    SeedSearch, Trial, TrialExecutor, TrialOutcome, VirtualClock,
};
pub use types::Time;
pub use util::DetRng;
