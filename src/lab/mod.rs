//! Deterministic lab for seed search.
//!
//! The lab provides:
//!
//! - Virtual time (no wall-clock dependencies inside a trial)
//! - Seeded randomness (same seed → same execution)
//! - A periodic job state machine driven by both
//! - Real-time deadlines and cancellation per trial
//! - Sequential and parallel seed exploration with replay

pub mod cancel;
pub mod clock;
pub mod job;
pub mod machine;
pub mod search;
pub mod trial;

pub use cancel::{CancelReason, CancelToken};
pub use clock::{Clock, VirtualClock};
pub use job::{FaultInjector, Job};
pub use machine::{JobMachine, JobState, TraceCertificate};
pub use search::{
    CollectingReporter, Reporter, SearchReport, SeedSearch, TracingReporter, TrialSummary,
    Verdict,
};
pub use trial::{BugReport, ReplayError, Trial, TrialExecutor, TrialOutcome};
