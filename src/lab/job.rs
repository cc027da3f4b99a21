//! The job under test.
//!
//! A [`Job`] is one fallible operation the state machine runs each time the
//! target minute arrives. Any randomness it needs must come from the
//! trial's [`DetRng`], otherwise a reported seed will not reproduce.

use crate::error::JobError;
use crate::util::DetRng;

/// An injectable fallible operation.
pub trait Job {
    /// Runs the operation once.
    ///
    /// # Errors
    ///
    /// Returns a [`JobError`] describing the failure. The harness treats
    /// every error as a reproducible bug.
    fn execute(&mut self, rng: &mut DetRng) -> Result<(), JobError>;
}

impl<F> Job for F
where
    F: FnMut(&mut DetRng) -> Result<(), JobError>,
{
    fn execute(&mut self, rng: &mut DetRng) -> Result<(), JobError> {
        self(rng)
    }
}

/// A job that fails with a fixed probability per execution.
///
/// Each execution draws one `f32` from the trial RNG and fails if it falls
/// below the probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultInjector {
    probability: f64,
}

impl FaultInjector {
    /// Failure probability of [`FaultInjector::rare`].
    pub const RARE_PROBABILITY: f64 = 1e-9;

    /// Message carried by the injected failure.
    pub const FAILURE_MESSAGE: &'static str = "rarely happening bug occurred";

    /// Creates an injector failing with `probability` per execution.
    ///
    /// # Panics
    ///
    /// Panics if `probability` is not within `[0, 1]`.
    #[must_use]
    pub fn new(probability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&probability),
            "failure probability must be within [0, 1], got {probability}"
        );
        Self { probability }
    }

    /// A job that almost never fails.
    #[must_use]
    pub fn rare() -> Self {
        Self::new(Self::RARE_PROBABILITY)
    }

    /// A job that never fails.
    #[must_use]
    pub fn never() -> Self {
        Self::new(0.0)
    }

    /// A job that fails on every execution.
    #[must_use]
    pub fn always() -> Self {
        Self::new(1.0)
    }

    /// Returns the failure probability.
    #[must_use]
    pub const fn probability(&self) -> f64 {
        self.probability
    }
}

impl Job for FaultInjector {
    fn execute(&mut self, rng: &mut DetRng) -> Result<(), JobError> {
        if f64::from(rng.next_f32()) < self.probability {
            return Err(JobError::new(Self::FAILURE_MESSAGE));
        }
        Ok(())
    }
}
