//! Deterministic utilities.
//!
//! - [`DetRng`]: seeded PRNG driving every random decision in a trial
//! - [`DetHasher`]: fixed-seed hasher for trace fingerprints

pub mod det_hash;
pub mod det_rng;

pub use det_hash::DetHasher;
pub use det_rng::DetRng;
