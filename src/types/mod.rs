//! Core value types.
//!
//! - [`time`]: virtual timestamps measured from a fixed epoch

pub mod time;

pub use time::Time;
