//! Semantic exit codes for the `seedsweep` binary.
//!
//! Exit codes stay in the valid range (0-125); codes 126-255 are reserved by
//! shells.

/// Semantic exit codes.
pub struct ExitCode;

impl ExitCode {
    /// Search finished without finding a bug.
    pub const SUCCESS: i32 = 0;

    /// Bad arguments or configuration.
    pub const USER_ERROR: i32 = 1;

    /// Output could not be written.
    pub const RUNTIME_ERROR: i32 = 2;

    /// Bug in the tool itself.
    pub const INTERNAL_ERROR: i32 = 3;

    /// Replayed seed hit its deadline without failing.
    pub const CANCELLED: i32 = 4;

    // Application-specific codes (10-125)

    /// The search found at least one failing seed.
    pub const TEST_FAILURE: i32 = 10;

    /// Two runs of one seed ended differently.
    pub const DETERMINISM_FAILURE: i32 = 12;

    /// Returns a human-readable description of `code`.
    #[must_use]
    pub const fn description(code: i32) -> &'static str {
        match code {
            0 => "success",
            1 => "user error (invalid input/arguments)",
            2 => "runtime error",
            3 => "internal error (bug)",
            4 => "cancelled",
            10 => "test failure",
            12 => "determinism failure",
            _ => "unknown",
        }
    }
}
