//! Logging helpers shared by unit and integration tests.
//!
//! Tests call [`init_test_logging`] once, then bracket their body with
//! [`test_phase!`](crate::test_phase) and [`test_complete!`](crate::test_complete)
//! so that failures in the captured output are easy to locate.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a test-writer `tracing` subscriber exactly once per process.
///
/// The level defaults to `INFO` and can be raised with `RUST_LOG`.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Marks the start of a test in the log.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        ::tracing::info!(test = $name, "=== TEST START ===");
    };
}

/// Marks the successful end of a test in the log.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        ::tracing::info!(test = $name, "=== TEST COMPLETE ===");
    };
}

/// Asserts a condition, logging expected and actual values before panicking.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        if !$cond {
            ::tracing::error!(
                message = $msg,
                expected = ?$expected,
                actual = ?$actual,
                "Assertion failed"
            );
        }
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
