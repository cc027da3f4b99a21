//! Structured CLI errors.
//!
//! Follows RFC 9457 (Problem Details) style for machine-readable errors
//! with human-friendly formatting.

use super::exit::ExitCode;
use crate::error::ConfigError;
use crate::lab::{ReplayError, SearchReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured error following RFC 9457 (Problem Details) style.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliError {
    /// Error type identifier (machine-readable).
    #[serde(rename = "type")]
    pub error_type: String,

    /// Short human-readable title.
    pub title: String,

    /// Detailed explanation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,

    /// Suggested action for recovery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,

    /// Additional context (varies by error type).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,

    /// Exit code for this error.
    pub exit_code: i32,
}

impl CliError {
    /// Creates an error with [`ExitCode::RUNTIME_ERROR`].
    #[must_use]
    pub fn new(error_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            title: title.into(),
            detail: String::new(),
            suggestion: None,
            context: BTreeMap::new(),
            exit_code: ExitCode::RUNTIME_ERROR,
        }
    }

    /// Adds a detailed explanation.
    #[must_use]
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Adds a suggested recovery action.
    #[must_use]
    pub fn suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Adds a context field.
    #[must_use]
    pub fn context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Sets the exit code.
    #[must_use]
    pub const fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Formats for a terminal. `color` adds ANSI escapes.
    #[must_use]
    pub fn human_format(&self, color: bool) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        if color {
            out.push_str("\x1b[1;31m");
        }
        out.push_str("Error: ");
        out.push_str(&self.title);
        if color {
            out.push_str("\x1b[0m");
        }
        out.push('\n');

        if !self.detail.is_empty() {
            out.push_str(&self.detail);
            out.push('\n');
        }

        if let Some(ref suggestion) = self.suggestion {
            out.push('\n');
            if color {
                out.push_str("\x1b[33m");
            }
            out.push_str("Suggestion: ");
            out.push_str(suggestion);
            if color {
                out.push_str("\x1b[0m");
            }
            out.push('\n');
        }

        if !self.context.is_empty() {
            out.push('\n');
            if color {
                out.push_str("\x1b[2m");
            }
            out.push_str("Context:\n");
            for (k, v) in &self.context {
                let _ = writeln!(out, "  {k}: {v}");
            }
            if color {
                out.push_str("\x1b[0m");
            }
        }

        out
    }

    /// Formats as JSON.
    #[must_use]
    pub fn json_format(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.title.clone())
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_type, self.title)
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let cli = Self::new("invalid_config", "Invalid search configuration")
            .detail(err.to_string())
            .exit_code(ExitCode::USER_ERROR);
        match err {
            ConfigError::UnknownOverride(key) => cli
                .suggestion("Unset the variable or fix its name")
                .context("key", key),
            ConfigError::InvalidOverride { key, value } => {
                cli.context("key", key).context("value", value)
            }
            ConfigError::UnboundedParallelSearch => {
                cli.suggestion("Pass --seeds, or drop --keep-going to stop at the first bug")
            }
            _ => cli,
        }
    }
}

impl From<ReplayError> for CliError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::Inconclusive { seed } => {
                Self::new("replay_inconclusive", "Seed did not fail")
                    .detail(err.to_string())
                    .suggestion("Raise --deadline-ms or check the seed")
                    .context("seed", seed)
                    .exit_code(ExitCode::CANCELLED)
            }
            ReplayError::Divergence { seed, .. } => {
                Self::new("replay_divergence", "Seed is not reproducible")
                    .detail(err.to_string())
                    .context("seed", seed)
                    .exit_code(ExitCode::DETERMINISM_FAILURE)
            }
        }
    }
}

/// Standard error constructors.
pub mod errors {
    use super::{CliError, ExitCode, SearchReport};
    use std::any::Any;

    /// Invalid argument error.
    #[must_use]
    pub fn invalid_argument(arg: &str, reason: &str) -> CliError {
        CliError::new("invalid_argument", format!("Invalid argument: {arg}"))
            .detail(reason)
            .exit_code(ExitCode::USER_ERROR)
    }

    /// The search found failing seeds.
    #[must_use]
    pub fn bugs_found(report: &SearchReport) -> CliError {
        let seeds = report.bug_seeds();
        let detail = report.first_bug().map_or_else(String::new, |bug| {
            format!(
                "{} of {} trials failed. First failure at seed {}: {}",
                seeds.len(),
                report.trials_run,
                bug.seed,
                bug.error
            )
        });
        CliError::new("bugs_found", "Search found failing seeds")
            .detail(detail)
            .suggestion("Reproduce with `seedsweep replay --seed <SEED>`")
            .context("seeds", seeds)
            .exit_code(ExitCode::TEST_FAILURE)
    }

    /// Output could not be written.
    #[must_use]
    pub fn output(err: &dyn std::error::Error) -> CliError {
        CliError::new("output_error", "Failed to write output")
            .detail(err.to_string())
            .exit_code(ExitCode::RUNTIME_ERROR)
    }

    /// Internal error (bug).
    #[must_use]
    pub fn internal(details: &str) -> CliError {
        CliError::new("internal_error", "Internal error")
            .detail(details)
            .exit_code(ExitCode::INTERNAL_ERROR)
    }

    /// Internal error from a caught panic payload.
    #[must_use]
    pub fn panicked(payload: &(dyn Any + Send)) -> CliError {
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("panic with a non-string payload");
        internal(message)
    }
}
