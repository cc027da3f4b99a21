//! Human and JSON rendering of search results.

use crate::lab::{BugReport, SearchReport, TrialOutcome, Verdict};
use serde::Serialize;
use std::io::{self, Write};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Plain text for terminals.
    #[default]
    Human,
    /// Pretty-printed JSON.
    Json,
}

/// Something the CLI can print.
pub trait Outputtable {
    /// Plain-text rendering.
    fn human_format(&self) -> String;

    /// JSON rendering.
    fn json_value(&self) -> serde_json::Value;
}

/// Writes [`Outputtable`] values in one format.
pub struct Output<W = io::Stdout> {
    format: OutputFormat,
    writer: W,
}

impl Output<io::Stdout> {
    /// Writes to stdout.
    #[must_use]
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(format, io::stdout())
    }
}

impl<W: Write> Output<W> {
    /// Writes to `writer`.
    pub const fn new(format: OutputFormat, writer: W) -> Self {
        Self { format, writer }
    }

    /// Writes `value` followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns the writer's error.
    pub fn write(&mut self, value: &dyn Outputtable) -> io::Result<()> {
        let text = match self.format {
            OutputFormat::Human => value.human_format(),
            OutputFormat::Json => serde_json::to_string_pretty(&value.json_value())
                .map_err(io::Error::other)?,
        };
        writeln!(self.writer, "{text}")?;
        self.writer.flush()
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl Outputtable for SearchReport {
    fn human_format(&self) -> String {
        let aborted = self
            .runs
            .iter()
            .filter(|run| run.verdict == Verdict::Aborted)
            .count();
        let status = if self.all_inconclusive() {
            "NO BUG"
        } else {
            "BUG"
        };
        let mut lines = vec![
            format!("Search: {:?} [{status}]", self.mode),
            format!(
                "Trials: {} ({} timed out, {aborted} aborted)",
                self.trials_run, self.timeouts
            ),
            format!("Wall time: {:.3}s", self.wall_elapsed.as_secs_f64()),
        ];
        for bug in &self.bugs {
            lines.push(bug_line(bug));
        }
        lines.join("\n")
    }

    fn json_value(&self) -> serde_json::Value {
        self.to_json()
    }
}

fn bug_line(bug: &BugReport) -> String {
    format!(
        "  seed {}: {} (after {:.3}s real, {} simulated, {} polls)",
        bug.seed,
        bug.error,
        bug.elapsed.as_secs_f64(),
        crate::types::Time::from_offset(bug.virtual_elapsed),
        bug.certificate.polls
    )
}

/// Result of a confirmed replay.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayOutput {
    /// Replayed seed.
    pub seed: u64,
    /// True once both runs matched.
    pub deterministic: bool,
    /// The failure.
    pub bug: Option<BugReport>,
}

impl ReplayOutput {
    /// Builds the output for a replayed outcome.
    #[must_use]
    pub fn from_outcome(outcome: &TrialOutcome) -> Self {
        Self {
            seed: outcome.seed(),
            deterministic: true,
            bug: outcome.to_bug_report(),
        }
    }
}

impl Outputtable for ReplayOutput {
    fn human_format(&self) -> String {
        let mut lines = vec![format!("Replay: seed {} [DETERMINISTIC]", self.seed)];
        if let Some(bug) = &self.bug {
            lines.push(bug_line(bug));
            lines.push(format!(
                "Certificate: fingerprint={}, cycles={}, executions={}",
                bug.certificate.fingerprint, bug.certificate.cycles, bug.certificate.executions
            ));
        }
        lines.join("\n")
    }

    fn json_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
