//! Seed search.
//!
//! [`SeedSearch`] runs trials over a range of seeds until a job failure turns
//! up. Cancelled trials are inconclusive and only mean "try another seed";
//! failures go to a [`Reporter`] together with everything needed to replay
//! them.
//!
//! Sequential mode walks the seeds one by one on the calling thread.
//! Parallel mode runs a fixed pool of workers under [`std::thread::scope`]:
//! a producer feeds seeds in order into a bounded channel, each worker
//! takes the next seed and runs its own trial, and outcomes flow back over
//! an unbounded channel to the calling thread, which reports them in
//! discovery order.

use super::cancel::{CancelReason, CancelToken};
use super::job::Job;
use super::machine::TraceCertificate;
use super::trial::{BugReport, Trial, TrialExecutor, TrialOutcome};
use crate::config::{SearchConfig, SearchMode, StopPolicy};
use crate::error::{ConfigError, SearchAction, TrialError};
use crossbeam_channel as channel;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Receives search findings as they happen.
pub trait Reporter {
    /// Called once per job failure, in discovery order.
    fn on_bug(&mut self, bug: &BugReport);

    /// Called once per trial that hit its deadline.
    fn on_timeout(&mut self, seed: u64, elapsed: Duration) {
        let _ = (seed, elapsed);
    }
}

/// Logs findings through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn on_bug(&mut self, bug: &BugReport) {
        tracing::info!(
            seed = bug.seed,
            elapsed_ms = bug.elapsed.as_millis(),
            virtual_elapsed_s = bug.virtual_elapsed.as_secs(),
            fingerprint = bug.certificate.fingerprint,
            "bug found: {}",
            bug.error
        );
    }

    fn on_timeout(&mut self, seed: u64, elapsed: Duration) {
        tracing::debug!(
            seed,
            elapsed_ms = elapsed.as_millis(),
            "trial inconclusive, trying next seed"
        );
    }
}

/// Keeps findings in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingReporter {
    bugs: Vec<BugReport>,
    timeouts: Vec<u64>,
}

impl CollectingReporter {
    /// Creates an empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bugs in the order they were reported.
    #[must_use]
    pub fn bugs(&self) -> &[BugReport] {
        &self.bugs
    }

    /// Seeds whose trials timed out, in the order they were reported.
    #[must_use]
    pub fn timeouts(&self) -> &[u64] {
        &self.timeouts
    }
}

impl Reporter for CollectingReporter {
    fn on_bug(&mut self, bug: &BugReport) {
        self.bugs.push(bug.clone());
    }

    fn on_timeout(&mut self, seed: u64, _elapsed: Duration) {
        self.timeouts.push(seed);
    }
}

/// How a single trial of a search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The job failed.
    Bug,
    /// The trial hit its deadline.
    Timeout,
    /// The search stopped the trial early.
    Aborted,
}

impl Verdict {
    fn of(error: &TrialError) -> Self {
        match error {
            TrialError::JobFailure(_) => Self::Bug,
            TrialError::Cancelled {
                reason: CancelReason::Deadline,
            } => Self::Timeout,
            TrialError::Cancelled {
                reason: CancelReason::Requested,
            } => Self::Aborted,
        }
    }
}

/// Per-trial line of a [`SearchReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialSummary {
    /// Seed of the trial.
    pub seed: u64,
    /// How it ended.
    pub verdict: Verdict,
    /// Deadline it ran under.
    pub deadline: Duration,
    /// Wall-clock duration.
    pub elapsed: Duration,
    /// Identity of the simulated run.
    pub certificate: TraceCertificate,
}

impl TrialSummary {
    fn of(outcome: &TrialOutcome) -> Self {
        Self {
            seed: outcome.seed(),
            verdict: Verdict::of(&outcome.error),
            deadline: outcome.trial.deadline(),
            elapsed: outcome.elapsed,
            certificate: outcome.certificate,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        json!({
            "seed": self.seed,
            "verdict": self.verdict,
            "deadline_ms": self.deadline.as_millis(),
            "elapsed_ms": self.elapsed.as_millis(),
            "polls": self.certificate.polls,
            "executions": self.certificate.executions,
            "virtual_elapsed_s": self.certificate.virtual_elapsed.as_secs(),
            "fingerprint": self.certificate.fingerprint,
        })
    }
}

/// Result of a whole search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    /// Strategy that ran.
    pub mode: SearchMode,
    /// Trials that finished, including aborted ones.
    pub trials_run: u64,
    /// Trials that hit their deadline.
    pub timeouts: u64,
    /// Bugs in discovery order.
    pub bugs: Vec<BugReport>,
    /// Finished trials, sorted by seed.
    ///
    /// A bounded range keeps every trial. An unbounded range keeps only bug
    /// and aborted rows; its timeouts are counted in `timeouts`.
    pub runs: Vec<TrialSummary>,
    /// Wall-clock duration of the search.
    pub wall_elapsed: Duration,
}

impl SearchReport {
    fn new(mode: SearchMode) -> Self {
        Self {
            mode,
            trials_run: 0,
            timeouts: 0,
            bugs: Vec::new(),
            runs: Vec::new(),
            wall_elapsed: Duration::ZERO,
        }
    }

    /// Returns the first bug discovered.
    #[must_use]
    pub fn first_bug(&self) -> Option<&BugReport> {
        self.bugs.first()
    }

    /// Returns the failing seeds in increasing order.
    #[must_use]
    pub fn bug_seeds(&self) -> Vec<u64> {
        let mut seeds: Vec<u64> = self.bugs.iter().map(|bug| bug.seed).collect();
        seeds.sort_unstable();
        seeds
    }

    /// Returns true if no trial found a bug.
    #[must_use]
    pub fn all_inconclusive(&self) -> bool {
        self.bugs.is_empty()
    }

    /// Number of distinct simulated runs among `runs`.
    #[must_use]
    pub fn unique_fingerprints(&self) -> usize {
        self.runs
            .iter()
            .map(|run| run.certificate.fingerprint)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Serializes the report for the CLI.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        json!({
            "mode": self.mode,
            "trials_run": self.trials_run,
            "timeouts": self.timeouts,
            "bug_seeds": self.bug_seeds(),
            "bugs": self.bugs.iter().map(|bug| json!({
                "seed": bug.seed,
                "error": bug.error.message(),
                "elapsed_ms": bug.elapsed.as_millis(),
                "virtual_elapsed_s": bug.virtual_elapsed.as_secs(),
                "polls": bug.certificate.polls,
                "fingerprint": bug.certificate.fingerprint,
            })).collect::<Vec<_>>(),
            "unique_fingerprints": self.unique_fingerprints(),
            "wall_elapsed_ms": self.wall_elapsed.as_millis(),
            "runs": self.runs.iter().map(TrialSummary::to_json).collect::<Vec<_>>(),
        })
    }

    fn record(
        &mut self,
        outcome: &TrialOutcome,
        keep_timeouts: bool,
        reporter: &mut dyn Reporter,
    ) {
        self.trials_run += 1;
        let summary = TrialSummary::of(outcome);
        match summary.verdict {
            Verdict::Bug => {
                if let Some(bug) = outcome.to_bug_report() {
                    reporter.on_bug(&bug);
                    self.bugs.push(bug);
                }
            }
            Verdict::Timeout => {
                self.timeouts += 1;
                reporter.on_timeout(summary.seed, summary.elapsed);
            }
            Verdict::Aborted => {
                tracing::debug!(seed = summary.seed, "trial aborted by search stop");
            }
        }
        if keep_timeouts || summary.verdict != Verdict::Timeout {
            self.runs.push(summary);
        }
    }
}

/// Searches seeds for a failing run.
pub struct SeedSearch<F> {
    config: SearchConfig,
    executor: TrialExecutor<F>,
}

impl<F> std::fmt::Debug for SeedSearch<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedSearch")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<F, J> SeedSearch<F>
where
    F: Fn() -> J + Sync,
    J: Job,
{
    /// Creates a search.
    ///
    /// # Errors
    ///
    /// Returns the configuration's validation error.
    pub fn new(config: SearchConfig, executor: TrialExecutor<F>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, executor })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Runs the search, reporting findings as they happen.
    ///
    /// Never returns for an unbounded range whose job never fails.
    pub fn run(&self, reporter: &mut dyn Reporter) -> SearchReport {
        let started = Instant::now();
        tracing::info!(
            mode = ?self.config.mode,
            start_seed = self.config.seed_range.start,
            seed_count = ?self.config.seed_range.count,
            deadline_ms = self.config.deadline.initial.as_millis(),
            "seed search starting"
        );
        let mut report = match self.config.mode {
            SearchMode::Sequential => self.run_sequential(reporter),
            SearchMode::Parallel => self.run_parallel(reporter),
        };
        report.runs.sort_by_key(|run| run.seed);
        report.wall_elapsed = started.elapsed();
        tracing::info!(
            trials = report.trials_run,
            timeouts = report.timeouts,
            bugs = report.bugs.len(),
            wall_ms = report.wall_elapsed.as_millis(),
            "seed search finished"
        );
        report
    }

    fn run_sequential(&self, reporter: &mut dyn Reporter) -> SearchReport {
        let mut report = SearchReport::new(SearchMode::Sequential);
        let policy = self.config.deadline;
        let mut deadline = policy.initial;
        let keep_timeouts = self.config.seed_range.is_bounded();
        for seed in self.config.seed_range.iter() {
            let outcome = self.executor.run(seed, deadline);
            report.record(&outcome, keep_timeouts, reporter);
            match outcome.error.kind().search_action() {
                SearchAction::NextSeed => deadline = policy.escalate(deadline),
                SearchAction::Report if self.config.stop == StopPolicy::FirstFailure => break,
                SearchAction::Report => {}
            }
        }
        report
    }

    fn run_parallel(&self, reporter: &mut dyn Reporter) -> SearchReport {
        let mut report = SearchReport::new(SearchMode::Parallel);
        let deadline = self.config.deadline.initial;
        let keep_timeouts = self.config.seed_range.is_bounded();
        let workers = self.config.worker_count;
        let stop = CancelToken::never();
        let (seed_tx, seed_rx) = channel::bounded::<u64>(workers);
        let (result_tx, result_rx) = channel::unbounded::<TrialOutcome>();

        std::thread::scope(|scope| {
            let seeds = self.config.seed_range;
            let producer_stop = &stop;
            scope.spawn(move || {
                for seed in seeds.iter() {
                    if producer_stop.is_cancelled() || seed_tx.send(seed).is_err() {
                        break;
                    }
                }
            });

            for _ in 0..workers {
                let seed_rx = seed_rx.clone();
                let result_tx = result_tx.clone();
                let stop = &stop;
                let executor = &self.executor;
                scope.spawn(move || {
                    for seed in &seed_rx {
                        if stop.is_cancelled() {
                            break;
                        }
                        let outcome = executor.run_with_token(Trial::new(seed, deadline), stop);
                        if result_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(seed_rx);
            drop(result_tx);

            for outcome in &result_rx {
                report.record(&outcome, keep_timeouts, reporter);
                if outcome.is_bug() && self.config.stop == StopPolicy::FirstFailure {
                    stop.cancel();
                }
            }
        });
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeadlinePolicy;
    use crate::error::JobError;
    use crate::lab::job::FaultInjector;
    use crate::util::DetRng;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    const GENEROUS: Duration = Duration::from_secs(30);
    const SHORT: Duration = Duration::from_millis(20);

    /// Tosses a coin on its first execution: heads fails now, tails never fails.
    #[derive(Debug, Default)]
    struct CoinJob {
        bad: Option<bool>,
    }

    impl Job for CoinJob {
        fn execute(&mut self, rng: &mut DetRng) -> Result<(), JobError> {
            if *self.bad.get_or_insert_with(|| rng.next_bool()) {
                Err(JobError::new("bad seed"))
            } else {
                Ok(())
            }
        }
    }

    fn coin_search(config: SearchConfig) -> SeedSearch<fn() -> CoinJob> {
        SeedSearch::new(config, TrialExecutor::new(CoinJob::default as fn() -> CoinJob))
            .expect("valid config")
    }

    fn bad_seeds(seeds: std::ops::Range<u64>) -> Vec<u64> {
        let executor = TrialExecutor::new(CoinJob::default);
        seeds
            .filter(|&seed| executor.run(seed, SHORT).is_bug())
            .collect()
    }

    #[test]
    fn sequential_stops_at_first_failure() {
        init_test("sequential_stops_at_first_failure");
        let executor = TrialExecutor::new(FaultInjector::always);
        let search = SeedSearch::new(
            SearchConfig::sequential().deadline(GENEROUS).unbounded_seeds(7),
            executor,
        )
        .expect("valid config");
        let mut reporter = CollectingReporter::new();
        let report = search.run(&mut reporter);
        assert_eq!(report.trials_run, 1);
        assert_eq!(report.bug_seeds(), vec![7]);
        assert_eq!(reporter.bugs().len(), 1);
        assert_eq!(report.first_bug().map(|bug| bug.seed), Some(7));
        crate::test_complete!("sequential_stops_at_first_failure");
    }

    #[test]
    fn sequential_skips_timeouts() {
        init_test("sequential_skips_timeouts");
        let search = SeedSearch::new(
            SearchConfig::sequential()
                .deadline(Duration::from_millis(20))
                .seeds(0, 3),
            TrialExecutor::new(FaultInjector::never),
        )
        .expect("valid config");
        let mut reporter = CollectingReporter::new();
        let report = search.run(&mut reporter);
        assert_eq!(report.trials_run, 3);
        assert_eq!(report.timeouts, 3);
        assert!(report.all_inconclusive());
        assert_eq!(reporter.timeouts(), &[0, 1, 2]);
        assert!(report.runs.iter().all(|run| run.verdict == Verdict::Timeout));
        crate::test_complete!("sequential_skips_timeouts");
    }

    #[test]
    fn unbounded_search_keeps_only_bug_rows() {
        init_test("unbounded_search_keeps_only_bug_rows");
        let bad = bad_seeds(0..64);
        let start = (0..64).find(|seed| !bad.contains(seed)).expect("a passing seed");
        let first_bad = *bad.iter().find(|&&seed| seed > start).expect("a later bad seed");

        let report = coin_search(
            SearchConfig::sequential()
                .deadline(SHORT)
                .unbounded_seeds(start),
        )
        .run(&mut CollectingReporter::new());
        assert_eq!(report.trials_run, first_bad - start + 1);
        crate::assert_with_log!(
            report.timeouts == report.trials_run - 1,
            "timeouts still counted",
            report.trials_run - 1,
            report.timeouts
        );
        assert_eq!(report.runs.len(), 1);
        assert_eq!(report.runs[0].seed, first_bad);
        assert_eq!(report.runs[0].verdict, Verdict::Bug);
        crate::test_complete!("unbounded_search_keeps_only_bug_rows");
    }

    #[test]
    fn sequential_escalates_deadline_after_timeouts() {
        init_test("sequential_escalates_deadline_after_timeouts");
        let search = SeedSearch::new(
            SearchConfig::sequential()
                .deadline_policy(DeadlinePolicy::escalating(
                    Duration::from_micros(15_625),
                    2.0,
                    Duration::from_millis(40),
                ))
                .seeds(0, 4),
            TrialExecutor::new(FaultInjector::never),
        )
        .expect("valid config");
        let report = search.run(&mut CollectingReporter::new());
        let deadlines: Vec<u128> = report
            .runs
            .iter()
            .map(|run| run.deadline.as_micros())
            .collect();
        crate::assert_with_log!(
            deadlines == vec![15_625, 31_250, 40_000, 40_000],
            "deadlines",
            "[15625, 31250, 40000, 40000]",
            deadlines
        );
        crate::test_complete!("sequential_escalates_deadline_after_timeouts");
    }

    #[test]
    fn sequential_exhaust_reports_every_bug() {
        init_test("sequential_exhaust_reports_every_bug");
        let expected = bad_seeds(0..8);
        let search = coin_search(
            SearchConfig::sequential()
                .deadline(SHORT)
                .seeds(0, 8)
                .stop(StopPolicy::Exhaust),
        );
        let mut reporter = CollectingReporter::new();
        let report = search.run(&mut reporter);
        assert_eq!(report.trials_run, 8);
        crate::assert_with_log!(
            report.bug_seeds() == expected,
            "bug seeds",
            expected,
            report.bug_seeds()
        );
        assert_eq!(report.timeouts, 8 - expected.len() as u64);
        assert!(reporter.bugs().iter().all(|bug| bug.error.message() == "bad seed"));
        crate::test_complete!("sequential_exhaust_reports_every_bug");
    }

    #[test]
    fn parallel_visits_every_seed_once() {
        init_test("parallel_visits_every_seed_once");
        let search = SeedSearch::new(
            SearchConfig::parallel()
                .deadline(GENEROUS)
                .seeds(100, 40)
                .worker_count(4),
            TrialExecutor::new(FaultInjector::always),
        )
        .expect("valid config");
        let report = search.run(&mut CollectingReporter::new());
        let seeds: Vec<u64> = report.runs.iter().map(|run| run.seed).collect();
        let expected: Vec<u64> = (100..140).collect();
        crate::assert_with_log!(seeds == expected, "seeds", expected, seeds);
        assert_eq!(report.bug_seeds(), expected);
        assert_eq!(report.trials_run, 40);
        crate::test_complete!("parallel_visits_every_seed_once");
    }

    #[test]
    fn parallel_matches_sequential() {
        init_test("parallel_matches_sequential");
        let base = SearchConfig::sequential()
            .deadline(SHORT)
            .seeds(0, 12)
            .stop(StopPolicy::Exhaust);
        let sequential = coin_search(base.clone()).run(&mut TracingReporter);
        let parallel =
            coin_search(base.mode(SearchMode::Parallel).worker_count(3)).run(&mut TracingReporter);
        assert_eq!(parallel.bug_seeds(), sequential.bug_seeds());
        assert_eq!(parallel.timeouts, sequential.timeouts);
        let bugs = |report: &SearchReport| {
            report
                .runs
                .iter()
                .filter(|run| run.verdict == Verdict::Bug)
                .map(|run| (run.seed, run.certificate))
                .collect::<Vec<_>>()
        };
        assert_eq!(bugs(&parallel), bugs(&sequential));
        crate::test_complete!("parallel_matches_sequential");
    }

    #[test]
    fn parallel_first_failure_stops_early() {
        init_test("parallel_first_failure_stops_early");
        let search = SeedSearch::new(
            SearchConfig::parallel()
                .deadline(GENEROUS)
                .unbounded_seeds(0)
                .worker_count(2)
                .stop(StopPolicy::FirstFailure),
            TrialExecutor::new(FaultInjector::always),
        )
        .expect("valid config");
        let mut reporter = CollectingReporter::new();
        let report = search.run(&mut reporter);
        assert!(!report.all_inconclusive());
        assert_eq!(reporter.bugs().len(), report.bugs.len());
        assert!(report.runs.windows(2).all(|pair| pair[0].seed < pair[1].seed));
        crate::test_complete!("parallel_first_failure_stops_early");
    }

    #[test]
    fn first_failure_aborts_in_flight_trials() {
        init_test("first_failure_aborts_in_flight_trials");
        let first_bad = bad_seeds(0..64).first().copied().expect("some bad seed");
        // Good seeds never fail, so they only end early if the search stops them.
        let search = coin_search(
            SearchConfig::parallel()
                .deadline(GENEROUS)
                .seeds(first_bad, 4)
                .worker_count(4)
                .stop(StopPolicy::FirstFailure),
        );
        let report = search.run(&mut CollectingReporter::new());
        assert!(report.bug_seeds().contains(&first_bad));
        assert_eq!(report.timeouts, 0);
        crate::assert_with_log!(
            report.wall_elapsed < Duration::from_secs(10),
            "wall elapsed",
            "< 10s",
            report.wall_elapsed
        );
        assert!(
            report
                .runs
                .iter()
                .all(|run| matches!(run.verdict, Verdict::Bug | Verdict::Aborted))
        );
        crate::test_complete!("first_failure_aborts_in_flight_trials");
    }

    #[test]
    fn invalid_config_is_rejected() {
        init_test("invalid_config_is_rejected");
        let err = SeedSearch::new(
            SearchConfig::parallel().worker_count(0),
            TrialExecutor::new(FaultInjector::never),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidWorkerCount);
        crate::test_complete!("invalid_config_is_rejected");
    }

    #[test]
    fn report_json_shape() {
        init_test("report_json_shape");
        let search = SeedSearch::new(
            SearchConfig::sequential().deadline(GENEROUS).seeds(3, 1),
            TrialExecutor::new(FaultInjector::always),
        )
        .expect("valid config");
        let report = search.run(&mut CollectingReporter::new());
        let json = report.to_json();
        assert_eq!(json["mode"], "sequential");
        assert_eq!(json["trials_run"], 1);
        assert_eq!(json["bug_seeds"][0], 3);
        assert_eq!(json["bugs"][0]["error"], FaultInjector::FAILURE_MESSAGE);
        assert_eq!(json["runs"][0]["verdict"], "bug");
        assert_eq!(json["unique_fingerprints"], 1);
        crate::test_complete!("report_json_shape");
    }
}
