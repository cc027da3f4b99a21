//! End-to-end properties of trials and seed searches.
//!
//! Run with: `cargo test --test seed_search_e2e`

use seedsweep::config::{SearchConfig, SearchMode, StopPolicy};
use seedsweep::lab::{
    CancelReason, CollectingReporter, FaultInjector, Job, SeedSearch, TrialExecutor, Verdict,
};
use seedsweep::{DetRng, JobError, TrialError};
use std::collections::BTreeSet;
use std::time::Duration;

fn init_test(name: &str) {
    seedsweep::test_utils::init_test_logging();
    seedsweep::test_phase!(name);
}

/// Fails on its third execution for roughly one seed in four; otherwise never.
#[derive(Debug, Default)]
struct FlakyJob {
    executions: u32,
    doomed: Option<bool>,
}

impl Job for FlakyJob {
    fn execute(&mut self, rng: &mut DetRng) -> Result<(), JobError> {
        self.executions += 1;
        let doomed = *self.doomed.get_or_insert_with(|| rng.next_u32_below(4) == 0);
        if doomed && self.executions == 3 {
            return Err(JobError::new("flaky job gave up"));
        }
        Ok(())
    }
}

#[test]
fn same_seed_same_failure() {
    init_test("same_seed_same_failure");
    let executor = TrialExecutor::new(|| FaultInjector::new(0.1));
    for seed in [0, 1, 42, 9_999, u64::MAX] {
        let first = executor.run(seed, Duration::from_secs(30));
        let second = executor.run(seed, Duration::from_secs(30));
        assert!(first.is_bug(), "seed {seed} should fail");
        assert_eq!(first.error, second.error);
        seedsweep::assert_with_log!(
            first.certificate == second.certificate,
            "certificate",
            first.certificate,
            second.certificate
        );
    }
    seedsweep::test_complete!("same_seed_same_failure");
}

#[test]
fn different_seeds_explore_different_runs() {
    init_test("different_seeds_explore_different_runs");
    let executor = TrialExecutor::new(|| FaultInjector::new(0.1));
    let fingerprints: BTreeSet<u64> = (0..32)
        .map(|seed| executor.run(seed, Duration::from_secs(30)).certificate.fingerprint)
        .collect();
    assert!(fingerprints.len() > 16, "only {} distinct runs", fingerprints.len());
    seedsweep::test_complete!("different_seeds_explore_different_runs");
}

#[test]
fn parallel_matches_sequential_per_seed() {
    init_test("parallel_matches_sequential_per_seed");
    let config = SearchConfig::sequential()
        .deadline(Duration::from_millis(25))
        .seeds(0, 24)
        .stop(StopPolicy::Exhaust);
    let sequential = SeedSearch::new(config.clone(), TrialExecutor::new(FlakyJob::default))
        .expect("valid config")
        .run(&mut CollectingReporter::new());
    let parallel = SeedSearch::new(
        config.mode(SearchMode::Parallel).worker_count(4),
        TrialExecutor::new(FlakyJob::default),
    )
    .expect("valid config")
    .run(&mut CollectingReporter::new());

    let verdicts = |report: &seedsweep::SearchReport| {
        report
            .runs
            .iter()
            .map(|run| (run.seed, run.verdict))
            .collect::<Vec<_>>()
    };
    assert_eq!(verdicts(&parallel), verdicts(&sequential));
    for bug in &sequential.bugs {
        let twin = parallel
            .bugs
            .iter()
            .find(|other| other.seed == bug.seed)
            .expect("same bug seeds");
        assert_eq!(twin.certificate, bug.certificate);
        assert_eq!(twin.error, bug.error);
    }
    seedsweep::test_complete!("parallel_matches_sequential_per_seed");
}

#[test]
fn deadline_is_respected_in_real_time() {
    init_test("deadline_is_respected_in_real_time");
    let deadline = Duration::from_millis(150);
    let outcome = TrialExecutor::new(FaultInjector::never).run(3, deadline);
    assert_eq!(
        outcome.error,
        TrialError::Cancelled {
            reason: CancelReason::Deadline
        }
    );
    seedsweep::assert_with_log!(
        outcome.elapsed >= deadline,
        "not before deadline",
        deadline,
        outcome.elapsed
    );
    seedsweep::assert_with_log!(
        outcome.elapsed < deadline + Duration::from_secs(1),
        "shortly after deadline",
        deadline,
        outcome.elapsed
    );
    assert!(outcome.certificate.cycles > 0);
    seedsweep::test_complete!("deadline_is_respected_in_real_time");
}

#[test]
fn parallel_visits_each_seed_exactly_once() {
    init_test("parallel_visits_each_seed_exactly_once");
    let n = 200;
    let config = SearchConfig::parallel()
        .deadline(Duration::from_secs(30))
        .seeds(0, n)
        .worker_count(6)
        .stop(StopPolicy::Exhaust);
    let parallel = SeedSearch::new(config.clone(), TrialExecutor::new(|| FaultInjector::new(0.05)))
        .expect("valid config")
        .run(&mut CollectingReporter::new());
    let seeds: Vec<u64> = parallel.runs.iter().map(|run| run.seed).collect();
    let expected: Vec<u64> = (0..n).collect();
    seedsweep::assert_with_log!(seeds == expected, "seeds", n, seeds.len());

    let sequential = SeedSearch::new(
        config.mode(SearchMode::Sequential),
        TrialExecutor::new(|| FaultInjector::new(0.05)),
    )
    .expect("valid config")
    .run(&mut CollectingReporter::new());
    assert_eq!(parallel.bug_seeds(), sequential.bug_seeds());
    seedsweep::test_complete!("parallel_visits_each_seed_exactly_once");
}

#[test]
fn never_failing_job_times_out_without_bugs() {
    init_test("never_failing_job_times_out_without_bugs");
    let deadline = Duration::from_secs(2);
    let mut reporter = CollectingReporter::new();
    let report = SeedSearch::new(
        SearchConfig::sequential().deadline(deadline).seeds(0, 1),
        TrialExecutor::new(FaultInjector::never),
    )
    .expect("valid config")
    .run(&mut reporter);
    assert!(report.all_inconclusive());
    assert!(reporter.bugs().is_empty());
    assert_eq!(report.timeouts, 1);
    let run = report.runs[0];
    assert_eq!(run.verdict, Verdict::Timeout);
    seedsweep::assert_with_log!(
        run.elapsed >= deadline && run.elapsed < deadline + Duration::from_secs(1),
        "about two seconds",
        deadline,
        run.elapsed
    );
    seedsweep::test_complete!("never_failing_job_times_out_without_bugs");
}

#[test]
fn certain_failure_hits_first_execution() {
    init_test("certain_failure_hits_first_execution");
    let deadline = Duration::from_secs(10);
    let outcome = TrialExecutor::new(FaultInjector::always).run(42, deadline);
    assert!(matches!(outcome.error, TrialError::JobFailure(_)));
    assert_eq!(outcome.certificate.executions, 1);
    seedsweep::assert_with_log!(
        outcome.certificate.polls <= 60,
        "polls",
        "<= 60",
        outcome.certificate.polls
    );
    assert!(outcome.virtual_elapsed <= Duration::from_secs(59 * 60));
    seedsweep::assert_with_log!(
        outcome.elapsed < deadline / 10,
        "real elapsed",
        deadline / 10,
        outcome.elapsed
    );
    seedsweep::test_complete!("certain_failure_hits_first_execution");
}

#[test]
fn replay_reproduces_search_finding() {
    init_test("replay_reproduces_search_finding");
    let executor = TrialExecutor::new(FlakyJob::default);
    let report = SeedSearch::new(
        SearchConfig::sequential()
            .deadline(Duration::from_millis(25))
            .unbounded_seeds(0),
        TrialExecutor::new(FlakyJob::default),
    )
    .expect("valid config")
    .run(&mut CollectingReporter::new());
    let bug = report.first_bug().expect("a doomed seed exists");
    let replayed = executor
        .replay(bug.seed, Duration::from_secs(5))
        .expect("replay confirms");
    assert_eq!(replayed.certificate, bug.certificate);
    assert_eq!(replayed.certificate.executions, 3);
    seedsweep::test_complete!("replay_reproduces_search_finding");
}
