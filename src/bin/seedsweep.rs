//! `seedsweep` command-line tool.

use clap::{ArgAction, Args, Parser, Subcommand};
use seedsweep::cli::{CliError, ExitCode, Output, OutputFormat, ReplayOutput, errors};
use seedsweep::config::{ConfigLoader, SearchConfig};
use seedsweep::lab::{FaultInjector, SeedSearch, TracingReporter, TrialExecutor};
use std::io::{self, IsTerminal, Write};
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "seedsweep",
    version,
    about = "Search seeds for a failing run of a simulated periodic job"
)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbosity: u8,

    /// Only log warnings and errors
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Try seeds one at a time, growing the deadline after each timeout
    Sequential(SequentialArgs),
    /// Try seeds on a pool of worker threads
    Parallel(ParallelArgs),
    /// Re-run one seed twice and check both runs fail identically
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Real-time deadline per trial in milliseconds
    #[arg(long = "deadline-ms")]
    deadline_ms: Option<u64>,

    /// First seed to try
    #[arg(long = "start-seed")]
    start_seed: Option<u64>,

    /// Number of seeds to try (omit for the mode default)
    #[arg(long = "seeds")]
    seeds: Option<u64>,

    /// Failure probability of each job execution
    #[arg(
        long = "failure-probability",
        default_value_t = FaultInjector::RARE_PROBABILITY,
        value_parser = parse_probability
    )]
    failure_probability: f64,

    /// Keep searching after the first bug
    #[arg(long = "keep-going", action = ArgAction::SetTrue)]
    keep_going: bool,

    /// Output results as JSON
    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Args, Debug)]
struct SequentialArgs {
    #[command(flatten)]
    search: SearchArgs,

    /// Deadline growth factor after each inconclusive trial
    #[arg(long = "deadline-growth")]
    deadline_growth: Option<f64>,

    /// Cap for the grown deadline in milliseconds (default: 16x the deadline)
    #[arg(long = "deadline-max-ms")]
    deadline_max_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct ParallelArgs {
    #[command(flatten)]
    search: SearchArgs,

    /// Worker threads (default: available parallelism)
    #[arg(long = "workers")]
    workers: Option<usize>,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Seed to replay
    #[arg(long = "seed")]
    seed: u64,

    /// Real-time deadline per run in milliseconds
    #[arg(long = "deadline-ms", default_value_t = 10_000)]
    deadline_ms: u64,

    /// Failure probability of each job execution
    #[arg(
        long = "failure-probability",
        default_value_t = FaultInjector::RARE_PROBABILITY,
        value_parser = parse_probability
    )]
    failure_probability: f64,

    /// Output results as JSON
    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,
}

fn parse_probability(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not within [0, 1]"))
    }
}

fn init_logging(verbosity: u8, quiet: bool) {
    let level = match (quiet, verbosity) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbosity, cli.quiet);

    let json = match &cli.command {
        Command::Sequential(args) => args.search.json,
        Command::Parallel(args) => args.search.json,
        Command::Replay(args) => args.json,
    };
    let result = panic::catch_unwind(AssertUnwindSafe(|| run(cli.command)))
        .unwrap_or_else(|payload| Err(errors::panicked(payload.as_ref())));
    if let Err(err) = result {
        tracing::debug!(
            code = err.exit_code,
            "exiting: {}",
            ExitCode::description(err.exit_code)
        );
        write_cli_error(&err, json);
        std::process::exit(err.exit_code);
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Sequential(args) => {
            let mut loader = search_loader(SearchConfig::sequential(), &args.search);
            if let Some(growth) = args.deadline_growth {
                loader = loader.override_value("SEEDSWEEP_DEADLINE_GROWTH", growth.to_string());
            }
            if let Some(max) = args.deadline_max_ms {
                loader = loader.override_value("SEEDSWEEP_DEADLINE_MAX_MS", max.to_string());
            }
            run_search(&loader, &args.search)
        }
        Command::Parallel(args) => {
            let mut loader = search_loader(SearchConfig::parallel(), &args.search);
            if let Some(workers) = args.workers {
                loader = loader.override_value("SEEDSWEEP_WORKERS", workers.to_string());
            }
            run_search(&loader, &args.search)
        }
        Command::Replay(args) => run_replay(&args),
    }
}

/// Command-line flags override `SEEDSWEEP_*` variables, which override the
/// mode defaults.
fn search_loader(base: SearchConfig, args: &SearchArgs) -> ConfigLoader {
    let mut loader = ConfigLoader::new().base(base);
    if let Some(deadline) = args.deadline_ms {
        loader = loader.override_value("SEEDSWEEP_DEADLINE_MS", deadline.to_string());
    }
    if let Some(start) = args.start_seed {
        loader = loader.override_value("SEEDSWEEP_SEED_START", start.to_string());
    }
    if let Some(count) = args.seeds {
        loader = loader.override_value("SEEDSWEEP_SEED_COUNT", count.to_string());
    }
    if args.keep_going {
        loader = loader.override_value("SEEDSWEEP_STOP", "exhaust");
    }
    loader
}

fn run_search(loader: &ConfigLoader, args: &SearchArgs) -> Result<(), CliError> {
    let config = loader.load()?;
    let probability = args.failure_probability;
    let executor = TrialExecutor::new(move || FaultInjector::new(probability));
    let search = SeedSearch::new(config, executor)?;

    let report = search.run(&mut TracingReporter);
    output(args.json)
        .write(&report)
        .map_err(|e| errors::output(&e))?;

    if report.all_inconclusive() {
        Ok(())
    } else {
        Err(errors::bugs_found(&report))
    }
}

fn run_replay(args: &ReplayArgs) -> Result<(), CliError> {
    if args.deadline_ms == 0 {
        return Err(errors::invalid_argument(
            "--deadline-ms",
            "deadline must be positive",
        ));
    }
    let probability = args.failure_probability;
    let executor = TrialExecutor::new(move || FaultInjector::new(probability));
    let outcome = executor.replay(args.seed, Duration::from_millis(args.deadline_ms))?;
    output(args.json)
        .write(&ReplayOutput::from_outcome(&outcome))
        .map_err(|e| errors::output(&e))
}

fn output(json: bool) -> Output {
    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    Output::stdout(format)
}

fn write_cli_error(err: &CliError, json: bool) {
    let mut stderr = io::stderr();
    let text = if json {
        err.json_format()
    } else {
        err.human_format(stderr.is_terminal())
    };
    let _ = writeln!(stderr, "{text}");
}
