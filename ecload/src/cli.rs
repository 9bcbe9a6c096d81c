use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use ecload_core::{CancelPolicy, RejectionPrecedence};
use ecload_shop::Preset;

use crate::logging::LogFormat;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }
    humantime::parse_duration(s)
        .map_err(|err| format!("invalid duration '{s}': {err} (expected e.g. 10s, 250ms, 1m)"))
}

fn parse_preset(input: &str) -> Result<Preset, String> {
    input.trim().parse().map_err(|_| {
        let known: Vec<&str> = Preset::ALL.iter().map(|p| p.name()).collect();
        format!(
            "unknown scenario '{input}' (expected one of: {})",
            known.join(", ")
        )
    })
}

fn parse_cancel_policy(input: &str) -> Result<CancelPolicy, String> {
    input
        .trim()
        .parse()
        .map_err(|_| format!("invalid abort policy '{input}' (expected drain or discard)"))
}

fn parse_precedence(input: &str) -> Result<RejectionPrecedence, String> {
    input.trim().parse().map_err(|_| {
        format!("invalid precedence '{input}' (expected duplicate-first or capacity-first)")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    HumanReadable,
    /// Emit one JSON summary line (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "ecload",
    author,
    version,
    about = "Concurrency-correctness load harness for the shop API",
    long_about = "ecload drives many concurrent virtual users against an e-commerce backend and checks that it stays correct under contention: no overselling, exact-N coupon issuance, no duplicate grants.\n\nEvery iteration lands in exactly one outcome category (success, rejected_duplicate, rejected_capacity, rejected_other, transport_error). Thresholds over the collected metrics decide the verdict and the exit code.",
    after_help = "Examples:\n  ecload list\n  ecload run coupon-rush --base-url http://localhost:8080 --coupon-quantity 100\n  ecload run concurrent-order --vus 50 --iterations 200 --output json\n  ecload run mixed-workload --duration 30s --config scenario.yaml\n\nExit codes: 0 passed, 11 thresholds failed, 30 invalid input, 40 harness error, 41 runtime error."
)]
pub struct Cli {
    /// Log line format (stderr). Filter with RUST_LOG.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a built-in scenario against the target
    #[command(
        long_about = "Run a built-in scenario against the target.\n\nConfiguration is layered: the scenario's defaults, then the --config file, then CLI flags and their environment variables."
    )]
    Run(RunArgs),

    /// List the built-in scenarios
    List,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Scenario to run (see `ecload list`)
    #[arg(value_parser = parse_preset)]
    pub scenario: Preset,

    /// Base URL of the system under test
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Number of virtual users
    #[arg(long, env = "VUS")]
    pub vus: Option<u64>,

    /// Total iterations; turns the scenario into a fixed-iterations run
    #[arg(long, env = "ITERATIONS")]
    pub iterations: Option<u64>,

    /// Run duration (e.g. 10s, 250ms, 1m)
    #[arg(long, env = "DURATION", value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Coupon targeted by the coupon rush
    #[arg(long, env = "COUPON_ID", default_value_t = 1)]
    pub coupon_id: u64,

    /// Known stock of the rushed coupon; enables the exact-issuance thresholds
    #[arg(long, env = "COUPON_QUANTITY")]
    pub coupon_quantity: Option<u64>,

    /// Size of the random user id space
    #[arg(long, env = "USER_COUNT", default_value_t = 1000)]
    pub user_count: u64,

    /// Directory the result document is written to
    #[arg(long, env = "RESULTS_DIR", default_value = "results")]
    pub results_dir: PathBuf,

    /// Do not write the result document
    #[arg(long)]
    pub no_result_file: bool,

    /// YAML scenario overrides (executor, vus, stages, pacing, thresholds, ...)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Seed for action selection, pacing and data choices (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// What happens to in-flight actions on abort: drain or discard
    #[arg(long, value_name = "POLICY", value_parser = parse_cancel_policy)]
    pub on_abort: Option<CancelPolicy>,

    /// Which rejection wins when a response matches both markers
    #[arg(
        long,
        value_name = "ORDER",
        value_parser = parse_precedence,
        default_value = "duplicate-first"
    )]
    pub precedence: RejectionPrecedence,

    /// Upper bound for one HTTP exchange
    #[arg(long, value_parser = parse_duration, default_value = "60s")]
    pub request_timeout: Duration,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}
