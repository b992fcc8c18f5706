#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::time::Duration;

use typed_builder::TypedBuilder;

/// Flags that suppress the penalty of a detected violation. Detection and
/// logging still happen; only the verdict assignment is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Allowances {
    /// Do not penalize byte-identical submissions.
    pub identical_submission: bool,
    /// Do not penalize submissions with an unexpected file type.
    pub wrong_filetype:       bool,
    /// Do not penalize output that fails answer verification.
    pub incorrect_answer:     bool,
}

/// Runtime knobs for one grading round, from the CLI and environment.
#[derive(Debug, Clone, TypedBuilder)]
pub struct Config {
    /// Penalty suppression flags.
    #[builder(default)]
    pub allowances:    Allowances,
    /// Wall-clock deadline for one compiler invocation.
    #[builder(default = read_timeout_secs("TALLY_BUILD_TIMEOUT_SECS", 30))]
    pub build_timeout: Duration,
    /// Wall-clock deadline for one artifact execution.
    #[builder(default = read_timeout_secs("TALLY_RUN_TIMEOUT_SECS", 2))]
    pub run_timeout:   Duration,
    /// Upper bound on concurrently running artifacts.
    #[builder(default = read_run_jobs())]
    pub run_jobs:      usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Parses an environment variable into a `Duration`, falling back to
/// `default_secs` when parsing fails or the variable is missing.
fn read_timeout_secs(env: &str, default_secs: u64) -> Duration {
    std::env::var(env)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}

/// Reads the run-job bound from `TALLY_RUN_JOBS`, defaulting to the
/// available parallelism.
fn read_run_jobs() -> usize {
    std::env::var("TALLY_RUN_JOBS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|&jobs| jobs > 0)
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(4)
        })
}
