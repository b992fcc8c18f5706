#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # tally
//!
//! Command-line entry point for the grading pipeline. One invocation grades
//! one project round: `tally <PROJECT>` expects the collected submissions
//! under `collections/<PROJECT>/` and the registry in `results.csv`.

use anyhow::Result;
use bpaf::*;
use dotenvy::dotenv;
use tally::{Allowances, Config, Round};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Parsed command line for one grading round.
#[derive(Debug, Clone)]
struct Opts {
    /// Do not penalize byte-identical submissions.
    allow_identical_submission: bool,
    /// Do not penalize submissions with an unexpected file type.
    allow_wrong_filetype:       bool,
    /// Do not penalize output that fails answer verification.
    allow_incorrect_answer:     bool,
    /// Skip ingestion/build/run and only recompute ranks.
    rank_only:                  bool,
    /// Re-prompt for the answer spec and overwrite the answer file.
    update_answer:              bool,
    /// Name of the project to grade.
    project:                    String,
}

/// Parses the command line arguments.
fn options() -> Opts {
    let allow_identical_submission = short('i')
        .long("allow-identical-submission")
        .help("Allow identical submissions")
        .switch();
    let allow_wrong_filetype = short('t')
        .long("allow-wrong-filetype")
        .help("Allow wrong filetype")
        .switch();
    let allow_incorrect_answer = short('a')
        .long("allow-incorrect-answer")
        .help("Allow incorrect answer")
        .switch();
    let rank_only = short('r')
        .long("rank-only")
        .help("Only update ranks")
        .switch();
    let update_answer = short('u')
        .long("update-answer")
        .help("Update the expected answer before grading")
        .switch();
    let project = positional::<String>("PROJECT")
        .help("The folder name of the collected codes (under `collections/`)");

    construct!(Opts {
        allow_identical_submission,
        allow_wrong_filetype,
        allow_incorrect_answer,
        rank_only,
        update_answer,
        project,
    })
    .to_options()
    .descr("Batch build, run, and grading pipeline for course submissions")
    .run()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let opts = options();
    let config = Config::builder()
        .allowances(Allowances {
            identical_submission: opts.allow_identical_submission,
            wrong_filetype:       opts.allow_wrong_filetype,
            incorrect_answer:     opts.allow_incorrect_answer,
        })
        .build();

    let mut round = Round::new(&opts.project, config)?;
    match (opts.rank_only, opts.update_answer) {
        (true, true) => round.reverify()?,
        (true, false) => round.rank_only()?,
        (false, update_answer) => round.grade(update_answer).await?,
    }

    Ok(())
}
