#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use anyhow::{Context, Result, ensure};
use tracing::info;

use crate::{
    answer::AnswerSpec,
    builder::CommandBuilder,
    config::Config,
    ingest,
    paths::RoundPaths,
    reconcile,
    roster::Roster,
    sheet::SubmissionSheet,
    supervise::{self, Supervisor},
};

/// One grading pass over a single project's submissions.
///
/// Construction checks the required external inputs and loads the roster;
/// nothing on disk is mutated until a mode method runs. The roster is
/// persisted atomically at the end of every mode.
pub struct Round {
    /// Workspace layout for this round.
    paths:  RoundPaths,
    /// Runtime knobs.
    config: Config,
    /// The registry/result table, loaded once.
    roster: Roster,
}

impl Round {
    /// Creates a round for `project` rooted at the current directory.
    pub fn new(project: &str, config: Config) -> Result<Self> {
        Self::with_paths(RoundPaths::new(project), config)
    }

    /// Creates a round over explicit paths. Fails before any mutation when
    /// the registry or the project intake is missing.
    pub fn with_paths(paths: RoundPaths, config: Config) -> Result<Self> {
        ensure!(
            paths.roster_file().is_file(),
            "Registry {} does not exist",
            paths.roster_file().display()
        );
        ensure!(
            paths.intake_dir().is_dir(),
            "Invalid project name: {} does not exist",
            paths.intake_dir().display()
        );

        let roster = Roster::load(&paths.roster_file())?;
        Ok(Self {
            paths,
            config,
            roster,
        })
    }

    /// Runs a full round: reset, ingest, build, run, verify, rank.
    ///
    /// `update_answer` forces a fresh answer prompt even when the answer
    /// file exists.
    pub async fn grade(&mut self, update_answer: bool) -> Result<()> {
        info!("Processing project: {}", self.paths.project());
        self.roster.clear_project(self.paths.project());

        let (sheet, entries) =
            ingest::run(&self.paths, &self.config.allowances, &mut self.roster)?;

        let answer = AnswerSpec::load_or_prompt(&self.paths.answer_file(), update_answer)?;

        let builder = CommandBuilder::discover(self.config.build_timeout)?;
        let supervisor = Supervisor::builder()
            .builder(builder)
            .run_timeout(self.config.run_timeout)
            .jobs(self.config.run_jobs)
            .build();
        let records = supervisor.supervise(entries, &self.paths).await?;

        reconcile::classify(
            &mut self.roster,
            &sheet,
            &records,
            &answer,
            &self.config.allowances,
            self.paths.project(),
        )?;

        self.rank_and_persist()
    }

    /// Re-verifies a previous round's captured output under a (re-prompted)
    /// answer spec, without re-running anything, then re-ranks.
    pub fn reverify(&mut self) -> Result<()> {
        info!("Re-verifying project: {}", self.paths.project());
        let mut sheet = SubmissionSheet::load(&self.paths.sheet_file())
            .context("No processed submission sheet; run a full round first")?;

        let answer = AnswerSpec::load_or_prompt(&self.paths.answer_file(), true)?;
        let records = supervise::recover_records(&self.paths, &mut self.roster, &mut sheet)?;

        reconcile::clear_for_reverify(&mut self.roster, self.paths.project());
        reconcile::classify(
            &mut self.roster,
            &sheet,
            &records,
            &answer,
            &self.config.allowances,
            self.paths.project(),
        )?;

        self.rank_and_persist()
    }

    /// Recomputes ranks from the existing table, touching nothing else.
    pub fn rank_only(&mut self) -> Result<()> {
        info!("Updating ranks for project: {}", self.paths.project());
        self.roster.ensure_project(self.paths.project());
        self.rank_and_persist()
    }

    /// Shared tail of every mode: rank, persist, report, summarize.
    fn rank_and_persist(&mut self) -> Result<()> {
        let ranked = reconcile::rank(&mut self.roster, self.paths.project());
        info!("Ranks updated, {ranked} students are ranked");

        self.roster.save(&self.paths.roster_file())?;
        if self.paths.base_dir().is_dir() {
            reconcile::write_report(&self.roster, self.paths.project(), &self.paths.report_file())?;
        }
        reconcile::print_summary(&self.roster, self.paths.project());
        Ok(())
    }

    /// The roster as it stands, for inspection.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The round's workspace paths.
    pub fn paths(&self) -> &RoundPaths {
        &self.paths
    }
}
