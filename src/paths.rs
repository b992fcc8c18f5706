#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Standard workspace paths for one grading round of a project.
pub struct RoundPaths {
    /// Name of the project being graded.
    project:        String,
    /// Root directory the tool runs from.
    root_dir:       PathBuf,
    /// `collections/<project>/` pristine intake, never mutated.
    intake_dir:     PathBuf,
    /// `<project>/` working directory for this round.
    base_dir:       PathBuf,
    /// `<project>/collection/` working copy of the intake.
    collection_dir: PathBuf,
    /// `<project>/source/` normalized, renamed sources.
    source_dir:     PathBuf,
    /// `<project>/bin/` built artifacts.
    bin_dir:        PathBuf,
    /// `<project>/output/` per-student capture files.
    output_dir:     PathBuf,
    /// `answers/` directory holding answer specs for every project.
    answers_dir:    PathBuf,
}

impl RoundPaths {
    /// Creates round paths for `project` rooted at the current directory.
    pub fn new(project: impl Into<String>) -> Self {
        Self::rooted(PathBuf::from("."), project)
    }

    /// Creates round paths for `project` rooted at `root_dir`.
    pub fn rooted(root_dir: PathBuf, project: impl Into<String>) -> Self {
        let project = project.into();
        let intake_dir = root_dir.join("collections").join(&project);
        let base_dir = root_dir.join(&project);
        let collection_dir = base_dir.join("collection");
        let source_dir = base_dir.join("source");
        let bin_dir = base_dir.join("bin");
        let output_dir = base_dir.join("output");
        let answers_dir = root_dir.join("answers");

        Self {
            project,
            root_dir,
            intake_dir,
            base_dir,
            collection_dir,
            source_dir,
            bin_dir,
            output_dir,
            answers_dir,
        }
    }

    /// Name of the project this round grades.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Root directory the tool runs from.
    pub fn root_dir(&self) -> &Path {
        self.root_dir.as_path()
    }

    /// Pristine intake directory for this project.
    pub fn intake_dir(&self) -> &Path {
        self.intake_dir.as_path()
    }

    /// Working directory for this round.
    pub fn base_dir(&self) -> &Path {
        self.base_dir.as_path()
    }

    /// Working copy of the intake.
    pub fn collection_dir(&self) -> &Path {
        self.collection_dir.as_path()
    }

    /// Directory holding normalized, renamed sources.
    pub fn source_dir(&self) -> &Path {
        self.source_dir.as_path()
    }

    /// Directory holding built artifacts.
    pub fn bin_dir(&self) -> &Path {
        self.bin_dir.as_path()
    }

    /// Directory holding per-student capture files.
    pub fn output_dir(&self) -> &Path {
        self.output_dir.as_path()
    }

    /// Answer spec file for this project.
    pub fn answer_file(&self) -> PathBuf {
        self.answers_dir.join(format!("{}.txt", self.project))
    }

    /// The registry/result table shared by all projects.
    pub fn roster_file(&self) -> PathBuf {
        self.root_dir.join("results.csv")
    }

    /// Normalized copy of the submission sheet for this round.
    pub fn sheet_file(&self) -> PathBuf {
        self.base_dir.join("submission.csv")
    }

    /// Machine-readable round report.
    pub fn report_file(&self) -> PathBuf {
        self.base_dir.join("report.json")
    }

    /// Removes any previous round workspace and recreates the directory
    /// skeleton. The intake directory is left untouched.
    pub fn reset_round(&self) -> Result<()> {
        if self.base_dir.exists() {
            std::fs::remove_dir_all(&self.base_dir)
                .with_context(|| format!("Could not clear {}", self.base_dir.display()))?;
        }
        self.scaffold()
    }

    /// Creates every round directory (and the answers directory) if missing.
    pub fn scaffold(&self) -> Result<()> {
        for dir in [
            &self.base_dir,
            &self.collection_dir,
            &self.source_dir,
            &self.bin_dir,
            &self.output_dir,
            &self.answers_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Could not create {}", dir.display()))?;
        }
        Ok(())
    }
}
