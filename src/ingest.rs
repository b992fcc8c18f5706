#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::{
    config::Allowances,
    fingerprint::{Deduplicator, Fingerprint},
    identity::{self, Identity},
    normalize::normalize_source,
    paths::RoundPaths,
    roster::{Outcome, Roster, Verdict},
    sheet::SubmissionSheet,
    supervise::SourceEntry,
    util::{copy_dir_all, find_files},
};

/// Extension of a well-formed submission.
const SOURCE_EXT: &str = "cpp";

/// Walks one round's collection and stages every well-formed submission.
///
/// Resets the round workspace, copies the intake, loads the submission
/// sheet, then processes each collection entry: directories are resolved to
/// their latest file through the sheet, `.cpp` files are fingerprinted,
/// dedup-checked, staged into `source/` under the canonical
/// `<student_id>-<name>.cpp` name, and normalized; everything else is a
/// wrong-filetype violation. Per-entry failures are logged and skipped;
/// one student never aborts the batch.
///
/// Returns the (identity-repaired, persisted) sheet and the staged entries.
pub fn run(
    paths: &RoundPaths,
    allowances: &Allowances,
    roster: &mut Roster,
) -> Result<(SubmissionSheet, Vec<SourceEntry>)> {
    paths.reset_round()?;
    copy_dir_all(paths.intake_dir(), paths.collection_dir())?;

    let sheet_path = find_files("csv", 0, paths.collection_dir())?
        .into_iter()
        .next();
    let Some(sheet_path) = sheet_path else {
        bail!(
            "No submission sheet (*.csv) found in {}",
            paths.collection_dir().display()
        );
    };
    let mut sheet = SubmissionSheet::load(&sheet_path)?;

    let mut ingest = Ingest {
        paths,
        allowances,
        roster,
        dedup: Deduplicator::new(),
        entries: Vec::new(),
    };

    let mut collection: Vec<_> = std::fs::read_dir(paths.collection_dir())
        .with_context(|| format!("Could not read {}", paths.collection_dir().display()))?
        .collect::<Result<_, _>>()?;
    collection.sort_by_key(|entry| entry.file_name());

    for entry in collection {
        let path = entry.path();
        if path == sheet_path {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();

        if path.is_dir() {
            ingest.directory(&path, &file_name, &mut sheet);
        } else if path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXT) {
            let token = file_name
                .strip_suffix(&format!(".{SOURCE_EXT}"))
                .unwrap_or(&file_name)
                .to_string();
            ingest.stage(&path, &token, &mut sheet);
        } else {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_name.clone());
            ingest.wrong_filetype(&stem, &file_name, &mut sheet);
        }
    }

    let entries = ingest.entries;
    info!("Staged {} sources for {}", entries.len(), paths.project());

    sheet
        .save(&paths.sheet_file())
        .context("Could not persist the repaired submission sheet")?;

    Ok((sheet, entries))
}

/// Working state threaded through one collection walk.
struct Ingest<'a> {
    /// Round paths.
    paths:      &'a RoundPaths,
    /// Penalty suppression flags.
    allowances: &'a Allowances,
    /// The registry, mutated by identity resolution and verdicts.
    roster:     &'a mut Roster,
    /// Fingerprint tracker for this round.
    dedup:      Deduplicator,
    /// Successfully staged sources.
    entries:    Vec<SourceEntry>,
}

impl Ingest<'_> {
    /// Handles a per-student submission directory: the sheet names the
    /// latest file inside it.
    fn directory(&mut self, dir: &Path, token: &str, sheet: &mut SubmissionSheet) {
        let Ok((token_id, _)) = identity::split_token(token) else {
            warn!("Skipping directory {token}: not of the form <student_id>-<name>");
            return;
        };
        let Some(row) = sheet.get(&token_id) else {
            warn!("Skipping directory {token}: no submission sheet row for {token_id}");
            return;
        };

        let filename = row.filename.clone();
        let latest = dir.join(&filename);
        if !latest.is_file() {
            warn!("Skipping directory {token}: sheet names missing file {filename}");
            return;
        }

        if filename.ends_with(&format!(".{SOURCE_EXT}")) {
            self.stage(&latest, token, sheet);
        } else {
            self.wrong_filetype(token, &filename, sheet);
        }
    }

    /// Fingerprints, dedup-checks, stages, and normalizes one source file.
    fn stage(&mut self, path: &Path, token: &str, sheet: &mut SubmissionSheet) {
        let Ok((token_id, token_name)) = identity::split_token(token) else {
            warn!("Skipping {token}: not of the form <student_id>-<name>");
            return;
        };
        let identity = identity::resolve(&token_id, &token_name, self.roster, sheet);

        // Fingerprint the raw submitted bytes, before any normalization.
        match Fingerprint::of_file(path) {
            Ok(fingerprint) => self.check_duplicate(fingerprint, &identity),
            Err(e) => {
                warn!("Could not fingerprint {}: {e:#}", path.display());
                return;
            }
        }

        let target = self
            .paths
            .source_dir()
            .join(format!("{}.{SOURCE_EXT}", identity.stem()));
        if let Err(e) = std::fs::copy(path, &target) {
            warn!("Could not stage {} as {}: {e}", path.display(), target.display());
            return;
        }

        if let Err(e) = normalize_source(&target) {
            // The raw copy stays staged; it will usually surface as a
            // compile failure.
            warn!("Could not normalize {}: {e:#}", target.display());
        }

        self.entries.push(SourceEntry {
            identity,
            path: target,
        });
    }

    /// Registers a fingerprint and penalizes both parties on a collision.
    fn check_duplicate(&mut self, fingerprint: Fingerprint, identity: &Identity) {
        let prior = self
            .dedup
            .register(fingerprint, identity.clone())
            .cloned();
        let Some(prior) = prior else {
            return;
        };

        warn!("Identical submissions: {identity} with {prior}");
        if !self.allowances.identical_submission {
            let project = self.paths.project().to_string();
            self.roster.set_outcome(
                &identity.student_id,
                &project,
                Outcome::Verdict(Verdict::IdenticalSubmission),
            );
            self.roster.set_outcome(
                &prior.student_id,
                &project,
                Outcome::Verdict(Verdict::IdenticalSubmission),
            );
        }
    }

    /// Flags a submission with an unexpected file type.
    fn wrong_filetype(&mut self, token: &str, shown: &str, sheet: &mut SubmissionSheet) {
        warn!("Wrong filetype: {shown}");
        if self.allowances.wrong_filetype {
            return;
        }
        match identity::split_token(token) {
            Ok((token_id, token_name)) => {
                let identity = identity::resolve(&token_id, &token_name, self.roster, sheet);
                let project = self.paths.project().to_string();
                self.roster.set_outcome(
                    &identity.student_id,
                    &project,
                    Outcome::Verdict(Verdict::WrongFileType),
                );
            }
            Err(e) => warn!("Cannot attribute wrong filetype {shown}: {e:#}"),
        }
    }
}
