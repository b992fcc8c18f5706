#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use futures::{StreamExt, stream};
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

use crate::{
    builder::Builder,
    identity::{self, Identity},
    paths::RoundPaths,
    process::{self, ExecutionStatus},
    roster::Roster,
    sheet::SubmissionSheet,
    util::find_files,
};

/// One staged source awaiting build and run.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    /// Canonical identity the source was staged under.
    pub identity: Identity,
    /// The normalized source file in `source/`.
    pub path:     PathBuf,
}

/// The full per-student pipeline state for one round: which stages the
/// submission reached and what each produced. Classification reads these
/// records directly; nothing is inferred from directory listings.
#[derive(Debug, Clone)]
pub struct RunRecord {
    /// Canonical identity of the submitter.
    pub identity:  Identity,
    /// The staged source file.
    pub source:    PathBuf,
    /// The built artifact, absent on compile failure.
    pub artifact:  Option<PathBuf>,
    /// How the artifact terminated; absent when it never launched (or when
    /// the record was recovered from a previous round's tree).
    pub execution: Option<ExecutionStatus>,
    /// The capture file holding the artifact's stdout, absent when the
    /// artifact never launched.
    pub capture:   Option<PathBuf>,
}

/// Drives the build collaborator over the staged source set, then executes
/// every produced artifact under the run deadline, concurrently up to
/// `jobs` at a time. Each execution owns its child process and capture
/// file; nothing is shared between them.
#[derive(Debug, TypedBuilder)]
pub struct Supervisor<B: Builder> {
    /// The external build collaborator.
    builder:     B,
    /// Wall-clock deadline per artifact execution.
    run_timeout: Duration,
    /// Upper bound on concurrently running artifacts.
    #[builder(default = 4)]
    jobs:        usize,
}

impl<B: Builder> Supervisor<B> {
    /// Builds and runs the whole source set, returning one record per
    /// source.
    pub async fn supervise(
        &self,
        entries: Vec<SourceEntry>,
        paths: &RoundPaths,
    ) -> Result<Vec<RunRecord>> {
        let sources: Vec<PathBuf> = entries.iter().map(|e| e.path.clone()).collect();
        let outcomes = self.builder.build(&sources, paths.bin_dir()).await?;

        let mut records = Vec::with_capacity(entries.len());
        let mut runnable = Vec::new();
        for (entry, outcome) in entries.into_iter().zip(outcomes) {
            match outcome.artifact {
                Some(artifact) => runnable.push((entry, artifact)),
                None => records.push(RunRecord {
                    identity:  entry.identity,
                    source:    entry.path,
                    artifact:  None,
                    execution: None,
                    capture:   None,
                }),
            }
        }

        let run_timeout = self.run_timeout;
        let runs = runnable.into_iter().map(|(entry, artifact)| {
            let capture = paths
                .output_dir()
                .join(format!("{}.txt", entry.identity.stem()));
            async move {
                match process::run_to_capture(&artifact, &capture, run_timeout).await {
                    Ok(execution) => {
                        if execution.status == ExecutionStatus::TimedOut {
                            warn!("{} hit the {run_timeout:?} deadline", entry.identity);
                        }
                        if !execution.stderr.is_empty() {
                            debug!(
                                "{} stderr: {}",
                                entry.identity,
                                String::from_utf8_lossy(&execution.stderr).trim()
                            );
                        }
                        RunRecord {
                            identity:  entry.identity,
                            source:    entry.path,
                            artifact:  Some(artifact),
                            execution: Some(execution.status),
                            capture:   Some(capture),
                        }
                    }
                    Err(e) => {
                        warn!("{} failed to launch: {e:#}", entry.identity);
                        let _ = std::fs::remove_file(&capture);
                        RunRecord {
                            identity:  entry.identity,
                            source:    entry.path,
                            artifact:  Some(artifact),
                            execution: None,
                            capture:   None,
                        }
                    }
                }
            }
        });

        let ran: Vec<RunRecord> = stream::iter(runs)
            .buffer_unordered(self.jobs.max(1))
            .collect()
            .await;
        records.extend(ran);

        Ok(records)
    }
}

/// Rebuilds run records from a previous round's `source/`, `bin/`, and
/// `output/` trees, so captured output can be re-verified under a new
/// answer spec without re-running anything.
pub fn recover_records(
    paths: &RoundPaths,
    roster: &mut Roster,
    sheet: &mut SubmissionSheet,
) -> Result<Vec<RunRecord>> {
    let mut records = Vec::new();

    for source in find_files("cpp", 0, paths.source_dir())? {
        let Some(stem) = source.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let (token_id, token_name) = match identity::split_token(stem) {
            Ok(parts) => parts,
            Err(e) => {
                warn!("Skipping staged source {}: {e:#}", source.display());
                continue;
            }
        };
        let identity = identity::resolve(&token_id, &token_name, roster, sheet);

        let artifact = paths.bin_dir().join(stem);
        let capture = paths.output_dir().join(format!("{stem}.txt"));
        records.push(RunRecord {
            identity,
            source,
            artifact: artifact.exists().then_some(artifact),
            execution: None,
            capture: capture.exists().then_some(capture),
        });
    }

    Ok(records)
}
