#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use colored::Colorize;
use itertools::Itertools;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Panel, Style},
};
use tracing::{info, warn};

use crate::{
    answer::AnswerSpec,
    config::Allowances,
    roster::{Outcome, Roster, TIME_FORMAT, Verdict},
    sheet::SubmissionSheet,
    supervise::RunRecord,
};

/// Copies every sheet row's submit time into the roster's
/// `<project>_submission` column.
fn record_submission_times(roster: &mut Roster, sheet: &SubmissionSheet, project: &str) {
    for row in sheet.rows() {
        if roster.contains(&row.student_id) {
            roster.set_submitted_at(&row.student_id, project, row.submit_time);
        } else {
            warn!(
                "Sheet row {} ({}) has no registry row and no staged file; ignoring",
                row.student_id, row.name
            );
        }
    }
}

/// Classifies every run record into the roster.
///
/// Ingestion-time disqualifiers are left untouched. For the rest:
/// no artifact is `CompileError`, no captured output is `RuntimeError`, and
/// captured output failing verification is `IncorrectAnswer`. The three
/// are mutually exclusive by construction, since they read disjoint stages
/// of the same typed record. Registry rows with no submission this round become
/// `NoSubmission`. Passing students keep an empty result cell for the
/// ranker to fill.
pub fn classify(
    roster: &mut Roster,
    sheet: &SubmissionSheet,
    records: &[RunRecord],
    answer: &AnswerSpec,
    allowances: &Allowances,
    project: &str,
) -> Result<()> {
    record_submission_times(roster, sheet, project);

    for record in records {
        let student_id = record.identity.student_id.as_str();
        if roster.outcome(student_id, project).is_some() {
            // An ingestion-time disqualifier stands.
            continue;
        }

        let verdict = match (&record.artifact, &record.capture) {
            (None, _) => Some(Verdict::CompileError),
            (Some(_), None) => Some(Verdict::RuntimeError),
            (Some(_), Some(capture)) => {
                if verify_capture(capture, answer)? {
                    None
                } else {
                    warn!("Incorrect answer: {}", record.identity);
                    (!allowances.incorrect_answer).then_some(Verdict::IncorrectAnswer)
                }
            }
        };

        if let Some(verdict) = verdict {
            roster.set_outcome(student_id, project, Outcome::Verdict(verdict));
        }
    }

    let absent: Vec<String> = roster
        .rows()
        .iter()
        .filter(|row| {
            row.cell(project)
                .and_then(|cell| cell.submitted_at)
                .is_none()
        })
        .map(|row| row.student_id().to_string())
        .collect();
    for student_id in absent {
        roster.set_outcome_if_empty(&student_id, project, Outcome::Verdict(Verdict::NoSubmission));
    }

    Ok(())
}

/// Reads one capture file and checks it against the answer spec. Captures
/// are decoded lossily, since student binaries write arbitrary bytes.
fn verify_capture(capture: &Path, answer: &AnswerSpec) -> Result<bool> {
    let bytes = std::fs::read(capture)
        .with_context(|| format!("Could not read capture {}", capture.display()))?;
    Ok(answer.verify(&String::from_utf8_lossy(&bytes)))
}

/// Clears every outcome a re-verification recomputes: ranks and build/run
/// classifications. Ingestion-time disqualifiers (identical submission,
/// wrong file type) were assigned by a phase that is not being re-run, so
/// they survive.
pub fn clear_for_reverify(roster: &mut Roster, project: &str) {
    let recompute: Vec<String> = roster
        .rows()
        .iter()
        .filter(|row| {
            !matches!(
                row.cell(project).and_then(|cell| cell.outcome),
                Some(Outcome::Verdict(Verdict::IdenticalSubmission))
                    | Some(Outcome::Verdict(Verdict::WrongFileType))
            )
        })
        .map(|row| row.student_id().to_string())
        .collect();
    for student_id in recompute {
        roster.clear_outcome(&student_id, project);
    }
}

/// Ranks the undecided (and previously ranked) students by submission time.
///
/// Candidates are rows whose result is unset (they passed verification)
/// or already numeric, so re-ranking is idempotent. Rank is the 1-based
/// ordinal of submit time, ties broken by stable registry order. Students
/// holding any verdict are excluded. Returns how many students were ranked.
pub fn rank(roster: &mut Roster, project: &str) -> usize {
    let candidates: Vec<(NaiveDateTime, usize, String)> = roster
        .rows()
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let cell = row.cell(project)?;
            let submitted_at = cell.submitted_at?;
            match cell.outcome {
                None | Some(Outcome::Rank(_)) => {
                    Some((submitted_at, i, row.student_id().to_string()))
                }
                Some(Outcome::Verdict(_)) => None,
            }
        })
        .sorted_by_key(|&(submitted_at, i, _)| (submitted_at, i))
        .collect();

    for (ordinal, (_, _, student_id)) in candidates.iter().enumerate() {
        roster.set_outcome(student_id, project, Outcome::Rank(ordinal as u32 + 1));
    }

    candidates.len()
}

/// One row of the per-round summary table.
#[derive(Tabled)]
struct SummaryRow {
    /// Display label for the classification.
    #[tabled(rename = "Result")]
    result: String,
    /// Number of students with that classification.
    #[tabled(rename = "Students")]
    count:  usize,
}

/// Prints the per-verdict summary table for one round.
pub fn print_summary(roster: &Roster, project: &str) {
    let mut ranked = 0usize;
    let mut unset = 0usize;
    let mut verdicts: Vec<(Verdict, usize)> = Vec::new();

    for row in roster.rows() {
        match row.cell(project).and_then(|cell| cell.outcome) {
            Some(Outcome::Rank(_)) => ranked += 1,
            Some(Outcome::Verdict(v)) => {
                match verdicts.iter_mut().find(|(seen, _)| *seen == v) {
                    Some((_, count)) => *count += 1,
                    None => verdicts.push((v, 1)),
                }
            }
            None => unset += 1,
        }
    }

    let mut rows = vec![SummaryRow {
        result: "Ranked".green().to_string(),
        count:  ranked,
    }];
    rows.extend(verdicts.into_iter().map(|(verdict, count)| SummaryRow {
        result: verdict.to_string().red().to_string(),
        count,
    }));
    if unset > 0 {
        rows.push(SummaryRow {
            result: "Unclassified".yellow().to_string(),
            count:  unset,
        });
    }

    eprintln!(
        "{}",
        Table::new(&rows)
            .with(Panel::header(format!("Round {project}")))
            .with(Panel::footer(format!("{} students", roster.rows().len())))
            .with(Style::modern())
    );
}

/// One student's entry in the machine-readable round report.
#[derive(Serialize)]
struct ReportEntry {
    /// Canonical student id.
    student_id:   String,
    /// Canonical student name.
    name:         String,
    /// Submission time this round, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    submitted_at: Option<String>,
    /// Verdict or rank.
    #[serde(skip_serializing_if = "Option::is_none")]
    result:       Option<Outcome>,
}

/// The machine-readable report persisted next to each round.
#[derive(Serialize)]
struct RoundReport {
    /// Project this round graded.
    project:      String,
    /// When the report was generated.
    generated_at: String,
    /// How many students earned a rank.
    ranked:       usize,
    /// One entry per registry row.
    entries:      Vec<ReportEntry>,
}

/// Writes `report.json` for the finished round.
pub fn write_report(roster: &Roster, project: &str, path: &Path) -> Result<()> {
    let entries: Vec<ReportEntry> = roster
        .rows()
        .iter()
        .map(|row| {
            let cell = row.cell(project);
            ReportEntry {
                student_id:   row.student_id().to_string(),
                name:         row.name().to_string(),
                submitted_at: cell
                    .and_then(|c| c.submitted_at)
                    .map(|t| t.format(TIME_FORMAT).to_string()),
                result:       cell.and_then(|c| c.outcome),
            }
        })
        .collect();

    let ranked = entries
        .iter()
        .filter(|entry| matches!(entry.result, Some(Outcome::Rank(_))))
        .count();

    let report = RoundReport {
        project: project.to_string(),
        generated_at: chrono::Local::now().format(TIME_FORMAT).to_string(),
        ranked,
        entries,
    };

    let body = serde_json::to_string_pretty(&report).context("Could not serialize the report")?;
    std::fs::write(path, body)
        .with_context(|| format!("Could not write report {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}
