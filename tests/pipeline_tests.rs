#![cfg(unix)]

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Result;
use tally::{
    Allowances, AnswerSpec, RoundPaths,
    builder::{BuildOutcome, Builder},
    ingest, reconcile,
    roster::{Outcome, Roster, Verdict},
    supervise::Supervisor,
};
use uuid::Uuid;

const PROJECT: &str = "proj1";

/// A stand-in build collaborator: every source "compiles" into a shell
/// script that prints a fixed line.
struct ScriptBuilder;

impl Builder for ScriptBuilder {
    async fn build(&self, sources: &[PathBuf], bin_dir: &Path) -> Result<Vec<BuildOutcome>> {
        let mut outcomes = Vec::new();
        for source in sources {
            let stem = source.file_stem().expect("source stem");
            let artifact = bin_dir.join(stem);
            fs::write(&artifact, "#!/bin/sh\necho hello a\n")?;
            fs::set_permissions(&artifact, fs::Permissions::from_mode(0o755))?;
            outcomes.push(BuildOutcome {
                source: source.clone(),
                artifact: Some(artifact),
            });
        }
        Ok(outcomes)
    }
}

fn scaffold_workspace() -> PathBuf {
    let root = std::env::temp_dir().join(format!("tally-pipeline-{}", Uuid::new_v4()));
    let intake = root.join("collections").join(PROJECT);
    fs::create_dir_all(&intake).expect("create intake");

    fs::write(
        root.join("results.csv"),
        "学号,姓名\n001,Li\n002,Wang\n005,Sun\n004,Qian\n",
    )
    .expect("write registry");

    // The sheet uses the upstream header dialect.
    fs::write(
        intake.join("submission.csv"),
        "姓名,学号,文件名,提交时间\n\
         Li,001,001-Li.cpp,2024-03-08 10:00:00\n\
         Wang,002,002-Wang.cpp,2024-03-08 11:00:00\n\
         Sun,005,005-Sun.cpp,2024-03-08 09:00:00\n\
         Zhao,003,003-Zhao.docx,2024-03-08 12:00:00\n",
    )
    .expect("write sheet");

    // Li and Wang submitted byte-identical files.
    fs::write(intake.join("001-Li.cpp"), "int main() { return 0; }\n").expect("write 001");
    fs::write(intake.join("002-Wang.cpp"), "int main() { return 0; }\n").expect("write 002");
    fs::write(intake.join("005-Sun.cpp"), "int main() { return 5; }\n").expect("write 005");
    fs::write(intake.join("003-Zhao.docx"), "not a source file").expect("write 003");

    root
}

#[tokio::test]
async fn a_full_round_reaches_every_verdict() {
    let root = scaffold_workspace();
    let paths = RoundPaths::rooted(root.clone(), PROJECT);

    let mut roster = Roster::load(&paths.roster_file()).expect("load roster");
    roster.clear_project(PROJECT);

    let (sheet, entries) =
        ingest::run(&paths, &Allowances::default(), &mut roster).expect("ingest");
    // The identical pair and the unique submission staged; the .docx did not.
    assert_eq!(entries.len(), 3);
    assert!(paths.sheet_file().is_file());

    let supervisor = Supervisor::builder()
        .builder(ScriptBuilder)
        .run_timeout(Duration::from_secs(5))
        .jobs(2)
        .build();
    let records = supervisor.supervise(entries, &paths).await.expect("supervise");
    assert_eq!(records.len(), 3);

    let answer = AnswerSpec::parse("hello\n[g1]a\n[g1]b\n");
    reconcile::classify(
        &mut roster,
        &sheet,
        &records,
        &answer,
        &Allowances::default(),
        PROJECT,
    )
    .expect("classify");
    let ranked = reconcile::rank(&mut roster, PROJECT);

    // Identical submissions disqualify both parties, even though their
    // artifacts ran and printed a passing answer.
    assert_eq!(
        roster.outcome("001", PROJECT),
        Some(Outcome::Verdict(Verdict::IdenticalSubmission))
    );
    assert_eq!(
        roster.outcome("002", PROJECT),
        Some(Outcome::Verdict(Verdict::IdenticalSubmission))
    );
    // The unknown .docx submitter got a placeholder row and a verdict.
    assert_eq!(
        roster.outcome("003", PROJECT),
        Some(Outcome::Verdict(Verdict::WrongFileType))
    );
    // In the registry, never submitted.
    assert_eq!(
        roster.outcome("004", PROJECT),
        Some(Outcome::Verdict(Verdict::NoSubmission))
    );
    // The only passing student ranks first.
    assert_eq!(ranked, 1);
    assert_eq!(roster.outcome("005", PROJECT), Some(Outcome::Rank(1)));

    // Every registry row ends the round with a result.
    for row in roster.rows() {
        assert!(
            roster.outcome(row.student_id(), PROJECT).is_some(),
            "{} has no result",
            row.student_id()
        );
    }

    // The table round-trips through its atomic save.
    roster.save(&paths.roster_file()).expect("save roster");
    let reloaded = Roster::load(&paths.roster_file()).expect("reload roster");
    assert_eq!(reloaded.outcome("005", PROJECT), Some(Outcome::Rank(1)));
    assert_eq!(
        reloaded.outcome("003", PROJECT),
        Some(Outcome::Verdict(Verdict::WrongFileType))
    );

    // The machine-readable report parses and names the round.
    reconcile::write_report(&roster, PROJECT, &paths.report_file()).expect("write report");
    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(paths.report_file()).expect("read report"))
            .expect("parse report");
    assert_eq!(report["project"], PROJECT);
    assert_eq!(report["ranked"], 1);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn identical_submission_allowance_lets_both_proceed() {
    let root = scaffold_workspace();
    let paths = RoundPaths::rooted(root.clone(), PROJECT);

    let mut roster = Roster::load(&paths.roster_file()).expect("load roster");
    roster.clear_project(PROJECT);

    let allowances = Allowances {
        identical_submission: true,
        wrong_filetype: true,
        ..Default::default()
    };
    let (sheet, entries) = ingest::run(&paths, &allowances, &mut roster).expect("ingest");

    let supervisor = Supervisor::builder()
        .builder(ScriptBuilder)
        .run_timeout(Duration::from_secs(5))
        .jobs(2)
        .build();
    let records = supervisor.supervise(entries, &paths).await.expect("supervise");

    let answer = AnswerSpec::parse("hello\n[g1]a\n[g1]b\n");
    reconcile::classify(&mut roster, &sheet, &records, &answer, &allowances, PROJECT)
        .expect("classify");
    let ranked = reconcile::rank(&mut roster, PROJECT);

    // With the allowance on, the identical pair builds, runs, and ranks.
    assert_eq!(ranked, 3);
    assert!(roster.outcome("001", PROJECT).expect("001 ranked").is_rank());
    assert!(roster.outcome("002", PROJECT).expect("002 ranked").is_rank());
    // Sun submitted earliest and ranks first.
    assert_eq!(roster.outcome("005", PROJECT), Some(Outcome::Rank(1)));

    let _ = fs::remove_dir_all(root);
}
