use std::{fs, path::PathBuf};

use tally::roster::{Outcome, Roster, Verdict};
use uuid::Uuid;

fn temp_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!("tally-roster-{}", Uuid::new_v4()));
    fs::create_dir_all(&root).expect("create temp root");
    root
}

const ROSTER: &str = "\
学号,姓名,年级,proj1_submission,proj1_result
001,Li,2024,2024-03-08 14:32:11,1
002,Wang,2024,2024-03-08 15:00:00,CompileError
003,Zhao,2023,,NoSubmission
";

#[test]
fn load_parses_project_columns_and_preserves_extras() {
    let root = temp_root();
    let path = root.join("results.csv");
    fs::write(&path, ROSTER).expect("write roster");

    let roster = Roster::load(&path).expect("load");
    assert_eq!(roster.rows().len(), 3);

    assert_eq!(roster.outcome("001", "proj1"), Some(Outcome::Rank(1)));
    assert_eq!(
        roster.outcome("002", "proj1"),
        Some(Outcome::Verdict(Verdict::CompileError))
    );
    assert_eq!(
        roster.outcome("003", "proj1"),
        Some(Outcome::Verdict(Verdict::NoSubmission))
    );

    let li = roster.get("001").expect("row 001");
    assert_eq!(li.name(), "Li");
    let cell = li.cell("proj1").expect("proj1 cell");
    assert!(cell.submitted_at.is_some());

    let _ = fs::remove_dir_all(root);
}

#[test]
fn save_round_trips_and_leaves_no_temp_file() {
    let root = temp_root();
    let path = root.join("results.csv");
    fs::write(&path, ROSTER).expect("write roster");

    let roster = Roster::load(&path).expect("load");
    roster.save(&path).expect("save");

    // Atomic save: the temp file has been renamed away.
    assert!(!root.join("results.csv.tmp").exists());

    let reloaded = Roster::load(&path).expect("reload");
    assert_eq!(reloaded.rows().len(), 3);
    assert_eq!(reloaded.outcome("001", "proj1"), Some(Outcome::Rank(1)));
    assert_eq!(
        reloaded.outcome("002", "proj1"),
        Some(Outcome::Verdict(Verdict::CompileError))
    );

    // The preserved upstream column survives the round trip.
    let body = fs::read_to_string(&path).expect("read saved csv");
    assert!(body.lines().next().unwrap().contains("年级"));
    assert!(body.contains("2023"));

    let _ = fs::remove_dir_all(root);
}

#[test]
fn clear_project_touches_only_that_project() {
    let root = temp_root();
    let path = root.join("results.csv");
    fs::write(
        &path,
        "学号,姓名,proj1_result,proj2_result\n001,Li,CompileError,RuntimeError\n",
    )
    .expect("write roster");

    let mut roster = Roster::load(&path).expect("load");
    roster.clear_project("proj1");

    assert_eq!(roster.outcome("001", "proj1"), None);
    assert_eq!(
        roster.outcome("001", "proj2"),
        Some(Outcome::Verdict(Verdict::RuntimeError))
    );

    let _ = fs::remove_dir_all(root);
}

#[test]
fn placeholder_rows_join_the_table_and_persist() {
    let root = temp_root();
    let path = root.join("results.csv");
    fs::write(&path, ROSTER).expect("write roster");

    let mut roster = Roster::load(&path).expect("load");
    roster.insert_placeholder("777", "Qian");
    assert!(roster.contains("777"));

    roster.save(&path).expect("save");
    let reloaded = Roster::load(&path).expect("reload");
    assert_eq!(reloaded.get("777").expect("placeholder").name(), "Qian");
    // Rows are never dropped.
    assert_eq!(reloaded.rows().len(), 4);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn result_cells_parse_as_ranks_or_verdicts() {
    assert_eq!("3".parse::<Outcome>().ok(), Some(Outcome::Rank(3)));
    assert_eq!(
        "IdenticalSubmission".parse::<Outcome>().ok(),
        Some(Outcome::Verdict(Verdict::IdenticalSubmission))
    );
    assert!("✔".parse::<Outcome>().is_err());
}

#[test]
fn set_outcome_if_empty_never_overwrites() {
    let root = temp_root();
    let path = root.join("results.csv");
    fs::write(&path, "学号,姓名\n001,Li\n").expect("write roster");

    let mut roster = Roster::load(&path).expect("load");
    roster.ensure_project("proj1");
    roster.set_outcome("001", "proj1", Outcome::Verdict(Verdict::IdenticalSubmission));
    roster.set_outcome_if_empty("001", "proj1", Outcome::Verdict(Verdict::NoSubmission));

    assert_eq!(
        roster.outcome("001", "proj1"),
        Some(Outcome::Verdict(Verdict::IdenticalSubmission))
    );

    let _ = fs::remove_dir_all(root);
}
