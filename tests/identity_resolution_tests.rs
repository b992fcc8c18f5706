use std::{fs, path::PathBuf};

use tally::{identity, roster::Roster, sheet::SubmissionSheet};
use uuid::Uuid;

fn temp_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!("tally-identity-{}", Uuid::new_v4()));
    fs::create_dir_all(&root).expect("create temp root");
    root
}

fn write_roster(root: &PathBuf, body: &str) -> Roster {
    let path = root.join("results.csv");
    fs::write(&path, body).expect("write roster");
    Roster::load(&path).expect("load roster")
}

fn write_sheet(root: &PathBuf, body: &str) -> SubmissionSheet {
    let path = root.join("submission.csv");
    fs::write(&path, body).expect("write sheet");
    SubmissionSheet::load(&path).expect("load sheet")
}

#[test]
fn registry_wins_on_name_mismatch() {
    let root = temp_root();
    let mut roster = write_roster(&root, "学号,姓名\n001,Li\n");
    let mut sheet = write_sheet(
        &root,
        "student_id,name,filename,submit_time\n001,Wang,main.cpp,2024-03-08 14:32:11\n",
    );

    let identity = identity::resolve("001", "Wang", &mut roster, &mut sheet);
    assert_eq!(identity.student_id, "001");
    assert_eq!(identity.name, "Li");

    // The sheet row is repaired in place.
    assert_eq!(sheet.get("001").unwrap().name, "Li");
    // The registry itself is untouched.
    assert_eq!(roster.get("001").unwrap().name(), "Li");

    let _ = fs::remove_dir_all(root);
}

#[test]
fn fat_fingered_id_rekeys_under_the_registry_row() {
    let root = temp_root();
    let mut roster = write_roster(&root, "学号,姓名\n001,Li\n002,Wang\n");
    let mut sheet = write_sheet(
        &root,
        "student_id,name,filename,submit_time\n\
         999,Li,old.cpp,2024-03-08 10:00:00\n\
         998,Li,new.cpp,2024-03-08 12:00:00\n",
    );

    let identity = identity::resolve("999", "Li", &mut roster, &mut sheet);
    assert_eq!(identity.student_id, "001");
    assert_eq!(identity.name, "Li");

    // Only the most recent of Li's rows survives, under the canonical id.
    let rows: Vec<_> = sheet.rows().iter().filter(|r| r.name == "Li").collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].student_id, "001");
    assert_eq!(rows[0].filename, "new.cpp");

    let _ = fs::remove_dir_all(root);
}

#[test]
fn unknown_student_gets_a_placeholder_row() {
    let root = temp_root();
    let mut roster = write_roster(&root, "学号,姓名\n001,Li\n");
    let mut sheet = write_sheet(
        &root,
        "student_id,name,filename,submit_time\n777,Zhao,main.cpp,2024-03-08 14:32:11\n",
    );

    assert!(!roster.contains("777"));
    let identity = identity::resolve("777", "Zhao", &mut roster, &mut sheet);
    assert_eq!(identity.student_id, "777");
    assert_eq!(identity.name, "Zhao");
    assert_eq!(roster.get("777").unwrap().name(), "Zhao");

    let _ = fs::remove_dir_all(root);
}

#[test]
fn ambiguous_name_is_not_rekeyed() {
    let root = temp_root();
    // Two registry students share the same name.
    let mut roster = write_roster(&root, "学号,姓名\n001,Li\n002,Li\n");
    let mut sheet = write_sheet(
        &root,
        "student_id,name,filename,submit_time\n999,Li,main.cpp,2024-03-08 14:32:11\n",
    );

    let identity = identity::resolve("999", "Li", &mut roster, &mut sheet);
    // Rather than guessing between 001 and 002, the submission keeps its own
    // id and a placeholder row is added.
    assert_eq!(identity.student_id, "999");
    assert!(roster.contains("999"));
    assert_eq!(sheet.get("999").unwrap().name, "Li");

    let _ = fs::remove_dir_all(root);
}

#[test]
fn resolution_always_returns_an_identity() {
    let root = temp_root();
    let mut roster = write_roster(&root, "学号,姓名\n001,Li\n");
    let mut sheet = write_sheet(
        &root,
        "student_id,name,filename,submit_time\n001,Li,main.cpp,2024-03-08 14:32:11\n",
    );

    // A known, consistent identity resolves to itself with no side effects.
    let identity = identity::resolve("001", "Li", &mut roster, &mut sheet);
    assert_eq!(identity.student_id, "001");
    assert_eq!(identity.name, "Li");
    assert_eq!(roster.rows().len(), 1);

    let _ = fs::remove_dir_all(root);
}
