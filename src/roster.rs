#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
    path::Path,
    str::FromStr,
};

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Header of the student-id column in the persisted table.
pub const ID_HEADER: &str = "学号";
/// Header of the name column in the persisted table.
pub const NAME_HEADER: &str = "姓名";

/// Timestamp format used when persisting submission times.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Accepted fallback format when parsing submission times.
const TIME_FORMAT_ALT: &str = "%Y/%m/%d %H:%M:%S";

/// Parses a submission timestamp in either accepted format.
pub(crate) fn parse_timestamp(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, TIME_FORMAT_ALT))
        .with_context(|| format!("Could not parse timestamp `{text}`"))
}

/// A disqualifying classification for one student in one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Source present, no artifact produced.
    CompileError,
    /// Artifact present, no captured output.
    RuntimeError,
    /// Output present but failed answer verification.
    IncorrectAnswer,
    /// Submitted file was not of the expected type.
    WrongFileType,
    /// Byte-identical to another student's submission.
    IdenticalSubmission,
    /// No submission at all this round.
    NoSubmission,
}

impl Verdict {
    /// The string stored in the result column for this verdict.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::CompileError => "CompileError",
            Verdict::RuntimeError => "RuntimeError",
            Verdict::IncorrectAnswer => "IncorrectAnswer",
            Verdict::WrongFileType => "WrongFileType",
            Verdict::IdenticalSubmission => "IdenticalSubmission",
            Verdict::NoSubmission => "NoSubmission",
        }
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error produced when a result cell holds unrecognised text.
#[derive(thiserror::Error, Debug)]
#[error("unrecognised result cell `{0}`")]
pub struct ParseOutcomeError(String);

impl FromStr for Verdict {
    type Err = ParseOutcomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CompileError" => Ok(Verdict::CompileError),
            "RuntimeError" => Ok(Verdict::RuntimeError),
            "IncorrectAnswer" => Ok(Verdict::IncorrectAnswer),
            "WrongFileType" => Ok(Verdict::WrongFileType),
            "IdenticalSubmission" => Ok(Verdict::IdenticalSubmission),
            "NoSubmission" => Ok(Verdict::NoSubmission),
            other => Err(ParseOutcomeError(other.to_string())),
        }
    }
}

/// Contents of a `<project>_result` cell: either a disqualifying verdict or
/// the 1-based rank earned by a passing, on-time submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    /// A disqualifying verdict.
    Verdict(Verdict),
    /// Numeric rank among passing submissions.
    Rank(u32),
}

impl Outcome {
    /// Returns true when this outcome is a numeric rank.
    pub fn is_rank(&self) -> bool {
        matches!(self, Outcome::Rank(_))
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Verdict(v) => write!(f, "{v}"),
            Outcome::Rank(r) => write!(f, "{r}"),
        }
    }
}

impl FromStr for Outcome {
    type Err = ParseOutcomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(rank) = s.parse::<u32>() {
            return Ok(Outcome::Rank(rank));
        }
        s.parse::<Verdict>().map(Outcome::Verdict)
    }
}

/// Per-project columns of one roster row.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectCell {
    /// Latest submission time this round, if any.
    pub submitted_at: Option<NaiveDateTime>,
    /// Verdict or rank, once assigned.
    pub outcome:      Option<Outcome>,
}

/// One row of the registry/result table.
#[derive(Debug, Clone)]
pub struct StudentRow {
    /// Canonical student id (unique key).
    student_id: String,
    /// Canonical student name.
    name:       String,
    /// Values of upstream columns preserved verbatim, aligned with
    /// [`Roster::extra_headers`].
    extras:     Vec<String>,
    /// Per-project cells, keyed by project id.
    projects:   BTreeMap<String, ProjectCell>,
}

impl StudentRow {
    /// Canonical student id.
    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    /// Canonical student name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The cell for `project`, if any column has been written.
    pub fn cell(&self, project: &str) -> Option<&ProjectCell> {
        self.projects.get(project)
    }

    /// The cell for `project`, created empty on first access.
    fn cell_mut(&mut self, project: &str) -> &mut ProjectCell {
        self.projects.entry(project.to_string()).or_default()
    }
}

/// The authoritative registry/result table, loaded once per run and
/// persisted atomically at round end. Rows are kept in input order and are
/// never dropped; per-project columns are append-only across rounds.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    /// Headers of preserved upstream columns, in input order.
    extra_headers: Vec<String>,
    /// Project ids in column order (first appearance wins).
    project_ids:   Vec<String>,
    /// Rows in input order.
    rows:          Vec<StudentRow>,
    /// student_id -> index into `rows`.
    index:         HashMap<String, usize>,
}

impl Roster {
    /// Loads the table from `path`.
    ///
    /// `学号` and `姓名` are required; `<project>_submission` /
    /// `<project>_result` pairs become project cells; every other column is
    /// preserved verbatim.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Could not open roster {}", path.display()))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Could not read headers of {}", path.display()))?
            .clone();

        let mut id_col = None;
        let mut name_col = None;
        let mut extra_cols: Vec<(usize, String)> = Vec::new();
        // (column index, project id, true = submission / false = result)
        let mut project_cols: Vec<(usize, String, bool)> = Vec::new();
        let mut project_ids: Vec<String> = Vec::new();

        for (i, header) in headers.iter().enumerate() {
            if header == ID_HEADER {
                id_col = Some(i);
            } else if header == NAME_HEADER {
                name_col = Some(i);
            } else if let Some(project) = header.strip_suffix("_submission") {
                if !project_ids.iter().any(|p| p == project) {
                    project_ids.push(project.to_string());
                }
                project_cols.push((i, project.to_string(), true));
            } else if let Some(project) = header.strip_suffix("_result") {
                if !project_ids.iter().any(|p| p == project) {
                    project_ids.push(project.to_string());
                }
                project_cols.push((i, project.to_string(), false));
            } else {
                extra_cols.push((i, header.to_string()));
            }
        }

        let Some(id_col) = id_col else {
            bail!("Roster {} has no `{ID_HEADER}` column", path.display());
        };
        let Some(name_col) = name_col else {
            bail!("Roster {} has no `{NAME_HEADER}` column", path.display());
        };

        let mut roster = Roster {
            extra_headers: extra_cols.iter().map(|(_, h)| h.clone()).collect(),
            project_ids,
            rows: Vec::new(),
            index: HashMap::new(),
        };

        for record in reader.records() {
            let record =
                record.with_context(|| format!("Could not read a row of {}", path.display()))?;
            let field = |i: usize| record.get(i).unwrap_or_default().trim().to_string();

            let student_id = field(id_col);
            if student_id.is_empty() {
                warn!("Skipping roster row with an empty {ID_HEADER}");
                continue;
            }
            if roster.index.contains_key(&student_id) {
                warn!("Duplicate roster row for {student_id}, keeping the first");
                continue;
            }

            let mut row = StudentRow {
                student_id: student_id.clone(),
                name: field(name_col),
                extras: extra_cols.iter().map(|&(i, _)| field(i)).collect(),
                projects: BTreeMap::new(),
            };

            for (i, project, is_submission) in &project_cols {
                let cell_text = field(*i);
                if cell_text.is_empty() {
                    continue;
                }
                let cell = row.cell_mut(project);
                if *is_submission {
                    cell.submitted_at = Some(parse_timestamp(&cell_text).with_context(|| {
                        format!("Bad `{project}_submission` cell for {student_id}")
                    })?);
                } else {
                    cell.outcome = Some(cell_text.parse::<Outcome>().with_context(|| {
                        format!("Bad `{project}_result` cell for {student_id}")
                    })?);
                }
            }

            roster.index.insert(student_id, roster.rows.len());
            roster.rows.push(row);
        }

        Ok(roster)
    }

    /// Persists the table to `path` via write-temp-then-rename, so a crash
    /// mid-save never clobbers the previous version.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)
                .with_context(|| format!("Could not create {}", tmp.display()))?;

            let mut headers = vec![ID_HEADER.to_string(), NAME_HEADER.to_string()];
            headers.extend(self.extra_headers.iter().cloned());
            for project in &self.project_ids {
                headers.push(format!("{project}_submission"));
                headers.push(format!("{project}_result"));
            }
            writer.write_record(&headers).context("Could not write roster headers")?;

            for row in &self.rows {
                let mut record = vec![row.student_id.clone(), row.name.clone()];
                record.extend(row.extras.iter().cloned());
                for project in &self.project_ids {
                    let cell = row.projects.get(project);
                    record.push(
                        cell.and_then(|c| c.submitted_at)
                            .map(|t| t.format(TIME_FORMAT).to_string())
                            .unwrap_or_default(),
                    );
                    record.push(
                        cell.and_then(|c| c.outcome)
                            .map(|o| o.to_string())
                            .unwrap_or_default(),
                    );
                }
                writer
                    .write_record(&record)
                    .with_context(|| format!("Could not write roster row {}", row.student_id))?;
            }
            writer.flush().context("Could not flush roster")?;
        }
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Could not move {} into place", tmp.display()))?;
        Ok(())
    }

    /// Rows in stable input order.
    pub fn rows(&self) -> &[StudentRow] {
        &self.rows
    }

    /// Looks a student up by canonical id.
    pub fn get(&self, student_id: &str) -> Option<&StudentRow> {
        self.index.get(student_id).map(|&i| &self.rows[i])
    }

    /// True if the registry knows this student id.
    pub fn contains(&self, student_id: &str) -> bool {
        self.index.contains_key(student_id)
    }

    /// All rows whose canonical name equals `name`.
    pub fn find_by_name(&self, name: &str) -> Vec<&StudentRow> {
        self.rows.iter().filter(|row| row.name == name).collect()
    }

    /// Appends a placeholder row for a student the registry does not know.
    /// Preserved upstream columns are left empty.
    pub fn insert_placeholder(&mut self, student_id: &str, name: &str) {
        if self.contains(student_id) {
            return;
        }
        let row = StudentRow {
            student_id: student_id.to_string(),
            name: name.to_string(),
            extras: vec![String::new(); self.extra_headers.len()],
            projects: BTreeMap::new(),
        };
        self.index.insert(student_id.to_string(), self.rows.len());
        self.rows.push(row);
    }

    /// Registers `project` as a column pair, keeping column order stable.
    pub fn ensure_project(&mut self, project: &str) {
        if !self.project_ids.iter().any(|p| p == project) {
            self.project_ids.push(project.to_string());
        }
    }

    /// Clears both of `project`'s columns in every row, ahead of a full
    /// recompute. Other projects' columns are untouched.
    pub fn clear_project(&mut self, project: &str) {
        self.ensure_project(project);
        for row in &mut self.rows {
            row.projects.remove(project);
        }
    }

    /// Records the submission time for one student.
    pub fn set_submitted_at(&mut self, student_id: &str, project: &str, at: NaiveDateTime) {
        if let Some(&i) = self.index.get(student_id) {
            self.rows[i].cell_mut(project).submitted_at = Some(at);
        }
    }

    /// The outcome currently assigned to one student, if any.
    pub fn outcome(&self, student_id: &str, project: &str) -> Option<Outcome> {
        self.get(student_id)
            .and_then(|row| row.cell(project))
            .and_then(|cell| cell.outcome)
    }

    /// Assigns an outcome, overwriting whatever was present.
    pub fn set_outcome(&mut self, student_id: &str, project: &str, outcome: Outcome) {
        if let Some(&i) = self.index.get(student_id) {
            self.rows[i].cell_mut(project).outcome = Some(outcome);
        }
    }

    /// Assigns an outcome only when the student has none for `project` yet.
    pub fn set_outcome_if_empty(&mut self, student_id: &str, project: &str, outcome: Outcome) {
        if self.outcome(student_id, project).is_none() {
            self.set_outcome(student_id, project, outcome);
        }
    }

    /// Clears an assigned outcome for one student.
    pub fn clear_outcome(&mut self, student_id: &str, project: &str) {
        if let Some(&i) = self.index.get(student_id)
            && let Some(cell) = self.rows[i].projects.get_mut(project)
        {
            cell.outcome = None;
        }
    }
}
