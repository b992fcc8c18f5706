#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::roster::{TIME_FORMAT, parse_timestamp};

/// One row of the submission metadata sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// Student id as submitted (canonicalized in place by identity
    /// resolution).
    pub student_id:  String,
    /// Student name as submitted (canonicalized in place).
    pub name:        String,
    /// Name of the submitted file.
    pub filename:    String,
    /// Submission timestamp.
    pub submit_time: NaiveDateTime,
}

/// The submission metadata sheet for one round, as exported by the external
/// tabular store. Accepts the upstream Chinese headers or the normalized
/// ones; duplicate `(name, student_id)` rows collapse keeping the first.
#[derive(Debug, Clone, Default)]
pub struct SubmissionSheet {
    /// Rows in input order.
    rows: Vec<Submission>,
}

/// Column headers accepted for each field, normalized dialect first.
const HEADER_ALIASES: [(&str, &str); 4] = [
    ("name", "姓名"),
    ("student_id", "学号"),
    ("filename", "文件名"),
    ("submit_time", "提交时间"),
];

impl SubmissionSheet {
    /// Loads the sheet from `path`, accepting either header dialect.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Could not open submission sheet {}", path.display()))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Could not read headers of {}", path.display()))?
            .clone();

        let mut cols = [None; 4];
        for (i, header) in headers.iter().enumerate() {
            let header = header.trim();
            for (slot, (normalized, upstream)) in cols.iter_mut().zip(HEADER_ALIASES) {
                if header == normalized || header == upstream {
                    slot.get_or_insert(i);
                }
            }
        }
        let [name_col, id_col, file_col, time_col] = cols;
        let (Some(name_col), Some(id_col), Some(file_col), Some(time_col)) =
            (name_col, id_col, file_col, time_col)
        else {
            bail!(
                "Submission sheet {} is missing one of the name/student_id/filename/submit_time \
                 columns",
                path.display()
            );
        };

        let mut rows: Vec<Submission> = Vec::new();
        for record in reader.records() {
            let record =
                record.with_context(|| format!("Could not read a row of {}", path.display()))?;
            let field = |i: usize| record.get(i).unwrap_or_default().trim().to_string();

            let student_id = field(id_col);
            let name = field(name_col);
            if student_id.is_empty() && name.is_empty() {
                continue;
            }

            // Duplicate (name, student_id) rows collapse keeping the first.
            if rows.iter().any(|r| r.name == name && r.student_id == student_id) {
                warn!("Duplicate sheet row for ({student_id}, {name}), keeping the first");
                continue;
            }

            rows.push(Submission {
                student_id: student_id.clone(),
                name,
                filename: field(file_col),
                submit_time: parse_timestamp(&field(time_col))
                    .with_context(|| format!("Bad submit_time for {student_id}"))?,
            });
        }

        Ok(Self { rows })
    }

    /// Persists the sheet with normalized headers.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Could not create {}", path.display()))?;
        writer
            .write_record(["student_id", "name", "filename", "submit_time"])
            .context("Could not write sheet headers")?;
        for row in &self.rows {
            let submit_time = row.submit_time.format(TIME_FORMAT).to_string();
            writer
                .write_record([
                    row.student_id.as_str(),
                    row.name.as_str(),
                    row.filename.as_str(),
                    submit_time.as_str(),
                ])
                .with_context(|| format!("Could not write sheet row {}", row.student_id))?;
        }
        writer.flush().context("Could not flush sheet")?;
        Ok(())
    }

    /// Rows in input order.
    pub fn rows(&self) -> &[Submission] {
        &self.rows
    }

    /// The sheet row for `student_id`, if present.
    pub fn get(&self, student_id: &str) -> Option<&Submission> {
        self.rows.iter().find(|row| row.student_id == student_id)
    }

    /// All rows whose submitted name equals `name`.
    pub fn find_by_name(&self, name: &str) -> Vec<&Submission> {
        self.rows.iter().filter(|row| row.name == name).collect()
    }

    /// Overwrites the submitted name for `student_id` with the canonical
    /// one.
    pub fn repair_name(&mut self, student_id: &str, canonical_name: &str) {
        for row in self.rows.iter_mut().filter(|r| r.student_id == student_id) {
            row.name = canonical_name.to_string();
        }
    }

    /// Re-keys every row submitted under `name` to `canonical_id`, keeping
    /// only the most recent row by submit time when several exist.
    pub fn rekey_by_name(&mut self, name: &str, canonical_id: &str) {
        let latest = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.name == name)
            .max_by_key(|(_, r)| r.submit_time)
            .map(|(i, _)| i);

        let Some(latest) = latest else {
            return;
        };

        self.rows[latest].student_id = canonical_id.to_string();
        let mut i = 0;
        self.rows.retain(|r| {
            let keep = r.name != name || i == latest;
            i += 1;
            keep
        });
    }
}
