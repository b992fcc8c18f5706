#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    collections::BTreeMap,
    io::BufRead,
    path::Path,
};

use anyhow::{Context, Result};
use tracing::{info, warn};

/// One line of the answer file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Must appear in the output (case-insensitive, trimmed substring).
    Required(String),
    /// Member of an alternative group; one member per group must appear.
    Optional {
        /// Group tag shared by alternative clauses.
        group: String,
        /// The clause text.
        text:  String,
    },
}

/// An ordered answer specification: required clauses ANDed together, plus
/// optional groups where any one member satisfies its group.
#[derive(Debug, Clone, Default)]
pub struct AnswerSpec {
    /// Clauses in file order.
    clauses: Vec<Clause>,
}

impl AnswerSpec {
    /// Parses an answer file body, one clause per line. Lines starting with
    /// `[group]` are optional clauses; blank lines are skipped. A line that
    /// opens a bracket but never closes it is demoted to a required clause.
    pub fn parse(text: &str) -> Self {
        let mut clauses = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix('[') {
                if let Some((group, text)) = rest.split_once(']') {
                    clauses.push(Clause::Optional {
                        group: group.to_string(),
                        text:  text.to_string(),
                    });
                    continue;
                }
                warn!("Answer clause `{line}` has no closing `]`, treating it as required");
            }
            clauses.push(Clause::Required(line.to_string()));
        }
        Self { clauses }
    }

    /// Loads the answer spec from `path`, prompting for it on stdin when the
    /// file is missing or `force_update` is set. Prompted clauses are
    /// lowercased, blank lines dropped, and the file (over)written before
    /// grading proceeds.
    pub fn load_or_prompt(path: &Path, force_update: bool) -> Result<Self> {
        if !force_update && path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Could not read answer file {}", path.display()))?;
            return Ok(Self::parse(&text));
        }

        eprintln!("Enter the expected answer, one clause per line (end with Ctrl-D):");
        let clauses = read_clauses(std::io::stdin().lock())?;
        let body = clauses.join("\n") + "\n";

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }
        std::fs::write(path, &body)
            .with_context(|| format!("Could not write answer file {}", path.display()))?;
        info!("Wrote {} answer clauses to {}", clauses.len(), path.display());

        Ok(Self::parse(&body))
    }

    /// Clauses in file order.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// True when the spec holds no clauses at all.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Checks captured output against this spec.
    ///
    /// The output is trimmed and lowercased; every required clause must be a
    /// literal substring. Optional clauses are grouped by tag: each group
    /// must have at least one member found in the output with newlines
    /// flattened to spaces (answers wrapped mid-line still match). A spec
    /// with no optional groups passes that phase trivially; a group with no
    /// matching member fails the whole verification.
    pub fn verify(&self, output: &str) -> bool {
        let normalized = output.trim().to_lowercase();

        for clause in &self.clauses {
            if let Clause::Required(text) = clause
                && !normalized.contains(&text.trim().to_lowercase())
            {
                return false;
            }
        }

        let flattened = normalized.replace('\n', " ");
        let mut groups: BTreeMap<&str, bool> = BTreeMap::new();
        for clause in &self.clauses {
            if let Clause::Optional { group, text } = clause {
                let hit = flattened.contains(&text.trim().to_lowercase());
                let entry = groups.entry(group.as_str()).or_insert(false);
                *entry = *entry || hit;
            }
        }

        groups.values().all(|&satisfied| satisfied)
    }
}

/// Reads clauses from `reader` until end of input, lowercasing each line and
/// dropping blanks.
fn read_clauses(reader: impl BufRead) -> Result<Vec<String>> {
    let mut clauses = Vec::new();
    for line in reader.lines() {
        let line = line.context("Could not read an answer clause")?;
        let line = line.trim();
        if !line.is_empty() {
            clauses.push(line.to_lowercase());
        }
    }
    Ok(clauses)
}
