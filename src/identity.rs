#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{roster::Roster, sheet::SubmissionSheet};

/// A canonical `(student_id, name)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Canonical student id.
    pub student_id: String,
    /// Canonical student name.
    pub name:       String,
}

impl Identity {
    /// Creates an identity from its parts.
    pub fn new(student_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            name: name.into(),
        }
    }

    /// The `<student_id>-<name>` stem used for staged files, artifacts, and
    /// captures.
    pub fn stem(&self) -> String {
        format!("{}-{}", self.student_id, self.name)
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.student_id, self.name)
    }
}

/// Splits a filename stem of the form `{id}-{name}` into its parts.
pub fn split_token(stem: &str) -> Result<(String, String)> {
    let Some((id, name)) = stem.split_once('-') else {
        bail!("`{stem}` is not of the form <student_id>-<name>");
    };
    if id.is_empty() || name.is_empty() {
        bail!("`{stem}` is not of the form <student_id>-<name>");
    }
    Ok((id.to_string(), name.to_string()))
}

/// Resolves a submitted `(id, name)` token against the registry.
///
/// The registry always wins: a known id with a differing name has the
/// submitted name overwritten; an unknown id whose name matches exactly one
/// registry row is re-keyed under that row's id (keeping only the student's
/// most recent sheet row); an unknown id and name inserts a placeholder
/// registry row. Every anomaly is logged. This never fails; some identity
/// is always returned.
pub fn resolve(
    token_id: &str,
    token_name: &str,
    roster: &mut Roster,
    sheet: &mut SubmissionSheet,
) -> Identity {
    if let Some(row) = roster.get(token_id) {
        let canonical = row.name().to_string();
        if canonical != token_name {
            warn!("Name/id mismatch for {token_id}: submitted {token_name}, registry {canonical}");
            sheet.repair_name(token_id, &canonical);
        }
        return Identity::new(token_id, canonical);
    }

    let (match_count, canonical_id) = {
        let matches = roster.find_by_name(token_name);
        (
            matches.len(),
            matches.first().map(|row| row.student_id().to_string()),
        )
    };

    if let (1, Some(canonical_id)) = (match_count, canonical_id) {
        warn!("Wrong student id for {token_name}: submitted {token_id}, registry {canonical_id}");
        sheet.rekey_by_name(token_name, &canonical_id);
        return Identity::new(canonical_id, token_name);
    }

    if match_count == 0 {
        warn!("Unknown student ({token_id}, {token_name}), inserting a placeholder row");
    } else {
        warn!(
            "Name {token_name} matches {match_count} registry rows; cannot repair id {token_id}, \
             inserting a placeholder row"
        );
    }
    roster.insert_placeholder(token_id, token_name);
    Identity::new(token_id, token_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_the_first_hyphen() {
        let (id, name) = split_token("20240101-Li").unwrap();
        assert_eq!(id, "20240101");
        assert_eq!(name, "Li");
    }

    #[test]
    fn rejects_tokens_without_a_hyphen() {
        assert!(split_token("20240101Li").is_err());
        assert!(split_token("-Li").is_err());
        assert!(split_token("20240101-").is_err());
    }
}
