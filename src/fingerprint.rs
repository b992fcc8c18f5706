#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    collections::{HashMap, hash_map::Entry},
    fmt::Display,
    path::Path,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// 128-bit digest of a submission's raw bytes, used for duplicate
/// detection only. Stored as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the digest of `bytes`. Pure and deterministic.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(format!("{:x}", md5::compute(bytes)))
    }

    /// Computes the digest of a file's contents.
    pub fn of_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Could not read {} for fingerprinting", path.display()))?;
        Ok(Self::of_bytes(&bytes))
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tracks which student first submitted each fingerprint within a round.
#[derive(Debug, Default)]
pub struct Deduplicator {
    /// fingerprint -> first submitter seen this round.
    seen: HashMap<Fingerprint, Identity>,
}

impl Deduplicator {
    /// Creates an empty deduplicator for a new round.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fingerprint for `submitter`.
    ///
    /// The first registration claims the slot and returns `None`. Every
    /// later registration with the same fingerprint leaves the slot
    /// untouched and returns the prior submitter.
    pub fn register(&mut self, fingerprint: Fingerprint, submitter: Identity) -> Option<&Identity> {
        match self.seen.entry(fingerprint) {
            Entry::Occupied(prior) => Some(prior.into_mut()),
            Entry::Vacant(slot) => {
                slot.insert(submitter);
                None
            }
        }
    }
}
