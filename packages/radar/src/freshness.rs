//! Cross-run freshness state.
//!
//! The state file is a flat JSON array of listing identifiers. It is read
//! once at the start of a run and replaced at the end of a successful one.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::persist::write_atomic;
use crate::types::{Freshness, ListingRecord};

/// Which earlier runs count when deciding whether a listing is new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FreshnessPolicy {
    /// Only the immediately preceding run. Identifiers missing from the
    /// current run are forgotten when state is saved.
    #[default]
    PreviousRun,

    /// Every earlier run. Saved state is the union of prior and current
    /// identifiers, so the file grows over time.
    AllRuns,
}

/// Loads, classifies against and replaces the persisted identifier set.
#[derive(Debug, Clone)]
pub struct FreshnessTracker {
    path: PathBuf,
    policy: FreshnessPolicy,
}

impl FreshnessTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            policy: FreshnessPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: FreshnessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> FreshnessPolicy {
        self.policy
    }

    /// Identifiers persisted by earlier runs.
    ///
    /// A missing or malformed file yields an empty set, so every listing
    /// counts as new for this run.
    pub fn load(&self) -> HashSet<String> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No freshness state yet");
                return HashSet::new();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Unreadable freshness state, starting empty");
                return HashSet::new();
            }
        };

        match serde_json::from_str::<Vec<String>>(&text) {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Corrupt freshness state, starting empty");
                HashSet::new()
            }
        }
    }

    /// New iff the listing has an identifier absent from `prior`.
    #[must_use]
    pub fn classify(listing: &ListingRecord, prior: &HashSet<String>) -> Freshness {
        match &listing.identifier {
            Some(id) if !prior.contains(id) => Freshness::New,
            _ => Freshness::Old,
        }
    }

    /// Persist the identifiers of `listings`.
    ///
    /// Identifiers are written in encounter order without duplicates. Under
    /// [`FreshnessPolicy::AllRuns`] previously stored identifiers are kept
    /// ahead of the current ones.
    pub fn save(&self, listings: &[ListingRecord]) -> Result<()> {
        let mut seen = HashSet::new();
        let mut ids: Vec<String> = Vec::new();

        if self.policy == FreshnessPolicy::AllRuns {
            let mut prior: Vec<String> = self.load().into_iter().collect();
            prior.sort();
            for id in prior {
                if seen.insert(id.clone()) {
                    ids.push(id);
                }
            }
        }

        for id in listings.iter().filter_map(|l| l.identifier.as_ref()) {
            if seen.insert(id.clone()) {
                ids.push(id.clone());
            }
        }

        write_atomic(&self.path, &serde_json::to_string_pretty(&ids)?)?;
        tracing::info!(path = %self.path.display(), count = ids.len(), "Saved freshness state");
        Ok(())
    }
}
