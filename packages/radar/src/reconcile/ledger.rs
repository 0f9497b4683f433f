//! Persisted application signals.
//!
//! Keeps every signal seen so far so later runs only need to parse messages
//! they have not seen yet.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::persist::write_atomic;
use crate::types::ApplicationSignal;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalLedger {
    #[serde(default)]
    pub messages: Vec<ApplicationSignal>,

    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl SignalLedger {
    /// Load a ledger; a missing or malformed file yields an empty one.
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Unreadable signal ledger, starting empty");
                }
                return Self::default();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Corrupt signal ledger, starting empty");
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &serde_json::to_string_pretty(self)?)
    }

    /// Source ids already recorded.
    #[must_use]
    pub fn known_ids(&self) -> HashSet<&str> {
        self.messages.iter().map(|s| s.source_id.as_str()).collect()
    }

    /// Merge `incoming` by source id, newer entries replacing older ones.
    ///
    /// Messages end up sorted by observation time, newest first, with
    /// undated ones last. Returns the number of previously unknown ids.
    pub fn merge(&mut self, incoming: Vec<ApplicationSignal>, synced_at: DateTime<Utc>) -> usize {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut merged: Vec<ApplicationSignal> = Vec::new();
        let mut added = 0;
        let existing = self.messages.len();

        for (position, signal) in std::mem::take(&mut self.messages)
            .into_iter()
            .chain(incoming)
            .enumerate()
        {
            match index.get(&signal.source_id) {
                Some(&slot) => merged[slot] = signal,
                None => {
                    if position >= existing {
                        added += 1;
                    }
                    index.insert(signal.source_id.clone(), merged.len());
                    merged.push(signal);
                }
            }
        }

        merged.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        self.messages = merged;
        self.last_synced_at = Some(synced_at);
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn signal(id: &str, company: &str, day: Option<u32>) -> ApplicationSignal {
        ApplicationSignal {
            source_id: id.into(),
            company: Some(company.into()),
            title: None,
            posting_id: None,
            observed_at: day.map(|d| Utc.with_ymd_and_hms(2025, 6, d, 0, 0, 0).unwrap()),
            subject: String::new(),
        }
    }

    fn synced() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_merge_replaces_by_id_and_sorts_newest_first() {
        let mut ledger = SignalLedger::default();
        assert_eq!(ledger.merge(vec![signal("a", "Old", Some(1)), signal("b", "B", Some(3))], synced()), 2);

        let added = ledger.merge(
            vec![signal("a", "New", Some(2)), signal("c", "C", None), signal("d", "D", Some(5))],
            synced(),
        );
        assert_eq!(added, 2);

        let ids: Vec<&str> = ledger.messages.iter().map(|s| s.source_id.as_str()).collect();
        assert_eq!(ids, vec!["d", "b", "a", "c"]);
        assert_eq!(ledger.messages[2].company.as_deref(), Some("New"));
        assert_eq!(ledger.last_synced_at, Some(synced()));
    }

    #[test]
    fn test_known_ids() {
        let mut ledger = SignalLedger::default();
        ledger.merge(vec![signal("a", "A", None)], synced());
        assert!(ledger.known_ids().contains("a"));
        assert!(!ledger.known_ids().contains("b"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs").join("application_status.json");
        let mut ledger = SignalLedger::default();
        ledger.merge(vec![signal("a", "A", Some(1))], synced());

        ledger.save(&path).unwrap();
        assert_eq!(SignalLedger::load(&path), ledger);
    }

    #[test]
    fn test_load_missing_or_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        assert_eq!(SignalLedger::load(&path), SignalLedger::default());

        fs::write(&path, "[]").unwrap();
        assert_eq!(SignalLedger::load(&path), SignalLedger::default());
    }
}
