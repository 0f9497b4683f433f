//! Application status reconciliation.
//!
//! Confirmation messages are parsed into [`ApplicationSignal`]s
//! ([`message`]), optionally accumulated in a [`SignalLedger`]
//! ([`ledger`]), and matched against listings by a ranked list of matchers
//! ([`matcher`]). Every listing receives exactly one [`StatusAnnotation`]
//! carrying the tier that produced it.

pub mod ledger;
pub mod matcher;
pub mod message;

use std::collections::HashSet;

use crate::types::{ApplicationSignal, ListingRecord, StatusAnnotation};

pub use ledger::SignalLedger;
pub use matcher::{best_match, normalize, ListingFacts, SignalFacts, MATCHERS};
pub use message::{parse_message, parse_messages, InboundMessage};

/// Annotates listings with inferred application status.
#[derive(Debug, Clone, Default)]
pub struct StatusReconciler;

impl StatusReconciler {
    pub fn new() -> Self {
        Self
    }

    /// One annotation per listing, in listing order.
    ///
    /// Signals are deduplicated by source id (first kept) and signals with
    /// neither company nor title are dropped before matching.
    #[must_use]
    pub fn reconcile(
        &self,
        signals: &[ApplicationSignal],
        listings: &[ListingRecord],
    ) -> Vec<StatusAnnotation> {
        let usable = usable_signals(signals);
        let facts: Vec<SignalFacts> = usable.iter().map(|s| SignalFacts::from_signal(s)).collect();

        let annotations: Vec<StatusAnnotation> = listings
            .iter()
            .enumerate()
            .map(|(row, listing)| {
                let key = listing.key(row);
                match best_match(&ListingFacts::from_listing(listing), &facts) {
                    Some((tier, index)) => StatusAnnotation {
                        listing_key: key,
                        status: tier.status(),
                        tier: Some(tier),
                        signal_id: Some(usable[index].source_id.clone()),
                    },
                    None => StatusAnnotation::unapplied(key),
                }
            })
            .collect();

        let matched = annotations.iter().filter(|a| a.tier.is_some()).count();
        tracing::info!(
            signals = usable.len(),
            listings = listings.len(),
            matched,
            "Reconciled application status"
        );
        annotations
    }
}

fn usable_signals(signals: &[ApplicationSignal]) -> Vec<&ApplicationSignal> {
    let mut seen = HashSet::new();
    signals
        .iter()
        .filter(|signal| {
            let first = seen.insert(signal.source_id.as_str());
            if !first {
                tracing::debug!(id = %signal.source_id, "Duplicate signal skipped");
            }
            first
        })
        .filter(|signal| {
            let usable = signal.company.is_some() || signal.title.is_some();
            if !usable {
                tracing::warn!(id = %signal.source_id, "Signal has no company or title, discarding");
            }
            usable
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApplicationStatus, ListingKey, MatchTier};
    use chrono::{FixedOffset, TimeZone};
    use pretty_assertions::assert_eq;

    fn listing(id: Option<&str>, company: &str, title: &str) -> ListingRecord {
        let now = FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 6, 1, 9, 0, 0)
            .unwrap();
        let mut listing = ListingRecord::new(title, company, now);
        listing.identifier = id.map(String::from);
        listing
    }

    fn signal(id: &str, company: Option<&str>, title: Option<&str>, posting: Option<&str>) -> ApplicationSignal {
        ApplicationSignal {
            source_id: id.into(),
            company: company.map(String::from),
            title: title.map(String::from),
            posting_id: posting.map(String::from),
            observed_at: None,
            subject: String::new(),
        }
    }

    #[test]
    fn test_each_listing_gets_one_annotation() {
        let listings = vec![
            listing(Some("1"), "Acme", "Backend"),
            listing(Some("2"), "Globex", "DevOps"),
            listing(None, "Initech", "QA"),
            listing(None, "Hooli", "Search"),
        ];
        let signals = vec![
            signal("m1", Some("Acme"), None, Some("1")),
            signal("m2", Some("globex"), Some("devops"), None),
            signal("m3", Some("Other"), Some("qa"), None),
        ];

        let annotations = StatusReconciler::new().reconcile(&signals, &listings);
        let statuses: Vec<ApplicationStatus> = annotations.iter().map(|a| a.status).collect();
        assert_eq!(
            statuses,
            vec![
                ApplicationStatus::Applied,
                ApplicationStatus::Applied,
                ApplicationStatus::AppliedInferredByTitle,
                ApplicationStatus::Unapplied,
            ]
        );
        assert_eq!(annotations[0].tier, Some(MatchTier::PostingId));
        assert_eq!(annotations[1].tier, Some(MatchTier::CompanyTitle));
        assert_eq!(annotations[2].signal_id.as_deref(), Some("m3"));
        assert_eq!(annotations[3], StatusAnnotation::unapplied(ListingKey::Row(3)));
    }

    #[test]
    fn test_posting_id_beats_earlier_company_signal() {
        let listings = vec![listing(Some("7"), "Acme", "Backend")];
        let signals = vec![
            signal("company-only", Some("Acme"), None, None),
            signal("by-id", None, Some("전혀 다른 제목"), Some("7")),
        ];
        let annotations = StatusReconciler::new().reconcile(&signals, &listings);
        assert_eq!(annotations[0].tier, Some(MatchTier::PostingId));
        assert_eq!(annotations[0].signal_id.as_deref(), Some("by-id"));
    }

    #[test]
    fn test_duplicate_and_empty_signals_dropped() {
        let listings = vec![listing(Some("9"), "Acme", "Backend")];
        let signals = vec![
            signal("m1", Some("Globex"), None, None),
            signal("m1", Some("Acme"), None, None),
            signal("m2", None, None, Some("9")),
        ];
        let annotations = StatusReconciler::new().reconcile(&signals, &listings);
        assert_eq!(annotations[0].status, ApplicationStatus::Unapplied);
    }
}
