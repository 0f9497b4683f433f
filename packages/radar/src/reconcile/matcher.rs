//! Tiered listing/signal matching.

use unicode_normalization::UnicodeNormalization;

use crate::types::{ApplicationSignal, ListingRecord, MatchTier};

/// NFC-compose, lowercase and collapse whitespace.
///
/// ```
/// use recruit_radar::reconcile::normalize;
///
/// assert_eq!(normalize("  Backend\t  ENGINEER "), "backend engineer");
/// assert_eq!(normalize("\u{1112}\u{1161}\u{11AB}"), "한");
/// ```
#[must_use]
pub fn normalize(text: &str) -> String {
    let composed: String = text.nfc().collect();
    composed
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Listing fields compared during matching.
#[derive(Debug, Clone)]
pub struct ListingFacts {
    pub identifier: Option<String>,
    pub company: String,
    pub title: String,
}

impl ListingFacts {
    #[must_use]
    pub fn from_listing(listing: &ListingRecord) -> Self {
        Self {
            identifier: listing.identifier.clone(),
            company: normalize(&listing.company),
            title: normalize(&listing.title),
        }
    }
}

/// Signal fields compared during matching. Missing values are empty.
#[derive(Debug, Clone)]
pub struct SignalFacts {
    pub posting_id: Option<String>,
    pub company: String,
    pub title: String,
}

impl SignalFacts {
    #[must_use]
    pub fn from_signal(signal: &ApplicationSignal) -> Self {
        Self {
            posting_id: signal.posting_id.clone(),
            company: signal.company.as_deref().map(normalize).unwrap_or_default(),
            title: signal.title.as_deref().map(normalize).unwrap_or_default(),
        }
    }
}

type Matcher = fn(&ListingFacts, &SignalFacts) -> bool;

/// Matchers in descending confidence.
pub const MATCHERS: [(MatchTier, Matcher); 4] = [
    (MatchTier::PostingId, posting_id_matches),
    (MatchTier::CompanyTitle, pair_matches),
    (MatchTier::Title, title_matches),
    (MatchTier::Company, company_matches),
];

fn posting_id_matches(listing: &ListingFacts, signal: &SignalFacts) -> bool {
    matches!((&listing.identifier, &signal.posting_id), (Some(a), Some(b)) if a == b)
}

fn pair_matches(listing: &ListingFacts, signal: &SignalFacts) -> bool {
    !listing.company.is_empty()
        && !listing.title.is_empty()
        && listing.company == signal.company
        && listing.title == signal.title
}

/// Either string contains the other; empty strings never match.
fn contains_either(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

fn title_matches(listing: &ListingFacts, signal: &SignalFacts) -> bool {
    contains_either(&listing.title, &signal.title)
}

fn company_matches(listing: &ListingFacts, signal: &SignalFacts) -> bool {
    contains_either(&listing.company, &signal.company)
}

/// Strongest match of a listing against `signals`.
///
/// Tiers are tried in order and within a tier the first signal wins.
/// Returns the tier and the index of the matched signal.
#[must_use]
pub fn best_match(listing: &ListingFacts, signals: &[SignalFacts]) -> Option<(MatchTier, usize)> {
    MATCHERS.iter().find_map(|(tier, matches)| {
        signals
            .iter()
            .position(|signal| matches(listing, signal))
            .map(|index| (*tier, index))
    })
}
