//! Core data types for the radar.
//!
//! Listings are recreated on every run; the optional numeric identifier is
//! the only thing that ties a listing to earlier runs.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Resolved deadline of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "date")]
pub enum DeadlineStatus {
    /// A concrete closing date.
    Date(NaiveDate),

    /// Open-ended posting ("rolling", "상시채용", ...).
    Open,
}

impl DeadlineStatus {
    /// Days from `today` until the deadline; `None` for open postings.
    #[must_use]
    pub fn days_from(&self, today: NaiveDate) -> Option<i64> {
        match self {
            Self::Date(date) => Some((*date - today).num_days()),
            Self::Open => None,
        }
    }
}

/// A single job posting extracted from a table or feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Numeric record id, stable across runs when present.
    pub identifier: Option<String>,

    pub title: String,

    pub company: String,

    pub location: String,

    pub job_category: String,

    /// Required experience, as shown in the feed's condition line.
    #[serde(default)]
    pub career: String,

    /// Required education, as shown in the feed's condition line.
    #[serde(default)]
    pub education: String,

    /// Deadline text exactly as it appeared in the source.
    pub deadline_raw: String,

    /// `None` when the deadline text could not be parsed.
    pub deadline: Option<DeadlineStatus>,

    pub salary_text: String,

    /// Absolute URL of the posting (may be empty).
    pub url: String,

    pub discovered_at: DateTime<FixedOffset>,
}

impl ListingRecord {
    /// Create a listing with only a title and company set.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        company: impl Into<String>,
        discovered_at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            identifier: None,
            title: title.into(),
            company: company.into(),
            location: String::new(),
            job_category: String::new(),
            career: String::new(),
            education: String::new(),
            deadline_raw: String::new(),
            deadline: None,
            salary_text: String::new(),
            url: String::new(),
            discovered_at,
        }
    }

    /// Key used for deduplication: the identifier, else the URL.
    ///
    /// Returns `None` when the listing has neither.
    #[must_use]
    pub fn dedup_key(&self) -> Option<&str> {
        self.identifier
            .as_deref()
            .or_else(|| Some(self.url.as_str()).filter(|u| !u.is_empty()))
    }

    /// Stable key for annotations, falling back to the row position.
    #[must_use]
    pub fn key(&self, row: usize) -> ListingKey {
        match (&self.identifier, self.url.is_empty()) {
            (Some(id), _) => ListingKey::Identifier(id.clone()),
            (None, false) => ListingKey::Url(self.url.clone()),
            (None, true) => ListingKey::Row(row),
        }
    }
}

/// Identifies a listing in reconciliation output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ListingKey {
    Identifier(String),
    Url(String),
    Row(usize),
}

impl std::fmt::Display for ListingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identifier(id) => write!(f, "#{id}"),
            Self::Url(url) => f.write_str(url),
            Self::Row(row) => write!(f, "row {row}"),
        }
    }
}

/// Whether a listing was absent from the previous run's snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    New,
    Old,
}

/// Additive score components of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub deadline: i32,
    pub freshness: i32,
    pub firm: i32,
    pub salary: i32,

    /// Absent when no preferred regions are configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<i32>,

    pub total: i32,
}

impl ScoreBreakdown {
    /// Build a breakdown; the total is the sum of the present components.
    #[must_use]
    pub fn new(deadline: i32, freshness: i32, firm: i32, salary: i32, region: Option<i32>) -> Self {
        Self {
            deadline,
            freshness,
            firm,
            salary,
            region,
            total: deadline + freshness + firm + salary + region.unwrap_or(0),
        }
    }
}

/// A listing paired with its score, as handed to renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedListing {
    pub listing: ListingRecord,
    pub score: ScoreBreakdown,
}

/// Evidence that an application was submitted, inferred from a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSignal {
    /// Id of the message the signal came from.
    pub source_id: String,

    pub company: Option<String>,

    pub title: Option<String>,

    /// Posting identifier mentioned in the message.
    pub posting_id: Option<String>,

    pub observed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub subject: String,
}

/// Inferred application status of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Unapplied,
    Applied,
    AppliedInferredByTitle,
    AppliedInferredByCompany,
}

impl ApplicationStatus {
    /// Label shown in the status column of the rendered table.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unapplied => "미지원",
            Self::Applied => "지원완료",
            Self::AppliedInferredByTitle => "지원완료(제목추정)",
            Self::AppliedInferredByCompany => "지원완료(회사추정)",
        }
    }
}

/// Confidence tier of a reconciliation match, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    PostingId,
    CompanyTitle,
    Title,
    Company,
}

impl MatchTier {
    /// Status implied by a match at this tier.
    #[must_use]
    pub fn status(&self) -> ApplicationStatus {
        match self {
            Self::PostingId | Self::CompanyTitle => ApplicationStatus::Applied,
            Self::Title => ApplicationStatus::AppliedInferredByTitle,
            Self::Company => ApplicationStatus::AppliedInferredByCompany,
        }
    }
}

/// Reconciliation result for one listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusAnnotation {
    pub listing_key: ListingKey,
    pub status: ApplicationStatus,

    /// Tier that produced the match; `None` for unapplied listings.
    pub tier: Option<MatchTier>,

    /// `source_id` of the matched signal.
    pub signal_id: Option<String>,
}

impl StatusAnnotation {
    /// Annotation for a listing no signal matched.
    #[must_use]
    pub fn unapplied(listing_key: ListingKey) -> Self {
        Self {
            listing_key,
            status: ApplicationStatus::Unapplied,
            tier: None,
            signal_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 6, 1, 9, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_dedup_key_prefers_identifier() {
        let mut listing = ListingRecord::new("Backend", "Acme", now());
        listing.url = "https://example.com/view?rec_idx=1".to_string();
        listing.identifier = Some("1".to_string());
        assert_eq!(listing.dedup_key(), Some("1"));

        listing.identifier = None;
        assert_eq!(
            listing.dedup_key(),
            Some("https://example.com/view?rec_idx=1")
        );

        listing.url.clear();
        assert_eq!(listing.dedup_key(), None);
    }

    #[test]
    fn test_listing_key_fallbacks() {
        let mut listing = ListingRecord::new("Backend", "Acme", now());
        assert_eq!(listing.key(4), ListingKey::Row(4));

        listing.url = "https://example.com/a".to_string();
        assert_eq!(listing.key(4), ListingKey::Url("https://example.com/a".into()));

        listing.identifier = Some("77".to_string());
        assert_eq!(listing.key(4), ListingKey::Identifier("77".into()));
    }

    #[test]
    fn test_score_breakdown_total_skips_absent_region() {
        let score = ScoreBreakdown::new(50, 30, 15, 5, None);
        assert_eq!(score.total, 100);

        let score = ScoreBreakdown::new(50, -10, 0, 0, Some(10));
        assert_eq!(score.total, 50);
    }

    #[test]
    fn test_score_breakdown_serialization_omits_region() {
        let json = serde_json::to_string(&ScoreBreakdown::new(1, 2, 3, 4, None)).unwrap();
        assert!(!json.contains("region"));
        assert!(json.contains("\"total\":10"));
    }

    #[test]
    fn test_deadline_days_from() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let date = DeadlineStatus::Date(NaiveDate::from_ymd_opt(2025, 6, 4).unwrap());
        assert_eq!(date.days_from(today), Some(3));
        assert_eq!(DeadlineStatus::Open.days_from(today), None);
    }

    #[test]
    fn test_match_tier_status() {
        assert_eq!(MatchTier::PostingId.status(), ApplicationStatus::Applied);
        assert_eq!(MatchTier::CompanyTitle.status(), ApplicationStatus::Applied);
        assert_eq!(
            MatchTier::Title.status(),
            ApplicationStatus::AppliedInferredByTitle
        );
        assert_eq!(
            MatchTier::Company.status(),
            ApplicationStatus::AppliedInferredByCompany
        );
        assert!(MatchTier::PostingId < MatchTier::Company);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(ApplicationStatus::Unapplied.label(), "미지원");
        assert_eq!(ApplicationStatus::Applied.label(), "지원완료");
    }
}
