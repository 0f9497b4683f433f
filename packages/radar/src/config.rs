//! Configuration constants, scoring weights and source settings.

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RadarError, Result};

/// Base URL of the recruiting site, used to resolve relative links.
pub const DEFAULT_BASE_URL: &str = "https://www.saramin.co.kr";

/// Search backend returning `{ innerHTML, count }` envelopes.
pub const FEED_API_URL: &str = "https://www.saramin.co.kr/zf_user/search/get-recruit-list";

/// Referer expected by the search backend.
pub const FEED_REFERER: &str = "https://www.saramin.co.kr/zf_user/search";

/// Listings per feed page.
pub const FEED_PAGE_SIZE: u32 = 40;

/// Concurrent feed page requests per batch.
pub const FEED_CONCURRENCY: usize = 4;

/// Upper bound on pages fetched in one run, whatever the declared total.
pub const FEED_MAX_PAGES: u32 = 50;

/// HTTP timeout in seconds, applied per request.
pub const HTTP_TIMEOUT_SECS: u64 = 20;

/// Worker count for detail-page enrichment.
pub const ENRICH_CONCURRENCY: usize = 4;

/// Query parameter carrying the numeric posting id in listing URLs.
pub const ID_QUERY_PARAM: &str = "rec_idx";

/// Default location of the freshness snapshot.
pub const DEFAULT_STATE_PATH: &str = "docs/last_rec_ids.json";

/// Default location of the application signal ledger.
pub const DEFAULT_LEDGER_PATH: &str = "docs/application_status.json";

/// UTC offset of the recruiting site (KST).
pub const SITE_UTC_OFFSET_HOURS: i32 = 9;

/// A month/day more than this many days in the past rolls into next year.
pub const ROLLOVER_WINDOW_DAYS: i64 = 180;

/// Date pattern: YYYY-MM-DD.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));

/// Parse a reference date in YYYY-MM-DD format.
///
/// # Arguments
/// * `date_str` - Date string such as `2025-06-01`
///
/// # Returns
/// The calendar date.
///
/// # Errors
/// Returns `RadarError::InvalidDate` if the string has the wrong shape or
/// names a day that does not exist.
///
/// # Examples
/// ```
/// use recruit_radar::config::parse_date;
///
/// assert!(parse_date("2025-06-01").is_ok());
/// assert!(parse_date("2025-02-30").is_err());
/// assert!(parse_date("06/01").is_err());
/// ```
pub fn parse_date(date_str: &str) -> Result<NaiveDate> {
    if !DATE_PATTERN.is_match(date_str) {
        return Err(RadarError::InvalidDate(date_str.to_string()));
    }
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| RadarError::InvalidDate(date_str.to_string()))
}

/// Current time in the site's timezone.
#[must_use]
pub fn site_now() -> DateTime<FixedOffset> {
    match FixedOffset::east_opt(SITE_UTC_OFFSET_HOURS * 3600) {
        Some(offset) => Utc::now().with_timezone(&offset),
        None => Utc::now().fixed_offset(),
    }
}

/// How an unparsable deadline is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnparsedDeadline {
    /// Same as a deadline beyond the decay horizon (the floor score).
    #[default]
    FarFuture,

    /// Same as an open-ended posting.
    NoDeadline,
}

/// Weights and thresholds of the scoring engine.
///
/// Every field has a default, so a YAML file only needs the values it
/// overrides:
///
/// ```
/// use recruit_radar::config::ScoringConfig;
///
/// let config = ScoringConfig::from_yaml_str("top_k: 10\nsalary_floor: 4000\n").unwrap();
/// assert_eq!(config.top_k, 10);
/// assert_eq!(config.salary_floor, 4000);
/// assert_eq!(config.deadline_3d, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Deadline at most 3 days away.
    pub deadline_3d: i32,
    /// Deadline at most 7 days away.
    pub deadline_7d: i32,
    /// Open-ended posting.
    pub no_deadline: i32,
    /// Decay score for a deadline 0 days out (beyond the 7-day tier).
    pub decay_ceiling: i32,
    /// Decay score at and beyond the horizon.
    pub decay_floor: i32,
    pub decay_horizon_days: i64,
    pub unparsed_deadline: UnparsedDeadline,

    pub fresh_new: i32,
    pub fresh_old: i32,

    pub firm_major: i32,
    pub firm_mid: i32,
    pub major_firm_keywords: Vec<String>,
    pub mid_firm_keywords: Vec<String>,

    pub salary_bonus: i32,
    /// Minimum annual salary (in 10k KRW) for the bonus.
    pub salary_floor: u32,
    pub salary_negotiable_marker: String,

    pub region_bonus: i32,
    /// Empty disables the region component entirely.
    pub preferred_regions: Vec<String>,

    pub top_k: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            deadline_3d: 50,
            deadline_7d: 40,
            no_deadline: 10,
            decay_ceiling: 30,
            decay_floor: 0,
            decay_horizon_days: 30,
            unparsed_deadline: UnparsedDeadline::FarFuture,
            fresh_new: 30,
            fresh_old: -10,
            firm_major: 15,
            firm_mid: 10,
            major_firm_keywords: to_strings(&[
                "대기업", "공기업", "공사", "공단", "그룹", "삼성", "LG", "현대", "롯데", "한화",
                "SK", "카카오", "네이버", "KT", "포스코",
            ]),
            mid_firm_keywords: to_strings(&["중견", "강소", "우량"]),
            salary_bonus: 5,
            salary_floor: 3500,
            salary_negotiable_marker: "협의".to_string(),
            region_bonus: 10,
            preferred_regions: Vec::new(),
            top_k: 5,
        }
    }
}

impl ScoringConfig {
    /// Parse a (partial) YAML scoring config.
    ///
    /// # Arguments
    /// * `yaml` - YAML mapping with any subset of the fields
    ///
    /// # Returns
    /// The defaults with the named fields overridden.
    ///
    /// # Errors
    /// Returns `RadarError::Yaml` for malformed YAML or mistyped fields, and
    /// `RadarError::Config` if [`validate`](Self::validate) rejects the result.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a (partial) YAML scoring config from disk.
    ///
    /// # Errors
    /// Returns `RadarError::Io` if the file cannot be read, otherwise the
    /// errors of [`from_yaml_str`](Self::from_yaml_str).
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject values the engine cannot work with.
    ///
    /// # Errors
    /// Returns `RadarError::Config` for a non-positive decay horizon or a
    /// `top_k` of zero.
    pub fn validate(&self) -> Result<()> {
        if self.decay_horizon_days <= 0 {
            return Err(RadarError::Config(format!(
                "decay_horizon_days must be positive, got {}",
                self.decay_horizon_days
            )));
        }
        if self.top_k == 0 {
            return Err(RadarError::Config("top_k must be at least 1".into()));
        }
        Ok(())
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_preferred_regions(mut self, regions: Vec<String>) -> Self {
        self.preferred_regions = regions;
        self
    }

    pub fn with_unparsed_deadline(mut self, policy: UnparsedDeadline) -> Self {
        self.unparsed_deadline = policy;
        self
    }
}

/// Header synonyms per column role, first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSynonyms {
    pub title: Vec<String>,
    pub company: Vec<String>,
    pub location: Vec<String>,
    pub job_category: Vec<String>,
    pub deadline: Vec<String>,
    pub salary: Vec<String>,
    pub direct_link: Vec<String>,
}

impl Default for HeaderSynonyms {
    fn default() -> Self {
        Self {
            title: to_strings(&["제목", "공고명", "title", "링크", "link"]),
            company: to_strings(&["회사", "회사명", "기업명", "company"]),
            location: to_strings(&["위치", "근무지", "지역", "location"]),
            job_category: to_strings(&["직무", "직종", "category", "job"]),
            deadline: to_strings(&["마감일", "마감", "deadline"]),
            salary: to_strings(&["연봉", "급여", "salary"]),
            direct_link: to_strings(&["바로가기", "링크", "link", "url"]),
        }
    }
}

/// Settings for single-table documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub base_url: String,
    pub synonyms: HeaderSynonyms,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            synonyms: HeaderSynonyms::default(),
        }
    }
}

impl TableConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Settings for the paginated search feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub api_url: String,
    pub referer: String,
    pub base_url: String,
    pub page_size: u32,
    /// Fixed search parameters; the page index and size are added per request.
    pub params: Vec<(String, String)>,
    pub concurrency: usize,
    /// Pause between page batches.
    pub page_delay: Duration,
    pub max_pages: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        let params = [
            ("searchType", "search"),
            ("loc_mcd", "106000,104000,105000,107000,110000,111000"),
            ("cat_kewd", "83,84,85,90,104,108,111,112,114,116"),
            ("company_cd", "0,1,2,3,4,5,6,7,9,10"),
            ("exp_cd", "1"),
            ("exp_none", "y"),
            ("job_type", "1"),
            ("search_optional_item", "y"),
            ("search_done", "y"),
            ("panel_count", "y"),
            ("preview", "y"),
            ("recruitSort", "relation"),
        ];
        Self {
            api_url: FEED_API_URL.to_string(),
            referer: FEED_REFERER.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: FEED_PAGE_SIZE,
            params: params
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            concurrency: FEED_CONCURRENCY,
            page_delay: Duration::from_millis(500),
            max_pages: FEED_MAX_PAGES,
        }
    }
}

impl FeedConfig {
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}
