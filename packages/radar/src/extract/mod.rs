//! Listing extraction from search result markup.
//!
//! Two source shapes are supported:
//! - [`table`]: a single HTML table whose header cells name the columns
//! - [`feed`]: the paginated search backend returning markup fragments
//!
//! Both produce [`ListingRecord`]s deduplicated by [`dedup_listings`].

pub mod feed;
pub mod table;

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;
use url::Url;

use crate::config::ID_QUERY_PARAM;
use crate::types::ListingRecord;

pub use feed::{extract_feed, parse_feed_fragment, FeedCount, FeedEnvelope, FeedTransport};
pub use table::{extract_table, ColumnMap, ColumnRole};

/// Matches the numeric posting id query parameter.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"[?&]{ID_QUERY_PARAM}=(\d+)")).expect("valid regex")
});

/// Pull the numeric posting id out of a listing URL.
///
/// # Examples
/// ```
/// use recruit_radar::extract::extract_identifier;
///
/// assert_eq!(
///     extract_identifier("https://www.saramin.co.kr/zf_user/jobs/relay/view?view_type=search&rec_idx=51234567"),
///     Some("51234567".to_string())
/// );
/// assert_eq!(extract_identifier("https://example.com/jobs/1"), None);
/// ```
#[must_use]
pub fn extract_identifier(url: &str) -> Option<String> {
    ID_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Resolves listing hrefs against the site's base URL.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    base: Option<Url>,
}

impl LinkResolver {
    /// Create a resolver; an unparsable base leaves relative links as-is.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        let base = match Url::parse(base_url) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(base_url, error = %e, "Invalid base URL, relative links stay relative");
                None
            }
        };
        Self { base }
    }

    /// Make `href` absolute. Empty input yields an empty string.
    #[must_use]
    pub fn resolve(&self, href: &str) -> String {
        let href = href.trim();
        if href.is_empty() || href.starts_with("http://") || href.starts_with("https://") {
            return href.to_string();
        }
        match self.base.as_ref().map(|base| base.join(href)) {
            Some(Ok(url)) => url.to_string(),
            _ => href.to_string(),
        }
    }
}

/// Deduplicate listings by identifier, else URL, keeping the first occurrence.
///
/// Listings with neither key are always kept.
#[must_use]
pub fn dedup_listings(listings: Vec<ListingRecord>) -> Vec<ListingRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let before = listings.len();

    let unique: Vec<ListingRecord> = listings
        .into_iter()
        .filter(|listing| match listing.dedup_key() {
            Some(key) => seen.insert(key.to_string()),
            None => true,
        })
        .collect();

    if unique.len() < before {
        tracing::debug!(dropped = before - unique.len(), "Removed duplicate listings");
    }
    unique
}

/// Visible text of an element with runs of whitespace collapsed.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
