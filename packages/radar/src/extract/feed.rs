//! Paginated search feed.
//!
//! The search backend answers each page request with a JSON envelope holding
//! a markup fragment and the comma-formatted total hit count. Up to
//! `concurrency` pages are in flight at once, but results are consumed
//! strictly in page order: the first failed or empty page ends pagination
//! and pages already fetched beyond it are discarded.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use futures::stream::{self, StreamExt};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use super::{dedup_listings, element_text, extract_identifier, LinkResolver};
use crate::config::FeedConfig;
use crate::deadline::resolve_deadline;
use crate::error::Result;
use crate::types::ListingRecord;

/// Total hit count as sent by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FeedCount {
    Number(u64),
    Text(String),
}

/// One page of the search feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FeedEnvelope {
    #[serde(default, alias = "innerHTML")]
    pub fragment: String,

    #[serde(default)]
    pub count: Option<FeedCount>,
}

impl FeedEnvelope {
    /// Declared total number of listings; unparsable counts read as zero.
    ///
    /// # Examples
    /// ```
    /// use recruit_radar::extract::{FeedCount, FeedEnvelope};
    ///
    /// let envelope = FeedEnvelope {
    ///     fragment: String::new(),
    ///     count: Some(FeedCount::Text("1,234".into())),
    /// };
    /// assert_eq!(envelope.total_count(), 1234);
    /// ```
    #[must_use]
    pub fn total_count(&self) -> u64 {
        match &self.count {
            Some(FeedCount::Number(n)) => *n,
            Some(FeedCount::Text(text)) => text.trim().replace(',', "").parse().unwrap_or(0),
            None => 0,
        }
    }
}

/// Fetches feed pages by 1-based index.
///
/// Calls run on tokio's blocking pool, several at once.
pub trait FeedTransport: Send + Sync {
    fn fetch_page(&self, page: u32) -> Result<FeedEnvelope>;
}

struct ItemSelectors {
    item: Selector,
    title: Selector,
    company: Selector,
    conditions: Selector,
    deadline: Selector,
    sector: Selector,
}

impl ItemSelectors {
    #[allow(clippy::expect_used)] // Static selectors that are guaranteed to be valid
    fn new() -> Self {
        Self {
            item: Selector::parse("div.item_recruit").expect("valid selector"),
            title: Selector::parse("h2.job_tit a").expect("valid selector"),
            company: Selector::parse("strong.corp_name a, strong.corp_name").expect("valid selector"),
            conditions: Selector::parse("div.job_condition span").expect("valid selector"),
            deadline: Selector::parse("div.job_date span.date").expect("valid selector"),
            sector: Selector::parse("div.job_sector a").expect("valid selector"),
        }
    }
}

/// Parse one feed fragment into listings, in document order.
///
/// Items without a title link are skipped.
#[must_use]
pub fn parse_feed_fragment(
    fragment: &str,
    resolver: &LinkResolver,
    discovered_at: DateTime<FixedOffset>,
) -> Vec<ListingRecord> {
    let selectors = ItemSelectors::new();
    let document = Html::parse_fragment(fragment);
    let today = discovered_at.date_naive();

    document
        .select(&selectors.item)
        .filter_map(|item| {
            let anchor = item.select(&selectors.title).next()?;
            let url = resolver.resolve(anchor.value().attr("href").unwrap_or_default());

            let first_text = |selector: &Selector| {
                item.select(selector)
                    .next()
                    .map(element_text)
                    .unwrap_or_default()
            };
            let conditions: Vec<String> = item.select(&selectors.conditions).map(element_text).collect();
            let condition = |i: usize| conditions.get(i).cloned().unwrap_or_default();
            let deadline_raw = first_text(&selectors.deadline);

            let mut listing = ListingRecord::new(
                element_text(anchor),
                first_text(&selectors.company),
                discovered_at,
            );
            listing.identifier = extract_identifier(&url).or_else(|| value_identifier(item));
            listing.location = condition(0);
            listing.career = condition(1);
            listing.education = condition(2);
            listing.job_category = item
                .select(&selectors.sector)
                .map(element_text)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            listing.deadline = resolve_deadline(&deadline_raw, today);
            listing.deadline_raw = deadline_raw;
            listing.url = url;
            Some(listing)
        })
        .collect()
}

/// Numeric `value` attribute of a feed item, used when the URL has no id.
fn value_identifier(item: ElementRef<'_>) -> Option<String> {
    item.value()
        .attr("value")
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit()))
        .map(String::from)
}

/// Fetch one page on the blocking pool.
async fn fetch_page<T: FeedTransport + 'static>(transport: Arc<T>, page: u32) -> Result<FeedEnvelope> {
    tokio::task::spawn_blocking(move || transport.fetch_page(page)).await?
}

/// Fetch and parse the whole feed.
///
/// Stops at the first page that fails or yields no listings, or once the
/// declared total is exhausted. A failure is indistinguishable from
/// legitimate exhaustion to the caller; it is only logged.
///
/// Once the first `concurrency` follow-up pages are in flight, every
/// freed slot waits `page_delay` before its next request.
pub async fn extract_feed<T: FeedTransport + 'static>(
    transport: Arc<T>,
    config: &FeedConfig,
    discovered_at: DateTime<FixedOffset>,
) -> Vec<ListingRecord> {
    let resolver = LinkResolver::new(&config.base_url);

    let first = match fetch_page(Arc::clone(&transport), 1).await {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(page = 1, error = %e, "Feed page failed, treating as end of pagination");
            return Vec::new();
        }
    };

    let mut listings = parse_feed_fragment(&first.fragment, &resolver, discovered_at);
    if listings.is_empty() {
        tracing::debug!("First feed page is empty");
        return listings;
    }

    let total = first.total_count();
    let page_size = u64::from(config.page_size.max(1));
    let page_count = u32::try_from(total.div_ceil(page_size))
        .unwrap_or(u32::MAX)
        .min(config.max_pages);
    tracing::debug!(total, page_count, "Feed pagination");

    let concurrency = config.concurrency.max(1);
    let first_refill = u32::try_from(concurrency)
        .unwrap_or(u32::MAX)
        .saturating_add(2);

    let mut pages = stream::iter(2..=page_count)
        .map(|page| {
            let transport = Arc::clone(&transport);
            let delay = if page >= first_refill {
                config.page_delay
            } else {
                Duration::ZERO
            };
            async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                (page, fetch_page(transport, page).await)
            }
        })
        .buffered(concurrency);

    while let Some((page, result)) = pages.next().await {
        match result {
            Ok(envelope) => {
                let parsed = parse_feed_fragment(&envelope.fragment, &resolver, discovered_at);
                if parsed.is_empty() {
                    tracing::debug!(page, "Empty feed page, stopping");
                    break;
                }
                listings.extend(parsed);
            }
            Err(e) => {
                tracing::warn!(page, error = %e, "Feed page failed, treating as end of pagination");
                break;
            }
        }
    }

    dedup_listings(listings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RadarError;
    use crate::types::DeadlineStatus;
    use chrono::{NaiveDate, TimeZone};
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 6, 1, 9, 0, 0)
            .unwrap()
    }

    fn item(id: u32, title: &str) -> String {
        format!(
            r#"<div class="item_recruit" value="{id}">
  <div class="area_job">
    <h2 class="job_tit"><a href="/zf_user/jobs/relay/view?view_type=search&rec_idx={id}" title="{title}"><span>{title}</span></a></h2>
    <div class="job_date"><span class="date">~ 06/05(목)</span></div>
    <div class="job_condition">
      <span><a>부산</a> <a>해운대구</a></span><span>신입</span><span>대졸↑</span><span>정규직</span>
    </div>
    <div class="job_sector"><a>데이터엔지니어</a>, <a>Python</a><span class="job_day">등록일 25/05/30</span></div>
  </div>
  <div class="area_corp"><strong class="corp_name"><a href="/zf_user/company-info">(주)한화시스템</a></strong></div>
</div>"#
        )
    }

    fn page(ids: &[u32], count: &str) -> FeedEnvelope {
        FeedEnvelope {
            fragment: ids.iter().map(|id| item(*id, &format!("job {id}"))).collect(),
            count: Some(FeedCount::Text(count.to_string())),
        }
    }

    struct FakeTransport {
        pages: HashMap<u32, Result<FeedEnvelope>>,
        requested: Mutex<Vec<u32>>,
    }

    impl FakeTransport {
        fn new(pages: Vec<(u32, Result<FeedEnvelope>)>) -> Arc<Self> {
            Arc::new(Self {
                pages: pages.into_iter().collect(),
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    impl FeedTransport for FakeTransport {
        fn fetch_page(&self, page: u32) -> Result<FeedEnvelope> {
            self.requested.lock().unwrap().push(page);
            match self.pages.get(&page) {
                Some(Ok(envelope)) => Ok(envelope.clone()),
                Some(Err(e)) => Err(RadarError::InvalidFeedResponse(e.to_string())),
                None => Ok(FeedEnvelope::default()),
            }
        }
    }

    fn config(page_size: u32, concurrency: usize) -> FeedConfig {
        FeedConfig {
            page_size,
            ..FeedConfig::default()
        }
        .with_concurrency(concurrency)
        .with_page_delay(Duration::ZERO)
    }

    fn ids(listings: &[ListingRecord]) -> Vec<&str> {
        listings
            .iter()
            .map(|l| l.identifier.as_deref().unwrap_or("-"))
            .collect()
    }

    #[test]
    fn test_parse_feed_item_fields() {
        let resolver = LinkResolver::new("https://www.saramin.co.kr");
        let listings = parse_feed_fragment(&item(51234567, "데이터 엔지니어"), &resolver, now());
        assert_eq!(listings.len(), 1);

        let listing = &listings[0];
        assert_eq!(listing.identifier.as_deref(), Some("51234567"));
        assert_eq!(listing.title, "데이터 엔지니어");
        assert_eq!(listing.company, "(주)한화시스템");
        assert_eq!(listing.location, "부산 해운대구");
        assert_eq!(listing.career, "신입");
        assert_eq!(listing.education, "대졸↑");
        assert_eq!(listing.job_category, "데이터엔지니어, Python");
        assert_eq!(listing.deadline_raw, "~ 06/05(목)");
        assert_eq!(
            listing.deadline,
            Some(DeadlineStatus::Date(NaiveDate::from_ymd_opt(2025, 6, 5).unwrap()))
        );
        assert_eq!(
            listing.url,
            "https://www.saramin.co.kr/zf_user/jobs/relay/view?view_type=search&rec_idx=51234567"
        );
        assert_eq!(listing.salary_text, "");
    }

    #[test]
    fn test_value_attribute_identifier_fallback() {
        let fragment = r#"<div class="item_recruit" value="777">
            <h2 class="job_tit"><a href="/jobs/777">X</a></h2></div>
            <div class="item_recruit" value="abc">
            <h2 class="job_tit"><a href="/jobs/abc">Y</a></h2></div>
            <div class="item_recruit"><h2 class="job_tit">no link</h2></div>"#;
        let resolver = LinkResolver::new("https://www.saramin.co.kr");
        let listings = parse_feed_fragment(fragment, &resolver, now());
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].identifier.as_deref(), Some("777"));
        assert_eq!(listings[1].identifier, None);
    }

    #[test]
    fn test_envelope_accepts_inner_html_and_numeric_count() {
        let envelope: FeedEnvelope =
            serde_json::from_str(r#"{"innerHTML": "<div></div>", "count": 81}"#).unwrap();
        assert_eq!(envelope.fragment, "<div></div>");
        assert_eq!(envelope.total_count(), 81);

        let envelope: FeedEnvelope =
            serde_json::from_str(r#"{"fragment": "", "count": "n/a"}"#).unwrap();
        assert_eq!(envelope.total_count(), 0);
    }

    #[tokio::test]
    async fn test_pages_concatenated_in_order() {
        let transport = FakeTransport::new(vec![
            (1, Ok(page(&[1, 2], "5"))),
            (2, Ok(page(&[3, 4], "5"))),
            (3, Ok(page(&[5], "5"))),
        ]);
        let listings = extract_feed(Arc::clone(&transport), &config(2, 4), now()).await;
        assert_eq!(ids(&listings), vec!["1", "2", "3", "4", "5"]);
    }

    #[tokio::test]
    async fn test_stops_at_declared_total() {
        let transport = FakeTransport::new(vec![
            (1, Ok(page(&[1, 2], "4"))),
            (2, Ok(page(&[3, 4], "4"))),
            (3, Ok(page(&[99], "4"))),
        ]);
        let listings = extract_feed(Arc::clone(&transport), &config(2, 1), now()).await;
        assert_eq!(ids(&listings), vec!["1", "2", "3", "4"]);
        assert!(!transport.requested.lock().unwrap().contains(&3));
    }

    #[tokio::test]
    async fn test_failed_page_ends_pagination() {
        let transport = FakeTransport::new(vec![
            (1, Ok(page(&[1], "4"))),
            (2, Err(RadarError::InvalidFeedResponse("timeout".into()))),
            (3, Ok(page(&[3], "4"))),
            (4, Ok(page(&[4], "4"))),
        ]);
        // Pages 3 and 4 may already be fetched; results after the failure are dropped.
        let listings = extract_feed(Arc::clone(&transport), &config(1, 3), now()).await;
        assert_eq!(ids(&listings), vec!["1"]);
    }

    #[tokio::test]
    async fn test_empty_page_ends_pagination() {
        let transport = FakeTransport::new(vec![
            (1, Ok(page(&[1], "3"))),
            (2, Ok(page(&[], "3"))),
            (3, Ok(page(&[3], "3"))),
        ]);
        let listings = extract_feed(Arc::clone(&transport), &config(1, 1), now()).await;
        assert_eq!(ids(&listings), vec!["1"]);
        assert_eq!(*transport.requested.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_first_page_failure_yields_nothing() {
        let transport = FakeTransport::new(vec![(
            1,
            Err(RadarError::InvalidFeedResponse("boom".into())),
        )]);
        assert!(extract_feed(Arc::clone(&transport), &config(40, 4), now()).await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicates_across_pages_keep_first() {
        let transport = FakeTransport::new(vec![
            (1, Ok(page(&[1, 2], "4"))),
            (2, Ok(page(&[2, 3], "4"))),
        ]);
        let listings = extract_feed(Arc::clone(&transport), &config(2, 2), now()).await;
        assert_eq!(ids(&listings), vec!["1", "2", "3"]);
        assert_eq!(listings[1].title, "job 2");
    }

    #[tokio::test]
    async fn test_max_pages_cap() {
        let transport = FakeTransport::new(vec![
            (1, Ok(page(&[1], "1,000"))),
            (2, Ok(page(&[2], "1,000"))),
            (3, Ok(page(&[3], "1,000"))),
        ]);
        let config = FeedConfig {
            max_pages: 2,
            ..config(1, 4)
        };
        let listings = extract_feed(Arc::clone(&transport), &config, now()).await;
        assert_eq!(ids(&listings), vec!["1", "2"]);
    }
}
