//! Detail-page enrichment.
//!
//! Feed items carry no salary and only a partial job category. When enabled,
//! detail pages are fetched a few at a time and the `<dt>/<dd>` summary
//! pairs fill whatever fields are still empty. A failed fetch leaves the
//! listing untouched.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::extract::element_text;
use crate::http::{bytes_to_string, create_client, download_bytes};
use crate::types::ListingRecord;

const SALARY_LABELS: &[&str] = &["급여", "연봉", "salary"];
const CATEGORY_LABELS: &[&str] = &["직무", "직종", "모집분야", "job category"];

/// Fetches a listing's detail page markup.
///
/// Calls run on tokio's blocking pool, several at once.
pub trait DetailFetcher: Send + Sync {
    fn fetch_detail(&self, url: &str) -> Result<String>;
}

/// Detail fetcher using the retrying blocking HTTP client.
pub struct HttpDetailFetcher {
    client: Client,
}

impl HttpDetailFetcher {
    /// # Errors
    /// Returns `RadarError::Http` if the client cannot be built.
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: create_client()?,
        })
    }
}

impl DetailFetcher for HttpDetailFetcher {
    fn fetch_detail(&self, url: &str) -> Result<String> {
        let bytes = download_bytes(&self.client, url)?;
        Ok(bytes_to_string(&bytes, url))
    }
}

/// Optional fields found on a detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingDetail {
    pub salary: Option<String>,
    pub job_category: Option<String>,
}

/// Read salary and job category from `<dt>label</dt><dd>value</dd>` pairs.
#[must_use]
pub fn parse_detail(html: &str) -> ListingDetail {
    #[allow(clippy::expect_used)] // Static selector that is guaranteed to be valid
    let term = Selector::parse("dt").expect("valid selector");
    let document = Html::parse_document(html);
    let mut detail = ListingDetail::default();

    for dt in document.select(&term) {
        let label = element_text(dt).to_lowercase();
        let Some(value) = definition_of(dt) else {
            continue;
        };

        if detail.salary.is_none() && SALARY_LABELS.iter().any(|l| label.contains(l)) {
            detail.salary = Some(value);
        } else if detail.job_category.is_none() && CATEGORY_LABELS.iter().any(|l| label.contains(l))
        {
            detail.job_category = Some(value);
        }
    }

    detail
}

/// Text of the `<dd>` directly following a `<dt>`.
fn definition_of(dt: ElementRef<'_>) -> Option<String> {
    dt.next_siblings()
        .filter_map(ElementRef::wrap)
        .next()
        .filter(|el| el.value().name() == "dd")
        .map(element_text)
        .filter(|text| !text.is_empty())
}

fn needs_detail(listing: &ListingRecord) -> bool {
    !listing.url.is_empty() && (listing.salary_text.is_empty() || listing.job_category.is_empty())
}

async fn fetch_detail(fetcher: Arc<dyn DetailFetcher>, url: String) -> Result<ListingDetail> {
    let html = tokio::task::spawn_blocking(move || fetcher.fetch_detail(&url)).await??;
    Ok(parse_detail(&html))
}

/// Fill empty salary and category fields from detail pages.
///
/// Runs at most `concurrency` fetches at a time. Returns the number of
/// listings that gained at least one field.
pub async fn enrich_listings(
    listings: &mut [ListingRecord],
    fetcher: Arc<dyn DetailFetcher>,
    concurrency: usize,
) -> usize {
    let targets: Vec<(usize, String)> = listings
        .iter()
        .enumerate()
        .filter(|(_, listing)| needs_detail(listing))
        .map(|(i, listing)| (i, listing.url.clone()))
        .collect();
    let requested = targets.len();

    let results: Vec<(usize, String, Result<ListingDetail>)> = stream::iter(targets)
        .map(|(index, url)| {
            let fetcher = Arc::clone(&fetcher);
            async move {
                let result = fetch_detail(fetcher, url.clone()).await;
                (index, url, result)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut enriched = 0;
    for (index, url, result) in results {
        let detail = match result {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Detail enrichment failed, keeping listing as-is");
                continue;
            }
        };

        let listing = &mut listings[index];
        let mut changed = false;
        if let Some(salary) = detail.salary.filter(|_| listing.salary_text.is_empty()) {
            listing.salary_text = salary;
            changed = true;
        }
        if let Some(category) = detail.job_category.filter(|_| listing.job_category.is_empty()) {
            listing.job_category = category;
            changed = true;
        }
        if changed {
            enriched += 1;
        }
    }

    tracing::debug!(requested, enriched, "Detail enrichment finished");
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RadarError;
    use chrono::{FixedOffset, TimeZone};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const DETAIL_PAGE: &str = r#"<html><body>
<div class="jv_summary"><div class="cont">
  <dl><dt>경력</dt><dd>신입</dd></dl>
  <dl><dt>급여</dt><dd>3,800만원 <em>상세보기</em></dd></dl>
  <dl><dt>직무</dt><dd>데이터 엔지니어</dd></dl>
</div></div>
</body></html>"#;

    #[derive(Default)]
    struct FakeFetcher {
        calls: AtomicUsize,
        in_flight: Mutex<HashSet<String>>,
        max_in_flight: AtomicUsize,
    }

    impl DetailFetcher for FakeFetcher {
        fn fetch_detail(&self, url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            {
                let mut in_flight = self.in_flight.lock().unwrap();
                in_flight.insert(url.to_string());
                self.max_in_flight.fetch_max(in_flight.len(), Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(20));
            self.in_flight.lock().unwrap().remove(url);

            if url.contains("broken") {
                return Err(RadarError::RetriesExhausted {
                    attempts: 3,
                    message: "timeout".into(),
                });
            }
            Ok(DETAIL_PAGE.to_string())
        }
    }

    fn listing(url: &str) -> ListingRecord {
        let now = FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 6, 1, 9, 0, 0)
            .unwrap();
        let mut listing = ListingRecord::new("Engineer", "Acme", now);
        listing.url = url.to_string();
        listing
    }

    #[test]
    fn test_parse_detail_pairs() {
        let detail = parse_detail(DETAIL_PAGE);
        assert_eq!(detail.salary.as_deref(), Some("3,800만원 상세보기"));
        assert_eq!(detail.job_category.as_deref(), Some("데이터 엔지니어"));
    }

    #[test]
    fn test_parse_detail_without_pairs() {
        assert_eq!(parse_detail("<p>closed</p>"), ListingDetail::default());
    }

    #[tokio::test]
    async fn test_enrich_fills_empty_fields_only() {
        let mut listings = vec![listing("https://a/1"), listing("https://a/2")];
        listings[1].job_category = "보안".to_string();
        let fetcher = Arc::new(FakeFetcher::default());

        let enriched = enrich_listings(&mut listings, fetcher, 4).await;
        assert_eq!(enriched, 2);
        assert_eq!(listings[0].job_category, "데이터 엔지니어");
        assert_eq!(listings[1].job_category, "보안");
        assert_eq!(listings[1].salary_text, "3,800만원 상세보기");
    }

    #[tokio::test]
    async fn test_failed_fetch_degrades_to_empty_fields() {
        let mut listings = vec![listing("https://a/broken"), listing("https://a/ok")];
        let fetcher = Arc::new(FakeFetcher::default());

        let enriched = enrich_listings(&mut listings, fetcher, 2).await;
        assert_eq!(enriched, 1);
        assert_eq!(listings[0].salary_text, "");
        assert_eq!(listings[1].job_category, "데이터 엔지니어");
    }

    #[tokio::test]
    async fn test_skips_listings_without_url_or_missing_fields() {
        let mut complete = listing("https://a/1");
        complete.salary_text = "협의".into();
        complete.job_category = "개발".into();
        let mut listings = vec![listing(""), complete];
        let fetcher = Arc::new(FakeFetcher::default());

        assert_eq!(enrich_listings(&mut listings, fetcher.clone(), 4).await, 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_are_capped() {
        let mut listings: Vec<ListingRecord> =
            (0..8).map(|i| listing(&format!("https://a/{i}"))).collect();
        let fetcher = Arc::new(FakeFetcher::default());

        let enriched = enrich_listings(&mut listings, fetcher.clone(), 3).await;
        assert_eq!(enriched, 8);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 8);
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 3);
    }
}
