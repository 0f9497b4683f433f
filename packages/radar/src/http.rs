//! HTTP client wrapper for the recruiting site.
//!
//! The search backend throttles bursts with `429` and `503` responses that
//! carry a `Retry-After` header. Those, other server errors and dropped
//! connections are retried on a [`RetryPolicy`]. Any other client error
//! fails at once.

use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER, RETRY_AFTER};
use reqwest::StatusCode;
use url::Url;

use crate::config::{FeedConfig, HTTP_TIMEOUT_SECS};
use crate::error::{RadarError, Result};
use crate::extract::{FeedEnvelope, FeedTransport};

/// Browser-like user agent; the search backend rejects unknown clients.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Default number of attempts for transient failures.
pub const MAX_RETRIES: u32 = 3;

/// Retry schedule for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first request.
    pub attempts: u32,

    /// Wait before the first retry; doubled for each further retry.
    pub base_delay: Duration,

    /// Upper bound for any wait, including a server's `Retry-After`.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: MAX_RETRIES,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based): base, 2x base, 4x base.
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    /// use recruit_radar::http::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.backoff(1), Duration::from_millis(500));
    /// assert_eq!(policy.backoff(3), Duration::from_millis(2000));
    /// ```
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Create a configured HTTP client.
///
/// # Returns
/// A `reqwest::blocking::Client` with the site timeout and a browser user agent.
///
/// # Errors
/// Returns `RadarError::Http` if the TLS backend cannot be initialised.
pub fn create_client() -> Result<Client> {
    create_client_with_headers(HeaderMap::new())
}

/// Create a client sending `headers` with every request.
///
/// # Arguments
/// * `headers` - Default headers added to each request
///
/// # Errors
/// Returns `RadarError::Http` if the client cannot be built.
pub fn create_client_with_headers(headers: HeaderMap) -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// What to do after one request.
enum Verdict {
    Done(Vec<u8>),
    Retry { reason: String, wait: Option<Duration> },
    Fail(RadarError),
}

/// Seconds from a `Retry-After` header; HTTP-date values are ignored.
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn judge(outcome: reqwest::Result<Response>, url: &str) -> Verdict {
    let response = match outcome {
        Ok(response) => response,
        Err(e) if e.is_connect() || e.is_timeout() => {
            return Verdict::Retry {
                reason: e.to_string(),
                wait: None,
            }
        }
        Err(e) => return Verdict::Fail(RadarError::Http(e)),
    };

    let status = response.status();
    if status.is_success() {
        return match response.bytes() {
            Ok(bytes) => Verdict::Done(bytes.to_vec()),
            Err(e) if e.is_timeout() => Verdict::Retry {
                reason: e.to_string(),
                wait: None,
            },
            Err(e) => Verdict::Fail(RadarError::Http(e)),
        };
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => Verdict::Retry {
            reason: format!("Throttled: {status}"),
            wait: retry_after(&response),
        },
        StatusCode::REQUEST_TIMEOUT => Verdict::Retry {
            reason: format!("Request timeout: {status}"),
            wait: None,
        },
        s if s.is_server_error() => Verdict::Retry {
            reason: format!("Server error: {status}"),
            wait: None,
        },
        _ => Verdict::Fail(RadarError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        }),
    }
}

/// Download a URL with the default [`RetryPolicy`].
///
/// # Arguments
/// * `client` - HTTP client to use
/// * `url` - URL to download from
///
/// # Returns
/// Raw bytes of the response body
///
/// # Errors
/// See [`download_with_policy`].
pub fn download_bytes(client: &Client, url: &str) -> Result<Vec<u8>> {
    download_with_policy(client, url, &RetryPolicy::default())
}

/// Download a URL, retrying throttling, server errors and dropped connections.
///
/// A throttled response's `Retry-After` replaces the exponential backoff for
/// the next attempt, capped at `policy.max_delay`.
///
/// # Arguments
/// * `client` - HTTP client to use
/// * `url` - URL to download from
/// * `policy` - Attempt count and backoff schedule
///
/// # Returns
/// Raw bytes of the response body
///
/// # Errors
/// - `RadarError::HttpStatus` for a client error other than 408 or 429
/// - `RadarError::Http` for a request that cannot be sent at all
/// - `RadarError::RetriesExhausted` once every attempt failed transiently
pub fn download_with_policy(client: &Client, url: &str, policy: &RetryPolicy) -> Result<Vec<u8>> {
    let attempts = policy.attempts.max(1);
    let mut last_reason = String::from("no attempt made");

    for attempt in 1..=attempts {
        match judge(client.get(url).send(), url) {
            Verdict::Done(bytes) => return Ok(bytes),
            Verdict::Fail(e) => return Err(e),
            Verdict::Retry { reason, wait } => {
                if attempt == attempts {
                    last_reason = reason;
                    break;
                }
                let delay = wait.map_or_else(|| policy.backoff(attempt), |w| w.min(policy.max_delay));
                tracing::warn!(
                    url,
                    attempt,
                    attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    reason = %reason,
                    "Transient fetch failure, backing off"
                );
                last_reason = reason;
                thread::sleep(delay);
            }
        }
    }

    Err(RadarError::RetriesExhausted {
        attempts,
        message: last_reason,
    })
}

/// Decode a response body, replacing invalid UTF-8.
#[must_use]
pub fn bytes_to_string(bytes: &[u8], context: &str) -> String {
    match String::from_utf8(bytes.to_vec()) {
        Ok(text) => text,
        Err(_) => {
            tracing::warn!(context, "Response is not valid UTF-8, replacing invalid bytes");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Feed transport backed by the live search backend.
pub struct HttpFeedTransport {
    client: Client,
    config: FeedConfig,
    retry: RetryPolicy,
}

impl HttpFeedTransport {
    /// Create a transport sending the headers the backend expects.
    ///
    /// # Arguments
    /// * `config` - Endpoint, referer and search parameters
    ///
    /// # Errors
    /// Returns `RadarError::Config` for a referer that is not a valid header
    /// value, or `RadarError::Http` if the client cannot be built.
    pub fn new(config: FeedConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/javascript, */*"));
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        let referer = HeaderValue::from_str(&config.referer)
            .map_err(|e| RadarError::Config(format!("invalid referer: {e}")))?;
        headers.insert(REFERER, referer);

        Ok(Self {
            client: create_client_with_headers(headers)?,
            config,
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// URL of a 1-based feed page.
    ///
    /// # Errors
    /// Returns `RadarError::InvalidUrl` if the configured endpoint is not a URL.
    pub fn page_url(&self, page: u32) -> Result<String> {
        page_url(&self.config, page)
    }
}

/// Build the URL of a 1-based feed page from the fixed search parameters.
///
/// # Arguments
/// * `config` - Endpoint, page size and fixed query parameters
/// * `page` - 1-based page index
///
/// # Returns
/// The endpoint with the search parameters and pagination appended.
///
/// # Errors
/// Returns `RadarError::InvalidUrl` if `config.api_url` cannot be parsed.
pub fn page_url(config: &FeedConfig, page: u32) -> Result<String> {
    let mut url = Url::parse(&config.api_url).map_err(|source| RadarError::InvalidUrl {
        url: config.api_url.clone(),
        source,
    })?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in &config.params {
            query.append_pair(key, value);
        }
        query.append_pair("recruitPage", &page.to_string());
        query.append_pair("recruitPageCount", &config.page_size.to_string());
    }
    Ok(url.into())
}

impl FeedTransport for HttpFeedTransport {
    fn fetch_page(&self, page: u32) -> Result<FeedEnvelope> {
        let fetch = || -> Result<FeedEnvelope> {
            let url = self.page_url(page)?;
            let bytes = download_with_policy(&self.client, &url, &self.retry)?;
            serde_json::from_slice(&bytes).map_err(|e| {
                RadarError::InvalidFeedResponse(format!("{e} (body: {})", preview(&bytes)))
            })
        };

        fetch().map_err(|source| RadarError::PageFetch {
            page,
            source: Box::new(source),
        })
    }
}

/// First characters of a body for error messages.
fn preview(bytes: &[u8]) -> String {
    bytes_to_string(bytes, "feed response").chars().take(80).collect()
}
