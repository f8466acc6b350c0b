//! Blocking HTTP client with configurable politeness (delay between requests) and bounded retries.

use crate::scraper::error::ScraperError;
use regex::Regex;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; ffarchive/0.1; personal archiving tool)";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DELAY_SECS: u64 = 1;
const MAX_REDIRECTS: usize = 10;

/// Default number of attempts for a fetch (initial plus retries).
pub const DEFAULT_RETRY_COUNT: u32 = 5;
/// Default backoff delays in seconds after each failed attempt.
const DEFAULT_BACKOFF_SECS: [u64; 4] = [1, 2, 4, 8];
/// Backoff for HTTP 429 (rate limit): wait longer so the server can recover.
const BACKOFF_429_SECS: [u64; 4] = [30, 60, 90, 120];

static RUN_ON_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("static regex"));

/// Source of page bodies. Implemented by [PoliteClient]; tests substitute canned pages.
pub trait Fetch {
    /// Fetch `url` and return its cleaned body text.
    fn fetch(&mut self, url: &str) -> Result<String, ScraperError>;
}

/// Replace non-breaking spaces and collapse runs of two or more spaces into one.
pub fn clean_whitespace(html: &str) -> String {
    let html = html.replace('\u{a0}', " ");
    RUN_ON_SPACES.replace_all(&html, " ").into_owned()
}

/// Blocking HTTP client that enforces a delay between requests.
#[derive(Debug)]
pub struct PoliteClient {
    inner: reqwest::blocking::Client,
    delay: Duration,
    last_request: Option<Instant>,
    retry_count: u32,
    backoff_secs: Vec<u64>,
}

impl PoliteClient {
    /// Build a polite client with default User-Agent, timeout, and delay.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    /// Builder for custom User-Agent, delay, timeout and retry settings.
    pub fn builder() -> PoliteClientBuilder {
        PoliteClientBuilder::default()
    }

    /// Perform a GET with retries for transient failures and return the cleaned body.
    ///
    /// Retries on: timeout (including while reading the body), connection errors,
    /// HTTP 5xx, and HTTP 429. Any other
    /// error status (e.g. 404: story removed) is returned immediately. When every
    /// attempt failed transiently the result is [ScraperError::RetriesExhausted].
    pub fn get_page(&mut self, url: &str) -> Result<String, ScraperError> {
        let max_attempts = self.retry_count;
        let mut last_reason = String::new();
        for attempt in 0..max_attempts {
            if attempt > 0 {
                std::thread::sleep(Duration::from_secs(self.backoff_for(
                    attempt - 1,
                    last_reason.starts_with("HTTP 429"),
                )));
            }
            self.wait_delay();
            tracing::debug!(url, attempt = attempt + 1, "fetching page");
            let sent = self.inner.get(url).send();
            self.last_request = Some(Instant::now());
            match sent {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text() {
                            Ok(body) => return Ok(clean_whitespace(&body)),
                            Err(e) if e.is_timeout() => {
                                tracing::warn!(url, error = %e, "timed out reading body");
                                last_reason = e.to_string();
                                continue;
                            }
                            Err(e) => {
                                return Err(ScraperError::BodyRead {
                                    url: url.to_string(),
                                    source: e,
                                })
                            }
                        }
                    }
                    if status.is_server_error() || status.as_u16() == 429 {
                        tracing::warn!(url, status = status.as_u16(), "transient HTTP status");
                        last_reason = format!("HTTP {}", status.as_u16());
                        continue;
                    }
                    return Err(ScraperError::HttpStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    tracing::warn!(url, error = %e, "transient network error");
                    last_reason = e.to_string();
                }
                Err(e) => {
                    return Err(ScraperError::Network {
                        url: url.to_string(),
                        source: e,
                    })
                }
            }
        }
        Err(ScraperError::RetriesExhausted {
            url: url.to_string(),
            attempts: max_attempts,
            reason: last_reason,
        })
    }

    fn backoff_for(&self, retry: u32, rate_limited: bool) -> u64 {
        let i = retry as usize;
        if rate_limited {
            return BACKOFF_429_SECS
                .get(i)
                .copied()
                .unwrap_or(BACKOFF_429_SECS[BACKOFF_429_SECS.len() - 1]);
        }
        self.backoff_secs
            .get(i)
            .or_else(|| self.backoff_secs.last())
            .copied()
            .unwrap_or(1)
    }

    fn wait_delay(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
    }
}

impl Fetch for PoliteClient {
    fn fetch(&mut self, url: &str) -> Result<String, ScraperError> {
        self.get_page(url)
    }
}

/// Builder for PoliteClient with optional User-Agent, delay, timeout, and retry settings.
#[derive(Debug)]
pub struct PoliteClientBuilder {
    user_agent: Option<String>,
    delay_secs: u64,
    timeout_secs: u64,
    retry_count: u32,
    retry_backoff_secs: Vec<u64>,
}

impl Default for PoliteClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            delay_secs: DEFAULT_DELAY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_backoff_secs: DEFAULT_BACKOFF_SECS.to_vec(),
        }
    }
}

impl PoliteClientBuilder {
    /// Set a custom User-Agent.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set delay between requests in seconds. Default 1.
    pub fn delay_secs(mut self, secs: u64) -> Self {
        self.delay_secs = secs;
        self
    }

    /// Set per-attempt timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set number of HTTP attempts for transient failures (default 5).
    pub fn retry_count(mut self, n: u32) -> Self {
        self.retry_count = n.max(1);
        self
    }

    /// Set backoff delays in seconds before each retry. If shorter than retry_count - 1, the last value is reused.
    pub fn retry_backoff_secs(mut self, secs: Vec<u64>) -> Self {
        self.retry_backoff_secs = secs;
        self
    }

    /// Build the blocking client and polite wrapper.
    pub fn build(self) -> Result<PoliteClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        let backoff_secs = if self.retry_backoff_secs.is_empty() {
            // Default exponential: 1, 2, 4, ... for (retry_count - 1) steps
            let n = self.retry_count.saturating_sub(1) as usize;
            (0..n).map(|i| 1u64 << i.min(4)).collect::<Vec<_>>()
        } else {
            self.retry_backoff_secs
        };
        Ok(PoliteClient {
            inner,
            delay: Duration::from_secs(self.delay_secs),
            last_request: None,
            retry_count: self.retry_count,
            backoff_secs,
        })
    }
}
