//! Page retrieval with optional retry and backoff.
//!
//! # Architecture
//!
//! - [`PageFetcher`]: core trait, fetch a URL and return the body text
//! - [`HttpFetcher`]: `reqwest` client with a browser User-Agent and timeout
//! - [`RetryFetch`]: decorator adding exponential backoff to any [`PageFetcher`]
//!
//! # Retry Strategy
//!
//! - `max_retries` attempts after the first (0 disables retrying)
//! - Exponential backoff from `base_delay`, capped at 30 seconds
//! - Random jitter (0-250ms) added to each delay

use crate::config::ScrapeConfig;
use rand::{Rng, rng};
use reqwest::Client;
use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Fetch a page and return its body as text.
pub trait PageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>>;
}

/// Plain HTTP GET fetcher. Non-2xx responses are errors.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, Box<dyn Error>> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let t0 = Instant::now();
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`PageFetcher`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> RetryFetch<T>
where
    T: PageFetcher,
{
    /// Wrap `inner` with retries.
    ///
    /// # Arguments
    ///
    /// * `inner` - Fetcher doing the actual request
    /// * `max_retries` - Retries after the first attempt; `0` disables retrying
    /// * `base_delay` - Delay before the first retry, doubled on each further one
    ///
    /// # Returns
    ///
    /// A fetcher whose delays are capped at 30 seconds plus jitter.
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> PageFetcher for RetryFetch<T>
where
    T: PageFetcher,
{
    #[instrument(level = "info", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Build the fetcher used by a scrape run.
pub fn build_fetcher(config: &ScrapeConfig) -> Result<RetryFetch<HttpFetcher>, Box<dyn Error>> {
    let http = HttpFetcher::new(&config.user_agent, Duration::from_secs(config.timeout_secs))?;
    Ok(RetryFetch::new(
        http,
        config.max_retries,
        Duration::from_millis(config.retry_base_delay_ms),
    ))
}

/// Fixed delay between requests to the same site.
pub async fn polite_pause(ms: u64) {
    if ms > 0 {
        sleep(Duration::from_millis(ms)).await;
    }
}
