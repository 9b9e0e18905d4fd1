//! HTTP fetching with anti-bot measures, retry/backoff, and block
//! classification, using wreq for TLS fingerprint emulation.

use crate::config::Config;
use crate::flipkart::models::BlockSignal;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::RngExt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use wreq::Client;
use wreq_util::Emulation;

/// Body phrases that mean an interstitial rather than a result page.
const BLOCK_MARKERS: &[&str] = &[
    "access denied",
    "captcha",
    "security check",
    "unusual traffic",
    "please verify",
    "are you a robot",
    "automated queries",
];

/// What a fetch produced: either a document body or a block classification.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Page(String),
    Blocked(BlockSignal),
}

/// Fetch failures that survive the retry budget.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed after {attempts} attempt(s): {message}")]
    Network { attempts: u32, message: String },

    #[error("request failed with status {status} after {attempts} attempt(s)")]
    Status { status: u16, attempts: u32 },
}

/// Trait for page fetching - enables mocking for tests and swapping the
/// plain HTTP strategy for a rendering service.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches a URL, retrying transient failures up to the configured
    /// attempt budget. Block signals are returned, not retried.
    async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError>;

    /// Base URL of the target marketplace.
    fn base_url(&self) -> &str;
}

/// Direct HTTP fetcher with browser impersonation.
pub struct HttpFetcher {
    client: Client,
    base_url: String,
    delay_ms: u64,
    delay_jitter_ms: u64,
    max_attempts: u32,
    retry_base_ms: u64,
}

impl HttpFetcher {
    /// Creates a fetcher from configuration.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(config, None)
    }

    /// Creates a fetcher with a custom base URL (for testing).
    pub fn with_base_url(config: &Config, base_url: Option<String>) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = &config.proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| config.base_url.clone()),
            delay_ms: config.delay_ms,
            delay_jitter_ms: config.delay_jitter_ms,
            max_attempts: config.max_attempts.max(1),
            retry_base_ms: config.retry_base_ms,
        })
    }

    /// Performs one GET with the full header disguise.
    async fn get(&self, url: &str) -> Result<wreq::Response, wreq::Error> {
        debug!("GET {}", url);

        self.client
            .get(url)
            .emulation(Emulation::Chrome131)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8")
            .header("Accept-Language", "en-IN,en;q=0.9,hi;q=0.8")
            .header("Accept-Encoding", "gzip, deflate, br")
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .header("Sec-Ch-Ua", "\"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\"")
            .header("Sec-Ch-Ua-Mobile", "?0")
            .header("Sec-Ch-Ua-Platform", "\"Windows\"")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Sec-Fetch-User", "?1")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
    }

    /// Adds a human-like delay with jitter before a request.
    async fn delay(&self) {
        if self.delay_ms == 0 {
            return;
        }

        let jitter = if self.delay_jitter_ms > 0 {
            rand::rng().random_range(0..=self.delay_jitter_ms)
        } else {
            0
        };

        let total_delay = self.delay_ms + jitter;
        debug!("Delaying {}ms", total_delay);
        tokio::time::sleep(Duration::from_millis(total_delay)).await;
    }

    /// Exponential backoff between retries: base delay doubling per retry.
    async fn backoff(&self, attempt: u32) {
        if self.retry_base_ms == 0 {
            return;
        }
        let delay = self.retry_base_ms.saturating_mul(1 << (attempt - 1));
        debug!("Backing off {}ms before retry {}", delay, attempt + 1);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        let mut last_status: Option<u16> = None;
        let mut last_error: Option<String> = None;

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                self.backoff(attempt - 1).await;
            }
            self.delay().await;

            let response = match self.get(url).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Attempt {}/{} failed: {}", attempt, self.max_attempts, e);
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            let status = response.status();
            debug!("Response status: {}", status);

            // Block statuses are terminal for this host; retrying the same
            // endpoint only digs the hole deeper.
            if let Some(signal) = classify_status(status.as_u16()) {
                info!("Blocked ({}), not retrying", signal);
                return Ok(FetchOutcome::Blocked(signal));
            }

            if !status.is_success() {
                warn!("Attempt {}/{} got status {}", attempt, self.max_attempts, status);
                last_status = Some(status.as_u16());
                continue;
            }

            let body = response.text().await.map_err(|e| FetchError::Network {
                attempts: attempt,
                message: format!("failed to read response body: {}", e),
            })?;

            // Some interstitials arrive with status 200
            if let Some(signal) = scan_block_markers(&body) {
                info!("Block marker in body ({})", signal);
                return Ok(FetchOutcome::Blocked(signal));
            }

            return Ok(FetchOutcome::Page(body));
        }

        match (last_status, last_error) {
            (Some(status), _) => Err(FetchError::Status { status, attempts: self.max_attempts }),
            (None, Some(message)) => {
                Err(FetchError::Network { attempts: self.max_attempts, message })
            }
            (None, None) => Err(FetchError::Network {
                attempts: self.max_attempts,
                message: "no attempt completed".to_string(),
            }),
        }
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Fetcher that drives a paid rendering/proxy service for pages that need
/// JS execution. The service token comes from configuration, never from
/// source.
pub struct RenderApiFetcher {
    client: Client,
    base_url: String,
    api_url: String,
    api_key: String,
    max_attempts: u32,
    retry_base_ms: u64,
}

impl RenderApiFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let api_url = config
            .render_api_url
            .clone()
            .context("fetch_strategy = \"render\" requires render_api_url")?;
        let api_key = config
            .render_api_key
            .clone()
            .context("fetch_strategy = \"render\" requires render_api_key (or FK_RENDER_KEY)")?;

        let client = Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_url,
            api_key,
            max_attempts: config.max_attempts.max(1),
            retry_base_ms: config.retry_base_ms,
        })
    }

    fn render_url(&self, target: &str) -> String {
        format!(
            "{}?api_key={}&render=true&url={}",
            self.api_url,
            self.api_key,
            urlencoding::encode(target)
        )
    }
}

#[async_trait]
impl PageFetcher for RenderApiFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        let render_url = self.render_url(url);
        let mut last_status: Option<u16> = None;
        let mut last_error: Option<String> = None;

        for attempt in 1..=self.max_attempts {
            if attempt > 1 && self.retry_base_ms > 0 {
                let delay = self.retry_base_ms.saturating_mul(1 << (attempt - 2));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let response = match self.client.get(&render_url).send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Render attempt {}/{} failed: {}", attempt, self.max_attempts, e);
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            let status = response.status();

            if let Some(signal) = classify_status(status.as_u16()) {
                info!("Render service blocked ({}), not retrying", signal);
                return Ok(FetchOutcome::Blocked(signal));
            }

            if !status.is_success() {
                warn!("Render attempt {}/{} got status {}", attempt, self.max_attempts, status);
                last_status = Some(status.as_u16());
                continue;
            }

            let body = response.text().await.map_err(|e| FetchError::Network {
                attempts: attempt,
                message: format!("failed to read rendered body: {}", e),
            })?;

            if let Some(signal) = scan_block_markers(&body) {
                return Ok(FetchOutcome::Blocked(signal));
            }

            return Ok(FetchOutcome::Page(body));
        }

        match (last_status, last_error) {
            (Some(status), _) => Err(FetchError::Status { status, attempts: self.max_attempts }),
            (None, Some(message)) => {
                Err(FetchError::Network { attempts: self.max_attempts, message })
            }
            (None, None) => Err(FetchError::Network {
                attempts: self.max_attempts,
                message: "no attempt completed".to_string(),
            }),
        }
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Maps block statuses to signals. 429 is throttling; 503 and 529 mean
/// the site (or its bot-defense) is shedding load.
pub fn classify_status(status: u16) -> Option<BlockSignal> {
    match status {
        429 => Some(BlockSignal::RateLimited),
        503 | 529 => Some(BlockSignal::Overloaded),
        _ => None,
    }
}

/// Scans a body for security-check phrases. A marker means CAPTCHA
/// regardless of the HTTP status.
pub fn scan_block_markers(body: &str) -> Option<BlockSignal> {
    let lowered = body.to_lowercase();
    BLOCK_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
        .then_some(BlockSignal::Captcha)
}
