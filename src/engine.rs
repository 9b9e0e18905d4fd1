//! The extraction engine: fetch, extract, normalize, validate, filter.
//!
//! `scrape` never returns an error. Every outcome, including blocks and
//! timeouts, is an `ExtractionResult` with a success flag; only engine
//! construction can fail hard.

use crate::config::{Config, FetchStrategy};
use crate::filters::FilterChain;
use crate::flipkart::cascade::CascadeExtractor;
use crate::flipkart::client::{FetchOutcome, HttpFetcher, PageFetcher, RenderApiFetcher};
use crate::flipkart::fallback::FallbackExtractor;
use crate::flipkart::models::{
    ExtractionMethod, ExtractionResult, ProductRecord, SearchRequest, PRICE_UNAVAILABLE,
};
use crate::flipkart::selectors::SelectorSet;
use crate::flipkart::validate::{build_records, validate_and_dedup};
use anyhow::Result;
use scraper::Html;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How many fallback candidates to recover even for small result limits,
/// since filtering happens after extraction.
const FALLBACK_SCAN_FLOOR: usize = 10;

/// Stateless per-request extraction engine. Shares only the read-only
/// selector set and the pooled client across concurrent callers.
pub struct ScrapeEngine {
    fetcher: Box<dyn PageFetcher>,
    selectors: SelectorSet,
    request_budget: Duration,
    synthetic_on_block: bool,
}

impl ScrapeEngine {
    /// Builds the engine from configuration. This is the only fallible
    /// step: a client that cannot start is a hard error, not a per-request
    /// one.
    pub fn new(config: &Config) -> Result<Self> {
        let fetcher: Box<dyn PageFetcher> = match config.fetch_strategy {
            FetchStrategy::Http => Box::new(HttpFetcher::new(config)?),
            FetchStrategy::Render => Box::new(RenderApiFetcher::new(config)?),
        };

        let selectors = SelectorSet::load(config.selector_file.as_deref());

        Ok(Self::with_fetcher(
            fetcher,
            selectors,
            Duration::from_secs(config.request_budget_secs),
            config.synthetic_on_block,
        ))
    }

    /// Assembles an engine from parts. Used by tests and by embedders that
    /// bring their own fetch strategy.
    pub fn with_fetcher(
        fetcher: Box<dyn PageFetcher>,
        selectors: SelectorSet,
        request_budget: Duration,
        synthetic_on_block: bool,
    ) -> Self {
        Self { fetcher, selectors, request_budget, synthetic_on_block }
    }

    /// The selector set in use. Read-only; replaced wholesale via
    /// `set_selectors` between passes, never mutated during one.
    pub fn selectors(&self) -> &SelectorSet {
        &self.selectors
    }

    /// Swaps in a new selector set (e.g. after a reviewed health-check
    /// recommendation).
    pub fn set_selectors(&mut self, selectors: SelectorSet) {
        self.selectors = selectors;
    }

    pub fn fetcher(&self) -> &dyn PageFetcher {
        self.fetcher.as_ref()
    }

    /// Runs one extraction request end to end.
    pub async fn scrape(&self, request: &SearchRequest) -> ExtractionResult {
        let start = Instant::now();
        let search_url = format!(
            "{}/search?q={}",
            self.fetcher.base_url(),
            urlencoding::encode(&request.query)
        );

        info!("Scraping: {} (limit {})", request.query, request.limit);

        let fetched = if self.request_budget.is_zero() {
            Ok(self.fetcher.fetch(&search_url).await)
        } else {
            tokio::time::timeout(self.request_budget, self.fetcher.fetch(&search_url)).await
        };

        let elapsed = || start.elapsed().as_millis() as u64;

        let outcome = match fetched {
            Err(_) => {
                return ExtractionResult::failed(
                    &request.query,
                    format!("request timed out after {:?}", self.request_budget),
                    elapsed(),
                );
            }
            Ok(Err(e)) => {
                return ExtractionResult::failed(&request.query, e.to_string(), elapsed());
            }
            Ok(Ok(outcome)) => outcome,
        };

        match outcome {
            FetchOutcome::Blocked(signal) => {
                if self.synthetic_on_block {
                    // Historical fallback path, opt-in only: placeholders
                    // are shape-complete but unmistakably tagged.
                    let records = synthetic_records(&request.query, &search_url, request.limit);
                    let mut result = ExtractionResult::ok(&request.query, records, elapsed());
                    result.block = Some(signal);
                    result
                } else {
                    ExtractionResult::blocked(&request.query, signal, elapsed())
                }
            }
            FetchOutcome::Page(html) => {
                let records = self.extract_records(&html, request, &search_url);
                ExtractionResult::ok(&request.query, records, elapsed())
            }
        }
    }

    /// Document pipeline: cascade (else fallback) -> build -> validate ->
    /// filter -> truncate. Synchronous so the parsed DOM never crosses an
    /// await point.
    fn extract_records(
        &self,
        html: &str,
        request: &SearchRequest,
        search_url: &str,
    ) -> Vec<ProductRecord> {
        let document = Html::parse_document(html);

        let cascade = CascadeExtractor::new(self.fetcher.base_url());
        let mut raw = cascade.extract(&document, &self.selectors);

        if raw.is_empty() {
            debug!("Cascade yielded zero containers, engaging fallback extractor");
            let fallback = FallbackExtractor::new(self.fetcher.base_url());
            raw = fallback.extract(&document, request.limit.max(FALLBACK_SCAN_FLOOR));
        }

        let records = build_records(raw, search_url);
        let records = validate_and_dedup(records);

        let chain = FilterChain::from_spec(&request.filters);
        if !chain.is_empty() {
            debug!("Active filters: {}", chain.descriptions().join(", "));
        }
        let mut records = chain.apply(records);

        records.truncate(request.limit);
        info!("Extracted {} records for '{}'", records.len(), request.query);
        records
    }
}

/// Placeholder records for the opt-in blocked path. Unpriced, unrated,
/// pointing at the search page, tagged synthetic.
fn synthetic_records(query: &str, search_url: &str, limit: usize) -> Vec<ProductRecord> {
    let count = limit.clamp(1, 3);
    (1..=count)
        .map(|i| ProductRecord {
            title: format!("Placeholder result {} for '{}'", i, query),
            price_display: PRICE_UNAVAILABLE.to_string(),
            price: None,
            rating: None,
            url: search_url.to_string(),
            image_url: None,
            availability: Default::default(),
            extraction_method: ExtractionMethod::Synthetic,
        })
        .collect()
}
