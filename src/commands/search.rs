//! Search command implementation.

use crate::config::Config;
use crate::engine::ScrapeEngine;
use crate::flipkart::models::{FilterSpec, SearchRequest};
use crate::format::Formatter;
use anyhow::{Context, Result};
use tracing::debug;

/// Executes a product search end to end and renders the outcome.
pub struct SearchCommand {
    config: Config,
}

impl SearchCommand {
    /// Creates a new search command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Executes the search and returns formatted output.
    pub async fn execute(&self, query: &str) -> Result<String> {
        let engine = ScrapeEngine::new(&self.config).context("Failed to start fetch engine")?;
        self.execute_with_engine(&engine, query).await
    }

    /// Executes the search with a provided engine (for testing).
    pub async fn execute_with_engine(&self, engine: &ScrapeEngine, query: &str) -> Result<String> {
        let filters = FilterSpec {
            min_price: self.config.min_price,
            max_price: self.config.max_price,
            min_rating: self.config.min_rating,
            brand: self.config.brand.clone(),
        };

        let request = SearchRequest::with_filters(query, filters, self.config.max_results);
        let result = engine.scrape(&request).await;

        debug!(
            "Scrape finished: success={} records={} elapsed={}ms",
            result.success,
            result.count(),
            result.elapsed_ms
        );

        let formatter = Formatter::new(self.config.format);
        Ok(formatter.format_result(&result))
    }
}
