//! Health check command implementation.

use crate::config::Config;
use crate::engine::ScrapeEngine;
use crate::flipkart::health::HealthMonitor;
use crate::format::Formatter;
use anyhow::{Context, Result};

/// Runs a selector health probe and renders the report.
pub struct HealthCommand {
    config: Config,
}

impl HealthCommand {
    /// Creates a new health command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Probes the configured query (or an explicit one) and returns the
    /// formatted report.
    pub async fn execute(&self, query: Option<&str>) -> Result<String> {
        let engine = ScrapeEngine::new(&self.config).context("Failed to start fetch engine")?;
        self.execute_with_engine(&engine, query).await
    }

    /// Runs the probe with a provided engine (for testing).
    pub async fn execute_with_engine(
        &self,
        engine: &ScrapeEngine,
        query: Option<&str>,
    ) -> Result<String> {
        let probe_query = query.unwrap_or(&self.config.probe_query);

        let monitor =
            HealthMonitor::new(engine.fetcher(), engine.selectors(), self.config.yield_threshold);
        let report = monitor.check(probe_query).await;

        let formatter = Formatter::new(self.config.format);
        Ok(formatter.format_health(&report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::flipkart::client::{FetchError, FetchOutcome, PageFetcher};
    use crate::flipkart::selectors::SelectorSet;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StaticFetcher {
        body: String,
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchOutcome, FetchError> {
            Ok(FetchOutcome::Page(self.body.clone()))
        }

        fn base_url(&self) -> &str {
            "https://www.flipkart.com"
        }
    }

    fn engine_with(body: &str) -> ScrapeEngine {
        ScrapeEngine::with_fetcher(
            Box::new(StaticFetcher { body: body.to_string() }),
            SelectorSet::embedded_default(),
            Duration::from_secs(10),
            false,
        )
    }

    fn healthy_page() -> String {
        r#"<html><body>
            <div data-id="ITM1">
                <a href="/asus/p/itm1"><div class="KzDlHZ">ASUS VivoBook 15 Laptop</div></a>
                <div class="Nx9bqj">₹45,990</div>
            </div>
        </body></html>"#
            .to_string()
    }

    #[tokio::test]
    async fn test_health_good() {
        let engine = engine_with(&healthy_page());
        let cmd = HealthCommand::new(Config { delay_ms: 0, ..Config::default() });

        let output = cmd.execute_with_engine(&engine, None).await.unwrap();
        assert!(output.contains("Selector health: good"));
        assert!(output.contains("Yield ratio:     100%"));
    }

    #[tokio::test]
    async fn test_health_explicit_query_used() {
        let engine = engine_with(&healthy_page());
        let cmd = HealthCommand::new(Config { delay_ms: 0, ..Config::default() });

        let output = cmd.execute_with_engine(&engine, Some("mobile")).await.unwrap();
        assert!(output.contains("Probe query:     mobile"));
    }

    #[tokio::test]
    async fn test_health_json_output() {
        let engine = engine_with(&healthy_page());
        let cmd = HealthCommand::new(Config {
            delay_ms: 0,
            format: OutputFormat::Json,
            ..Config::default()
        });

        let output = cmd.execute_with_engine(&engine, None).await.unwrap();
        assert!(output.contains("\"status\": \"good\""));
        assert!(output.contains("\"yield_ratio\""));
    }

    #[tokio::test]
    async fn test_health_critical_on_unmatched_page() {
        let engine = engine_with("<html><body><p>totally different markup</p></body></html>");
        let cmd = HealthCommand::new(Config { delay_ms: 0, ..Config::default() });

        let output = cmd.execute_with_engine(&engine, None).await.unwrap();
        assert!(output.contains("Selector health: critical"));
    }
}
