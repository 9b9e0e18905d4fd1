//! Offline probe that measures extraction yield of the current selector
//! rules and proposes replacements when yield degrades.
//!
//! The monitor only ever produces recommendations; the live selector set
//! is never mutated from here.

use crate::flipkart::cascade::CascadeExtractor;
use crate::flipkart::client::{FetchOutcome, PageFetcher};
use crate::flipkart::models::BlockSignal;
use crate::flipkart::selectors::SelectorSet;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info};

const MAX_CANDIDATE_RULES: usize = 8;

static DISCOVERY_ELEMENTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div, span, a, h1, h2, h3").unwrap());

/// Overall verdict of a probe run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Good,
    Degraded,
    Critical,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Good => write!(f, "good"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Critical => write!(f, "critical"),
        }
    }
}

/// Newly observed rules worth trying, grouped by field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateRules {
    pub title: Vec<String>,
    pub price: Vec<String>,
}

/// Outcome of one health probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub probe_query: String,
    pub containers_probed: usize,
    pub titles_found: usize,
    pub prices_found: usize,
    /// Containers that yielded both title and price / containers probed
    pub yield_ratio: f32,
    pub recommendations: Vec<String>,
    pub candidate_rules: CandidateRules,
    pub block: Option<BlockSignal>,
}

/// Probes a known-stable query and grades the current selector set.
pub struct HealthMonitor<'a> {
    fetcher: &'a dyn PageFetcher,
    selectors: &'a SelectorSet,
    yield_threshold: f32,
}

impl<'a> HealthMonitor<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        selectors: &'a SelectorSet,
        yield_threshold: f32,
    ) -> Self {
        Self { fetcher, selectors, yield_threshold: yield_threshold.clamp(0.0, 1.0) }
    }

    /// Runs the probe. Fetch failures and blocks grade as critical rather
    /// than erroring: a health check must always produce a report.
    pub async fn check(&self, probe_query: &str) -> HealthReport {
        let url = format!(
            "{}/search?q={}",
            self.fetcher.base_url(),
            urlencoding::encode(probe_query)
        );

        info!("Health probe: {}", url);

        match self.fetcher.fetch(&url).await {
            Ok(FetchOutcome::Page(body)) => {
                self.analyze(probe_query, &body)
            }
            Ok(FetchOutcome::Blocked(signal)) => HealthReport {
                status: HealthStatus::Critical,
                probe_query: probe_query.to_string(),
                containers_probed: 0,
                titles_found: 0,
                prices_found: 0,
                yield_ratio: 0.0,
                recommendations: vec![format!(
                    "Probe request blocked ({}); selector health unknown",
                    signal
                )],
                candidate_rules: CandidateRules::default(),
                block: Some(signal),
            },
            Err(e) => HealthReport {
                status: HealthStatus::Critical,
                probe_query: probe_query.to_string(),
                containers_probed: 0,
                titles_found: 0,
                prices_found: 0,
                yield_ratio: 0.0,
                recommendations: vec![format!("Cannot access search page: {}", e)],
                candidate_rules: CandidateRules::default(),
                block: None,
            },
        }
    }

    /// Grades one fetched page against the selector set.
    pub fn analyze(&self, probe_query: &str, html: &str) -> HealthReport {
        let document = Html::parse_document(html);
        let extractor = CascadeExtractor::new(self.fetcher.base_url());
        let candidates = extractor.extract(&document, self.selectors);

        let containers_probed = candidates.len();
        let titles_found = candidates.iter().filter(|c| c.title.is_some()).count();
        let prices_found = candidates.iter().filter(|c| c.price_text.is_some()).count();
        let complete = candidates
            .iter()
            .filter(|c| c.title.is_some() && c.price_text.is_some())
            .count();

        let yield_ratio = if containers_probed == 0 {
            0.0
        } else {
            complete as f32 / containers_probed as f32
        };

        debug!(
            "Probe yield: {}/{} complete (ratio {:.2})",
            complete, containers_probed, yield_ratio
        );

        let mut recommendations = Vec::new();
        let status = if containers_probed == 0 {
            recommendations
                .push("No container rule matched; the selector set is likely stale".to_string());
            HealthStatus::Critical
        } else if yield_ratio >= self.yield_threshold {
            HealthStatus::Good
        } else if yield_ratio >= self.yield_threshold / 2.0 {
            recommendations.push(format!(
                "Yield {:.0}% is below the {:.0}% threshold; some field rules are failing",
                yield_ratio * 100.0,
                self.yield_threshold * 100.0
            ));
            HealthStatus::Degraded
        } else {
            recommendations.push(format!(
                "Yield {:.0}% is far below the {:.0}% threshold; major selector issues",
                yield_ratio * 100.0,
                self.yield_threshold * 100.0
            ));
            HealthStatus::Critical
        };

        let candidate_rules = if status == HealthStatus::Good {
            CandidateRules::default()
        } else {
            discover_candidate_rules(&document)
        };

        HealthReport {
            status,
            probe_query: probe_query.to_string(),
            containers_probed,
            titles_found,
            prices_found,
            yield_ratio,
            recommendations,
            candidate_rules,
            block: None,
        }
    }
}

/// Best-effort discovery of replacement rules: elements whose text has a
/// currency marker become price candidates, elements with title-length
/// text become title candidates. Human review decides what gets adopted.
fn discover_candidate_rules(document: &Html) -> CandidateRules {
    let mut rules = CandidateRules::default();

    for element in document.select(&DISCOVERY_ELEMENTS) {
        let text: String = element.text().collect();
        let text = text.trim();
        let len = text.chars().count();

        let classes: Vec<&str> = element.value().classes().collect();
        if classes.is_empty() {
            continue;
        }
        let rule = format!(".{}", classes.join("."));

        if (20..=200).contains(&len)
            && text.chars().any(|c| c.is_alphabetic())
            && rules.title.len() < MAX_CANDIDATE_RULES
            && !rules.title.contains(&rule)
        {
            rules.title.push(rule.clone());
        }

        if text.contains('₹')
            && len < 20
            && rules.price.len() < MAX_CANDIDATE_RULES
            && !rules.price.contains(&rule)
        {
            rules.price.push(rule);
        }
    }

    rules
}
