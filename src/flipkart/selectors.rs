//! Selector rules for Flipkart HTML parsing.
//!
//! Flipkart rotates its obfuscated class names every few weeks, so every
//! logical field carries an ordered list of rules rather than one selector.
//! The active set is loadable from a TOML document; when that document is
//! missing or malformed the embedded defaults below are used.
//!
//! **Update process**: when extraction yield drops, run the `health`
//! subcommand, capture an HTML sample, and prepend the suggested rules here
//! or in the selector file.

use anyhow::{Context, Result};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// A named matching pattern for one logical field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorRule {
    pub name: String,
    pub query: String,
}

impl SelectorRule {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self { name: name.into(), query: query.into() }
    }
}

/// On-disk shape of a selector document: field name -> ordered rule list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorDoc {
    #[serde(default)]
    pub container: Vec<SelectorRule>,
    #[serde(default)]
    pub title: Vec<SelectorRule>,
    #[serde(default)]
    pub price: Vec<SelectorRule>,
    #[serde(default)]
    pub rating: Vec<SelectorRule>,
    #[serde(default)]
    pub link: Vec<SelectorRule>,
    #[serde(default)]
    pub image: Vec<SelectorRule>,
}

/// A rule whose CSS query has been compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub query: String,
    pub selector: Selector,
}

/// Compiled, ordered rules for every logical field. Read-only during an
/// extraction pass; replaced wholesale between passes when configuration
/// changes.
#[derive(Debug, Clone)]
pub struct SelectorSet {
    pub container: Vec<CompiledRule>,
    pub title: Vec<CompiledRule>,
    pub price: Vec<CompiledRule>,
    pub rating: Vec<CompiledRule>,
    pub link: Vec<CompiledRule>,
    pub image: Vec<CompiledRule>,
}

// Default rules, newest Flipkart class names first. Older generations kept
// as lower-priority fallbacks since stale pages still surface in caches.
const DEFAULT_CONTAINER: &[(&str, &str)] = &[
    ("data-id-card", "div[data-id]"),
    ("grid-row", "div._1AtVbE"),
    ("card-current", "div.tUxRFH"),
    ("list-row", "div._13oc-S"),
    ("wide-card", "div._2kHMtA"),
    ("compact-card", "div._3pLy-c"),
];

const DEFAULT_TITLE: &[(&str, &str)] = &[
    ("title-current", "div.KzDlHZ"),
    ("title-grid", "div._4rR01T"),
    ("title-detail", "span.B_NuCI"),
    ("title-compact", "a.s1Q9rs"),
    ("title-apparel", "a.IRpwTa"),
    ("title-brand-row", "div._2WkVRV"),
    ("title-alt", "a.wjcEIp"),
];

const DEFAULT_PRICE: &[(&str, &str)] = &[
    ("price-current", "div.Nx9bqj"),
    ("price-grid", "div._30jeq3"),
    ("price-list", "div._1_WHN1"),
    ("price-alt", "div._25b18c"),
    ("price-strike-row", "div._3I9_wc"),
];

const DEFAULT_RATING: &[(&str, &str)] = &[
    ("rating-current", "div.XQDdHH"),
    ("rating-grid", "div._3LWZlK"),
    ("rating-muted", "div.gUuXy-"),
    ("rating-alt", "div._3sae3h"),
];

const DEFAULT_LINK: &[(&str, &str)] =
    &[("product-link", "a[href*='/p/']"), ("any-link", "a[href]")];

const DEFAULT_IMAGE: &[(&str, &str)] = &[("any-image", "img")];

impl SelectorSet {
    /// The embedded default rule set. Guaranteed to compile.
    pub fn embedded_default() -> Self {
        fn compile(rules: &[(&str, &str)]) -> Vec<CompiledRule> {
            rules
                .iter()
                .map(|(name, query)| CompiledRule {
                    name: (*name).to_string(),
                    query: (*query).to_string(),
                    // Defaults are compile-time constants covered by tests
                    selector: Selector::parse(query).unwrap(),
                })
                .collect()
        }

        Self {
            container: compile(DEFAULT_CONTAINER),
            title: compile(DEFAULT_TITLE),
            price: compile(DEFAULT_PRICE),
            rating: compile(DEFAULT_RATING),
            link: compile(DEFAULT_LINK),
            image: compile(DEFAULT_IMAGE),
        }
    }

    /// Loads a selector document, substituting the embedded defaults when
    /// the file is absent or malformed. This never fails: a broken selector
    /// configuration must not take the engine down.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            debug!("No selector file configured, using embedded defaults");
            return Self::embedded_default();
        };

        match Self::try_load(path) {
            Ok(set) => set,
            Err(e) => {
                warn!("Failed to load selector file {}: {:#}. Using embedded defaults.",
                    path.display(), e);
                Self::embedded_default()
            }
        }
    }

    /// Fallible load used by `load` and by tests.
    pub fn try_load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read selector file: {}", path.display()))?;

        let doc: SelectorDoc = toml::from_str(&content)
            .with_context(|| format!("Failed to parse selector file: {}", path.display()))?;

        Ok(Self::from_doc(doc))
    }

    /// Compiles a document into a usable set. Individually invalid rules
    /// are skipped with a warning; a field left without any valid rule
    /// inherits the defaults for that field.
    pub fn from_doc(doc: SelectorDoc) -> Self {
        let defaults = Self::embedded_default();

        fn compile_or(rules: Vec<SelectorRule>, fallback: Vec<CompiledRule>) -> Vec<CompiledRule> {
            let compiled: Vec<CompiledRule> = rules
                .into_iter()
                .filter_map(|rule| {
                    let parsed = Selector::parse(&rule.query).map_err(|e| e.to_string());
                    match parsed {
                        Ok(selector) => {
                            Some(CompiledRule { name: rule.name, query: rule.query, selector })
                        }
                        Err(msg) => {
                            warn!("Skipping invalid selector rule '{}' ({}): {}", rule.name,
                                rule.query, msg);
                            None
                        }
                    }
                })
                .collect();

            if compiled.is_empty() {
                fallback
            } else {
                compiled
            }
        }

        Self {
            container: compile_or(doc.container, defaults.container),
            title: compile_or(doc.title, defaults.title),
            price: compile_or(doc.price, defaults.price),
            rating: compile_or(doc.rating, defaults.rating),
            link: compile_or(doc.link, defaults.link),
            image: compile_or(doc.image, defaults.image),
        }
    }

    /// Rule names per field, in priority order. Used by the `rules`
    /// subcommand and the health report.
    pub fn describe(&self) -> Vec<(&'static str, Vec<String>)> {
        fn names(rules: &[CompiledRule]) -> Vec<String> {
            rules.iter().map(|r| format!("{} ({})", r.name, r.query)).collect()
        }

        vec![
            ("container", names(&self.container)),
            ("title", names(&self.title)),
            ("price", names(&self.price)),
            ("rating", names(&self.rating)),
            ("link", names(&self.link)),
            ("image", names(&self.image)),
        ]
    }
}

impl Default for SelectorSet {
    fn default() -> Self {
        Self::embedded_default()
    }
}
