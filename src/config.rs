//! Configuration management with TOML, environment variables, and CLI overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Marketplace base URL (overridable for testing)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Proxy URL (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Base delay before each request in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Random jitter added to delay (0 to this value)
    #[serde(default = "default_delay_jitter_ms")]
    pub delay_jitter_ms: u64,

    /// Retry attempt budget per request
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds, doubled per retry
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Total fetch+retry time budget per request in seconds (0 = unbounded)
    #[serde(default = "default_request_budget_secs")]
    pub request_budget_secs: u64,

    /// Maximum number of records to return
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Filter: minimum price
    #[serde(default)]
    pub min_price: Option<f64>,

    /// Filter: maximum price
    #[serde(default)]
    pub max_price: Option<f64>,

    /// Filter: minimum rating
    #[serde(default)]
    pub min_rating: Option<f32>,

    /// Filter: brand substring
    #[serde(default)]
    pub brand: Option<String>,

    /// How pages are fetched
    #[serde(default)]
    pub fetch_strategy: FetchStrategy,

    /// Rendering/proxy service endpoint (fetch_strategy = "render")
    #[serde(default)]
    pub render_api_url: Option<String>,

    /// Rendering/proxy service token. Supplied here or via FK_RENDER_KEY,
    /// never hardcoded.
    #[serde(default)]
    pub render_api_key: Option<String>,

    /// Path to a selector rules document; embedded defaults when absent
    #[serde(default)]
    pub selector_file: Option<PathBuf>,

    /// Known-stable query used by the health probe
    #[serde(default = "default_probe_query")]
    pub probe_query: String,

    /// Extraction yield below this ratio grades as degraded
    #[serde(default = "default_yield_threshold")]
    pub yield_threshold: f32,

    /// Emit tagged placeholder records when blocked instead of an empty
    /// degraded result. Off by default for a reason.
    #[serde(default)]
    pub synthetic_on_block: bool,
}

fn default_base_url() -> String {
    "https://www.flipkart.com".to_string()
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_delay_jitter_ms() -> u64 {
    3000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    2000
}

fn default_request_budget_secs() -> u64 {
    45
}

fn default_max_results() -> usize {
    5
}

fn default_probe_query() -> String {
    "laptop".to_string()
}

fn default_yield_threshold() -> f32 {
    0.5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            proxy: None,
            delay_ms: default_delay_ms(),
            delay_jitter_ms: default_delay_jitter_ms(),
            max_attempts: default_max_attempts(),
            retry_base_ms: default_retry_base_ms(),
            request_budget_secs: default_request_budget_secs(),
            max_results: default_max_results(),
            format: OutputFormat::Table,
            min_price: None,
            max_price: None,
            min_rating: None,
            brand: None,
            fetch_strategy: FetchStrategy::Http,
            render_api_url: None,
            render_api_key: None,
            selector_file: None,
            probe_query: default_probe_query(),
            yield_threshold: default_yield_threshold(),
            synthetic_on_block: false,
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        // 1. Explicit path takes precedence
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        // 2. Try current directory
        let local_config = Path::new("fk-crawler.toml");
        if local_config.exists() {
            debug!("Found fk-crawler.toml in current directory");
            return Self::from_file(local_config);
        }

        // 3. Try XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("fk-crawler").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        // 4. Return default config
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(proxy) = std::env::var("FK_PROXY") {
            self.proxy = Some(proxy);
        }

        if let Ok(delay) = std::env::var("FK_DELAY") {
            if let Ok(d) = delay.parse() {
                self.delay_ms = d;
            }
        }

        if let Ok(key) = std::env::var("FK_RENDER_KEY") {
            self.render_api_key = Some(key);
        }

        self
    }
}

/// How search pages are fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Direct HTTP with TLS fingerprint emulation
    #[default]
    Http,
    /// Paid rendering/proxy service for JS-heavy pages
    Render,
}

impl std::str::FromStr for FetchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(FetchStrategy::Http),
            "render" => Ok(FetchStrategy::Render),
            _ => Err(format!("Unknown fetch strategy: {}. Use: http, render", s)),
        }
    }
}

impl std::fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchStrategy::Http => write!(f, "http"),
            FetchStrategy::Render => write!(f, "render"),
        }
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Markdown,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use: table, json, markdown, csv", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}
