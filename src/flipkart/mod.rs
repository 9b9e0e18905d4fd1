//! Flipkart-specific scraping: fetching, selector rules, extraction,
//! normalization, and selector health monitoring.

pub mod cascade;
pub mod client;
pub mod fallback;
pub mod health;
pub mod models;
pub mod normalize;
pub mod selectors;
pub mod validate;

pub use cascade::CascadeExtractor;
pub use client::{FetchError, FetchOutcome, HttpFetcher, PageFetcher, RenderApiFetcher};
pub use fallback::FallbackExtractor;
pub use health::{HealthMonitor, HealthReport, HealthStatus};
pub use models::{
    Availability, BlockSignal, ExtractionMethod, ExtractionResult, FilterSpec, ProductRecord,
    SearchRequest,
};
pub use selectors::{SelectorRule, SelectorSet};
