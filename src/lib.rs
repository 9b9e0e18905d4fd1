//! fk-crawler - Resilient Flipkart search-result extraction engine
//!
//! Turns drifting, anti-bot-defended marketplace search pages into
//! normalized product records: cascading selectors with a heuristic
//! fallback extractor, defensive field parsing, and an offline selector
//! health probe.

pub mod commands;
pub mod config;
pub mod engine;
pub mod filters;
pub mod flipkart;
pub mod format;

pub use config::Config;
pub use engine::ScrapeEngine;
pub use flipkart::models::{
    BlockSignal, ExtractionMethod, ExtractionResult, FilterSpec, ProductRecord, SearchRequest,
};
pub use flipkart::selectors::SelectorSet;
