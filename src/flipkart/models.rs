//! Data models for Flipkart products, extraction results, and block signals.

use serde::{Deserialize, Serialize};

/// Sentinel used in `price_display` when no price could be recovered.
/// A record never carries an empty display price.
pub const PRICE_UNAVAILABLE: &str = "unavailable";

/// A normalized product record extracted from a search-result page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Product title, non-empty after noise trimming
    pub title: String,
    /// Display price as shown on the page ("₹55,990") or the
    /// "unavailable" sentinel
    pub price_display: String,
    /// Numeric price, None when unknown
    pub price: Option<f64>,
    /// Star rating in [1.0, 5.0], None when unknown
    pub rating: Option<f32>,
    /// Absolute product URL
    pub url: String,
    /// Absolute image URL if one was found
    pub image_url: Option<String>,
    /// Stock status
    pub availability: Availability,
    /// How this record was extracted
    pub extraction_method: ExtractionMethod,
}

impl ProductRecord {
    /// Returns the first `n` characters of the title, respecting char
    /// boundaries. Used as the dedup key prefix.
    pub fn title_prefix(&self, n: usize) -> &str {
        match self.title.char_indices().nth(n) {
            Some((idx, _)) => &self.title[..idx],
            None => &self.title,
        }
    }

    /// True if neither title nor price carries information.
    pub fn is_vacant(&self) -> bool {
        self.title.trim().is_empty() && self.price.is_none()
    }
}

/// Stock status of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
    #[default]
    Unknown,
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Availability::InStock => write!(f, "In Stock"),
            Availability::OutOfStock => write!(f, "Out of Stock"),
            Availability::Unknown => write!(f, "Unknown"),
        }
    }
}

/// How a record was recovered from the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Declared selector rules matched
    Cascade,
    /// Heuristic anchor/regex recovery
    Fallback,
    /// Fabricated placeholder (only with the explicit `synthetic_on_block`
    /// opt-in; never produced otherwise)
    Synthetic,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionMethod::Cascade => write!(f, "cascade"),
            ExtractionMethod::Fallback => write!(f, "fallback"),
            ExtractionMethod::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Classification of a response that indicates the site is rejecting or
/// throttling us. Consumed by the fetch loop, surfaced on the result,
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockSignal {
    /// CAPTCHA or security-check interstitial in the body
    Captcha,
    /// HTTP 429
    RateLimited,
    /// HTTP 503/529
    Overloaded,
}

impl std::fmt::Display for BlockSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockSignal::Captcha => write!(f, "captcha"),
            BlockSignal::RateLimited => write!(f, "rate_limited"),
            BlockSignal::Overloaded => write!(f, "overloaded"),
        }
    }
}

/// Pre-normalization field values for one candidate listing.
///
/// Produced by the cascade and fallback extractors; every field except
/// `method` may be absent without aborting the pass.
#[derive(Debug, Clone, Default)]
pub struct RawProduct {
    pub title: Option<String>,
    pub price_text: Option<String>,
    pub rating_text: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub availability: Availability,
    pub method: Option<ExtractionMethod>,
}

/// Caller-supplied filter predicates, typically produced by an upstream
/// intent parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub min_rating: Option<f32>,
    #[serde(default)]
    pub brand: Option<String>,
}

impl FilterSpec {
    /// True if no predicate is set.
    pub fn is_empty(&self) -> bool {
        self.min_price.is_none()
            && self.max_price.is_none()
            && self.min_rating.is_none()
            && self.brand.is_none()
    }
}

/// One scraping request. Immutable, constructed per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub filters: FilterSpec,
    pub limit: usize,
}

impl SearchRequest {
    /// Creates a request with no filters.
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self { query: query.into(), filters: FilterSpec::default(), limit }
    }

    /// Creates a request with the given filters.
    pub fn with_filters(query: impl Into<String>, filters: FilterSpec, limit: usize) -> Self {
        Self { query: query.into(), filters, limit }
    }
}

/// Outcome of one `scrape` call. Created fresh per request and never
/// mutated after return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,
    pub query: String,
    pub records: Vec<ProductRecord>,
    pub elapsed_ms: u64,
    pub error: Option<String>,
    pub block: Option<BlockSignal>,
}

impl ExtractionResult {
    /// A successful result with the given records.
    pub fn ok(query: impl Into<String>, records: Vec<ProductRecord>, elapsed_ms: u64) -> Self {
        Self { success: true, query: query.into(), records, elapsed_ms, error: None, block: None }
    }

    /// A failed result carrying an error message.
    pub fn failed(query: impl Into<String>, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            query: query.into(),
            records: Vec::new(),
            elapsed_ms,
            error: Some(error.into()),
            block: None,
        }
    }

    /// A result for a blocked request.
    pub fn blocked(query: impl Into<String>, signal: BlockSignal, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            query: query.into(),
            records: Vec::new(),
            elapsed_ms,
            error: Some(format!("blocked: {}", signal)),
            block: Some(signal),
        }
    }

    /// Returns number of records.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no records were extracted.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record() -> ProductRecord {
        ProductRecord {
            title: "ASUS VivoBook 15 Thin and Light Laptop".to_string(),
            price_display: "₹45,990".to_string(),
            price: Some(45990.0),
            rating: Some(4.2),
            url: "https://www.flipkart.com/asus-vivobook-15/p/itm123".to_string(),
            image_url: None,
            availability: Availability::InStock,
            extraction_method: ExtractionMethod::Cascade,
        }
    }

    #[test]
    fn test_title_prefix() {
        let record = make_record();
        assert_eq!(record.title_prefix(4), "ASUS");
        assert_eq!(record.title_prefix(500), record.title);
    }

    #[test]
    fn test_title_prefix_multibyte() {
        let mut record = make_record();
        record.title = "₹₹₹₹₹".to_string();
        // Must not panic on non-ASCII boundaries
        assert_eq!(record.title_prefix(3), "₹₹₹");
    }

    #[test]
    fn test_is_vacant() {
        let record = make_record();
        assert!(!record.is_vacant());

        let mut record = make_record();
        record.title = "  ".to_string();
        record.price = None;
        assert!(record.is_vacant());

        // Title alone is enough
        let mut record = make_record();
        record.price = None;
        assert!(!record.is_vacant());
    }

    #[test]
    fn test_filter_spec_is_empty() {
        assert!(FilterSpec::default().is_empty());

        let spec = FilterSpec { max_price: Some(50000.0), ..Default::default() };
        assert!(!spec.is_empty());
    }

    #[test]
    fn test_extraction_result_constructors() {
        let ok = ExtractionResult::ok("laptop", vec![make_record()], 120);
        assert!(ok.success);
        assert_eq!(ok.count(), 1);
        assert!(ok.error.is_none());
        assert!(ok.block.is_none());

        let failed = ExtractionResult::failed("laptop", "request timed out", 5000);
        assert!(!failed.success);
        assert!(failed.is_empty());
        assert_eq!(failed.error.as_deref(), Some("request timed out"));

        let blocked = ExtractionResult::blocked("laptop", BlockSignal::Overloaded, 80);
        assert!(!blocked.success);
        assert_eq!(blocked.block, Some(BlockSignal::Overloaded));
        assert!(blocked.error.unwrap().contains("overloaded"));
    }

    #[test]
    fn test_record_serde_keys_always_present() {
        let mut record = make_record();
        record.price = None;
        record.rating = None;
        record.image_url = None;

        let json = serde_json::to_value(&record).unwrap();
        // Absent fields serialize as null, never omitted
        assert!(json.get("price").unwrap().is_null());
        assert!(json.get("rating").unwrap().is_null());
        assert!(json.get("image_url").unwrap().is_null());
        assert_eq!(json.get("extraction_method").unwrap(), "cascade");
        assert_eq!(json.get("availability").unwrap(), "in_stock");
    }

    #[test]
    fn test_block_signal_serde() {
        let json = serde_json::to_string(&BlockSignal::RateLimited).unwrap();
        assert_eq!(json, "\"rate_limited\"");

        let parsed: BlockSignal = serde_json::from_str("\"captcha\"").unwrap();
        assert_eq!(parsed, BlockSignal::Captcha);
    }

    #[test]
    fn test_search_request_serde() {
        let request = SearchRequest::with_filters(
            "laptop under 50000",
            FilterSpec { max_price: Some(50000.0), ..Default::default() },
            5,
        );
        let json = serde_json::to_string(&request).unwrap();
        let parsed: SearchRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.query, request.query);
        assert_eq!(parsed.filters.max_price, Some(50000.0));
        assert_eq!(parsed.limit, 5);
    }
}
