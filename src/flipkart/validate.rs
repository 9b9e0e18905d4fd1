//! Record construction, validation, and order-preserving deduplication.

use crate::flipkart::models::{
    ExtractionMethod, ProductRecord, RawProduct, PRICE_UNAVAILABLE,
};
use crate::flipkart::normalize::{parse_price, parse_rating};
use std::collections::HashSet;
use tracing::trace;

const DEDUP_TITLE_PREFIX: usize = 30;

/// Builds a normalized record from raw field values. Returns `None` when
/// the candidate cannot satisfy the record invariants (empty title). Field
/// level parse failures are recovered by leaving the field unset.
pub fn build_record(raw: RawProduct, default_url: &str) -> Option<ProductRecord> {
    let title = raw.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;

    let price_text = raw.price_text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
    let price = price_text.as_deref().and_then(parse_price);
    // The display price is the page's own string, or the explicit
    // sentinel. Never an empty string passed off as a value.
    let price_display = price_text.unwrap_or_else(|| PRICE_UNAVAILABLE.to_string());

    let rating = raw.rating_text.as_deref().and_then(parse_rating);

    Some(ProductRecord {
        title,
        price_display,
        price,
        rating,
        url: raw.url.unwrap_or_else(|| default_url.to_string()),
        image_url: raw.image,
        availability: raw.availability,
        extraction_method: raw.method.unwrap_or(ExtractionMethod::Cascade),
    })
}

/// Builds records from all candidates, dropping the unbuildable ones.
pub fn build_records(raw: Vec<RawProduct>, default_url: &str) -> Vec<ProductRecord> {
    raw.into_iter().filter_map(|r| build_record(r, default_url)).collect()
}

/// Drops records carrying no information (neither title nor price), then
/// removes near-duplicates in an order-preserving pass: later duplicates
/// are dropped, earlier ones retained.
pub fn validate_and_dedup(records: Vec<ProductRecord>) -> Vec<ProductRecord> {
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut out = Vec::with_capacity(records.len());

    for record in records {
        if record.is_vacant() {
            trace!("Dropping vacant record");
            continue;
        }

        let key = dedup_key(&record);
        if seen.insert(key) {
            out.push(record);
        } else {
            trace!("Dropping duplicate record: {}", record.title);
        }
    }

    out
}

/// Near-duplicate key: normalized price, normalized rating, and the first
/// 30 characters of the title.
fn dedup_key(record: &ProductRecord) -> (String, String, String) {
    (
        record.price.map(|p| format!("{:.2}", p)).unwrap_or_default(),
        record.rating.map(|r| format!("{:.1}", r)).unwrap_or_default(),
        record.title_prefix(DEDUP_TITLE_PREFIX).to_string(),
    )
}
