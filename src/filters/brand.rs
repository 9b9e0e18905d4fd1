//! Brand filter.

use super::Filter;
use crate::flipkart::models::ProductRecord;

/// Filters records by brand, a case-insensitive substring test against
/// the title. Search-result cards rarely carry a separate brand field, so
/// the title is the only reliable place to look.
pub struct BrandFilter {
    brand: String,
}

impl BrandFilter {
    /// Creates a new brand filter.
    pub fn new(brand: impl Into<String>) -> Self {
        Self { brand: brand.into().to_lowercase() }
    }
}

impl Filter for BrandFilter {
    fn matches(&self, record: &ProductRecord) -> bool {
        record.title.to_lowercase().contains(&self.brand)
    }

    fn description(&self) -> String {
        format!("Brand: {}", self.brand)
    }
}
