//! Price range filter.

use super::Filter;
use crate::flipkart::models::ProductRecord;

/// Filters records by numeric price range. Records whose price could not
/// be parsed are excluded: a caller asking for "under ₹50,000" must not
/// receive unpriced listings.
pub struct PriceFilter {
    min: Option<f64>,
    max: Option<f64>,
}

impl PriceFilter {
    /// Creates a new price filter with optional min/max bounds.
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Creates a filter with only minimum price.
    pub fn min(price: f64) -> Self {
        Self { min: Some(price), max: None }
    }

    /// Creates a filter with only maximum price.
    pub fn max(price: f64) -> Self {
        Self { min: None, max: Some(price) }
    }

    /// Creates a filter with both min and max.
    pub fn range(min: f64, max: f64) -> Self {
        Self { min: Some(min), max: Some(max) }
    }
}

impl Filter for PriceFilter {
    fn matches(&self, record: &ProductRecord) -> bool {
        let Some(price) = record.price else {
            return false;
        };

        if let Some(min) = self.min {
            if price < min {
                return false;
            }
        }

        if let Some(max) = self.max {
            if price > max {
                return false;
            }
        }

        true
    }

    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("Price: ₹{:.0} - ₹{:.0}", min, max),
            (Some(min), None) => format!("Price: >= ₹{:.0}", min),
            (None, Some(max)) => format!("Price: <= ₹{:.0}", max),
            (None, None) => "Price: any".to_string(),
        }
    }
}
