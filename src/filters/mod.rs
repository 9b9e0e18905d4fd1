//! Record filtering with composable predicates.

pub mod brand;
pub mod price;
pub mod rating;

use crate::flipkart::models::{FilterSpec, ProductRecord};

pub use brand::BrandFilter;
pub use price::PriceFilter;
pub use rating::RatingFilter;

/// Trait for filtering product records.
pub trait Filter: Send + Sync {
    /// Returns true if the record passes the filter.
    fn matches(&self, record: &ProductRecord) -> bool;

    /// Returns a description of this filter.
    fn description(&self) -> String;
}

/// A chain of filters that must all pass (logical AND). Application is
/// idempotent and the order of filters never changes the surviving set.
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    /// Creates an empty filter chain.
    pub fn new() -> Self {
        Self { filters: Vec::new() }
    }

    /// Builds a chain from caller-supplied filter predicates.
    pub fn from_spec(spec: &FilterSpec) -> Self {
        let mut chain = Self::new();

        if spec.min_price.is_some() || spec.max_price.is_some() {
            chain.add(PriceFilter::new(spec.min_price, spec.max_price));
        }
        if let Some(min_rating) = spec.min_rating {
            chain.add(RatingFilter::new(min_rating));
        }
        if let Some(brand) = &spec.brand {
            if !brand.trim().is_empty() {
                chain.add(BrandFilter::new(brand.trim()));
            }
        }

        chain
    }

    /// Adds a filter to the chain.
    pub fn add(&mut self, filter: impl Filter + 'static) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Checks if a record passes all filters.
    pub fn matches(&self, record: &ProductRecord) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }

    /// Filters a collection of records, preserving order.
    pub fn apply(&self, records: Vec<ProductRecord>) -> Vec<ProductRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }

    /// Returns true if no filters are configured.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Returns the number of filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns descriptions of all filters.
    pub fn descriptions(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.description()).collect()
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}
