//! Minimum rating filter.

use super::Filter;
use crate::flipkart::models::ProductRecord;

/// Filters records by minimum star rating. Unrated records are excluded:
/// "at least 4 stars" cannot be satisfied by a listing with no rating.
pub struct RatingFilter {
    min_stars: f32,
}

impl RatingFilter {
    /// Creates a new rating filter with minimum stars.
    pub fn new(min_stars: f32) -> Self {
        Self { min_stars: min_stars.clamp(0.0, 5.0) }
    }
}

impl Filter for RatingFilter {
    fn matches(&self, record: &ProductRecord) -> bool {
        let Some(rating) = record.rating else {
            return false;
        };

        rating >= self.min_stars
    }

    fn description(&self) -> String {
        format!("Rating: >= {:.1} stars", self.min_stars)
    }
}
