//! Pure normalizers for display strings scraped off listing pages.
//!
//! Every function here is total: bad input yields `None` or an unchanged
//! string, never a panic or an error.

use regex_lite::Regex;
use std::sync::LazyLock;

/// Plausible price window in rupees. Matches outside it are treated as
/// mis-parses (percentages, review counts, pincode digits).
pub const PRICE_MIN: f64 = 1_000.0;
pub const PRICE_MAX: f64 = 9_999_999.0;

/// Valid star-rating window.
pub const RATING_MIN: f32 = 1.0;
pub const RATING_MAX: f32 = 5.0;

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)").unwrap());

// Trailing noise that rides along with anchor-text titles
static TITLE_PRICE_NOISE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"₹[\d,]+.*$").unwrap());
static TITLE_DECIMAL_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+.*$").unwrap());
static TITLE_COUNT_NOISE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\d[\d,]*\)").unwrap());
static TITLE_LEADING_INDEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\s*").unwrap());

/// Parses a display price like "₹55,990" or "Rs. 12499" into a numeric
/// value. Strips currency symbols and thousands separators; rejects
/// non-numeric remainders and values outside the plausibility window.
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned: String =
        text.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect::<String>();

    if cleaned.is_empty() {
        return None;
    }

    let value: f64 = cleaned.parse().ok()?;
    if (PRICE_MIN..=PRICE_MAX).contains(&value) {
        Some(value)
    } else {
        None
    }
}

/// Extracts the first numeric token from a rating string like "4.3" or
/// "4.3 out of 5 stars". Values outside [1.0, 5.0] are rejected even when
/// syntactically valid.
pub fn parse_rating(text: &str) -> Option<f32> {
    let captures = FIRST_NUMBER.captures(text)?;
    let value: f32 = captures.get(1)?.as_str().parse().ok()?;

    if (RATING_MIN..=RATING_MAX).contains(&value) {
        // One decimal place is all the page ever shows
        Some((value * 10.0).round() / 10.0)
    } else {
        None
    }
}

/// Strips price/rating/count artifacts that cling to anchor-text titles
/// and collapses whitespace. Returns an empty string when nothing
/// title-like survives.
pub fn clean_title(text: &str) -> String {
    let mut title = text.trim().to_string();
    title = TITLE_PRICE_NOISE.replace(&title, "").into_owned();
    title = TITLE_DECIMAL_NOISE.replace(&title, "").into_owned();
    title = TITLE_COUNT_NOISE.replace_all(&title, "").into_owned();
    title = TITLE_LEADING_INDEX.replace(&title, "").into_owned();

    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().all(|c| c.is_ascii_digit()) {
        return String::new();
    }
    match collapsed.to_lowercase().as_str() {
        "n/a" | "na" | "none" | "null" => String::new(),
        _ => collapsed,
    }
}

/// Collapses runs of whitespace into single spaces and trims. Used on
/// cascade-selected titles, which carry layout whitespace but no trailing
/// noise.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves protocol-relative and root-relative URLs against a base.
/// Already-absolute URLs pass through unchanged.
pub fn absolutize_url(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else if href.starts_with('/') {
        format!("{}{}", base.trim_end_matches('/'), href)
    } else {
        format!("{}/{}", base.trim_end_matches('/'), href)
    }
}
