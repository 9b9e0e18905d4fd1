//! Heuristic recovery path for pages where every declared container rule
//! fails, which is what a Flipkart class-name rotation looks like from the
//! outside.
//!
//! Product anchors are located by their `/p/` detail-path pattern, the
//! smallest enclosing card-like ancestor is adopted as the container, and
//! fields are recovered with bounded regex scans plus plausibility checks.

use crate::flipkart::models::{Availability, ExtractionMethod, RawProduct};
use crate::flipkart::normalize::{absolutize_url, clean_title};
use regex_lite::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, trace};

/// Product-detail path marker in anchor hrefs.
const PRODUCT_PATH: &str = "/p/";

/// How far up the ancestor chain to look for a card-like container.
const ANCESTOR_DEPTH: usize = 8;

// A product card's text is bigger than a bare link and smaller than a page
// section.
const CARD_TEXT_MIN: usize = 50;
const CARD_TEXT_MAX: usize = 1500;

// Bounded scan windows keep a price/rating from bleeding in from the next
// card when the adopted ancestor is too generous.
const PRICE_SCAN_CHARS: usize = 500;
const RATING_SCAN_CHARS: usize = 300;

const ANCHOR_TITLE_MIN: usize = 10;
const ANCHOR_TITLE_MAX: usize = 200;
const NODE_TITLE_MIN: usize = 15;
const NODE_TITLE_MAX: usize = 150;
const TITLE_TRUNCATE: usize = 120;

const DEDUP_TITLE_PREFIX: usize = 30;

static ANCHORS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static IMAGES: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

// Ordered price patterns, most specific grouping first so "₹1,33,999" is
// never shredded into "33,999" by a shorter pattern.
static PRICE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"₹\s*([0-9]{1,2},[0-9]{2},[0-9]{3})").unwrap(),
        Regex::new(r"₹\s*([0-9]{1,3},[0-9]{3})").unwrap(),
        Regex::new(r"₹\s*([0-9]{4,7})").unwrap(),
        Regex::new(r"Rs\.?\s*([0-9][0-9,]{3,9})").unwrap(),
    ]
});

// Ordered rating patterns; all require the X.Y shape so review counts and
// prices cannot match.
static RATING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"([0-9]\.[0-9]{1,2})\s*★").unwrap(),
        Regex::new(r"([0-9]\.[0-9]{1,2})\s*out of 5").unwrap(),
        Regex::new(r"([0-9]\.[0-9]{1,2})\s*\([0-9,]+\)").unwrap(),
        Regex::new(r"★\s*([0-9]\.[0-9]{1,2})").unwrap(),
        Regex::new(r"([0-9]\.[0-9]{1,2})\s*[(|,]").unwrap(),
    ]
});

static PURE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+\.?[0-9]*$").unwrap());

/// Recovers product candidates from a page the cascade could not read.
pub struct FallbackExtractor {
    base_url: String,
}

impl FallbackExtractor {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }

    /// Scans the document for product anchors and recovers up to
    /// `max_records` candidates. Zero anchors is a normal outcome and
    /// yields an empty vector, never an error.
    pub fn extract(&self, document: &Html, max_records: usize) -> Vec<RawProduct> {
        let anchors: Vec<ElementRef<'_>> = document
            .select(&ANCHORS)
            .filter(|a| a.value().attr("href").is_some_and(is_product_href))
            .collect();

        debug!("Fallback found {} product anchors", anchors.len());

        let mut products = Vec::new();
        let mut seen: HashSet<(String, String, String)> = HashSet::new();

        for anchor in anchors {
            if products.len() >= max_records {
                break;
            }

            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let url = absolutize_url(&self.base_url, href);

            let container = find_card_container(anchor);
            let container_text: String = container.text().collect();

            let Some(title) = recover_title(anchor, container) else {
                trace!("Discarding anchor without plausible title: {}", url);
                continue;
            };

            let Some(price_display) = recover_price(&container_text) else {
                trace!("Discarding candidate without plausible price: {}", title);
                continue;
            };

            let rating = recover_rating(&container_text);

            let key = (
                price_display.clone(),
                rating.clone().unwrap_or_default(),
                prefix(&title, DEDUP_TITLE_PREFIX).to_string(),
            );
            if !seen.insert(key) {
                trace!("Discarding duplicate candidate: {}", title);
                continue;
            }

            let image = container
                .select(&IMAGES)
                .next()
                .and_then(|img| {
                    img.value().attr("src").or_else(|| img.value().attr("data-src"))
                })
                .map(|src| absolutize_url(&self.base_url, src));

            products.push(RawProduct {
                title: Some(title),
                price_text: Some(price_display),
                rating_text: rating,
                url: Some(url),
                image,
                availability: Availability::Unknown,
                method: Some(ExtractionMethod::Fallback),
            });
        }

        debug!("Fallback recovered {} candidates", products.len());
        products
    }
}

fn is_product_href(href: &str) -> bool {
    if !href.contains(PRODUCT_PATH) {
        return false;
    }
    // Relative hrefs, or absolute ones pointing back at the marketplace
    !href.starts_with("http") || href.contains("flipkart.com")
}

/// Walks up to `ANCESTOR_DEPTH` levels and adopts the smallest enclosing
/// ancestor that looks like a single product card: currency marker
/// present, text length within the card window. Stopping at the first
/// match keeps neighboring cards' prices out of the scan window.
fn find_card_container(anchor: ElementRef<'_>) -> ElementRef<'_> {
    for (level, node) in anchor.ancestors().enumerate() {
        if level >= ANCESTOR_DEPTH {
            break;
        }
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        let name = element.value().name();
        if name == "body" || name == "html" {
            break;
        }

        let text: String = element.text().collect();
        let len = text.trim().chars().count();
        if (CARD_TEXT_MIN..=CARD_TEXT_MAX).contains(&len) && has_currency_marker(&text) {
            return element;
        }
    }

    anchor
}

fn has_currency_marker(text: &str) -> bool {
    text.contains('₹') || text.contains("Rs.") || text.contains("Rs ")
}

/// Title preferentially comes from the anchor's own text; failing that,
/// the first container text node with title-like length and content.
fn recover_title(anchor: ElementRef<'_>, container: ElementRef<'_>) -> Option<String> {
    let anchor_text: String = anchor.text().collect();
    let anchor_text = anchor_text.trim();
    let anchor_len = anchor_text.chars().count();

    if (ANCHOR_TITLE_MIN..ANCHOR_TITLE_MAX).contains(&anchor_len) {
        let cleaned = clean_title(anchor_text);
        if cleaned.chars().count() >= ANCHOR_TITLE_MIN {
            return Some(truncate(&cleaned, TITLE_TRUNCATE));
        }
    }

    for node_text in container.text().take(10) {
        let text = node_text.trim();
        let len = text.chars().count();
        if (NODE_TITLE_MIN..NODE_TITLE_MAX).contains(&len)
            && !text.contains('₹')
            && !PURE_NUMBER.is_match(text)
            && !text.to_lowercase().contains("rating")
        {
            let cleaned = clean_title(text);
            if cleaned.chars().count() >= ANCHOR_TITLE_MIN {
                return Some(truncate(&cleaned, TITLE_TRUNCATE));
            }
        }
    }

    None
}

/// First pattern whose match survives digit-grouping and magnitude
/// validation wins. Returns the normalized display string ("₹12,499").
fn recover_price(container_text: &str) -> Option<String> {
    let window = prefix(container_text, PRICE_SCAN_CHARS);

    for pattern in PRICE_PATTERNS.iter() {
        for captures in pattern.captures_iter(window) {
            let Some(matched) = captures.get(1) else {
                continue;
            };
            if validate_price_group(matched.as_str()).is_some() {
                return Some(format!("₹{}", matched.as_str()));
            }
        }
    }

    None
}

/// Grouping plausibility: a 2-part group is "1–3 digits, 3 digits"; a
/// 3-part group is the Indian "1–2, 2, 3 digits"; ungrouped needs 4–7
/// digits. The joined value must land in the plausible rupee window.
fn validate_price_group(text: &str) -> Option<f64> {
    let parts: Vec<&str> = text.split(',').collect();

    let well_formed = match parts.as_slice() {
        [single] => (4..=7).contains(&single.len()),
        [head, tail] => (1..=3).contains(&head.len()) && tail.len() == 3,
        [head, mid, tail] => (1..=2).contains(&head.len()) && mid.len() == 2 && tail.len() == 3,
        _ => false,
    };
    if !well_formed || !parts.iter().all(|p| p.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }

    let value: f64 = parts.concat().parse().ok()?;
    let floor = if parts.len() == 3 { 10_000.0 } else { 1_000.0 };
    if (floor..=9_999_999.0).contains(&value) {
        Some(value)
    } else {
        None
    }
}

/// First pattern whose match lands in [1.0, 5.0] wins; the value is
/// rounded to one decimal place.
fn recover_rating(container_text: &str) -> Option<String> {
    let window = prefix(container_text, RATING_SCAN_CHARS);

    for pattern in RATING_PATTERNS.iter() {
        for captures in pattern.captures_iter(window) {
            let Some(matched) = captures.get(1) else {
                continue;
            };
            if let Ok(value) = matched.as_str().parse::<f32>() {
                if (1.0..=5.0).contains(&value) {
                    return Some(format!("{:.1}", (value * 10.0).round() / 10.0));
                }
            }
        }
    }

    None
}

fn prefix(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn truncate(text: &str, n: usize) -> String {
    prefix(text, n).trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> FallbackExtractor {
        FallbackExtractor::new("https://www.flipkart.com")
    }

    // Unstyled markup: no known class names anywhere, which is exactly the
    // situation that activates this extractor.
    fn fallback_card(title: &str, tail: &str) -> String {
        format!(
            r#"<html><body>
                <div>
                    <div>
                        <a href="/widget-pro/p/itmabc123">{title}</a>
                        <span>{tail}</span>
                        <span>Free delivery by Tomorrow, assured seller</span>
                        <img data-src="//img.example.com/widget.jpg">
                    </div>
                </div>
            </body></html>"#
        )
    }

    #[test]
    fn test_recovers_record_from_anchor_and_noise() {
        let html = fallback_card("Widget Pro ₹12,499 (1,204) 4.1★", "₹12,499 (1,204) 4.1★");
        let document = Html::parse_document(&html);
        let products = extractor().extract(&document, 5);

        assert_eq!(products.len(), 1);
        let p = &products[0];
        assert_eq!(p.title.as_deref(), Some("Widget Pro"));
        assert_eq!(p.price_text.as_deref(), Some("₹12,499"));
        assert_eq!(p.rating_text.as_deref(), Some("4.1"));
        assert_eq!(p.url.as_deref(), Some("https://www.flipkart.com/widget-pro/p/itmabc123"));
        assert_eq!(p.image.as_deref(), Some("https://img.example.com/widget.jpg"));
        assert_eq!(p.method, Some(ExtractionMethod::Fallback));
        assert_eq!(p.availability, Availability::Unknown);
    }

    #[test]
    fn test_no_anchors_yields_empty_not_error() {
        let html = "<html><body><p>A page with no product links whatsoever.</p></body></html>";
        let document = Html::parse_document(html);
        assert!(extractor().extract(&document, 5).is_empty());
    }

    #[test]
    fn test_non_product_anchors_ignored() {
        let html = r#"<html><body>
            <a href="/helpcentre">Help Centre</a>
            <a href="/account/login">Login</a>
        </body></html>"#;
        let document = Html::parse_document(html);
        assert!(extractor().extract(&document, 5).is_empty());
    }

    #[test]
    fn test_candidate_without_price_discarded() {
        let html = r#"<html><body>
            <div>
                <a href="/widget-pro/p/itmabc123">Widget Pro Deluxe Edition</a>
                <span>A long description of the widget with no price anywhere in it.</span>
            </div>
        </body></html>"#;
        let document = Html::parse_document(html);
        assert!(extractor().extract(&document, 5).is_empty());
    }

    #[test]
    fn test_candidate_without_title_discarded() {
        // Anchor text too short, no title-like text node either
        let html = r#"<html><body>
            <div>
                <a href="/x/p/itm1">Buy</a>
                <span>₹12,499</span>
                <span>4.1★</span>
            </div>
        </body></html>"#;
        let document = Html::parse_document(html);
        assert!(extractor().extract(&document, 5).is_empty());
    }

    #[test]
    fn test_title_recovered_from_text_node_when_anchor_is_noise() {
        let html = r#"<html><body>
            <div>
                <a href="/widget/p/itm1">Buy now</a>
                <span>Widget Ultra Portable Speaker</span>
                <span>₹12,499 with exchange offer available today</span>
            </div>
        </body></html>"#;
        let document = Html::parse_document(html);
        let products = extractor().extract(&document, 5);

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].title.as_deref(), Some("Widget Ultra Portable Speaker"));
    }

    #[test]
    fn test_indian_grouping_not_shredded() {
        let html = fallback_card(
            "Gaming Laptop Ultra Max Edition",
            "₹1,33,999 lowest price this season 4.5★",
        );
        let document = Html::parse_document(&html);
        let products = extractor().extract(&document, 5);

        assert_eq!(products[0].price_text.as_deref(), Some("₹1,33,999"));
    }

    #[test]
    fn test_duplicate_candidates_collapse() {
        let html = r#"<html><body>
            <div>
                <a href="/widget-pro/p/itm1">Widget Pro ₹12,499</a>
                <span>₹12,499 rated 4.1★ by verified buyers this month</span>
            </div>
            <div>
                <a href="/widget-pro/p/itm1?lid=2">Widget Pro ₹12,499</a>
                <span>₹12,499 rated 4.1★ by verified buyers this month</span>
            </div>
        </body></html>"#;
        let document = Html::parse_document(html);
        let products = extractor().extract(&document, 5);

        assert_eq!(products.len(), 1);
    }

    #[test]
    fn test_max_records_respected() {
        let mut html = String::from("<html><body>");
        for i in 0..6 {
            html.push_str(&format!(
                r#"<div>
                    <a href="/widget-{i}/p/itm{i}">Widget Model Number {i} Special</a>
                    <span>₹{}0,999 best seller with 4.{i}★ average rating</span>
                </div>"#,
                i + 1
            ));
        }
        html.push_str("</body></html>");

        let document = Html::parse_document(&html);
        let products = extractor().extract(&document, 3);
        assert_eq!(products.len(), 3);
    }

    // validate_price_group

    #[test]
    fn test_price_grouping_two_part() {
        assert_eq!(validate_price_group("79,990"), Some(79990.0));
        assert_eq!(validate_price_group("1,999"), Some(1999.0));
        // Malformed tail
        assert_eq!(validate_price_group("79,99"), None);
        assert_eq!(validate_price_group("7999,0"), None);
    }

    #[test]
    fn test_price_grouping_three_part() {
        assert_eq!(validate_price_group("1,33,999"), Some(133999.0));
        assert_eq!(validate_price_group("12,34,567"), Some(1234567.0));
        // Western grouping is not plausible here
        assert_eq!(validate_price_group("123,456,789"), None);
    }

    #[test]
    fn test_price_grouping_plain() {
        assert_eq!(validate_price_group("12499"), Some(12499.0));
        // Too small / too large
        assert_eq!(validate_price_group("999"), None);
        assert_eq!(validate_price_group("99999999"), None);
    }

    // recover_price / recover_rating

    #[test]
    fn test_recover_price_rejects_implausible_magnitudes() {
        assert_eq!(recover_price("₹999 cashback on ₹45,990 purchase"), Some("₹45,990".to_string()));
        assert_eq!(recover_price("₹999 only"), None);
    }

    #[test]
    fn test_recover_price_rs_notation() {
        assert_eq!(recover_price("Rs. 45,990 onwards"), Some("₹45,990".to_string()));
        assert_eq!(recover_price("Rs 12499 incl. taxes"), Some("₹12499".to_string()));
    }

    #[test]
    fn test_recover_rating_window() {
        assert_eq!(recover_rating("4.3★"), Some("4.3".to_string()));
        assert_eq!(recover_rating("4.3 out of 5"), Some("4.3".to_string()));
        assert_eq!(recover_rating("6.3★"), None);
        assert_eq!(recover_rating("0.5★"), None);
        assert_eq!(recover_rating("no score yet"), None);
    }

    #[test]
    fn test_recover_rating_skips_bad_match_for_later_pattern() {
        // The ★-suffixed value is out of range; the "out of 5" one is valid
        assert_eq!(recover_rating("9.9★ badge, scored 4.2 out of 5"), Some("4.2".to_string()));
    }
}
