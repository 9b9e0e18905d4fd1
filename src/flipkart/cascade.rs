//! Cascading selector extraction for search-result pages.
//!
//! Container rules are tried in priority order and the first rule that
//! yields at least one plausible card is adopted for the whole pass, so a
//! single page is never parsed under two different structure assumptions.
//! Within each card the same first-success policy applies per field.

use crate::flipkart::models::{Availability, ExtractionMethod, RawProduct};
use crate::flipkart::normalize::{self, collapse_whitespace};
use crate::flipkart::selectors::{CompiledRule, SelectorSet};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, trace};

// A card must hold at least a title-sized blob of text and an outbound
// link; anything bigger than a few KB of text is a page section, not a card.
const CONTAINER_TEXT_MIN: usize = 20;
const CONTAINER_TEXT_MAX: usize = 4000;

const TITLE_MIN: usize = 3;
const TITLE_MAX: usize = 250;

static ANY_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

const OUT_OF_STOCK_PHRASES: &[&str] =
    &["currently unavailable", "out of stock", "sold out", "temporarily unavailable"];

/// Extracts product candidates using declared selector rules.
pub struct CascadeExtractor {
    base_url: String,
}

impl CascadeExtractor {
    /// Creates an extractor that resolves relative URLs against `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }

    /// Runs the cascade over a parsed document. Returns an empty vector
    /// when no container rule matches; the caller then decides whether to
    /// engage the fallback extractor.
    pub fn extract(&self, document: &Html, selectors: &SelectorSet) -> Vec<RawProduct> {
        let Some((rule, containers)) = self.adopt_containers(document, selectors) else {
            debug!("No container rule matched");
            return Vec::new();
        };

        debug!("Adopted container rule '{}' with {} cards", rule.name, containers.len());

        containers
            .into_iter()
            .map(|container| self.extract_card(container, selectors))
            .collect()
    }

    /// Tries container rules in priority order; the first rule producing at
    /// least one plausible card wins for the entire pass.
    fn adopt_containers<'a>(
        &self,
        document: &'a Html,
        selectors: &'a SelectorSet,
    ) -> Option<(&'a CompiledRule, Vec<ElementRef<'a>>)> {
        for rule in &selectors.container {
            let plausible: Vec<ElementRef<'a>> =
                document.select(&rule.selector).filter(|e| is_plausible_container(e)).collect();

            trace!("Container rule '{}' matched {} plausible cards", rule.name, plausible.len());

            if !plausible.is_empty() {
                return Some((rule, plausible));
            }
        }
        None
    }

    /// Extracts one card in the fixed field order: title, price, rating,
    /// url, image. A missing field stays unset; it never aborts the card.
    fn extract_card(&self, container: ElementRef<'_>, selectors: &SelectorSet) -> RawProduct {
        // Declared title elements hold clean text; only whitespace needs
        // normalizing here, unlike the fallback's noisy anchor text.
        let title = first_match(container, &selectors.title, |text| {
            let cleaned = collapse_whitespace(text);
            ((TITLE_MIN..=TITLE_MAX).contains(&cleaned.chars().count())).then_some(cleaned)
        });

        let price_text = first_match(container, &selectors.price, |text| {
            normalize::parse_price(text).map(|_| text.trim().to_string())
        });

        let rating_text = first_match(container, &selectors.rating, |text| {
            normalize::parse_rating(text).map(|_| text.trim().to_string())
        });

        let url = first_attr(container, &selectors.link, &["href"])
            .map(|href| normalize::absolutize_url(&self.base_url, &href));

        let image = first_attr(container, &selectors.image, &["src", "data-src"])
            .map(|src| normalize::absolutize_url(&self.base_url, &src));

        let availability = classify_availability(container, price_text.is_some());

        RawProduct {
            title,
            price_text,
            rating_text,
            url,
            image,
            availability,
            method: Some(ExtractionMethod::Cascade),
        }
    }
}

/// A plausible card has bounded text and at least one embedded link.
fn is_plausible_container(element: &ElementRef<'_>) -> bool {
    let text: String = element.text().collect();
    let len = text.trim().chars().count();

    (CONTAINER_TEXT_MIN..=CONTAINER_TEXT_MAX).contains(&len)
        && element.select(&ANY_LINK).next().is_some()
}

/// First rule whose matched element text passes `accept`.
fn first_match<F>(container: ElementRef<'_>, rules: &[CompiledRule], accept: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for rule in rules {
        for element in container.select(&rule.selector) {
            let text: String = element.text().collect();
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            if let Some(value) = accept(text) {
                trace!("Field rule '{}' accepted", rule.name);
                return Some(value);
            }
        }
    }
    None
}

/// First rule whose matched element carries one of `attrs` non-empty.
fn first_attr(
    container: ElementRef<'_>,
    rules: &[CompiledRule],
    attrs: &[&str],
) -> Option<String> {
    for rule in rules {
        for element in container.select(&rule.selector) {
            for attr in attrs {
                if let Some(value) = element.value().attr(attr) {
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
    }
    None
}

fn classify_availability(container: ElementRef<'_>, has_price: bool) -> Availability {
    let text: String = container.text().collect::<String>().to_lowercase();

    if OUT_OF_STOCK_PHRASES.iter().any(|phrase| text.contains(phrase)) {
        Availability::OutOfStock
    } else if has_price {
        Availability::InStock
    } else {
        Availability::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> CascadeExtractor {
        CascadeExtractor::new("https://www.flipkart.com")
    }

    fn card_html(title: &str, price: &str, rating: &str) -> String {
        format!(
            r#"<html><body>
                <div data-id="ITM001">
                    <a href="/widget-pro/p/itm001">
                        <div class="KzDlHZ">{title}</div>
                    </a>
                    <div class="Nx9bqj">{price}</div>
                    <div class="XQDdHH">{rating}</div>
                    <img src="//img.example.com/widget.jpg">
                </div>
            </body></html>"#
        )
    }

    #[test]
    fn test_extracts_single_card() {
        let html = card_html("Widget Pro Max 5G", "₹55,990", "4.3");
        let document = Html::parse_document(&html);
        let products = extractor().extract(&document, &SelectorSet::embedded_default());

        assert_eq!(products.len(), 1);
        let p = &products[0];
        assert_eq!(p.title.as_deref(), Some("Widget Pro Max 5G"));
        assert_eq!(p.price_text.as_deref(), Some("₹55,990"));
        assert_eq!(p.rating_text.as_deref(), Some("4.3"));
        assert_eq!(p.url.as_deref(), Some("https://www.flipkart.com/widget-pro/p/itm001"));
        assert_eq!(p.image.as_deref(), Some("https://img.example.com/widget.jpg"));
        assert_eq!(p.availability, Availability::InStock);
        assert_eq!(p.method, Some(ExtractionMethod::Cascade));
    }

    #[test]
    fn test_no_containers_returns_empty() {
        let html = "<html><body><p>Nothing resembling a product card here at all.</p></body></html>";
        let document = Html::parse_document(html);
        let products = extractor().extract(&document, &SelectorSet::embedded_default());
        assert!(products.is_empty());
    }

    #[test]
    fn test_container_without_link_is_implausible() {
        let html = r#"<html><body>
            <div data-id="ITM001">
                <div class="KzDlHZ">A product title without any anchor element</div>
                <div class="Nx9bqj">₹12,999</div>
            </div>
        </body></html>"#;
        let document = Html::parse_document(html);
        let products = extractor().extract(&document, &SelectorSet::embedded_default());
        assert!(products.is_empty());
    }

    #[test]
    fn test_first_container_rule_adopted_for_whole_pass() {
        // Both the data-id rule and the legacy class rule match different
        // elements; only the higher-priority data-id cards must be used.
        let html = r#"<html><body>
            <div data-id="ITM001">
                <a href="/a/p/itm001"><div class="KzDlHZ">Card From Primary Rule</div></a>
                <div class="Nx9bqj">₹10,000</div>
            </div>
            <div class="_1AtVbE">
                <a href="/b/p/itm002"><div class="KzDlHZ">Card From Legacy Rule</div></a>
                <div class="Nx9bqj">₹20,000</div>
            </div>
        </body></html>"#;
        let document = Html::parse_document(html);
        let products = extractor().extract(&document, &SelectorSet::embedded_default());

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].title.as_deref(), Some("Card From Primary Rule"));
    }

    #[test]
    fn test_missing_fields_left_unset() {
        let html = r#"<html><body>
            <div data-id="ITM001">
                <a href="/widget/p/itm001"><div class="KzDlHZ">Widget Without Price Or Rating</div></a>
            </div>
        </body></html>"#;
        let document = Html::parse_document(html);
        let products = extractor().extract(&document, &SelectorSet::embedded_default());

        assert_eq!(products.len(), 1);
        let p = &products[0];
        assert!(p.price_text.is_none());
        assert!(p.rating_text.is_none());
        assert_eq!(p.availability, Availability::Unknown);
    }

    #[test]
    fn test_implausible_price_tries_next_rule() {
        // The first price rule matches a percentage; the second holds the
        // real price. First plausible value wins.
        let html = r#"<html><body>
            <div data-id="ITM001">
                <a href="/widget/p/itm001"><div class="KzDlHZ">Discounted Widget Deluxe</div></a>
                <div class="Nx9bqj">13% off</div>
                <div class="_30jeq3">₹45,990</div>
            </div>
        </body></html>"#;
        let document = Html::parse_document(html);
        let products = extractor().extract(&document, &SelectorSet::embedded_default());

        assert_eq!(products[0].price_text.as_deref(), Some("₹45,990"));
    }

    #[test]
    fn test_rating_outside_window_rejected() {
        let html = card_html("Widget With Review Count", "₹12,499", "7.2");
        let document = Html::parse_document(&html);
        let products = extractor().extract(&document, &SelectorSet::embedded_default());

        assert!(products[0].rating_text.is_none());
    }

    #[test]
    fn test_out_of_stock_detection() {
        let html = r#"<html><body>
            <div data-id="ITM001">
                <a href="/widget/p/itm001"><div class="KzDlHZ">Popular Widget Edition</div></a>
                <div class="Nx9bqj">₹12,499</div>
                <span>Currently unavailable</span>
            </div>
        </body></html>"#;
        let document = Html::parse_document(html);
        let products = extractor().extract(&document, &SelectorSet::embedded_default());

        assert_eq!(products[0].availability, Availability::OutOfStock);
    }

    #[test]
    fn test_deterministic_output() {
        let html = card_html("Widget Pro Max 5G", "₹55,990", "4.3");
        let document = Html::parse_document(&html);
        let selectors = SelectorSet::embedded_default();

        let first = extractor().extract(&document, &selectors);
        let second = extractor().extract(&document, &selectors);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.title, b.title);
            assert_eq!(a.price_text, b.price_text);
            assert_eq!(a.rating_text, b.rating_text);
            assert_eq!(a.url, b.url);
        }
    }

    #[test]
    fn test_multiple_cards_preserve_document_order() {
        let html = r#"<html><body>
            <div data-id="A"><a href="/a/p/1"><div class="KzDlHZ">First Product Entry</div></a><div class="Nx9bqj">₹10,000</div></div>
            <div data-id="B"><a href="/b/p/2"><div class="KzDlHZ">Second Product Entry</div></a><div class="Nx9bqj">₹20,000</div></div>
            <div data-id="C"><a href="/c/p/3"><div class="KzDlHZ">Third Product Entry</div></a><div class="Nx9bqj">₹30,000</div></div>
        </body></html>"#;
        let document = Html::parse_document(html);
        let products = extractor().extract(&document, &SelectorSet::embedded_default());

        let titles: Vec<_> = products.iter().filter_map(|p| p.title.as_deref()).collect();
        assert_eq!(
            titles,
            vec!["First Product Entry", "Second Product Entry", "Third Product Entry"]
        );
    }
}
