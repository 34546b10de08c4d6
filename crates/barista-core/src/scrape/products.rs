use regex::Regex;
use std::sync::LazyLock;

use crate::scrape::html::{find_all, find_first, remove_elements, text_content};

static CURRENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"RM\s*").expect("Invalid regex"));

const NO_PRICE: &str = "No Price";

/// Product documents from a collection page, one per `product-card`.
///
/// Cards without a title are skipped. The sale price is preferred over the
/// compare-at price.
pub fn parse_products(page: &str) -> Vec<String> {
    find_all(page, "product-card", Some("product-card"))
        .into_iter()
        .filter_map(|card| {
            let name = card_name(card.inner)?;
            let price = card_price(card.inner).unwrap_or_else(|| NO_PRICE.to_string());
            Some(format!("Product: {}\nPrice: {}\n", name, price))
        })
        .collect()
}

fn card_name(card: &str) -> Option<String> {
    let title = find_first(card, "span", Some("product-card__title"))?;
    let link = find_first(title.inner, "a", None)?;
    Some(link.text()).filter(|name| !name.is_empty())
}

fn card_price(card: &str) -> Option<String> {
    let prices = find_first(card, "price-list", None).map_or(card, |list| list.inner);
    ["sale-price", "compare-at-price"].iter().find_map(|tag| {
        let element = find_first(prices, tag, None)?;
        let visible = remove_elements(element.inner, "span", "sr-only");
        normalize_price(&text_content(&visible))
    })
}

/// "RM79.00" and "RM 79.00" both become "RM 79.00".
fn normalize_price(raw: &str) -> Option<String> {
    let cleaned = raw.replace('"', "");
    let cleaned = CURRENCY_RE.replace_all(cleaned.trim(), "RM ");
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}
