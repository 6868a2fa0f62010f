use scraper::{Html, Selector};
use serde_json::Value;

use super::PageContext;
use crate::extract::helpers::{num_from_value, parse_price};

const PRICE_SELECTORS: [&str; 4] = [
    ".product-price-current",
    "[class*=\"price-current\"]",
    ".uniform-banner-box-price",
    "[class*=\"product-price\"] [class*=\"current\"]",
];
const ORIGINAL_PRICE_SELECTORS: [&str; 3] = [
    ".product-price-origin",
    "[class*=\"price-original\"]",
    "[class*=\"del\"]",
];

pub(crate) struct Pricing {
    pub price: f64,
    pub original_price: Option<f64>,
    pub currency: String,
}

pub(crate) fn extract(ctx: &PageContext) -> Pricing {
    let mut pricing = Pricing {
        price: 0.0,
        original_price: None,
        currency: "USD".to_string(),
    };

    if let Some(pm) = ctx.state_module("priceModule") {
        pricing.price = state_price(pm).unwrap_or(0.0);
        let original = amount_value(pm, "maxAmount").or_else(|| amount_value(pm, "originalAmount"));
        // A strike-through price at or below the current price is noise
        pricing.original_price = original.filter(|o| *o > pricing.price);
        if let Some(currency) = state_currency(pm) {
            pricing.currency = currency;
        }
    }

    // The DOM is consulted only when the state yielded no price; the
    // strike-through scan rides along in the same branch
    if pricing.price == 0.0 {
        if let Some(price) = first_parsed_price(&ctx.doc, &PRICE_SELECTORS, 0.0) {
            pricing.price = price;
        }
        if let Some(original) = first_parsed_price(&ctx.doc, &ORIGINAL_PRICE_SELECTORS, pricing.price)
        {
            pricing.original_price = Some(original);
        }
    }

    // A visible currency marker on the page beats whatever the state claimed
    if let Some(currency) = sniff_currency(&ctx.doc) {
        pricing.currency = currency;
    }

    pricing
}

fn state_price(pm: &Value) -> Option<f64> {
    amount_value(pm, "minAmount")
        .or_else(|| amount_value(pm, "activityAmount"))
        .or_else(|| {
            pm.get("formattedActivityPrice")
                .and_then(|v| v.as_str())
                .and_then(parse_price)
                .filter(|p| *p != 0.0)
        })
}

fn amount_value(pm: &Value, key: &str) -> Option<f64> {
    pm.get(key)
        .and_then(|a| a.get("value"))
        .and_then(num_from_value)
        .filter(|v| *v != 0.0)
}

fn state_currency(pm: &Value) -> Option<String> {
    pm.get("minAmount")
        .and_then(|a| a.get("currency"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            pm.get("currencyCode")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
}

/// First selector whose first matching element parses to a price above
/// `floor`; a selector whose element fails to parse does not stop the scan.
fn first_parsed_price(doc: &Html, selectors: &[&str], floor: f64) -> Option<f64> {
    for sel_str in selectors {
        if let Ok(sel) = Selector::parse(sel_str) {
            if let Some(el) = doc.select(&sel).next() {
                let text: String = el.text().collect::<Vec<_>>().join(" ");
                if let Some(parsed) = parse_price(&text) {
                    if parsed > floor {
                        return Some(parsed);
                    }
                }
            }
        }
    }
    None
}

fn sniff_currency(doc: &Html) -> Option<String> {
    let sel = Selector::parse("[class*=\"currency\"]").ok()?;
    let el = doc.select(&sel).next()?;
    let text: String = el.text().collect();
    if text.contains('€') {
        Some("EUR".to_string())
    } else if text.contains('$') {
        Some("USD".to_string())
    } else if text.contains('£') {
        Some("GBP".to_string())
    } else {
        None
    }
}
