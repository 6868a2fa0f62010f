use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

static SIZE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_\d+x\d+\w*\.").expect("valid regex"));
static DOTTED_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\d+x\d+\.").expect("valid regex"));

/// Parse a price string by extracting digits, periods, and commas, then
/// determine the decimal separator based on position and context.
/// Handles both US format (1,234.56) and European format (1.234,56).
pub fn parse_price(s: &str) -> Option<f64> {
    // Keep only digits, periods, and commas
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let has_dot = cleaned.contains('.');
    let has_comma = cleaned.contains(',');

    let normalized = if has_dot && has_comma {
        // Both present: the LAST one is the decimal separator
        let last_dot = cleaned.rfind('.').unwrap();
        let last_comma = cleaned.rfind(',').unwrap();
        if last_comma > last_dot {
            // Comma is decimal (European: 1.234,56)
            cleaned.replace('.', "").replacen(',', ".", 1)
        } else {
            // Dot is decimal (US: 1,234.56)
            cleaned.replace(',', "")
        }
    } else if has_comma {
        // Only commas: check if it looks like a thousands separator
        let last_comma = cleaned.rfind(',').unwrap();
        let after_comma = &cleaned[last_comma + 1..];
        if after_comma.len() == 3 && after_comma.chars().all(|c| c.is_ascii_digit()) {
            // Exactly 3 digits after last comma => thousands separator (e.g. "1,000")
            cleaned.replace(',', "")
        } else {
            // Otherwise treat comma as decimal (e.g. "23,99")
            cleaned.replacen(',', ".", 1)
        }
    } else {
        // Only dots or no separator at all: parse normally
        cleaned
    };

    normalized.parse().ok()
}

/// Extract text from a document by trying comma-separated CSS selectors.
pub fn extract_text(doc: &Html, selectors: &str) -> Option<String> {
    for sel_str in selectors.split(',') {
        if let Ok(sel) = Selector::parse(sel_str.trim()) {
            if let Some(element) = doc.select(&sel).next() {
                let text: String = element
                    .text()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .trim()
                    .to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

/// Extract text from an element reference by trying comma-separated CSS selectors.
pub fn extract_element_text(el: &scraper::ElementRef, selectors: &str) -> Option<String> {
    for sel_str in selectors.split(',') {
        if let Ok(sel) = Selector::parse(sel_str.trim()) {
            if let Some(child) = el.select(&sel).next() {
                let text: String = child
                    .text()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .trim()
                    .to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

/// Parse a count from text by extracting digits.
pub fn parse_count(text: &str) -> Option<u32> {
    text.replace(',', "")
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse::<u32>()
        .ok()
}

/// Normalize a product image URL: force https on protocol-relative URLs,
/// rewrite thumbnail size suffixes to the full 800x800 rendition, and strip
/// the query string. Empty input yields `None`.
pub fn normalize_image_url(src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    let mut url = if let Some(rest) = src.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        src.to_string()
    };
    url = SIZE_SUFFIX_RE.replace(&url, "_800x800.").into_owned();
    url = DOTTED_SIZE_RE.replace(&url, ".800x800.").into_owned();
    if let Some(idx) = url.find('?') {
        url.truncate(idx);
    }
    Some(url)
}

/// Collect the text content of every inline (non-src) script tag.
pub fn inline_scripts(doc: &Html) -> Vec<String> {
    let mut scripts = Vec::new();
    if let Ok(sel) = Selector::parse("script:not([src])") {
        for el in doc.select(&sel) {
            let text: String = el.text().collect();
            if !text.trim().is_empty() {
                scripts.push(text);
            }
        }
    }
    scripts
}

/// JavaScript-style truthiness for JSON values, used when probing page
/// globals: null, false, 0, and "" are falsy, everything else is truthy.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Read a JSON value as f64, accepting numbers and plain numeric strings.
pub fn num_from_value(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a JSON value as a display string, stringifying numbers.
pub fn string_from_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Dump HTML to /tmp for debugging when debug level is enabled.
pub fn debug_dump_html(html: &str, label: &str) {
    if tracing::enabled!(tracing::Level::DEBUG) {
        let safe_label = label.replace(' ', "_");
        let dump_path = format!("/tmp/shopgrab_{}.html", safe_label);
        let _ = std::fs::write(&dump_path, html);
        tracing::debug!("Dumped HTML to {}", dump_path);
    }
}

/// Check if HTML indicates a 404/not-found or delisted-product page.
pub fn is_not_found_page(html: &str) -> bool {
    html.contains("Page Not Found")
        || html.contains("<title>404</title>")
        || html.contains("404 Not Found")
        || html.contains("item is no longer available")
}
