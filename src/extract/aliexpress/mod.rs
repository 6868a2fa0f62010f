mod media;
mod pricing;
mod reviews;
mod specs;
mod variants;

use std::cell::OnceCell;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::extract::helpers::{extract_text, inline_scripts, string_from_value};
use crate::extract::page::PageSnapshot;
use crate::extract::state;
use crate::extract::PageExtractor;
use crate::model::ProductRecord;

pub const PLATFORM: &str = "aliexpress";

const TITLE_SELECTORS: &str =
    "h1[data-pl=\"product-title\"], .product-title, .product-title-text, h1[class*=\"title\"], h1";
const BRAND_SELECTORS: &str =
    ".store-name, [class*=\"store-name\"], .shop-name a, .store-header-name";
const DESCRIPTION_SELECTORS: &str =
    ".product-description, [class*=\"description\"], #product-description, .detail-desc";
const BREADCRUMB_SELECTORS: &str =
    ".breadcrumb, [class*=\"breadcrumb\"], nav[aria-label=\"breadcrumb\"]";

const DESCRIPTION_MAX_CHARS: usize = 5000;

static ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"/item/(\d+)\.html",
        r"/i/(\d+)\.html",
        r"/_p/(\d+)",
        r"productId=(\d+)",
        r"/(\d{10,})\.html",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

pub struct AliExpressExtractor;

impl PageExtractor for AliExpressExtractor {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn extract(&self, snapshot: &PageSnapshot) -> ProductRecord {
        extract_record(snapshot)
    }
}

/// Shared view of one page that every field strategy reads from: the parsed
/// document, the inline script bodies, and the lazily located bootstrap
/// state (resolved at most once per extraction).
pub(crate) struct PageContext<'a> {
    pub(crate) snapshot: &'a PageSnapshot,
    pub(crate) doc: Html,
    pub(crate) scripts: Vec<String>,
    state: OnceCell<Option<Value>>,
}

impl<'a> PageContext<'a> {
    pub(crate) fn new(snapshot: &'a PageSnapshot) -> Self {
        let doc = Html::parse_document(&snapshot.html);
        let scripts = inline_scripts(&doc);
        Self {
            snapshot,
            doc,
            scripts,
            state: OnceCell::new(),
        }
    }

    pub(crate) fn bootstrap_state(&self) -> Option<&Value> {
        self.state
            .get_or_init(|| state::locate(&self.snapshot.globals, &self.scripts))
            .as_ref()
    }

    /// Module container of the bootstrap state. States assigned via
    /// `runParams` nest their modules under a `data` key; others are flat.
    pub(crate) fn state_modules(&self) -> Option<&Value> {
        let state = self.bootstrap_state()?;
        match state.get("data") {
            Some(data) if data.is_object() => Some(data),
            _ => Some(state),
        }
    }

    pub(crate) fn state_module(&self, name: &str) -> Option<&Value> {
        self.state_modules()?.get(name).filter(|v| !v.is_null())
    }
}

/// Run every field strategy over the snapshot and assemble the record.
/// Strategies that find nothing leave their field at its default; this
/// function itself cannot fail.
pub fn extract_record(snapshot: &PageSnapshot) -> ProductRecord {
    let ctx = PageContext::new(snapshot);
    if ctx.bootstrap_state().is_none() {
        tracing::debug!("No embedded bootstrap state on {}", snapshot.url);
    }

    let external_id = extract_product_id(&snapshot.url);
    let pricing = pricing::extract(&ctx);

    ProductRecord {
        external_id: external_id.clone(),
        url: snapshot.url.clone(),
        platform: PLATFORM.to_string(),
        extracted_at: Utc::now(),
        title: extract_title(&ctx),
        brand: extract_brand(&ctx),
        description: extract_description(&ctx),
        category: extract_category(&ctx),
        price: pricing.price,
        original_price: pricing.original_price,
        currency: pricing.currency,
        images: media::extract_images(&ctx),
        videos: media::extract_videos(&ctx, external_id.as_deref()),
        variants: variants::extract(&ctx),
        reviews: reviews::extract(&ctx),
        specifications: specs::extract(&ctx),
    }
}

/// Product ID from the page URL, first matching pattern wins.
pub fn extract_product_id(url: &str) -> Option<String> {
    for re in ID_PATTERNS.iter() {
        if let Some(caps) = re.captures(url) {
            if let Some(m) = caps.get(1) {
                return Some(m.as_str().to_string());
            }
        }
    }
    None
}

fn extract_title(ctx: &PageContext) -> String {
    if let Some(module) = ctx
        .state_module("titleModule")
        .or_else(|| ctx.state_module("pageModule"))
    {
        let title = module
            .get("subject")
            .and_then(string_from_value)
            .or_else(|| module.get("title").and_then(string_from_value));
        if let Some(title) = title {
            return title;
        }
    }

    if let Some(title) = extract_text(&ctx.doc, TITLE_SELECTORS) {
        return title;
    }

    // Last resort: the document title up to the site-name separator
    if let Some(doc_title) = extract_text(&ctx.doc, "title") {
        let head = doc_title.split('|').next().unwrap_or("").trim();
        if !head.is_empty() {
            return head.to_string();
        }
    }

    String::new()
}

fn extract_brand(ctx: &PageContext) -> String {
    if let Some(store) = ctx.state_module("storeModule") {
        let brand = store
            .get("storeName")
            .and_then(string_from_value)
            .or_else(|| store.get("companyId").and_then(string_from_value));
        if let Some(brand) = brand {
            return brand;
        }
    }

    extract_text(&ctx.doc, BRAND_SELECTORS).unwrap_or_default()
}

fn extract_description(ctx: &PageContext) -> String {
    let text = ctx
        .state_module("pageModule")
        .and_then(|m| m.get("description"))
        .and_then(string_from_value)
        .or_else(|| extract_text(&ctx.doc, DESCRIPTION_SELECTORS))
        .unwrap_or_default();
    text.chars().take(DESCRIPTION_MAX_CHARS).collect()
}

/// Category is the second-to-last breadcrumb entry (the last one is the
/// product itself); trails with fewer than two entries carry no category.
fn extract_category(ctx: &PageContext) -> String {
    if let Some(trail) = ctx
        .state_module("crossLinkModule")
        .and_then(|m| m.get("breadCrumbPathList"))
        .and_then(|v| v.as_array())
    {
        if trail.len() > 1 {
            let entry = &trail[trail.len() - 2];
            let name = entry
                .get("name")
                .and_then(string_from_value)
                .or_else(|| entry.get("title").and_then(string_from_value));
            if let Some(name) = name {
                let name = name.trim().to_string();
                if !name.is_empty() {
                    return name;
                }
            }
        }
    }

    if let Ok(container_sel) = Selector::parse(BREADCRUMB_SELECTORS) {
        if let Some(container) = ctx.doc.select(&container_sel).next() {
            if let Ok(link_sel) = Selector::parse("a") {
                let links: Vec<_> = container.select(&link_sel).collect();
                if links.len() > 1 {
                    let text: String = links[links.len() - 2]
                        .text()
                        .collect::<Vec<_>>()
                        .join(" ")
                        .trim()
                        .to_string();
                    if !text.is_empty() {
                        return text;
                    }
                }
            }
        }
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot_with_state(state: Value) -> PageSnapshot {
        let mut globals = serde_json::Map::new();
        globals.insert("runParams".to_string(), state);
        PageSnapshot::new(
            "https://www.aliexpress.com/item/1005001234567890.html".to_string(),
            "<html><body></body></html>".to_string(),
            globals,
            crate::extract::page::CaptureStore::new(),
        )
    }

    #[test]
    fn product_id_patterns_match_in_order() {
        assert_eq!(
            extract_product_id("https://www.aliexpress.com/item/1005001234567890.html").as_deref(),
            Some("1005001234567890")
        );
        assert_eq!(
            extract_product_id("https://m.aliexpress.com/i/32859902.html").as_deref(),
            Some("32859902")
        );
        assert_eq!(
            extract_product_id("https://www.aliexpress.com/store/_p/998877").as_deref(),
            Some("998877")
        );
        assert_eq!(
            extract_product_id("https://www.aliexpress.com/detail?productId=445566").as_deref(),
            Some("445566")
        );
        assert_eq!(
            extract_product_id("https://www.aliexpress.us/9988776655.html").as_deref(),
            Some("9988776655")
        );
        assert_eq!(extract_product_id("https://www.aliexpress.com/category/phones"), None);
    }

    #[test]
    fn title_prefers_embedded_state_over_dom() {
        let mut snapshot = snapshot_with_state(json!({
            "data": {"titleModule": {"subject": "State Widget"}}
        }));
        snapshot.html = "<html><body><h1>DOM Widget</h1></body></html>".to_string();
        let ctx = PageContext::new(&snapshot);
        assert_eq!(extract_title(&ctx), "State Widget");
    }

    #[test]
    fn title_falls_back_to_document_title() {
        let snapshot = PageSnapshot::from_html(
            "https://www.aliexpress.com/item/123.html",
            "<html><head><title>Nice Gadget | AliExpress</title></head><body></body></html>",
        );
        let ctx = PageContext::new(&snapshot);
        assert_eq!(extract_title(&ctx), "Nice Gadget");
    }

    #[test]
    fn brand_stringifies_numeric_company_id() {
        let snapshot = snapshot_with_state(json!({
            "data": {"storeModule": {"companyId": 992211}}
        }));
        let ctx = PageContext::new(&snapshot);
        assert_eq!(extract_brand(&ctx), "992211");
    }

    #[test]
    fn description_is_capped() {
        let long = "x".repeat(6000);
        let html = format!("<html><body><div class=\"product-description\">{long}</div></body></html>");
        let snapshot = PageSnapshot::from_html("https://www.aliexpress.com/item/123.html", html);
        let ctx = PageContext::new(&snapshot);
        assert_eq!(extract_description(&ctx).chars().count(), 5000);
    }

    #[test]
    fn category_takes_second_to_last_breadcrumb() {
        let html = r#"<html><body><nav class="breadcrumb">
            <a href="/">Home</a>
            <a href="/c/electronics">Electronics</a>
            <a href="/item/1.html">Nice Gadget</a>
        </nav></body></html>"#;
        let snapshot = PageSnapshot::from_html("https://www.aliexpress.com/item/1.html", html);
        let ctx = PageContext::new(&snapshot);
        assert_eq!(extract_category(&ctx), "Electronics");
    }

    #[test]
    fn single_link_breadcrumb_yields_empty_category() {
        let html = r#"<html><body><nav class="breadcrumb"><a href="/">Home</a></nav></body></html>"#;
        let snapshot = PageSnapshot::from_html("https://www.aliexpress.com/item/1.html", html);
        let ctx = PageContext::new(&snapshot);
        assert_eq!(extract_category(&ctx), "");
    }

    #[test]
    fn category_from_state_breadcrumb_trail() {
        let snapshot = snapshot_with_state(json!({
            "data": {"crossLinkModule": {"breadCrumbPathList": [
                {"name": "Home"},
                {"name": "Dresses"},
                {"name": "Floral Summer Dress"}
            ]}}
        }));
        let ctx = PageContext::new(&snapshot);
        assert_eq!(extract_category(&ctx), "Dresses");
    }

    #[test]
    fn bootstrap_state_is_resolved_once() {
        let snapshot = snapshot_with_state(json!({"data": {}}));
        let ctx = PageContext::new(&snapshot);
        let first = ctx.bootstrap_state().unwrap();
        let second = ctx.bootstrap_state().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn stateless_page_with_url_id_and_dom_title_still_yields_a_record() {
        let snapshot = PageSnapshot::from_html(
            "https://www.aliexpress.com/item/1005009876543210.html",
            "<html><body><h1>Cordless Drill 21V</h1></body></html>",
        );
        let record = extract_record(&snapshot);
        assert_eq!(record.external_id.as_deref(), Some("1005009876543210"));
        assert_eq!(record.title, "Cordless Drill 21V");
        assert_eq!(record.platform, "aliexpress");
        assert_eq!(record.price, 0.0);
        assert_eq!(record.original_price, None);
        assert_eq!(record.currency, "USD");
        assert!(record.images.is_empty());
        assert!(record.variants.is_empty());
        assert!(!record.is_empty());
    }
}
