use std::collections::HashMap;

use serde_json::{Map, Value};

/// URL substrings that mark an in-page request as worth capturing at all.
const RELEVANT_MARKERS: [&str; 5] = ["/api/", "product", "sku", "review", "feedback"];

/// Bucket an intercepted payload lands in, decided by URL substring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureCategory {
    Product,
    Skus,
    Reviews,
}

/// Holds the most recent successfully parsed JSON payload per category.
///
/// Bodies that fail to parse are dropped silently; an empty store is the
/// normal state for pages that never fired a matching request.
#[derive(Debug, Default)]
pub struct CaptureStore {
    payloads: HashMap<CaptureCategory, Value>,
}

impl CaptureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_relevant_url(url: &str) -> bool {
        RELEVANT_MARKERS.iter().any(|m| url.contains(m))
    }

    /// Category for a captured URL, or `None` when the URL fails the
    /// relevance filter. Review markers take precedence over the SKU marker;
    /// anything else relevant counts as product data.
    pub fn categorize(url: &str) -> Option<CaptureCategory> {
        if !Self::is_relevant_url(url) {
            return None;
        }
        if url.contains("review") || url.contains("feedback") {
            Some(CaptureCategory::Reviews)
        } else if url.contains("sku") {
            Some(CaptureCategory::Skus)
        } else {
            Some(CaptureCategory::Product)
        }
    }

    /// Record one captured response body. Later payloads overwrite earlier
    /// ones in the same category.
    pub fn record(&mut self, url: &str, body: &str) {
        let Some(category) = Self::categorize(url) else {
            return;
        };
        match serde_json::from_str::<Value>(body) {
            Ok(payload) => {
                tracing::debug!("Captured {:?} payload from {}", category, url);
                self.payloads.insert(category, payload);
            }
            Err(_) => {
                tracing::debug!("Ignoring non-JSON captured body from {}", url);
            }
        }
    }

    pub fn get(&self, category: CaptureCategory) -> Option<&Value> {
        self.payloads.get(&category)
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

/// Everything one extraction run sees of a loaded page: the final URL, the
/// rendered HTML, whichever known page globals existed (serialized by name),
/// and the payloads captured by the network hook.
#[derive(Debug)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
    pub globals: Map<String, Value>,
    pub captures: CaptureStore,
}

impl PageSnapshot {
    pub fn new(url: String, html: String, globals: Map<String, Value>, captures: CaptureStore) -> Self {
        Self {
            url,
            html,
            globals,
            captures,
        }
    }

    /// Snapshot for offline extraction over saved HTML: no live globals, cold
    /// capture store.
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            globals: Map::new(),
            captures: CaptureStore::new(),
        }
    }
}
