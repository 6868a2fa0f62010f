//! Structured extraction over loaded product pages.
//!
//! Platform-specific extractors implement [`PageExtractor`] over an immutable
//! [`page::PageSnapshot`] and are looked up through the [`ExtractorRegistry`]
//! by platform key. Field strategies are pure functions; anything they fail
//! to find stays at its default in the record.

pub mod aliexpress;
pub mod helpers;
pub mod live;
pub mod page;
pub mod state;

use std::collections::HashMap;

use url::Url;

use crate::model::ProductRecord;
use page::PageSnapshot;

/// Hostname fragment to platform key.
const PLATFORM_HOSTS: [(&str, &str); 12] = [
    ("aliexpress", "aliexpress"),
    ("amazon", "amazon"),
    ("ebay", "ebay"),
    ("temu", "temu"),
    ("walmart", "walmart"),
    ("etsy", "etsy"),
    ("shein", "shein"),
    ("alibaba", "alibaba"),
    ("1688.com", "alibaba"),
    ("banggood", "banggood"),
    ("dhgate", "dhgate"),
    ("wish", "wish"),
];

pub trait PageExtractor {
    /// Registry key, also stamped into every record this extractor emits.
    fn platform(&self) -> &'static str;

    /// Produce the normalized record for one page. Extraction itself cannot
    /// fail; a page that matches nothing yields a record of defaults.
    fn extract(&self, snapshot: &PageSnapshot) -> ProductRecord;
}

/// Platform key for a page URL, from the hostname.
pub fn detect_platform(url: &str) -> Option<&'static str> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    PLATFORM_HOSTS
        .iter()
        .find(|(fragment, _)| host.contains(fragment))
        .map(|(_, key)| *key)
}

pub struct ExtractorRegistry {
    extractors: HashMap<&'static str, Box<dyn PageExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Registry with every built-in extractor registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(aliexpress::AliExpressExtractor));
        registry
    }

    /// Register an extractor under its platform key. A later registration
    /// for the same key replaces the earlier one.
    pub fn register(&mut self, extractor: Box<dyn PageExtractor>) {
        self.extractors.insert(extractor.platform(), extractor);
    }

    pub fn get(&self, platform: &str) -> Option<&dyn PageExtractor> {
        self.extractors.get(platform).map(|b| b.as_ref())
    }

    /// Extractor responsible for a page URL, via platform detection.
    pub fn for_url(&self, url: &str) -> Option<&dyn PageExtractor> {
        self.get(detect_platform(url)?)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
