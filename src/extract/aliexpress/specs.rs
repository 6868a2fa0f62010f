use std::collections::BTreeMap;

use scraper::Selector;

use super::PageContext;
use crate::extract::helpers::{extract_element_text, string_from_value};

const SPEC_ITEM_SELECTORS: &str = "[class*=\"specification\"] li, [class*=\"property-item\"]";

/// Specification pairs from the embedded specs module, then from DOM list
/// items. DOM pairs overwrite embedded ones on key collision.
pub(crate) fn extract(ctx: &PageContext) -> BTreeMap<String, String> {
    let mut specs = BTreeMap::new();

    if let Some(props) = ctx
        .state_module("specsModule")
        .and_then(|m| m.get("props"))
        .and_then(|v| v.as_array())
    {
        for prop in props {
            let name = prop.get("attrName").and_then(string_from_value);
            let value = prop.get("attrValue").and_then(string_from_value);
            if let (Some(name), Some(value)) = (name, value) {
                let name = name.trim().to_string();
                if !name.is_empty() {
                    specs.insert(name, value.trim().to_string());
                }
            }
        }
    }

    if let Ok(sel) = Selector::parse(SPEC_ITEM_SELECTORS) {
        for item in ctx.doc.select(&sel) {
            let key = extract_element_text(&item, "[class*=\"name\"], [class*=\"key\"]");
            let value = extract_element_text(&item, "[class*=\"value\"]");
            if let (Some(key), Some(value)) = (key, value) {
                specs.insert(key, value);
                continue;
            }
            // Items without name/value children often read "Label: value"
            let text: String = item.text().collect::<Vec<_>>().join(" ").trim().to_string();
            if let Some(idx) = text.find(':') {
                if idx > 0 {
                    let key = text[..idx].trim().to_string();
                    let val = text[idx + 1..].trim().to_string();
                    if !key.is_empty() {
                        specs.insert(key, val);
                    }
                }
            }
        }
    }

    specs
}
