use scraper::{Html, Selector};
use serde_json::Value;

use super::PageContext;
use crate::extract::helpers::{normalize_image_url, string_from_value};
use crate::model::VariantOption;

/// Ordered selector groups; the first group that yields any elements is
/// used and the remaining groups are not consulted.
const SKU_SELECTOR_GROUPS: [&str; 3] = [
    "[class*=\"sku-property\"] [class*=\"item\"]",
    ".sku-item",
    ".sku-property-item",
];

/// Variants come from exactly one source: the embedded SKU module, the DOM,
/// or a raw script scan, in that order. Sources are never merged.
pub(crate) fn extract(ctx: &PageContext) -> Vec<VariantOption> {
    if let Some(list) = ctx
        .state_module("skuModule")
        .and_then(|m| m.get("productSKUPropertyList"))
        .and_then(|v| v.as_array())
    {
        let variants = variants_from_property_list(list);
        if !variants.is_empty() {
            return variants;
        }
    }

    let variants = variants_from_dom(&ctx.doc);
    if !variants.is_empty() {
        return variants;
    }

    variants_from_scripts(&ctx.scripts)
}

fn variants_from_property_list(list: &[Value]) -> Vec<VariantOption> {
    let mut variants = Vec::new();
    for property in list {
        let kind = property.get("skuPropertyName").and_then(string_from_value);
        let Some(values) = property.get("skuPropertyValues").and_then(|v| v.as_array()) else {
            continue;
        };
        for value in values {
            let image_path = value.get("skuPropertyImagePath").and_then(|v| v.as_str());
            let title = value
                .get("propertyValueDisplayName")
                .and_then(string_from_value)
                .or_else(|| image_path.map(str::to_string))
                .unwrap_or_default();
            variants.push(VariantOption {
                id: value.get("propertyValueId").and_then(string_from_value),
                title,
                kind: kind.clone(),
                image: image_path.and_then(normalize_image_url),
                available: true,
            });
        }
    }
    variants
}

fn variants_from_dom(doc: &Html) -> Vec<VariantOption> {
    let Ok(img_sel) = Selector::parse("img") else {
        return Vec::new();
    };

    for sel_str in SKU_SELECTOR_GROUPS {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        let elements: Vec<_> = doc.select(&sel).collect();
        if elements.is_empty() {
            continue;
        }

        let mut variants = Vec::new();
        for (i, el) in elements.iter().enumerate() {
            let title = el
                .value()
                .attr("title")
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .or_else(|| {
                    let text: String = el.text().collect::<Vec<_>>().join(" ").trim().to_string();
                    (!text.is_empty()).then_some(text)
                });
            let Some(title) = title else {
                continue;
            };

            let class_attr = el.value().attr("class").unwrap_or("");
            let id = el
                .value()
                .attr("data-sku-id")
                .or_else(|| el.value().attr("data-value"))
                .map(str::to_string)
                .unwrap_or_else(|| format!("var_{i}"));
            let image = el
                .select(&img_sel)
                .next()
                .and_then(|img| img.value().attr("src"))
                .and_then(normalize_image_url);

            variants.push(VariantOption {
                id: Some(id),
                title,
                kind: None,
                image,
                available: !class_attr.contains("disabled") && !class_attr.contains("unavailable"),
            });
        }
        return variants;
    }

    Vec::new()
}

fn variants_from_scripts(scripts: &[String]) -> Vec<VariantOption> {
    for script in scripts {
        if !script.contains("productSKUPropertyList") {
            continue;
        }
        if let Some(slice) = balanced_array_after(script, "\"productSKUPropertyList\"") {
            if let Ok(Value::Array(list)) = serde_json::from_str::<Value>(slice) {
                let variants = variants_from_property_list(&list);
                if !variants.is_empty() {
                    return variants;
                }
            }
        }
    }
    Vec::new()
}

/// Slice out the balanced `[...]` array following `key:` in raw script text.
/// Bracket depth is tracked with string-literal awareness so nested value
/// arrays do not truncate the slice.
fn balanced_array_after<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let key_pos = text.find(key)?;
    let rest = &text[key_pos + key.len()..];
    let colon = rest.find(':')?;
    let after_colon = &rest[colon + 1..];
    let start = after_colon.find('[')?;
    if !after_colon[..start].trim().is_empty() {
        return None;
    }

    let bytes = after_colon.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&after_colon[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::page::{CaptureStore, PageSnapshot};
    use serde_json::json;

    fn snapshot_with_state(state: Value, html: &str) -> PageSnapshot {
        let mut globals = serde_json::Map::new();
        globals.insert("runParams".to_string(), state);
        PageSnapshot::new(
            "https://www.aliexpress.com/item/1.html".to_string(),
            html.to_string(),
            globals,
            CaptureStore::new(),
        )
    }

    #[test]
    fn sku_property_values_map_to_variants() {
        let snap = snapshot_with_state(
            json!({"data": {"skuModule": {"productSKUPropertyList": [{
                "skuPropertyName": "Color",
                "skuPropertyValues": [
                    {"propertyValueId": 201, "propertyValueDisplayName": "Red",
                     "skuPropertyImagePath": "//ae01.alicdn.com/kf/red_50x50.jpg"},
                    {"propertyValueId": 202, "propertyValueDisplayName": "Blue"}
                ]
            }]}}}),
            "<html><body></body></html>",
        );
        let ctx = PageContext::new(&snap);
        let variants = extract(&ctx);
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].id.as_deref(), Some("201"));
        assert_eq!(variants[0].title, "Red");
        assert_eq!(variants[0].kind.as_deref(), Some("Color"));
        assert_eq!(
            variants[0].image.as_deref(),
            Some("https://ae01.alicdn.com/kf/red_800x800.jpg")
        );
        assert!(variants[0].available);
        assert_eq!(variants[1].image, None);
    }

    #[test]
    fn image_path_stands_in_for_missing_display_name() {
        let snap = snapshot_with_state(
            json!({"data": {"skuModule": {"productSKUPropertyList": [{
                "skuPropertyName": "Style",
                "skuPropertyValues": [{"skuPropertyImagePath": "//ae01.alicdn.com/kf/s.jpg"}]
            }]}}}),
            "<html><body></body></html>",
        );
        let ctx = PageContext::new(&snap);
        let variants = extract(&ctx);
        assert_eq!(variants[0].title, "//ae01.alicdn.com/kf/s.jpg");
    }

    #[test]
    fn embedded_source_excludes_dom_entries() {
        let html = r#"<html><body><div class="sku-item" title="DOM Green"></div></body></html>"#;
        let snap = snapshot_with_state(
            json!({"data": {"skuModule": {"productSKUPropertyList": [{
                "skuPropertyName": "Color",
                "skuPropertyValues": [{"propertyValueId": 1, "propertyValueDisplayName": "Red"}]
            }]}}}),
            html,
        );
        let ctx = PageContext::new(&snap);
        let variants = extract(&ctx);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].title, "Red");
    }

    #[test]
    fn first_dom_selector_group_shadows_later_groups() {
        let html = r#"<html><body>
            <div class="sku-property-wrap">
                <span class="prop-item" title="Group One"></span>
            </div>
            <div class="sku-item" title="Group Two"></div>
        </body></html>"#;
        let snap = PageSnapshot::from_html("https://www.aliexpress.com/item/1.html", html);
        let ctx = PageContext::new(&snap);
        let variants = extract(&ctx);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].title, "Group One");
    }

    #[test]
    fn disabled_or_unavailable_class_clears_availability() {
        let html = r#"<html><body>
            <div class="sku-item" title="In stock"></div>
            <div class="sku-item disabled" title="Gone"></div>
            <div class="sku-item item-unavailable" title="Also gone"></div>
        </body></html>"#;
        let snap = PageSnapshot::from_html("https://www.aliexpress.com/item/1.html", html);
        let ctx = PageContext::new(&snap);
        let variants = extract(&ctx);
        assert_eq!(variants.len(), 3);
        assert!(variants[0].available);
        assert!(!variants[1].available);
        assert!(!variants[2].available);
    }

    #[test]
    fn dom_ids_prefer_data_attributes_then_position() {
        let html = r#"<html><body>
            <div class="sku-item" data-sku-id="sku-9" title="A"></div>
            <div class="sku-item" data-value="v-3" title="B"></div>
            <div class="sku-item"> </div>
            <div class="sku-item" title="D"></div>
        </body></html>"#;
        let snap = PageSnapshot::from_html("https://www.aliexpress.com/item/1.html", html);
        let ctx = PageContext::new(&snap);
        let variants = extract(&ctx);
        assert_eq!(variants.len(), 3);
        assert_eq!(variants[0].id.as_deref(), Some("sku-9"));
        assert_eq!(variants[1].id.as_deref(), Some("v-3"));
        // The blank element is skipped but still occupies its position
        assert_eq!(variants[2].id.as_deref(), Some("var_3"));
    }

    #[test]
    fn script_scan_handles_nested_value_arrays() {
        let html = r#"<html><body><script>
            var sku = {"productSKUPropertyList": [{"skuPropertyName": "Size",
                "skuPropertyValues": [{"propertyValueId": 7, "propertyValueDisplayName": "XL"}]}],
                "trailing": true};
        </script></body></html>"#;
        let snap = PageSnapshot::from_html("https://www.aliexpress.com/item/1.html", html);
        let ctx = PageContext::new(&snap);
        let variants = extract(&ctx);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].title, "XL");
        assert_eq!(variants[0].kind.as_deref(), Some("Size"));
        assert!(variants[0].available);
    }

    #[test]
    fn balanced_scan_ignores_brackets_inside_strings() {
        let text = r#"{"productSKUPropertyList": [{"skuPropertyName": "we[ird]", "skuPropertyValues": []}]}"#;
        let slice = balanced_array_after(text, "\"productSKUPropertyList\"").unwrap();
        assert!(serde_json::from_str::<Value>(slice).is_ok());
        assert!(slice.ends_with("]}]"));
    }
}
