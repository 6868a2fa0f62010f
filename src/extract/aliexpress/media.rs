use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::{PageContext, PLATFORM};
use crate::extract::helpers::{normalize_image_url, string_from_value};
use crate::model::VideoRef;

const GALLERY_SELECTORS: [&str; 4] = [
    "[class*=\"slider\"] img",
    ".images-view img",
    "[class*=\"gallery\"] img",
    ".image-view-magnifier img",
];
const THUMBNAIL_SELECTORS: [&str; 2] = [".images-view-item img", "[class*=\"thumbnail\"] img"];

const MAX_IMAGES: usize = 30;
const MAX_VIDEOS: usize = 10;

static IMAGE_LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"imagePathList["']?\s*:\s*\[([^\]]+)\]"#).expect("valid regex"));
static CDN_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([^"']+alicdn[^"']+)["']"#).expect("valid regex"));
static VIDEO_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)["']?(videoUrl|video_url)["']?\s*:\s*["']([^"']+\.mp4[^"']*)["']"#)
        .expect("valid regex")
});

/// Every candidate from the embedded path list, the DOM galleries and
/// thumbnails, and the script scan feeds one dedup set; unlike variants,
/// image sources merge.
pub(crate) fn extract_images(ctx: &PageContext) -> Vec<String> {
    let mut images: Vec<String> = Vec::new();

    if let Some(list) = ctx
        .state_module("imageModule")
        .and_then(|m| m.get("imagePathList"))
        .and_then(|v| v.as_array())
    {
        for entry in list {
            if let Some(normalized) = entry.as_str().and_then(normalize_image_url) {
                images.push(normalized);
            }
        }
    }

    collect_dom_images(&ctx.doc, &GALLERY_SELECTORS, &mut images);
    collect_dom_images(&ctx.doc, &THUMBNAIL_SELECTORS, &mut images);
    images.extend(images_from_scripts(&ctx.scripts));

    dedup_filter_cap(images, MAX_IMAGES)
}

/// CDN-hosted images under the given selectors, lazy-load attribute first.
fn collect_dom_images(doc: &Html, selectors: &[&str], out: &mut Vec<String>) {
    for sel_str in selectors {
        if let Ok(sel) = Selector::parse(sel_str) {
            for img in doc.select(&sel) {
                let src = img
                    .value()
                    .attr("data-src")
                    .or_else(|| img.value().attr("src"));
                if let Some(src) = src {
                    if src.contains("alicdn") {
                        if let Some(normalized) = normalize_image_url(src) {
                            out.push(normalized);
                        }
                    }
                }
            }
        }
    }
}

/// Image list harvested from the first inline script carrying an
/// `imagePathList` array literal.
fn images_from_scripts(scripts: &[String]) -> Vec<String> {
    for script in scripts {
        if let Some(caps) = IMAGE_LIST_RE.captures(script) {
            let body = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            return CDN_URL_RE
                .captures_iter(body)
                .filter_map(|c| c.get(1).and_then(|m| normalize_image_url(m.as_str())))
                .collect();
        }
    }
    Vec::new()
}

fn dedup_filter_cap(images: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for url in images {
        if !url.contains("http") {
            continue;
        }
        if seen.insert(url.clone()) {
            out.push(url);
            if out.len() == cap {
                break;
            }
        }
    }
    out
}

pub(crate) fn extract_videos(ctx: &PageContext, product_id: Option<&str>) -> Vec<VideoRef> {
    let mut videos: Vec<VideoRef> = Vec::new();

    // The CDN play URL needs both the video uid and the product id
    if let Some(uid) = ctx
        .state_module("imageModule")
        .and_then(|m| m.get("videoUid"))
        .and_then(string_from_value)
    {
        if let Some(id) = product_id {
            push_video(
                &mut videos,
                format!("https://cloud.video.taobao.com/play/u/{uid}/p/1/e/6/t/1/{id}.mp4"),
            );
        }
    }

    if let Ok(sel) = Selector::parse("video source, video") {
        for el in ctx.doc.select(&sel) {
            if let Some(src) = el.value().attr("src") {
                let src = src.trim();
                if !src.is_empty() {
                    push_video(&mut videos, src.to_string());
                }
            }
        }
    }

    for script in &ctx.scripts {
        for caps in VIDEO_URL_RE.captures_iter(script) {
            if let Some(m) = caps.get(2) {
                let url = m.as_str().replace("\\u002F", "/").replace('\\', "");
                push_video(&mut videos, url);
            }
        }
    }

    videos.truncate(MAX_VIDEOS);
    videos
}

fn push_video(videos: &mut Vec<VideoRef>, url: String) {
    if videos.iter().any(|v| v.url == url) {
        return;
    }
    videos.push(VideoRef {
        url,
        kind: "mp4".to_string(),
        platform: PLATFORM.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::page::{CaptureStore, PageSnapshot};
    use serde_json::json;

    fn snapshot_with_state(state: serde_json::Value, html: &str) -> PageSnapshot {
        let mut globals = serde_json::Map::new();
        globals.insert("runParams".to_string(), state);
        PageSnapshot::new(
            "https://www.aliexpress.com/item/1005001234567890.html".to_string(),
            html.to_string(),
            globals,
            CaptureStore::new(),
        )
    }

    #[test]
    fn state_and_dom_images_merge_into_one_set() {
        let html = r#"<html><body><div class="gallery"><img src="//ae01.alicdn.com/kf/dom.jpg"></div></body></html>"#;
        let snap = snapshot_with_state(
            json!({"data": {"imageModule": {"imagePathList": ["//ae01.alicdn.com/kf/a_220x220.jpg"]}}}),
            html,
        );
        let ctx = PageContext::new(&snap);
        let images = extract_images(&ctx);
        assert_eq!(
            images,
            vec![
                "https://ae01.alicdn.com/kf/a_800x800.jpg",
                "https://ae01.alicdn.com/kf/dom.jpg"
            ]
        );
    }

    #[test]
    fn all_three_image_sources_contribute_without_duplicates() {
        let html = r#"<html><body>
            <div class="gallery">
                <img src="//ae01.alicdn.com/kf/shared_50x50.jpg">
                <img src="//ae01.alicdn.com/kf/dom_only.jpg">
            </div>
            <script>var g = { imagePathList: ["//ae01.alicdn.com/kf/script_only.jpg"] };</script>
        </body></html>"#;
        let snap = snapshot_with_state(
            json!({"data": {"imageModule": {"imagePathList": ["//ae01.alicdn.com/kf/shared_220x220.jpg"]}}}),
            html,
        );
        let ctx = PageContext::new(&snap);
        let images = extract_images(&ctx);
        assert_eq!(
            images,
            vec![
                "https://ae01.alicdn.com/kf/shared_800x800.jpg",
                "https://ae01.alicdn.com/kf/dom_only.jpg",
                "https://ae01.alicdn.com/kf/script_only.jpg"
            ]
        );
    }

    #[test]
    fn dom_images_require_cdn_host_and_prefer_data_src() {
        let html = r#"<html><body>
            <div class="images-view">
                <img data-src="//ae01.alicdn.com/kf/real_50x50.jpg" src="data:image/gif;base64,xyz">
                <img src="https://other-cdn.example.com/kf/skipped.jpg">
            </div>
        </body></html>"#;
        let snap = PageSnapshot::from_html("https://www.aliexpress.com/item/1.html", html);
        let ctx = PageContext::new(&snap);
        let images = extract_images(&ctx);
        assert_eq!(images, vec!["https://ae01.alicdn.com/kf/real_800x800.jpg"]);
    }

    #[test]
    fn same_image_at_two_sizes_collapses_after_normalization() {
        let html = r#"<html><body>
            <div class="gallery">
                <img src="//ae01.alicdn.com/kf/photo_50x50.jpg">
            </div>
            <div class="thumbnail-list">
                <img class="thumbnail" src="//ae01.alicdn.com/kf/photo_220x220.jpg">
            </div>
        </body></html>"#;
        let snap = PageSnapshot::from_html("https://www.aliexpress.com/item/1.html", html);
        let ctx = PageContext::new(&snap);
        let images = extract_images(&ctx);
        assert_eq!(images, vec!["https://ae01.alicdn.com/kf/photo_800x800.jpg"]);
    }

    #[test]
    fn image_list_is_capped_at_thirty() {
        let list: Vec<String> = (0..40)
            .map(|i| format!("//ae01.alicdn.com/kf/img{i}.jpg"))
            .collect();
        let snap = snapshot_with_state(
            json!({"data": {"imageModule": {"imagePathList": list}}}),
            "<html><body></body></html>",
        );
        let ctx = PageContext::new(&snap);
        assert_eq!(extract_images(&ctx).len(), 30);
    }

    #[test]
    fn entries_without_http_are_dropped() {
        let snap = snapshot_with_state(
            json!({"data": {"imageModule": {"imagePathList": ["data:image/gif;base64,abc", "//ae01.alicdn.com/kf/ok.jpg"]}}}),
            "<html><body></body></html>",
        );
        let ctx = PageContext::new(&snap);
        assert_eq!(extract_images(&ctx), vec!["https://ae01.alicdn.com/kf/ok.jpg"]);
    }

    #[test]
    fn script_scan_recovers_image_list() {
        let html = r#"<html><body><script>
            window.__aeData = { imagePathList: ["//ae01.alicdn.com/kf/s1.jpg","//ae01.alicdn.com/kf/s2.jpg"] };
        </script></body></html>"#;
        let snap = PageSnapshot::from_html("https://www.aliexpress.com/item/1.html", html);
        let ctx = PageContext::new(&snap);
        let images = extract_images(&ctx);
        assert_eq!(
            images,
            vec![
                "https://ae01.alicdn.com/kf/s1.jpg",
                "https://ae01.alicdn.com/kf/s2.jpg"
            ]
        );
    }

    #[test]
    fn video_uid_expands_to_play_url_only_with_product_id() {
        let snap = snapshot_with_state(
            json!({"data": {"imageModule": {"videoUid": "abc123"}}}),
            "<html><body></body></html>",
        );
        let ctx = PageContext::new(&snap);
        let videos = extract_videos(&ctx, Some("1005001234567890"));
        assert_eq!(videos.len(), 1);
        assert_eq!(
            videos[0].url,
            "https://cloud.video.taobao.com/play/u/abc123/p/1/e/6/t/1/1005001234567890.mp4"
        );
        assert_eq!(videos[0].kind, "mp4");
        assert_eq!(videos[0].platform, "aliexpress");

        assert!(extract_videos(&ctx, None).is_empty());
    }

    #[test]
    fn script_video_urls_are_unescaped_and_deduped() {
        let html = r#"<html><body>
            <video src="https://cdn.example.com/v1.mp4"></video>
            <script>var player = { "videoUrl": "https://cdn.example.com/v1.mp4" };</script>
            <script>var alt = { video_url: "https://cdn.example.com/v2.mp4" };</script>
        </body></html>"#;
        let snap = PageSnapshot::from_html("https://www.aliexpress.com/item/1.html", html);
        let ctx = PageContext::new(&snap);
        let videos = extract_videos(&ctx, None);
        let urls: Vec<&str> = videos.iter().map(|v| v.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://cdn.example.com/v1.mp4",
                "https://cdn.example.com/v2.mp4"
            ]
        );
    }

    #[test]
    fn video_list_is_capped_at_ten() {
        let mut script = String::from("var urls = {");
        for i in 0..12 {
            script.push_str(&format!("\"videoUrl\": \"https://cdn.example.com/v{i}.mp4\","));
        }
        script.push_str("};");
        let html = format!("<html><body><script>{script}</script></body></html>");
        let snap = PageSnapshot::from_html("https://www.aliexpress.com/item/1.html", html);
        let ctx = PageContext::new(&snap);
        assert_eq!(extract_videos(&ctx, None).len(), 10);
    }
}
