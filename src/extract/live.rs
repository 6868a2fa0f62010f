use std::time::Duration;

use chromiumoxide::Page;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::browser::navigation::Navigator;
use crate::error::ShopgrabError;
use crate::extract::page::{CaptureStore, PageSnapshot};
use crate::extract::state::GLOBAL_STATE_KEYS;

/// Wraps `window.fetch` to mirror interesting response bodies into a page
/// buffer. The original response object is always handed back untouched and
/// every capture step sits behind a catch-all, so page behavior is never
/// altered. The window flag makes a second install a no-op.
const CAPTURE_HOOK_JS: &str = r#"
    (function() {
        if (window.__shopgrabHooked) { return true; }
        window.__shopgrabHooked = true;
        window.__shopgrabCaptured = [];
        var markers = ['/api/', 'product', 'sku', 'review', 'feedback'];
        var originalFetch = window.fetch;
        window.fetch = function() {
            var args = arguments;
            var result = originalFetch.apply(this, args);
            try {
                var url = typeof args[0] === 'string' ? args[0] : (args[0] && args[0].url);
                var relevant = false;
                for (var i = 0; i < markers.length; i++) {
                    if (url && url.indexOf(markers[i]) !== -1) { relevant = true; break; }
                }
                if (relevant) {
                    result.then(function(response) {
                        try {
                            response.clone().text().then(function(body) {
                                window.__shopgrabCaptured.push({ url: url, body: body });
                                if (window.__shopgrabCaptured.length > 50) {
                                    window.__shopgrabCaptured.shift();
                                }
                            }).catch(function() {});
                        } catch (e) {}
                    }).catch(function() {});
                }
            } catch (e) {}
            return result;
        };
        return true;
    })()
"#;

const DRAIN_CAPTURES_JS: &str = r#"
    (function() {
        var captured = window.__shopgrabCaptured || [];
        window.__shopgrabCaptured = [];
        try { return JSON.stringify(captured); } catch (e) { return null; }
    })()
"#;

#[derive(Debug, Deserialize)]
struct CapturedRequest {
    url: String,
    body: String,
}

/// Install the fetch capture hook. Failures are logged and tolerated; an
/// uninstrumented page just means a cold capture store.
pub async fn install_capture_hook(page: &Page) {
    if let Err(e) = page.evaluate(CAPTURE_HOOK_JS).await {
        tracing::warn!("Failed to install network capture hook: {}", e);
    }
}

/// Navigate and produce a snapshot: goto, hook install, readiness wait,
/// settle delay for late in-page requests, then content + globals + captures.
pub async fn acquire(
    page: &Page,
    navigator: &Navigator,
    url: &str,
) -> Result<PageSnapshot, ShopgrabError> {
    navigator.goto(page, url).await?;
    install_capture_hook(page).await;
    navigator.await_ready(page).await?;
    navigator.settle_delay().await;
    snapshot_page(page, url).await
}

pub async fn acquire_with_retry(
    page: &Page,
    navigator: &Navigator,
    url: &str,
    max_retries: u32,
) -> Result<PageSnapshot, ShopgrabError> {
    let mut last_err = None;

    for attempt in 1..=max_retries + 1 {
        match acquire(page, navigator, url).await {
            Ok(snapshot) => return Ok(snapshot),
            Err(e) => {
                tracing::warn!(
                    "Page acquisition attempt {}/{} failed: {}",
                    attempt,
                    max_retries + 1,
                    e
                );
                last_err = Some(e);
                if attempt <= max_retries {
                    let backoff = Duration::from_secs(2u64.pow(attempt - 1));
                    tracing::info!("Retrying in {:?}...", backoff);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    Err(last_err.unwrap())
}

/// Capture everything extraction needs from the live page.
pub async fn snapshot_page(page: &Page, requested_url: &str) -> Result<PageSnapshot, ShopgrabError> {
    let html = page
        .content()
        .await
        .map_err(|e| ShopgrabError::Navigation(format!("Failed to get page content: {}", e)))?;

    // Redirects are common on these pages; prefer the address the document
    // actually ended up at
    let url = eval_string(page, "window.location.href")
        .await
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| requested_url.to_string());

    let globals = probe_globals(page).await;

    let mut captures = CaptureStore::new();
    drain_captures(page, &mut captures).await;

    Ok(PageSnapshot::new(url, html, globals, captures))
}

/// Serialize whichever known state globals exist on the page, keyed by name.
async fn probe_globals(page: &Page) -> Map<String, Value> {
    let keys = GLOBAL_STATE_KEYS
        .iter()
        .map(|k| format!("'{k}'"))
        .collect::<Vec<_>>()
        .join(", ");
    let script = format!(
        r#"
        (function() {{
            var keys = [{keys}];
            var found = {{}};
            var any = false;
            for (var i = 0; i < keys.length; i++) {{
                var value = window[keys[i]];
                if (value) {{
                    try {{ JSON.stringify(value); found[keys[i]] = value; any = true; }} catch (e) {{}}
                }}
            }}
            return any ? JSON.stringify(found) : null;
        }})()
    "#
    );

    match eval_string(page, &script).await {
        Some(json_str) => {
            tracing::debug!("Found page state globals ({} bytes)", json_str.len());
            match serde_json::from_str::<Map<String, Value>>(&json_str) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("Failed to parse page state globals: {}", e);
                    Map::new()
                }
            }
        }
        None => {
            tracing::debug!("No page state globals found");
            Map::new()
        }
    }
}

async fn drain_captures(page: &Page, store: &mut CaptureStore) {
    let Some(json_str) = eval_string(page, DRAIN_CAPTURES_JS).await else {
        return;
    };
    match serde_json::from_str::<Vec<CapturedRequest>>(&json_str) {
        Ok(entries) => {
            tracing::debug!("Drained {} captured responses", entries.len());
            for entry in entries {
                store.record(&entry.url, &entry.body);
            }
        }
        Err(e) => tracing::warn!("Failed to parse captured response list: {}", e),
    }
}

async fn eval_string(page: &Page, script: &str) -> Option<String> {
    match page.evaluate(script).await {
        Ok(val) => val.into_value::<Option<String>>().unwrap_or(None),
        Err(e) => {
            tracing::warn!("Page evaluation failed: {}", e);
            None
        }
    }
}
