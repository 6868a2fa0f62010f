use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::extract::helpers::is_truthy;

/// Page globals probed for bootstrap state, highest priority first.
pub const GLOBAL_STATE_KEYS: [&str; 5] = [
    "runParams",
    "detailData",
    "pageData",
    "__INITIAL_STATE__",
    "productData",
];

static RUN_PARAMS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)runParams\s*=\s*(\{.*?\});").expect("valid regex"));
static DATA_MODULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)data\s*:\s*(\{.*?"priceModule".*?\})\s*[,}]"#).expect("valid regex")
});
static INIT_DATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)__INIT_DATA__\s*=\s*(\{.*?\});").expect("valid regex"));

/// Locate the page bootstrap state.
///
/// Known global names are tried in priority order, first truthy value wins.
/// Only when no global matches are inline scripts scanned. `None` means the
/// page simply does not expose embedded state; callers fall through to their
/// next source.
pub fn locate(globals: &Map<String, Value>, scripts: &[String]) -> Option<Value> {
    for key in GLOBAL_STATE_KEYS {
        if let Some(value) = globals.get(key) {
            if is_truthy(value) {
                tracing::debug!("Bootstrap state from page global '{}'", key);
                return Some(value.clone());
            }
        }
    }
    from_scripts(scripts)
}

/// Scan inline script bodies against the known state patterns, in pattern
/// order. A candidate that matches but fails JSON parsing is skipped and the
/// scan moves on; the first candidate that parses wins.
pub fn from_scripts(scripts: &[String]) -> Option<Value> {
    let patterns: [(&str, &Regex); 3] = [
        ("runParams", &RUN_PARAMS_RE),
        ("data module", &DATA_MODULE_RE),
        ("init data", &INIT_DATA_RE),
    ];
    for (label, re) in patterns {
        for script in scripts {
            let Some(caps) = re.captures(script) else {
                continue;
            };
            let Some(candidate) = caps.get(1) else {
                continue;
            };
            match serde_json::from_str::<Value>(candidate.as_str()) {
                Ok(value) => {
                    tracing::debug!("Bootstrap state from script tag ({})", label);
                    return Some(value);
                }
                Err(_) => {
                    tracing::debug!("Script state candidate ({}) is not valid JSON, skipping", label);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn globals(entries: &[(&str, Value)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn global_lookup_follows_priority_order() {
        let g = globals(&[
            ("pageData", json!({"from": "pageData"})),
            ("detailData", json!({"from": "detailData"})),
        ]);
        let state = locate(&g, &[]).unwrap();
        assert_eq!(state["from"], "detailData");
    }

    #[test]
    fn falsy_globals_are_skipped() {
        let g = globals(&[
            ("runParams", Value::Null),
            ("pageData", json!({"from": "pageData"})),
        ]);
        let state = locate(&g, &[]).unwrap();
        assert_eq!(state["from"], "pageData");
    }

    #[test]
    fn run_params_script_assignment_parses() {
        let scripts = vec![
            "window.runParams = {\"data\": {\"titleModule\": {\"subject\": \"Widget\"}}};".to_string(),
        ];
        let state = locate(&Map::new(), &scripts).unwrap();
        assert_eq!(state["data"]["titleModule"]["subject"], "Widget");
    }

    #[test]
    fn unparseable_candidate_falls_through_to_next_pattern() {
        let scripts = vec![
            "var runParams = {broken: true};".to_string(),
            "var cfg = { data: {\"priceModule\": 9.5}, other: 1 };".to_string(),
        ];
        let state = locate(&Map::new(), &scripts).unwrap();
        assert_eq!(state["priceModule"], 9.5);
    }

    #[test]
    fn init_data_assignment_parses() {
        let scripts =
            vec!["window.__INIT_DATA__ = {\"productInfoComponent\": {\"id\": 123}};".to_string()];
        let state = locate(&Map::new(), &scripts).unwrap();
        assert_eq!(state["productInfoComponent"]["id"], 123);
    }

    #[test]
    fn pages_without_state_yield_none() {
        let scripts = vec!["console.log('nothing here');".to_string()];
        assert!(locate(&Map::new(), &scripts).is_none());
    }

    #[test]
    fn globals_win_over_scripts() {
        let g = globals(&[("runParams", json!({"from": "global"}))]);
        let scripts =
            vec!["window.runParams = {\"from\": \"script\"};".to_string()];
        let state = locate(&g, &scripts).unwrap();
        assert_eq!(state["from"], "global");
    }
}
