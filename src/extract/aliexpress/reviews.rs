use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use super::PageContext;
use crate::extract::helpers::{
    extract_element_text, extract_text, normalize_image_url, num_from_value, parse_count,
    parse_price, string_from_value,
};
use crate::extract::page::CaptureCategory;
use crate::model::ReviewEntry;

const MAX_REVIEWS: usize = 50;

const REVIEW_CARD_SELECTORS: &str = ".feedback-item, [class*=\"review-item\"]";
const SUMMARY_RATING_SELECTORS: &str =
    ".overview-rating-average, [class*=\"rating-value\"], [class*=\"average-star\"]";
const SUMMARY_COUNT_SELECTORS: &str =
    ".product-reviewer-reviews, [class*=\"review-count\"], [class*=\"reviews-num\"]";

static STAR_WIDTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"width:\s*([\d.]+)%").expect("valid regex"));

/// Rating summary first (when one exists), then individual reviews from the
/// intercepted feedback payload and the DOM cards, capped at fifty entries.
pub(crate) fn extract(ctx: &PageContext) -> Vec<ReviewEntry> {
    let mut reviews = Vec::new();

    if let Some(summary) = summary_from_state(ctx).or_else(|| summary_from_dom(&ctx.doc)) {
        reviews.push(summary);
    }

    if let Some(payload) = ctx.snapshot.captures.get(CaptureCategory::Reviews) {
        intercepted_reviews(payload, &mut reviews);
    }

    dom_reviews(&ctx.doc, &mut reviews);

    reviews.truncate(MAX_REVIEWS);
    reviews
}

fn summary_from_state(ctx: &PageContext) -> Option<ReviewEntry> {
    let fm = ctx.state_module("feedbackModule")?;
    // The long-lived misspelled average key predates the corrected one and
    // still appears on live pages
    let average_rating = fm
        .get("evarageStar")
        .and_then(num_from_value)
        .filter(|v| *v != 0.0)
        .or_else(|| fm.get("averageStar").and_then(num_from_value))
        .unwrap_or(0.0);
    let total_count = fm
        .get("totalValidNum")
        .and_then(num_from_value)
        .filter(|v| *v != 0.0)
        .or_else(|| fm.get("reviewCount").and_then(num_from_value))
        .unwrap_or(0.0) as u32;
    let positive_rate = fm.get("positiveRate").and_then(string_from_value);
    Some(ReviewEntry::Summary {
        average_rating,
        total_count,
        positive_rate,
    })
}

fn summary_from_dom(doc: &Html) -> Option<ReviewEntry> {
    let average_rating = extract_text(doc, SUMMARY_RATING_SELECTORS)
        .and_then(|t| parse_price(&t))
        .unwrap_or(0.0);
    let total_count = extract_text(doc, SUMMARY_COUNT_SELECTORS)
        .and_then(|t| parse_count(&t))
        .unwrap_or(0);
    if average_rating == 0.0 && total_count == 0 {
        return None;
    }
    Some(ReviewEntry::Summary {
        average_rating,
        total_count,
        positive_rate: None,
    })
}

fn intercepted_reviews(payload: &Value, reviews: &mut Vec<ReviewEntry>) {
    let Some(list) = payload
        .get("data")
        .and_then(|d| d.get("evaViewList"))
        .and_then(|v| v.as_array())
    else {
        return;
    };
    for entry in list {
        let images = entry
            .get("images")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|i| i.as_str().and_then(normalize_image_url))
                    .collect()
            })
            .unwrap_or_default();
        reviews.push(ReviewEntry::Review {
            author: entry
                .get("buyerName")
                .and_then(string_from_value)
                .unwrap_or_else(|| "Anonymous".to_string()),
            rating: entry
                .get("buyerEval")
                .and_then(num_from_value)
                .filter(|v| *v != 0.0)
                .unwrap_or(5.0),
            content: entry
                .get("buyerFeedback")
                .and_then(string_from_value)
                .unwrap_or_default(),
            date: entry
                .get("evalDate")
                .and_then(string_from_value)
                .unwrap_or_default(),
            country: entry
                .get("buyerCountry")
                .and_then(string_from_value)
                .unwrap_or_default(),
            images,
        });
    }
}

fn dom_reviews(doc: &Html, reviews: &mut Vec<ReviewEntry>) {
    let Ok(card_sel) = Selector::parse(REVIEW_CARD_SELECTORS) else {
        return;
    };
    let Ok(img_sel) = Selector::parse("img") else {
        return;
    };
    for card in doc.select(&card_sel) {
        // Cards without review text are decoration, not reviews
        let Some(content) = extract_element_text(&card, ".buyer-feedback, [class*=\"content\"]")
        else {
            continue;
        };
        let author = extract_element_text(&card, ".user-name, [class*=\"reviewer\"]")
            .unwrap_or_else(|| "Anonymous".to_string());
        let date = extract_element_text(&card, ".r-time, [class*=\"date\"]").unwrap_or_default();
        let country =
            extract_element_text(&card, ".user-country, [class*=\"country\"]").unwrap_or_default();
        let images = card
            .select(&img_sel)
            .filter(|img| !img.value().attr("class").unwrap_or("").contains("avatar"))
            .filter_map(|img| img.value().attr("src"))
            .filter(|src| src.contains("alicdn"))
            .filter_map(normalize_image_url)
            .collect();
        reviews.push(ReviewEntry::Review {
            author,
            rating: card_rating(&card),
            content,
            date,
            country,
            images,
        });
    }
}

/// Star rating from the filled-stars width percentage, five when absent.
fn card_rating(card: &ElementRef) -> f64 {
    let Ok(star_sel) = Selector::parse("[class*=\"star\"], .star-view") else {
        return 5.0;
    };
    let Some(stars) = card.select(&star_sel).next() else {
        return 5.0;
    };
    let style = stars.value().attr("style").unwrap_or("");
    match STAR_WIDTH_RE
        .captures(style)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
    {
        Some(pct) => (pct / 20.0).round(),
        None => 5.0,
    }
}
