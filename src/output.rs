use crate::model::{ProductRecord, ReviewEntry};

const MAX_LISTED_IMAGES: usize = 8;
const MAX_LISTED_REVIEWS: usize = 5;

pub fn format_record(record: &ProductRecord) -> String {
    let mut out = String::new();

    let title = if record.title.is_empty() {
        "(untitled product)"
    } else {
        record.title.as_str()
    };
    out.push_str(&format!("# {}\n\n", title));

    format_overview(record, &mut out);
    format_description(record, &mut out);
    format_media(record, &mut out);
    format_variants(record, &mut out);
    format_reviews(record, &mut out);
    format_specifications(record, &mut out);

    out
}

fn format_overview(record: &ProductRecord, out: &mut String) {
    out.push_str("## Overview\n");

    if !record.brand.is_empty() {
        out.push_str(&format!("- **Brand:** {}\n", record.brand));
    }
    if !record.category.is_empty() {
        out.push_str(&format!("- **Category:** {}\n", record.category));
    }

    let price_str = format_price(
        record.price,
        record.original_price.as_ref(),
        &record.currency,
    );
    out.push_str(&format!("- **Price:** {}\n", price_str));

    if let Some(summary) = record.reviews.iter().find_map(|entry| match entry {
        ReviewEntry::Summary {
            average_rating,
            total_count,
            ..
        } => Some((*average_rating, *total_count)),
        _ => None,
    }) {
        out.push_str(&format!(
            "- **Rating:** {:.1}/5 ({} reviews)\n",
            summary.0,
            format_number(summary.1)
        ));
    }

    if let Some(ref id) = record.external_id {
        out.push_str(&format!("- **ID:** {}\n", id));
    }
    out.push_str(&format!("- **Platform:** {}\n", record.platform));
    out.push_str(&format!("- **URL:** {}\n", record.url));
    out.push_str(&format!(
        "- **Extracted:** {}\n",
        record.extracted_at.format("%Y-%m-%d %H:%M UTC")
    ));
    out.push('\n');
}

fn format_description(record: &ProductRecord, out: &mut String) {
    if record.description.is_empty() {
        return;
    }
    out.push_str("## Description\n");
    out.push_str(&record.description);
    out.push_str("\n\n");
}

fn format_media(record: &ProductRecord, out: &mut String) {
    if !record.images.is_empty() {
        out.push_str(&format!("## Images ({})\n", record.images.len()));
        for url in record.images.iter().take(MAX_LISTED_IMAGES) {
            out.push_str(&format!("- {}\n", url));
        }
        if record.images.len() > MAX_LISTED_IMAGES {
            out.push_str(&format!(
                "- … {} more\n",
                record.images.len() - MAX_LISTED_IMAGES
            ));
        }
        out.push('\n');
    }

    if !record.videos.is_empty() {
        out.push_str(&format!("## Videos ({})\n", record.videos.len()));
        for video in &record.videos {
            out.push_str(&format!("- {} ({})\n", video.url, video.platform));
        }
        out.push('\n');
    }
}

fn format_variants(record: &ProductRecord, out: &mut String) {
    if record.variants.is_empty() {
        return;
    }
    out.push_str(&format!("## Variants ({})\n", record.variants.len()));

    // Group by variant kind, preserving first-seen order.
    let mut groups: Vec<(String, Vec<&crate::model::VariantOption>)> = Vec::new();
    for variant in &record.variants {
        let kind = variant.kind.clone().unwrap_or_else(|| "Options".to_string());
        match groups.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, members)) => members.push(variant),
            None => groups.push((kind, vec![variant])),
        }
    }

    for (kind, members) in &groups {
        if groups.len() > 1 {
            out.push_str(&format!("### {}\n", kind));
        }
        for variant in members {
            let marker = if variant.available {
                ""
            } else {
                " (unavailable)"
            };
            out.push_str(&format!("- {}{}\n", variant.title, marker));
        }
    }
    out.push('\n');
}

fn format_reviews(record: &ProductRecord, out: &mut String) {
    let individual: Vec<_> = record
        .reviews
        .iter()
        .filter_map(|entry| match entry {
            ReviewEntry::Review {
                author,
                rating,
                content,
                date,
                country,
                ..
            } => Some((author, rating, content, date, country)),
            _ => None,
        })
        .collect();
    if individual.is_empty() {
        return;
    }

    out.push_str(&format!("## Reviews ({})\n", individual.len()));
    for (author, rating, content, date, country) in individual.iter().take(MAX_LISTED_REVIEWS) {
        let mut meta = format!("{:.0}/5", rating);
        if !date.is_empty() {
            meta.push_str(&format!(", {}", date));
        }
        if !country.is_empty() {
            meta.push_str(&format!(", {}", country));
        }
        out.push_str(&format!("### {} ({})\n", author, meta));
        out.push_str(content);
        out.push_str("\n\n");
    }
    if individual.len() > MAX_LISTED_REVIEWS {
        out.push_str(&format!(
            "_… {} more reviews_\n\n",
            individual.len() - MAX_LISTED_REVIEWS
        ));
    }
}

fn format_specifications(record: &ProductRecord, out: &mut String) {
    if record.specifications.is_empty() {
        return;
    }
    out.push_str("## Specifications\n");
    out.push_str("| Name | Value |\n");
    out.push_str("|---|---|\n");
    for (name, value) in &record.specifications {
        out.push_str(&format!("| {} | {} |\n", name, value));
    }
    out.push('\n');
}

fn format_price(price: f64, original: Option<&f64>, currency: &str) -> String {
    if price == 0.0 {
        return "n/a".to_string();
    }

    let symbol = match currency {
        "USD" => "$",
        "EUR" => "€",
        "GBP" => "£",
        "CNY" => "¥",
        _ => currency,
    };

    match original {
        Some(orig) if *orig > price => {
            let discount = ((*orig - price) / *orig * 100.0).round() as u32;
            format!(
                "{}{:.2} ~~{}{:.2}~~ ({}% off)",
                symbol, price, symbol, orig, discount
            )
        }
        _ => format!("{}{:.2}", symbol, price),
    }
}

fn format_number(n: u32) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VariantOption;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn record() -> ProductRecord {
        ProductRecord {
            external_id: Some("1005001".to_string()),
            url: "https://www.aliexpress.com/item/1005001.html".to_string(),
            platform: "aliexpress".to_string(),
            extracted_at: Utc::now(),
            title: "Wireless Earbuds".to_string(),
            brand: String::new(),
            description: String::new(),
            category: String::new(),
            price: 19.99,
            original_price: Some(39.99),
            currency: "USD".to_string(),
            images: Vec::new(),
            videos: Vec::new(),
            variants: Vec::new(),
            reviews: Vec::new(),
            specifications: BTreeMap::new(),
        }
    }

    #[test]
    fn price_line_shows_discount() {
        assert_eq!(
            format_price(19.99, Some(&39.99), "USD"),
            "$19.99 ~~$39.99~~ (50% off)"
        );
    }

    #[test]
    fn zero_price_renders_as_not_available() {
        assert_eq!(format_price(0.0, None, "USD"), "n/a");
    }

    #[test]
    fn report_contains_title_and_price() {
        let out = format_record(&record());
        assert!(out.starts_with("# Wireless Earbuds\n"));
        assert!(out.contains("$19.99 ~~$39.99~~ (50% off)"));
        assert!(out.contains("- **ID:** 1005001"));
    }

    #[test]
    fn variants_grouped_by_kind() {
        let mut rec = record();
        rec.variants = vec![
            VariantOption {
                id: Some("1".to_string()),
                title: "Black".to_string(),
                kind: Some("Color".to_string()),
                image: None,
                available: true,
            },
            VariantOption {
                id: Some("2".to_string()),
                title: "White".to_string(),
                kind: Some("Color".to_string()),
                image: None,
                available: false,
            },
            VariantOption {
                id: Some("3".to_string()),
                title: "EU Plug".to_string(),
                kind: Some("Plug Type".to_string()),
                image: None,
                available: true,
            },
        ];
        let out = format_record(&rec);
        assert!(out.contains("### Color\n- Black\n- White (unavailable)\n"));
        assert!(out.contains("### Plug Type\n- EU Plug\n"));
    }
}
