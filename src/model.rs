use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized record produced by one extraction run over one product page.
///
/// Every field is always present in serialized output; fields a page does not
/// provide carry their defaults (empty string, empty list, 0.0, `None`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub external_id: Option<String>,
    pub url: String,
    pub platform: String,
    pub extracted_at: DateTime<Utc>,
    pub title: String,
    pub brand: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub original_price: Option<f64>,
    pub currency: String,
    pub images: Vec<String>,
    pub videos: Vec<VideoRef>,
    pub variants: Vec<VariantOption>,
    pub reviews: Vec<ReviewEntry>,
    pub specifications: BTreeMap<String, String>,
}

impl ProductRecord {
    /// An extraction that resolved neither an id, a title, nor a price found
    /// nothing usable on the page.
    pub fn is_empty(&self) -> bool {
        self.external_id.is_none() && self.title.is_empty() && self.price == 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRef {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub platform: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantOption {
    pub id: Option<String>,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub image: Option<String>,
    pub available: bool,
}

/// One entry in the reviews list. At most one `Summary` per record, always
/// first when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReviewEntry {
    Summary {
        average_rating: f64,
        total_count: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        positive_rate: Option<String>,
    },
    Review {
        author: String,
        rating: f64,
        content: String,
        date: String,
        country: String,
        images: Vec<String>,
    },
}
