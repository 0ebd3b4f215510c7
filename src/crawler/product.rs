//! Page items and the product records derived from them

use serde::{Deserialize, Serialize};

/// Placeholder token the catalog puts in image URLs
pub const IMAGE_SIZE_TOKEN: &str = "<SIZE>";

/// One product entry as returned by the search endpoint
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawItem {
    /// Catalog item identifier, used as the sku and dedup key
    pub item_id: String,

    /// Display name
    pub name: String,

    /// Brand name
    pub brand: String,

    /// First listed image URL, still containing the size token
    pub image_url: Option<String>,

    /// Product page path relative to the site origin
    pub canonical_url: String,

    /// Original (non-promotional) price
    pub original_price: Option<f64>,
}

/// One page of search results for a category
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchPage {
    pub items: Vec<RawItem>,

    /// Size of the category's whole result set as reported by this page
    pub total_products: u64,
}

/// Normalized product record handed to the output sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub sku: String,
    pub name: String,
    pub brand: String,
    pub image: String,
    pub url: String,
    /// Price rounded to the nearest whole unit
    pub price: Option<i64>,
}

/// Turns raw page items into product records
#[derive(Debug, Clone)]
pub struct ProductNormalizer {
    origin: String,
    image_size: String,
}

impl ProductNormalizer {
    /// Creates a normalizer for the given site origin and image size
    pub fn new(origin: &str, image_size: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            image_size: image_size.to_string(),
        }
    }

    pub fn normalize(&self, raw: &RawItem) -> ProductRecord {
        ProductRecord {
            sku: raw.item_id.clone(),
            name: raw.name.clone(),
            brand: raw.brand.clone(),
            image: raw
                .image_url
                .as_deref()
                .map(|url| substitute_image_size(url, &self.image_size))
                .unwrap_or_default(),
            url: self.product_url(&raw.canonical_url),
            price: raw.original_price.map(round_price),
        }
    }

    fn product_url(&self, canonical: &str) -> String {
        if canonical.is_empty() || canonical.starts_with('/') {
            format!("{}{}", self.origin, canonical)
        } else {
            format!("{}/{}", self.origin, canonical)
        }
    }
}

/// Replaces every size token in an image URL
pub fn substitute_image_size(url: &str, size: &str) -> String {
    url.replace(IMAGE_SIZE_TOKEN, size)
}

/// Rounds a price to the nearest whole unit, halves away from zero
pub fn round_price(price: f64) -> i64 {
    price.round() as i64
}
