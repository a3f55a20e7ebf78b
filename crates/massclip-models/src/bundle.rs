//! Bundle (product box) models.
//!
//! A bundle is a priced collection of uploads that buyers purchase as a unit.
//! Aggregates in [`ContentMetadata`] are recomputed from the full content list
//! whenever it changes.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::upload::{Upload, UploadType};

/// Lowest accepted bundle price (major units).
pub const MIN_BUNDLE_PRICE: f64 = 0.50;

/// Highest accepted bundle price (major units).
pub const MAX_BUNDLE_PRICE: f64 = 999.99;

/// Price validation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriceError {
    #[error("Price must be a finite number")]
    NotFinite,
    #[error("Price must be at least $0.50")]
    TooLow,
    #[error("Price cannot exceed $999.99")]
    TooHigh,
}

/// Derived aggregates over a bundle's content items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    /// Sum of known durations in seconds
    pub total_duration: f64,
    /// Sum of sizes in bytes
    pub total_size: u64,
    pub video_count: u32,
    pub audio_count: u32,
    pub image_count: u32,
    pub document_count: u32,
    pub other_count: u32,
}

impl ContentMetadata {
    /// Recompute aggregates by scanning every upload.
    pub fn from_uploads<'a>(uploads: impl IntoIterator<Item = &'a Upload>) -> Self {
        let mut meta = ContentMetadata::default();
        for upload in uploads {
            meta.total_duration += upload.duration.unwrap_or(0.0);
            meta.total_size = meta.total_size.saturating_add(upload.size);
            match upload.upload_type {
                UploadType::Video => meta.video_count += 1,
                UploadType::Audio => meta.audio_count += 1,
                UploadType::Image => meta.image_count += 1,
                UploadType::Document => meta.document_count += 1,
                UploadType::Other => meta.other_count += 1,
            }
        }
        meta
    }
}

/// A sellable bundle of uploads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Price in major units
    pub price: f64,
    pub currency: String,
    pub creator_id: String,
    /// Upload IDs, in insertion order
    #[serde(default)]
    pub content_items: Vec<String>,
    #[serde(default)]
    pub content_count: u32,
    #[serde(default)]
    pub content_metadata: ContentMetadata,
    /// Gateway product on the creator's connected account
    pub product_id: Option<String>,
    /// Gateway price on the creator's connected account
    pub price_id: Option<String>,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_preview_thumbnail: Option<String>,
    #[serde(default)]
    pub total_sales: u64,
    #[serde(default)]
    pub total_revenue: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bundle {
    /// Validate a bundle price against the accepted bounds.
    pub fn validate_price(price: f64) -> Result<(), PriceError> {
        if !price.is_finite() {
            return Err(PriceError::NotFinite);
        }
        if price < MIN_BUNDLE_PRICE {
            return Err(PriceError::TooLow);
        }
        if price > MAX_BUNDLE_PRICE {
            return Err(PriceError::TooHigh);
        }
        Ok(())
    }

    /// Create a new, empty, active bundle.
    pub fn new(
        id: impl Into<String>,
        creator_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        price: f64,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            price,
            currency: currency.into(),
            creator_id: creator_id.into(),
            content_items: Vec::new(),
            content_count: 0,
            content_metadata: ContentMetadata::default(),
            product_id: None,
            price_id: None,
            active: true,
            custom_preview_thumbnail: None,
            total_sales: 0,
            total_revenue: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.creator_id == uid
    }

    pub fn contains(&self, upload_id: &str) -> bool {
        self.content_items.iter().any(|id| id == upload_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(kind: UploadType, size: u64, duration: Option<f64>) -> Upload {
        Upload {
            id: crate::new_id(),
            uid: "creator".into(),
            file_url: "https://cdn.example.com/x".into(),
            r2_key: None,
            filename: "x".into(),
            title: "x".into(),
            upload_type: kind,
            size,
            mime_type: "application/octet-stream".into(),
            duration,
            thumbnail_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_price_bounds() {
        assert!(Bundle::validate_price(0.50).is_ok());
        assert!(Bundle::validate_price(999.99).is_ok());
        assert!(Bundle::validate_price(9.99).is_ok());
        assert_eq!(Bundle::validate_price(0.49), Err(PriceError::TooLow));
        assert_eq!(Bundle::validate_price(1000.0), Err(PriceError::TooHigh));
        assert_eq!(Bundle::validate_price(f64::NAN), Err(PriceError::NotFinite));
    }

    #[test]
    fn test_content_metadata_scan() {
        let uploads = vec![
            upload(UploadType::Video, 100, Some(12.5)),
            upload(UploadType::Video, 200, Some(7.5)),
            upload(UploadType::Audio, 50, None),
            upload(UploadType::Image, 5, None),
        ];
        let meta = ContentMetadata::from_uploads(&uploads);
        assert_eq!(meta.total_size, 355);
        assert_eq!(meta.total_duration, 20.0);
        assert_eq!(meta.video_count, 2);
        assert_eq!(meta.audio_count, 1);
        assert_eq!(meta.image_count, 1);
        assert_eq!(meta.document_count, 0);
    }

    #[test]
    fn test_new_bundle_defaults() {
        let bundle = Bundle::new("b1", "creator", "Pack", "", 9.99, "usd");
        assert!(bundle.active);
        assert!(bundle.product_id.is_none());
        assert_eq!(bundle.content_count, 0);
        assert!(bundle.is_owned_by("creator"));
        assert!(!bundle.is_owned_by("someone-else"));
    }
}
