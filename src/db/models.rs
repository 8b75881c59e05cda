use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Asset categories stored alongside uploaded reference images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetCategory {
    Closet,
    Location,
}

impl AssetCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetCategory::Closet => "closet",
            AssetCategory::Location => "location",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "closet" | "apparel" => Some(AssetCategory::Closet),
            "location" => Some(AssetCategory::Location),
            _ => None,
        }
    }
}

/// Gallery categories: main shoot output vs accessory composites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryCategory {
    Apparel,
    Accessory,
}

impl GalleryCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            GalleryCategory::Apparel => "apparel",
            GalleryCategory::Accessory => "accessory",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "apparel" => Some(GalleryCategory::Apparel),
            "accessory" => Some(GalleryCategory::Accessory),
            _ => None,
        }
    }
}

/// A model roster entry. Newer records carry split face/body references;
/// `image_base64` is the legacy single-image column older records used.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ModelRow {
    pub id: i64,
    pub studio_id: i64,
    pub name: String,
    pub face_base64: Option<String>,
    pub body_base64: Option<String>,
    pub image_base64: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AssetRow {
    pub id: i64,
    pub studio_id: i64,
    pub category: String,
    pub name: String,
    pub image_base64: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GalleryRow {
    pub id: i64,
    pub studio_id: i64,
    pub category: String,
    pub prompt: Option<String>,
    pub image_base64: String,
    pub created_at: DateTime<Utc>,
}
