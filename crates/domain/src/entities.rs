//! Catalog and try-on entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AssetId, GlassesId, LeadId, TryOnId};

/// Target demographic for a pair of glasses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Men,
    Women,
    Unisex,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Men => "men",
            Self::Women => "women",
            Self::Unisex => "unisex",
        }
    }

    /// Lenient parse for values coming out of storage; unknown values map to None.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "men" => Some(Self::Men),
            "women" => Some(Self::Women),
            "unisex" => Some(Self::Unisex),
            _ => None,
        }
    }
}

/// A glasses product in the catalog.
///
/// `sku` is globally unique; `id` is immutable once assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Glasses {
    pub id: GlassesId,
    pub sku: String,
    pub name: String,
    pub brand: String,
    pub style: Option<String>,
    pub shape: Option<String>,
    /// Normalized shape variant (e.g. "round" for both "round" and "circular").
    pub glasses_shape: Option<String>,
    pub color: Option<String>,
    pub audience: Option<Audience>,
    pub frame_width_mm: Option<i64>,
    pub lens_height_mm: Option<i64>,
    pub price_cents: Option<i64>,
    /// Freeform tags; order is display-significant and duplicates are allowed.
    pub tags: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Canonical reference asset's public URL, filled in by list queries.
    pub cover_cdn_url: Option<String>,
}

/// Kind of media attached to a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Reference,
    GalleryImage,
    Video,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::GalleryImage => "gallery_image",
            Self::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reference" => Some(Self::Reference),
            "gallery_image" => Some(Self::GalleryImage),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// A media file belonging to exactly one product.
///
/// When several assets of kind `reference` exist for one product, the one
/// with the lowest `sort_order` (ties: earliest `created_at`) is canonical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: AssetId,
    pub glasses_id: GlassesId,
    pub kind: AssetKind,
    pub storage_key: Option<String>,
    pub cdn_url: Option<String>,
    pub mime: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration_ms: Option<i64>,
    pub checksum: Option<String>,
    pub alt_text: Option<String>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

/// A follow-up request tied to one product. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub email: String,
    pub glasses_id: GlassesId,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Where the reference image of a try-on came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TryOnSource {
    /// Catalog product reference.
    Product,
    /// Client-uploaded glasses image.
    Custom,
}

impl TryOnSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "product" => Some(Self::Product),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Denormalized product fields copied into a try-on record at write time,
/// so the record stays meaningful if the product is later edited or deleted.
/// All fields are optional on purpose; new product attributes get added here
/// explicitly rather than silently dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlassesSnapshot {
    pub glasses_id: Option<GlassesId>,
    pub brand: Option<String>,
    pub name: Option<String>,
    pub shape: Option<String>,
    pub style: Option<String>,
    pub color: Option<String>,
    pub price_cents: Option<i64>,
}

impl GlassesSnapshot {
    pub fn of(glasses: &Glasses) -> Self {
        Self {
            glasses_id: Some(glasses.id),
            brand: Some(glasses.brand.clone()),
            name: Some(glasses.name.clone()),
            shape: glasses.shape.clone(),
            style: glasses.style.clone(),
            color: glasses.color.clone(),
            price_cents: glasses.price_cents,
        }
    }
}

/// A server-persisted try-on. Created only on explicit opt-in after a
/// successful generation; never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryOnRecord {
    pub id: TryOnId,
    pub source: TryOnSource,
    /// Generated image as a `data:image/png;base64,...` URI.
    pub image_data_url: String,
    #[serde(flatten)]
    pub snapshot: GlassesSnapshot,
    pub created_at: DateTime<Utc>,
}
