//! FrameFit domain types.
//!
//! Catalog entities (glasses, media assets, leads) and the try-on record
//! written after a successful generation. These are plain data types; all
//! persistence and orchestration lives in the server crate.

pub mod entities;
pub mod ids;

pub use entities::{
    AssetKind, Audience, Glasses, GlassesSnapshot, Lead, MediaAsset, TryOnRecord, TryOnSource,
};
pub use ids::{AssetId, GlassesId, LeadId, TryOnId};
