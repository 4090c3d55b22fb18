//! Port traits for infrastructure boundaries.
//!
//! These are the only abstractions in the server. Ports exist for:
//! - Catalog storage (embedded SQLite or networked Postgres)
//! - The external image-generation capability
//! - Remote fetches of previously-known asset URLs (for testing)

use async_trait::async_trait;
use framefit_domain::{
    Glasses, GlassesId, GlassesSnapshot, LeadId, MediaAsset, TryOnId, TryOnSource,
};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// The backing store cannot be reached. Fatal for catalog reads,
    /// swallowed for best-effort try-on persistence.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(io) => Self::Unavailable(io.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                Self::Unavailable(e.to_string())
            }
            other => Self::Database(other.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageGenError {
    /// No credential configured; no request was attempted.
    #[error("No generation credential configured")]
    MissingCredential,
    /// Network failure or non-2xx from the capability.
    #[error("Upstream generation failure: {0}")]
    Upstream(String),
    /// The capability answered with a shape we do not recognize.
    #[error("Unrecognized generation response: {0}")]
    InvalidResponse(String),
    /// The capability answered, but no part carried inline image data.
    #[error("No image produced by model")]
    NoImageProduced,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Remote fetch returned status {0}")]
    Status(u16),
    #[error("Remote fetch failed: {0}")]
    Network(String),
    #[error("Remote asset exceeds sanity bound of {limit} bytes")]
    TooLarge { limit: usize },
}

// =============================================================================
// Catalog Repository
// =============================================================================

/// Conjunction of optional predicates plus 1-indexed pagination.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    /// Case-insensitive substring match across name/brand/sku.
    pub query: Option<String>,
    pub brand: Option<String>,
    pub style: Option<String>,
    pub shape: Option<String>,
    /// 1-indexed page; offset = (page - 1) * limit.
    pub page: u32,
    /// Clamped by the HTTP layer, not here.
    pub limit: u32,
    /// When true, trade an exact total for speed; `total` becomes
    /// `items.len()` and must not be treated as authoritative.
    pub skip_count: bool,
}

#[derive(Debug, Clone)]
pub struct GlassesPage {
    pub items: Vec<Glasses>,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct GlassesDetail {
    pub glasses: Glasses,
    /// Ordered by sort_order, then created_at.
    pub assets: Vec<MediaAsset>,
}

/// Canonical reference image for a product: exactly one of inline bytes or
/// a URL for the caller to fetch.
#[derive(Debug, Clone)]
pub struct ReferenceAsset {
    pub mime: String,
    pub source: ReferenceSource,
}

#[derive(Debug, Clone)]
pub enum ReferenceSource {
    Inline(Vec<u8>),
    Remote(String),
}

#[derive(Debug, Clone)]
pub struct NewLead {
    /// Syntactic validity is enforced by the HTTP layer before this call.
    pub email: String,
    /// Not required to reference an existing product; a lead may outlive it.
    pub glasses_id: GlassesId,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTryOn {
    pub source: TryOnSource,
    pub image_data_url: String,
    pub snapshot: GlassesSnapshot,
}

/// Uniform query/command facade over one storage backend.
///
/// Both adapters implement this identically and pass the same contract
/// test suite. Not-found is `Ok(None)`, never an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogRepo: Send + Sync {
    /// Newest-created first.
    async fn list_glasses(&self, params: ListParams) -> Result<GlassesPage, RepoError>;

    async fn get_glasses(&self, id: GlassesId) -> Result<Option<GlassesDetail>, RepoError>;

    async fn get_reference_asset(
        &self,
        glasses_id: GlassesId,
    ) -> Result<Option<ReferenceAsset>, RepoError>;

    async fn create_lead(&self, lead: NewLead) -> Result<LeadId, RepoError>;

    /// Best-effort log; auto-creates its backing table on first use.
    async fn create_try_on(&self, try_on: NewTryOn) -> Result<TryOnId, RepoError>;
}

// =============================================================================
// External Service Ports
// =============================================================================

/// A validated binary image handed to the generation capability.
#[derive(Debug, Clone)]
pub struct ImagePart {
    /// Always image/jpeg or image/png once past the resolver.
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub image_base64: String,
    pub model_id: String,
}

/// One generation call: {reference, face, prompt} in, one image out.
/// No internal retry; the caller decides whether to retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageGenPort: Send + Sync {
    async fn generate(
        &self,
        face: &ImagePart,
        reference: &ImagePart,
        prompt: &str,
    ) -> Result<GeneratedImage, ImageGenError>;
}

#[derive(Debug, Clone)]
pub struct FetchedBytes {
    /// Content-type reported by the origin, if any.
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

/// Plain GET against a previously-known asset URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteFetchPort: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedBytes, FetchError>;
}
