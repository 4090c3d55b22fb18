//! Storage backend adapters for the catalog repository.
//!
//! Two interchangeable implementations of [`CatalogRepo`]: an embedded
//! single-file SQLite store for zero-dependency local operation, and a
//! networked Postgres store for multi-instance production. Selection is a
//! pure function of configuration; nothing outside this module knows the
//! choice exists.

mod postgres;
mod sqlite;


pub use postgres::PgCatalogRepo;
pub use sqlite::SqliteCatalogRepo;

use std::sync::Arc;

use async_trait::async_trait;
use framefit_domain::{Glasses, MediaAsset};

use crate::config::{Config, StorageBackend};
use crate::infrastructure::ports::{CatalogRepo, RepoError};

/// Insert surface used by offline import tooling and by tests. Not part of
/// the [`CatalogRepo`] contract: the serving path never writes products.
#[async_trait]
pub trait CatalogSeed: Send + Sync {
    async fn insert_glasses(&self, glasses: &Glasses) -> Result<(), RepoError>;
    async fn insert_asset(&self, asset: &MediaAsset) -> Result<(), RepoError>;
}

/// Open the backend selected by configuration and apply the startup schema.
/// Safe to re-run against an already-initialized store.
pub async fn connect(config: &Config) -> Result<Arc<dyn CatalogRepo>, RepoError> {
    match &config.backend {
        StorageBackend::Sqlite { path } => {
            tracing::info!(path = %path.display(), "Using embedded SQLite catalog");
            let repo = SqliteCatalogRepo::connect(path, config.assets_dir.clone()).await?;
            Ok(Arc::new(repo))
        }
        StorageBackend::Postgres { url } => {
            tracing::info!("Using networked Postgres catalog");
            let repo = PgCatalogRepo::connect(url).await?;
            Ok(Arc::new(repo))
        }
    }
}

/// Tags are stored as a JSON text column in both backends.
pub(crate) fn encode_tags(tags: Option<&Vec<String>>) -> Result<Option<String>, RepoError> {
    tags.map(|t| serde_json::to_string(t))
        .transpose()
        .map_err(|e| RepoError::Serialization(e.to_string()))
}

pub(crate) fn decode_tags(raw: Option<String>) -> Option<Vec<String>> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
}
