//! Application state and composition.

use std::sync::Arc;

use crate::infrastructure::ports::{CatalogRepo, ImageGenPort, RemoteFetchPort};
use crate::use_cases::TryOnPipeline;

/// Main application state, passed to HTTP handlers via axum state.
///
/// Built once at startup; the backend choice behind `catalog` is effectively
/// immutable for the process lifetime. There is no other shared mutable
/// state between requests.
pub struct App {
    pub catalog: Arc<dyn CatalogRepo>,
    pub tryon: TryOnPipeline,
    pub max_upload_bytes: usize,
}

impl App {
    pub fn new(
        catalog: Arc<dyn CatalogRepo>,
        image_gen: Arc<dyn ImageGenPort>,
        fetcher: Arc<dyn RemoteFetchPort>,
        max_upload_bytes: usize,
    ) -> Self {
        let tryon = TryOnPipeline::new(
            catalog.clone(),
            image_gen,
            fetcher,
            max_upload_bytes,
        );
        Self {
            catalog,
            tryon,
            max_upload_bytes,
        }
    }
}
