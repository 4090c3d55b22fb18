//! Try-on generation pipeline.
//!
//! Orchestrates one try-on request: validate the face image, resolve the
//! glasses reference, invoke the generation capability, and optionally
//! record the result. Steps are awaited sequentially; nothing here retries
//! or enforces a deadline, that belongs to the caller.

use std::sync::Arc;
use std::time::Instant;

use framefit_domain::{GlassesId, GlassesSnapshot, TryOnId, TryOnSource};

use crate::infrastructure::ports::{
    CatalogRepo, ImageGenError, ImageGenPort, ImagePart, NewTryOn, RemoteFetchPort,
};
use crate::prompt_templates;
use crate::use_cases::resolver::{
    resolve_reference, validate_image, ReferenceRequest, ResolveError, ValidationError,
};

#[derive(Debug, Clone)]
pub struct TryOnRequest {
    pub face: ImagePart,
    pub glasses_upload: Option<ImagePart>,
    pub glasses_id: Option<GlassesId>,
    pub glasses_url: Option<String>,
    /// Explicit opt-in to server-side persistence of the result.
    pub persist: bool,
}

#[derive(Debug, Clone)]
pub struct TryOnOutcome {
    pub image_base64: String,
    pub model_id: String,
    pub elapsed_ms: u64,
    /// Present only when persistence was opted into and succeeded.
    pub record_id: Option<TryOnId>,
}

#[derive(Debug, thiserror::Error)]
pub enum TryOnError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Generation(#[from] ImageGenError),
}

pub struct TryOnPipeline {
    catalog: Arc<dyn CatalogRepo>,
    image_gen: Arc<dyn ImageGenPort>,
    fetcher: Arc<dyn RemoteFetchPort>,
    max_upload_bytes: usize,
}

impl TryOnPipeline {
    pub fn new(
        catalog: Arc<dyn CatalogRepo>,
        image_gen: Arc<dyn ImageGenPort>,
        fetcher: Arc<dyn RemoteFetchPort>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            catalog,
            image_gen,
            fetcher,
            max_upload_bytes,
        }
    }

    pub async fn run(&self, request: TryOnRequest) -> Result<TryOnOutcome, TryOnError> {
        // Validation first, before any network call is made.
        validate_image("file", &request.face, self.max_upload_bytes)?;

        let reference_request = ReferenceRequest {
            upload: request.glasses_upload,
            glasses_id: request.glasses_id,
            glasses_url: request.glasses_url,
        };
        let reference = resolve_reference(
            &reference_request,
            self.catalog.as_ref(),
            self.fetcher.as_ref(),
            self.max_upload_bytes,
        )
        .await?;

        let prompt = prompt_templates::compositing_prompt();
        let started = Instant::now();
        let generated = self
            .image_gen
            .generate(&request.face, &reference, &prompt)
            .await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let record_id = self
            .maybe_persist(request.persist, request.glasses_id, &generated.image_base64)
            .await;

        Ok(TryOnOutcome {
            image_base64: generated.image_base64,
            model_id: generated.model_id,
            elapsed_ms,
            record_id,
        })
    }

    /// Persistence decision logic. Without opt-in this returns immediately
    /// and never touches the repository. With opt-in, failures are logged
    /// and swallowed: the generated image has already been delivered and a
    /// missing log row must not invalidate it.
    pub async fn maybe_persist(
        &self,
        opted_in: bool,
        source: Option<GlassesId>,
        image_base64: &str,
    ) -> Option<TryOnId> {
        if !opted_in {
            return None;
        }

        let snapshot = match source {
            Some(glasses_id) => match self.catalog.get_glasses(glasses_id).await {
                Ok(Some(detail)) => GlassesSnapshot::of(&detail.glasses),
                Ok(None) => {
                    tracing::warn!(%glasses_id, "Product vanished before persistence, recording without metadata");
                    GlassesSnapshot {
                        glasses_id: Some(glasses_id),
                        ..GlassesSnapshot::default()
                    }
                }
                Err(e) => {
                    tracing::warn!(%glasses_id, error = %e, "Product lookup failed, recording without metadata");
                    GlassesSnapshot {
                        glasses_id: Some(glasses_id),
                        ..GlassesSnapshot::default()
                    }
                }
            },
            None => GlassesSnapshot::default(),
        };

        let try_on = NewTryOn {
            source: if source.is_some() {
                TryOnSource::Product
            } else {
                TryOnSource::Custom
            },
            image_data_url: format!("data:image/png;base64,{image_base64}"),
            snapshot,
        };

        match self.catalog.create_try_on(try_on).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to persist try-on record");
                None
            }
        }
    }
}
