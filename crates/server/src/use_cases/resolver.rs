//! Reference resolver.
//!
//! Produces one validated {mime, bytes} glasses image from one of three
//! request shapes, in priority order: an uploaded glasses image, a catalog
//! product id (optionally with a pre-resolved URL that skips the repository
//! round-trip), or nothing, which is a failure. Every branch returns fully
//! validated data: mime is jpeg or png, never anything else.

use framefit_domain::GlassesId;

use crate::infrastructure::ports::{
    CatalogRepo, ImagePart, ReferenceSource, RemoteFetchPort, RepoError,
};

pub const ALLOWED_MIME: [&str; 2] = ["image/jpeg", "image/png"];

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing file")]
    MissingFace,
    #[error("{field} too large, max {limit_mb}MB")]
    TooLarge {
        field: &'static str,
        limit_mb: usize,
    },
    #[error("{field} must be JPEG or PNG, got {mime:?}")]
    UnsupportedMime { field: &'static str, mime: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Missing glasses reference (upload or id)")]
    MissingReference,
    #[error("No reference asset for glasses")]
    NoReferenceAsset,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Remote fetch failed or yielded unusable data. Recoverable by the
    /// caller as a 502-equivalent, not a crash.
    #[error("Failed to load reference image: {0}")]
    Fetch(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// The glasses side of a try-on request, as received.
#[derive(Debug, Clone, Default)]
pub struct ReferenceRequest {
    pub upload: Option<ImagePart>,
    pub glasses_id: Option<GlassesId>,
    /// Pre-resolved canonical image URL, honored only alongside an id.
    pub glasses_url: Option<String>,
}

/// Validate an inbound image against the configured ceiling. Size is
/// checked before mime so an oversized body is rejected without sniffing.
pub fn validate_image(
    field: &'static str,
    part: &ImagePart,
    max_upload_bytes: usize,
) -> Result<(), ValidationError> {
    if part.bytes.len() > max_upload_bytes {
        return Err(ValidationError::TooLarge {
            field,
            limit_mb: max_upload_bytes / (1024 * 1024),
        });
    }
    let mime = part.mime.to_ascii_lowercase();
    if !ALLOWED_MIME.contains(&mime.as_str()) {
        return Err(ValidationError::UnsupportedMime {
            field,
            mime: part.mime.clone(),
        });
    }
    Ok(())
}

pub async fn resolve_reference(
    request: &ReferenceRequest,
    catalog: &dyn CatalogRepo,
    fetcher: &dyn RemoteFetchPort,
    max_upload_bytes: usize,
) -> Result<ImagePart, ResolveError> {
    // Upload wins over a catalog id; documented contract.
    if let Some(upload) = &request.upload {
        validate_image("glassesFile", upload, max_upload_bytes)?;
        return Ok(ImagePart {
            mime: upload.mime.to_ascii_lowercase(),
            bytes: upload.bytes.clone(),
        });
    }

    let Some(glasses_id) = request.glasses_id else {
        return Err(ResolveError::MissingReference);
    };

    // A pre-resolved URL skips the repository round-trip; the browsing page
    // usually already knows the canonical image location.
    if let Some(url) = request.glasses_url.as_deref().filter(|u| !u.is_empty()) {
        return fetch_remote(fetcher, url, None).await;
    }

    let asset = catalog
        .get_reference_asset(glasses_id)
        .await?
        .ok_or(ResolveError::NoReferenceAsset)?;

    match asset.source {
        ReferenceSource::Inline(bytes) => {
            let part = ImagePart {
                mime: asset.mime.to_ascii_lowercase(),
                bytes,
            };
            validate_image("reference", &part, max_upload_bytes)?;
            Ok(part)
        }
        ReferenceSource::Remote(url) => fetch_remote(fetcher, &url, Some(asset.mime)).await,
    }
}

/// Fetch a reference over HTTP and hold the result to the same mime
/// contract as every other branch. The fetcher itself bounds response size.
async fn fetch_remote(
    fetcher: &dyn RemoteFetchPort,
    url: &str,
    fallback_mime: Option<String>,
) -> Result<ImagePart, ResolveError> {
    let fetched = fetcher
        .fetch(url)
        .await
        .map_err(|e| ResolveError::Fetch(e.to_string()))?;

    let mime = fetched
        .mime
        .or(fallback_mime)
        .unwrap_or_else(|| "image/png".to_string())
        .to_ascii_lowercase();
    if !ALLOWED_MIME.contains(&mime.as_str()) {
        return Err(ResolveError::Fetch(format!(
            "reference at {url} has unsupported content type {mime:?}"
        )));
    }

    Ok(ImagePart {
        mime,
        bytes: fetched.bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{
        FetchError, FetchedBytes, MockCatalogRepo, MockRemoteFetchPort, ReferenceAsset,
    };

    const MB: usize = 1024 * 1024;

    fn jpeg(len: usize) -> ImagePart {
        ImagePart {
            mime: "image/jpeg".into(),
            bytes: vec![0xAB; len],
        }
    }

    #[tokio::test]
    async fn upload_wins_over_catalog_id() {
        // No expectations on either mock: any repo or fetch call panics.
        let catalog = MockCatalogRepo::new();
        let fetcher = MockRemoteFetchPort::new();
        let request = ReferenceRequest {
            upload: Some(jpeg(1024)),
            glasses_id: Some(GlassesId::new()),
            glasses_url: Some("https://cdn.example.com/ref.png".into()),
        };

        let part = resolve_reference(&request, &catalog, &fetcher, 10 * MB)
            .await
            .expect("resolved");
        assert_eq!(part.mime, "image/jpeg");
        assert_eq!(part.bytes.len(), 1024);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let catalog = MockCatalogRepo::new();
        let fetcher = MockRemoteFetchPort::new();
        let request = ReferenceRequest {
            upload: Some(jpeg(11 * MB)),
            ..Default::default()
        };

        let err = resolve_reference(&request, &catalog, &fetcher, 10 * MB)
            .await
            .expect_err("rejected");
        assert!(matches!(
            err,
            ResolveError::Validation(ValidationError::TooLarge { limit_mb: 10, .. })
        ));
    }

    #[tokio::test]
    async fn upload_with_wrong_mime_is_rejected() {
        let catalog = MockCatalogRepo::new();
        let fetcher = MockRemoteFetchPort::new();
        let request = ReferenceRequest {
            upload: Some(ImagePart {
                mime: "image/webp".into(),
                bytes: vec![0; 16],
            }),
            ..Default::default()
        };

        let err = resolve_reference(&request, &catalog, &fetcher, 10 * MB)
            .await
            .expect_err("rejected");
        assert!(matches!(
            err,
            ResolveError::Validation(ValidationError::UnsupportedMime { .. })
        ));
    }

    #[tokio::test]
    async fn catalog_inline_bytes_are_used_directly() {
        let mut catalog = MockCatalogRepo::new();
        catalog.expect_get_reference_asset().times(1).returning(|_| {
            Ok(Some(ReferenceAsset {
                mime: "image/png".into(),
                source: ReferenceSource::Inline(vec![1, 2, 3]),
            }))
        });
        let fetcher = MockRemoteFetchPort::new();
        let request = ReferenceRequest {
            glasses_id: Some(GlassesId::new()),
            ..Default::default()
        };

        let part = resolve_reference(&request, &catalog, &fetcher, 10 * MB)
            .await
            .expect("resolved");
        assert_eq!(part.mime, "image/png");
        assert_eq!(part.bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn catalog_url_is_fetched() {
        let mut catalog = MockCatalogRepo::new();
        catalog.expect_get_reference_asset().times(1).returning(|_| {
            Ok(Some(ReferenceAsset {
                mime: "image/jpeg".into(),
                source: ReferenceSource::Remote("https://cdn.example.com/g.jpg".into()),
            }))
        });
        let mut fetcher = MockRemoteFetchPort::new();
        fetcher
            .expect_fetch()
            .withf(|url| url == "https://cdn.example.com/g.jpg")
            .times(1)
            .returning(|_| {
                Ok(FetchedBytes {
                    mime: Some("image/jpeg".into()),
                    bytes: vec![9; 64],
                })
            });
        let request = ReferenceRequest {
            glasses_id: Some(GlassesId::new()),
            ..Default::default()
        };

        let part = resolve_reference(&request, &catalog, &fetcher, 10 * MB)
            .await
            .expect("resolved");
        assert_eq!(part.mime, "image/jpeg");
        assert_eq!(part.bytes.len(), 64);
    }

    #[tokio::test]
    async fn pre_resolved_url_skips_the_repository() {
        // Repository mock has zero expectations; a lookup would panic.
        let catalog = MockCatalogRepo::new();
        let mut fetcher = MockRemoteFetchPort::new();
        fetcher
            .expect_fetch()
            .withf(|url| url == "https://cdn.example.com/pre.png")
            .times(1)
            .returning(|_| {
                Ok(FetchedBytes {
                    mime: Some("image/png".into()),
                    bytes: vec![7; 32],
                })
            });
        let request = ReferenceRequest {
            glasses_id: Some(GlassesId::new()),
            glasses_url: Some("https://cdn.example.com/pre.png".into()),
            ..Default::default()
        };

        let part = resolve_reference(&request, &catalog, &fetcher, 10 * MB)
            .await
            .expect("resolved");
        assert_eq!(part.bytes.len(), 32);
    }

    #[tokio::test]
    async fn fetch_404_is_a_fetch_failure_not_an_empty_result() {
        let mut catalog = MockCatalogRepo::new();
        catalog.expect_get_reference_asset().returning(|_| {
            Ok(Some(ReferenceAsset {
                mime: "image/png".into(),
                source: ReferenceSource::Remote("https://cdn.example.com/gone.png".into()),
            }))
        });
        let mut fetcher = MockRemoteFetchPort::new();
        fetcher
            .expect_fetch()
            .returning(|_| Err(FetchError::Status(404)));
        let request = ReferenceRequest {
            glasses_id: Some(GlassesId::new()),
            ..Default::default()
        };

        let err = resolve_reference(&request, &catalog, &fetcher, 10 * MB)
            .await
            .expect_err("failed");
        assert!(matches!(err, ResolveError::Fetch(_)));
    }

    #[tokio::test]
    async fn fetched_non_image_content_type_is_a_fetch_failure() {
        let catalog = MockCatalogRepo::new();
        let mut fetcher = MockRemoteFetchPort::new();
        fetcher.expect_fetch().returning(|_| {
            Ok(FetchedBytes {
                mime: Some("text/html".into()),
                bytes: b"<html>404</html>".to_vec(),
            })
        });
        let request = ReferenceRequest {
            glasses_id: Some(GlassesId::new()),
            glasses_url: Some("https://cdn.example.com/oops".into()),
            ..Default::default()
        };

        let err = resolve_reference(&request, &catalog, &fetcher, 10 * MB)
            .await
            .expect_err("failed");
        assert!(matches!(err, ResolveError::Fetch(_)));
    }

    #[tokio::test]
    async fn missing_reference_asset_is_reported() {
        let mut catalog = MockCatalogRepo::new();
        catalog.expect_get_reference_asset().returning(|_| Ok(None));
        let fetcher = MockRemoteFetchPort::new();
        let request = ReferenceRequest {
            glasses_id: Some(GlassesId::new()),
            ..Default::default()
        };

        let err = resolve_reference(&request, &catalog, &fetcher, 10 * MB)
            .await
            .expect_err("failed");
        assert!(matches!(err, ResolveError::NoReferenceAsset));
    }

    #[tokio::test]
    async fn nothing_at_all_is_missing_reference() {
        let catalog = MockCatalogRepo::new();
        let fetcher = MockRemoteFetchPort::new();

        let err = resolve_reference(&ReferenceRequest::default(), &catalog, &fetcher, 10 * MB)
            .await
            .expect_err("failed");
        assert!(matches!(err, ResolveError::MissingReference));
    }
}
