//! Try-on generation endpoint.
//!
//! Accepts a multipart payload with the face image plus one of the three
//! glasses-reference shapes, runs the pipeline, and maps its error taxonomy
//! onto HTTP statuses. Generation-path failures are logged in full here and
//! normalized to one generic message outward.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use framefit_domain::GlassesId;
use serde::Serialize;

use super::ErrorBody;
use crate::app::App;
use crate::infrastructure::ports::ImagePart;
use crate::use_cases::resolver::{ResolveError, ValidationError};
use crate::use_cases::{TryOnError, TryOnRequest};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TryOnResponse {
    pub image_base64: String,
    pub model_id: String,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

pub async fn generate_tryon(State(app): State<Arc<App>>, multipart: Multipart) -> Response {
    let request = match parse_multipart(multipart).await {
        Ok(request) => request,
        Err(response) => return response,
    };

    match app.tryon.run(request).await {
        Ok(outcome) => {
            let body = TryOnResponse {
                image_base64: outcome.image_base64,
                model_id: outcome.model_id,
                elapsed_ms: outcome.elapsed_ms,
                id: outcome.record_id.map(|id| id.to_string()),
            };
            // Generated images are personal; never cache them.
            (
                StatusCode::OK,
                [(header::CACHE_CONTROL, "no-store")],
                Json(body),
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn parse_multipart(mut multipart: Multipart) -> Result<TryOnRequest, Response> {
    let mut face: Option<ImagePart> = None;
    let mut glasses_upload: Option<ImagePart> = None;
    let mut glasses_id: Option<GlassesId> = None;
    let mut glasses_url: Option<String> = None;
    let mut persist = false;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(_) => return Err(bad_request("Expected multipart/form-data")),
        };
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let mime = field.content_type().unwrap_or("").to_ascii_lowercase();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| bad_request("Malformed upload"))?;
                face = Some(ImagePart {
                    mime,
                    bytes: bytes.to_vec(),
                });
            }
            "glassesFile" => {
                let mime = field.content_type().unwrap_or("").to_ascii_lowercase();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| bad_request("Malformed upload"))?;
                // Browsers send an empty part when no file was chosen.
                if !bytes.is_empty() {
                    glasses_upload = Some(ImagePart {
                        mime,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            "glassesId" => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| bad_request("Malformed upload"))?;
                if !text.is_empty() {
                    glasses_id =
                        Some(text.parse().map_err(|_| bad_request("Invalid glasses ID"))?);
                }
            }
            "glassesUrl" => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| bad_request("Malformed upload"))?;
                if !text.is_empty() {
                    glasses_url = Some(text);
                }
            }
            "persist" => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| bad_request("Malformed upload"))?
                    .to_ascii_lowercase();
                persist = text == "1" || text == "true";
            }
            _ => {}
        }
    }

    let Some(face) = face else {
        return Err(validation_response(ValidationError::MissingFace));
    };

    Ok(TryOnRequest {
        face,
        glasses_upload,
        glasses_id,
        glasses_url,
        persist,
    })
}

fn bad_request(message: &str) -> Response {
    ErrorBody::response(StatusCode::BAD_REQUEST, message).into_response()
}

fn error_response(err: TryOnError) -> Response {
    match err {
        TryOnError::Validation(v) | TryOnError::Resolve(ResolveError::Validation(v)) => {
            validation_response(v)
        }
        TryOnError::Resolve(ResolveError::MissingReference) => {
            bad_request("Missing glasses reference (upload or id)")
        }
        TryOnError::Resolve(ResolveError::NoReferenceAsset) => {
            bad_request("No reference asset for glasses")
        }
        TryOnError::Resolve(ResolveError::Fetch(detail)) => {
            tracing::error!(error = %detail, "Reference fetch failed");
            ErrorBody::response(StatusCode::BAD_GATEWAY, "Failed to load reference image")
                .into_response()
        }
        TryOnError::Resolve(ResolveError::Repo(e)) => {
            tracing::error!(error = %e, "Catalog lookup failed during try-on");
            ErrorBody::response(StatusCode::BAD_GATEWAY, "Failed to generate image")
                .into_response()
        }
        TryOnError::Generation(e) => {
            // The variants stay distinguishable here for observability; the
            // client sees one generic failure.
            tracing::error!(error = %e, "Try-on generation failed");
            ErrorBody::response(StatusCode::BAD_GATEWAY, "Failed to generate image")
                .into_response()
        }
    }
}

fn validation_response(v: ValidationError) -> Response {
    let (status, message) = match &v {
        ValidationError::MissingFace => (StatusCode::BAD_REQUEST, "Missing file".to_string()),
        ValidationError::TooLarge { field, limit_mb } => {
            let message = if *field == "glassesFile" {
                format!("Glasses file too large. Max {limit_mb}MB")
            } else {
                format!("File too large. Max {limit_mb}MB")
            };
            (StatusCode::PAYLOAD_TOO_LARGE, message)
        }
        ValidationError::UnsupportedMime { field, .. } => {
            let message = if *field == "glassesFile" {
                "Glasses image must be JPEG or PNG".to_string()
            } else {
                "Only JPEG or PNG supported".to_string()
            };
            (StatusCode::UNSUPPORTED_MEDIA_TYPE, message)
        }
    };
    ErrorBody::response(status, &message).into_response()
}
