//! Catalog browse and detail endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use framefit_domain::{Glasses, GlassesId, MediaAsset};
use serde::{Deserialize, Serialize};

use super::ErrorBody;
use crate::app::App;
use crate::infrastructure::ports::{ListParams, RepoError};

const DEFAULT_LIMIT: u32 = 12;
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub query: Option<String>,
    pub brand: Option<String>,
    pub style: Option<String>,
    pub shape: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<Glasses>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub glasses: Glasses,
    pub assets: Vec<MediaAsset>,
}

/// List products, newest first. The limit clamp lives here, at the request
/// boundary, not in the repository contract.
pub async fn list_glasses(
    State(app): State<Arc<App>>,
    Query(q): Query<ListQuery>,
) -> Result<Json<ListResponse>, (StatusCode, Json<ErrorBody>)> {
    let page = q.page.unwrap_or(1).max(1);
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let pageful = app
        .catalog
        .list_glasses(ListParams {
            query: q.query,
            brand: q.brand,
            style: q.style,
            shape: q.shape,
            page,
            limit,
            skip_count: false,
        })
        .await
        .map_err(storage_error)?;

    Ok(Json(ListResponse {
        items: pageful.items,
        total: pageful.total,
        page,
        limit,
    }))
}

pub async fn get_glasses(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<DetailResponse>, (StatusCode, Json<ErrorBody>)> {
    let id: GlassesId = id
        .parse()
        .map_err(|_| ErrorBody::response(StatusCode::BAD_REQUEST, "Invalid glasses ID"))?;

    let detail = app
        .catalog
        .get_glasses(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ErrorBody::response(StatusCode::NOT_FOUND, "Not found"))?;

    Ok(Json(DetailResponse {
        glasses: detail.glasses,
        assets: detail.assets,
    }))
}

/// Catalog reads are essential: an unreachable store is an explicit failure,
/// never silently-empty data.
pub(super) fn storage_error(e: RepoError) -> (StatusCode, Json<ErrorBody>) {
    tracing::error!(error = %e, "Catalog read failed");
    match e {
        RepoError::Unavailable(_) => {
            ErrorBody::response(StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable")
        }
        _ => ErrorBody::response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
    }
}
