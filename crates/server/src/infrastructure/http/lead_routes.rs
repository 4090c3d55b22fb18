//! Lead capture endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use framefit_domain::GlassesId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::catalog_routes::storage_error;
use super::ErrorBody;
use crate::app::App;
use crate::infrastructure::ports::NewLead;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    #[validate(email)]
    pub email: String,
    pub glasses_id: String,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateLeadResponse {
    pub id: String,
}

/// Syntactic validation happens here, before the repository is involved;
/// the repository deliberately does not require the product to still exist.
pub async fn create_lead(
    State(app): State<Arc<App>>,
    Json(req): Json<CreateLeadRequest>,
) -> Result<(StatusCode, Json<CreateLeadResponse>), (StatusCode, Json<ErrorBody>)> {
    req.validate()
        .map_err(|_| ErrorBody::response(StatusCode::BAD_REQUEST, "Invalid payload"))?;
    let glasses_id: GlassesId = req
        .glasses_id
        .parse()
        .map_err(|_| ErrorBody::response(StatusCode::BAD_REQUEST, "Invalid payload"))?;

    let id = app
        .catalog
        .create_lead(NewLead {
            email: req.email,
            glasses_id,
            note: req.note.filter(|n| !n.is_empty()),
        })
        .await
        .map_err(storage_error)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateLeadResponse { id: id.to_string() }),
    ))
}
