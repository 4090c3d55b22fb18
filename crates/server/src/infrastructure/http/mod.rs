//! HTTP entry points.

pub mod catalog_routes;
pub mod lead_routes;
pub mod tryon_routes;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::App;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn response(status: StatusCode, message: &str) -> (StatusCode, Json<ErrorBody>) {
        (
            status,
            Json(ErrorBody {
                error: message.to_string(),
            }),
        )
    }
}

pub fn router(app: Arc<App>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Room for the face plus a glasses upload, with multipart framing slack.
    let body_limit = app.max_upload_bytes * 2 + 1024 * 1024;

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/glasses", get(catalog_routes::list_glasses))
        .route("/api/glasses/{id}", get(catalog_routes::get_glasses))
        .route("/api/leads", post(lead_routes::create_lead))
        .route("/api/tryon", post(tryon_routes::generate_tryon))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use chrono::{Duration, Utc};
    use framefit_domain::{Audience, Glasses, GlassesId};
    use tower::ServiceExt;

    use crate::infrastructure::persistence::{CatalogSeed, SqliteCatalogRepo};
    use crate::infrastructure::ports::{MockImageGenPort, MockRemoteFetchPort};

    async fn test_app() -> (Arc<App>, Arc<SqliteCatalogRepo>) {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        let repo = Arc::new(
            SqliteCatalogRepo::new(pool, std::env::temp_dir())
                .await
                .expect("schema"),
        );
        let app = Arc::new(App::new(
            repo.clone(),
            Arc::new(MockImageGenPort::new()),
            Arc::new(MockRemoteFetchPort::new()),
            10 * 1024 * 1024,
        ));
        (app, repo)
    }

    fn glasses(sku: &str, brand: &str, minutes_ago: i64) -> Glasses {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        Glasses {
            id: GlassesId::new(),
            sku: sku.into(),
            name: format!("{sku} frame"),
            brand: brand.into(),
            style: None,
            shape: None,
            glasses_shape: None,
            color: None,
            audience: Some(Audience::Unisex),
            frame_width_mm: None,
            lens_height_mm: None,
            price_cents: Some(9900),
            tags: None,
            created_at: at,
            updated_at: at,
            cover_cdn_url: None,
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let (app, _) = test_app().await;
        let response = router(app)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn list_clamps_limit_and_reports_totals() {
        let (app, repo) = test_app().await;
        for i in 0..3 {
            repo.insert_glasses(&glasses(&format!("SKU-{i}"), "Acme", i))
                .await
                .expect("seed");
        }

        let response = router(app)
            .oneshot(
                Request::builder()
                    .uri("/api/glasses?limit=9999&page=1")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["total"], 3);
        assert_eq!(json["limit"], 100);
        assert_eq!(json["items"].as_array().map(Vec::len), Some(3));
        // Newest first.
        assert_eq!(json["items"][0]["sku"], "SKU-0");
    }

    #[tokio::test]
    async fn detail_404s_on_unknown_id_and_400s_on_garbage() {
        let (app, _) = test_app().await;
        let router = router(app);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/glasses/{}", GlassesId::new()))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/glasses/not-a-uuid")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lead_with_invalid_email_is_rejected() {
        let (app, _) = test_app().await;
        let payload = serde_json::json!({
            "email": "not-an-email",
            "glassesId": GlassesId::new().to_string(),
        });
        let response = router(app)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/leads")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lead_with_valid_payload_is_created() {
        let (app, _) = test_app().await;
        let payload = serde_json::json!({
            "email": "shopper@example.com",
            "glassesId": GlassesId::new().to_string(),
            "note": "do you ship abroad?",
        });
        let response = router(app)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/leads")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert!(json["id"].as_str().is_some());
    }

    #[tokio::test]
    async fn tryon_without_face_is_rejected_before_any_work() {
        let (app, _) = test_app().await;
        let boundary = "xXframefitXx";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"persist\"\r\n\r\n1\r\n--{boundary}--\r\n"
        );
        let response = router(app)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/tryon")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Missing file");
    }
}
