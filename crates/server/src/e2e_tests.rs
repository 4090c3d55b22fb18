//! End-to-end pipeline tests.
//!
//! Exercise the full try-on flow against a real embedded SQLite store and a
//! mocked generation capability: catalog-backed references, uploaded
//! references, CDN-backed references, and the persistence opt-in.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use framefit_domain::{AssetId, AssetKind, Audience, Glasses, GlassesId, MediaAsset};
use sqlx::Row;

use crate::app::App;
use crate::infrastructure::persistence::{CatalogSeed, SqliteCatalogRepo};
use crate::infrastructure::ports::{
    FetchedBytes, GeneratedImage, ImagePart, MockImageGenPort, MockRemoteFetchPort,
};
use crate::use_cases::resolver::ResolveError;
use crate::use_cases::{TryOnError, TryOnPipeline, TryOnRequest};

const MAX_UPLOAD: usize = 10 * 1024 * 1024;

async fn seeded_repo(assets_dir: PathBuf) -> Arc<SqliteCatalogRepo> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    Arc::new(
        SqliteCatalogRepo::new(pool, assets_dir)
            .await
            .expect("schema"),
    )
}

async fn seed_glasses(repo: &SqliteCatalogRepo, cdn_url: Option<&str>) -> Glasses {
    let now = Utc::now();
    let glasses = Glasses {
        id: GlassesId::new(),
        sku: format!("E2E-{}", GlassesId::new()),
        name: "Club Round".into(),
        brand: "Northlane".into(),
        style: Some("round".into()),
        shape: Some("circle".into()),
        glasses_shape: Some("round".into()),
        color: Some("tortoise".into()),
        audience: Some(Audience::Unisex),
        frame_width_mm: Some(136),
        lens_height_mm: Some(44),
        price_cents: Some(15900),
        tags: None,
        created_at: now,
        updated_at: now,
        cover_cdn_url: None,
    };
    repo.insert_glasses(&glasses).await.expect("seed glasses");
    if let Some(url) = cdn_url {
        repo.insert_asset(&MediaAsset {
            id: AssetId::new(),
            glasses_id: glasses.id,
            kind: AssetKind::Reference,
            storage_key: None,
            cdn_url: Some(url.to_string()),
            mime: Some("image/png".to_string()),
            width: None,
            height: None,
            duration_ms: None,
            checksum: None,
            alt_text: None,
            sort_order: 0,
            created_at: now,
        })
        .await
        .expect("seed asset");
    }
    glasses
}

fn face() -> ImagePart {
    ImagePart {
        mime: "image/jpeg".into(),
        bytes: b"face-jpeg-bytes".to_vec(),
    }
}

fn generator_expecting(reference_bytes: Vec<u8>) -> MockImageGenPort {
    let mut gen = MockImageGenPort::new();
    gen.expect_generate()
        .withf(move |face, reference, prompt| {
            face.bytes == b"face-jpeg-bytes"
                && reference.bytes == reference_bytes
                && prompt.contains("glasses")
        })
        .times(1)
        .returning(|_, _, _| {
            Ok(GeneratedImage {
                image_base64: "R0VORVJBVEVE".to_string(),
                model_id: "test-model".to_string(),
            })
        });
    gen
}

async fn try_on_count(repo: &SqliteCatalogRepo) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM try_ons")
        .fetch_one(repo.pool())
        .await
        .expect("count")
}

#[tokio::test]
async fn catalog_reference_with_opt_in_generates_and_records() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("assets")).expect("mkdir");
    std::fs::write(dir.path().join("assets/round.png"), b"local-reference-png")
        .expect("write asset");

    let repo = seeded_repo(dir.path().to_path_buf()).await;
    let glasses = seed_glasses(&repo, Some("/assets/round.png")).await;

    let pipeline = TryOnPipeline::new(
        repo.clone(),
        Arc::new(generator_expecting(b"local-reference-png".to_vec())),
        Arc::new(MockRemoteFetchPort::new()),
        MAX_UPLOAD,
    );

    let outcome = pipeline
        .run(TryOnRequest {
            face: face(),
            glasses_upload: None,
            glasses_id: Some(glasses.id),
            glasses_url: None,
            persist: true,
        })
        .await
        .expect("pipeline");

    assert_eq!(outcome.image_base64, "R0VORVJBVEVE");
    assert_eq!(outcome.model_id, "test-model");
    assert!(outcome.record_id.is_some());

    // The record carries the product snapshot taken at write time.
    let row = sqlx::query("SELECT source, brand, name, price_cents, image_data_url FROM try_ons")
        .fetch_one(repo.pool())
        .await
        .expect("row");
    assert_eq!(row.get::<String, _>("source"), "product");
    assert_eq!(row.get::<Option<String>, _>("brand").as_deref(), Some("Northlane"));
    assert_eq!(row.get::<Option<String>, _>("name").as_deref(), Some("Club Round"));
    assert_eq!(row.get::<Option<i64>, _>("price_cents"), Some(15900));
    assert_eq!(
        row.get::<String, _>("image_data_url"),
        "data:image/png;base64,R0VORVJBVEVE"
    );
}

#[tokio::test]
async fn uploaded_reference_without_opt_in_leaves_no_trace() {
    let repo = seeded_repo(PathBuf::from("/nonexistent")).await;

    let pipeline = TryOnPipeline::new(
        repo.clone(),
        Arc::new(generator_expecting(b"uploaded-glasses-png".to_vec())),
        Arc::new(MockRemoteFetchPort::new()),
        MAX_UPLOAD,
    );

    let outcome = pipeline
        .run(TryOnRequest {
            face: face(),
            glasses_upload: Some(ImagePart {
                mime: "image/png".into(),
                bytes: b"uploaded-glasses-png".to_vec(),
            }),
            glasses_id: None,
            glasses_url: None,
            persist: false,
        })
        .await
        .expect("pipeline");

    assert!(outcome.record_id.is_none());
    assert_eq!(try_on_count(&repo).await, 0);
}

#[tokio::test]
async fn cdn_reference_is_fetched_before_generation() {
    let repo = seeded_repo(PathBuf::from("/nonexistent")).await;
    let glasses = seed_glasses(&repo, Some("https://cdn.example.com/round.png")).await;

    let mut fetcher = MockRemoteFetchPort::new();
    fetcher
        .expect_fetch()
        .withf(|url| url == "https://cdn.example.com/round.png")
        .times(1)
        .returning(|_| {
            Ok(FetchedBytes {
                mime: Some("image/png".to_string()),
                bytes: b"cdn-reference-png".to_vec(),
            })
        });

    let pipeline = TryOnPipeline::new(
        repo.clone(),
        Arc::new(generator_expecting(b"cdn-reference-png".to_vec())),
        Arc::new(fetcher),
        MAX_UPLOAD,
    );

    let outcome = pipeline
        .run(TryOnRequest {
            face: face(),
            glasses_upload: None,
            glasses_id: Some(glasses.id),
            glasses_url: None,
            persist: false,
        })
        .await
        .expect("pipeline");
    assert_eq!(outcome.image_base64, "R0VORVJBVEVE");
}

#[tokio::test]
async fn product_without_reference_asset_fails_before_generation() {
    let repo = seeded_repo(PathBuf::from("/nonexistent")).await;
    let glasses = seed_glasses(&repo, None).await;

    let mut gen = MockImageGenPort::new();
    gen.expect_generate().times(0);

    let pipeline = TryOnPipeline::new(
        repo.clone(),
        Arc::new(gen),
        Arc::new(MockRemoteFetchPort::new()),
        MAX_UPLOAD,
    );

    let err = pipeline
        .run(TryOnRequest {
            face: face(),
            glasses_upload: None,
            glasses_id: Some(glasses.id),
            glasses_url: None,
            persist: true,
        })
        .await
        .expect_err("no reference");
    assert!(matches!(
        err,
        TryOnError::Resolve(ResolveError::NoReferenceAsset)
    ));
    assert_eq!(try_on_count(&repo).await, 0);
}

#[tokio::test]
async fn http_multipart_round_trip_returns_image_and_record_id() {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("assets")).expect("mkdir");
    std::fs::write(dir.path().join("assets/round.png"), b"local-reference-png")
        .expect("write asset");

    let repo = seeded_repo(dir.path().to_path_buf()).await;
    let glasses = seed_glasses(&repo, Some("/assets/round.png")).await;

    let app = Arc::new(App::new(
        repo.clone(),
        Arc::new(generator_expecting(b"local-reference-png".to_vec())),
        Arc::new(MockRemoteFetchPort::new()),
        MAX_UPLOAD,
    ));
    let router = crate::infrastructure::http::router(app);

    let boundary = "xXframefitXx";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"face.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"face-jpeg-bytes");
    body.extend_from_slice(
        format!(
            "\r\n--{boundary}\r\nContent-Disposition: form-data; name=\"glassesId\"\r\n\r\n{}\r\n",
            glasses.id
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Disposition: form-data; name=\"persist\"\r\n\r\n1\r\n--{boundary}--\r\n")
            .as_bytes(),
    );

    let response = router
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

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok()),
        Some("no-store")
    );

    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(json["imageBase64"], "R0VORVJBVEVE");
    assert_eq!(json["modelId"], "test-model");
    assert!(json["id"].as_str().is_some());
    assert_eq!(try_on_count(&repo).await, 1);
}
