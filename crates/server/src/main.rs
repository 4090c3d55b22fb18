//! FrameFit server - Main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use framefit_server::config::Config;
use framefit_server::infrastructure::fetch::HttpFetcher;
use framefit_server::infrastructure::gemini::GeminiClient;
use framefit_server::infrastructure::{http, persistence};
use framefit_server::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv_from_repo_root();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "framefit_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting FrameFit server");

    let config = Config::from_env();
    if config.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set; try-on generation will fail until configured");
    }

    let catalog = persistence::connect(&config).await?;
    let image_gen = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        &config.gemini_model_id,
    ));
    let fetcher = Arc::new(HttpFetcher::new());

    let app = Arc::new(App::new(
        catalog,
        image_gen,
        fetcher,
        config.max_upload_bytes,
    ));
    let router = http::router(app);

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
