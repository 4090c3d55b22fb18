//! Process configuration.
//!
//! All environment inspection happens here, once, at startup. The resulting
//! struct is passed explicitly to the repository factory and the rest of the
//! application; nothing else reads the environment.

use std::path::PathBuf;

/// Which storage backend the catalog repository should use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Embedded single-file SQLite database.
    Sqlite { path: PathBuf },
    /// Networked Postgres database.
    Postgres { url: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: StorageBackend,
    /// Local directory backing `/assets/...` cdn urls in dev.
    pub assets_dir: PathBuf,
    /// Credential for the external generation capability. Absent means
    /// generation fails fast with a missing-credential error.
    pub gemini_api_key: Option<String>,
    pub gemini_model_id: String,
    /// Upload ceiling for the face and glasses images, in bytes.
    pub max_upload_bytes: usize,
    pub server_host: String,
    pub server_port: u16,
}

pub const DEFAULT_MODEL_ID: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 10;

impl Config {
    pub fn from_env() -> Self {
        let force_sqlite = std::env::var("FORCE_SQLITE")
            .map(|v| {
                let v = v.to_ascii_lowercase();
                v == "1" || v == "true"
            })
            .unwrap_or(false);
        let database_url = std::env::var("DATABASE_URL").unwrap_or_default();
        let sqlite_path =
            PathBuf::from(std::env::var("SQLITE_PATH").unwrap_or_else(|_| ".data/dev.sqlite".into()));

        let backend = Self::select_backend(force_sqlite, &database_url, sqlite_path);

        let max_upload_mb: usize = std::env::var("MAX_UPLOAD_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_MB);

        Self {
            backend,
            assets_dir: PathBuf::from(std::env::var("ASSETS_DIR").unwrap_or_else(|_| "public".into())),
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            gemini_model_id: std::env::var("GEMINI_MODEL_ID")
                .unwrap_or_else(|_| DEFAULT_MODEL_ID.into()),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: std::env::var("SERVER_PORT")
                .or_else(|_| std::env::var("PORT"))
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
        }
    }

    /// Backend selection is a pure function of configuration: a Postgres
    /// connection string selects the networked store, anything else (or a
    /// forced override) selects the embedded one.
    fn select_backend(force_sqlite: bool, database_url: &str, sqlite_path: PathBuf) -> StorageBackend {
        if !force_sqlite
            && (database_url.starts_with("postgres://") || database_url.starts_with("postgresql://"))
        {
            StorageBackend::Postgres {
                url: database_url.to_string(),
            }
        } else {
            StorageBackend::Sqlite { path: sqlite_path }
        }
    }
}
