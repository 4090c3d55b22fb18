//! Embedded SQLite catalog adapter.
//!
//! Single-file store for local/dev operation. Schema setup is idempotent:
//! re-applying it against an initialized database neither errors nor
//! duplicates structures, and the `audience` column added after initial
//! deployment is backfilled via a pragma probe (SQLite has no
//! `ADD COLUMN IF NOT EXISTS`).

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use framefit_domain::{AssetKind, Audience, Glasses, GlassesId, LeadId, MediaAsset, TryOnId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::{decode_tags, encode_tags, CatalogSeed};
use crate::infrastructure::ports::{
    CatalogRepo, GlassesDetail, GlassesPage, ListParams, NewLead, NewTryOn, ReferenceAsset,
    ReferenceSource, RepoError,
};

pub struct SqliteCatalogRepo {
    pool: SqlitePool,
    /// Local directory backing `/assets/...` cdn urls.
    assets_dir: PathBuf,
}

impl SqliteCatalogRepo {
    /// Open (creating if missing) the database file and apply the schema.
    pub async fn connect(path: &Path, assets_dir: PathBuf) -> Result<Self, RepoError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| RepoError::Unavailable(e.to_string()))?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| RepoError::Unavailable(e.to_string()))?;
        Self::new(pool, assets_dir).await
    }

    /// Wrap an existing pool (tests hand in a single-connection in-memory pool).
    pub async fn new(pool: SqlitePool, assets_dir: PathBuf) -> Result<Self, RepoError> {
        ensure_schema(&pool).await?;
        Ok(Self { pool, assets_dir })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Apply the startup schema. Safe to call repeatedly.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), RepoError> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS glasses (
            id TEXT PRIMARY KEY,
            sku TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            brand TEXT NOT NULL,
            style TEXT,
            shape TEXT,
            glasses_shape TEXT,
            color TEXT,
            frame_width_mm INTEGER,
            lens_height_mm INTEGER,
            price_cents INTEGER,
            tags TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS media_assets (
            id TEXT PRIMARY KEY,
            glasses_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            storage_key TEXT,
            cdn_url TEXT,
            mime TEXT,
            width INTEGER,
            height INTEGER,
            duration_ms INTEGER,
            checksum TEXT,
            alt_text TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY(glasses_id) REFERENCES glasses(id)
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_media_assets_glasses_id ON media_assets(glasses_id)",
        r#"
        CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            glasses_id TEXT NOT NULL,
            note TEXT,
            created_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS try_ons (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            image_data_url TEXT NOT NULL,
            glasses_id TEXT,
            brand TEXT,
            name TEXT,
            shape TEXT,
            style TEXT,
            color TEXT,
            price_cents INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    ];
    for stmt in statements {
        sqlx::query(stmt).execute(pool).await?;
    }

    // Column added after initial deployment; probe before altering.
    let has_audience: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info('glasses') WHERE name = 'audience'")
            .fetch_one(pool)
            .await?;
    if has_audience == 0 {
        sqlx::query("ALTER TABLE glasses ADD COLUMN audience TEXT")
            .execute(pool)
            .await?;
    }

    Ok(())
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, params: &ListParams) {
    let mut sep = " WHERE ";
    if let Some(query) = params.query.as_deref().filter(|q| !q.is_empty()) {
        let pattern = format!("%{query}%");
        qb.push(sep)
            .push("(g.name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR g.brand LIKE ")
            .push_bind(pattern.clone())
            .push(" OR g.sku LIKE ")
            .push_bind(pattern)
            .push(")");
        sep = " AND ";
    }
    if let Some(brand) = params.brand.clone().filter(|b| !b.is_empty()) {
        qb.push(sep).push("g.brand = ").push_bind(brand);
        sep = " AND ";
    }
    if let Some(style) = params.style.clone().filter(|s| !s.is_empty()) {
        qb.push(sep).push("g.style = ").push_bind(style);
        sep = " AND ";
    }
    if let Some(shape) = params.shape.clone().filter(|s| !s.is_empty()) {
        qb.push(sep).push("g.shape = ").push_bind(shape);
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepoError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepoError::Serialization(format!("Invalid timestamp {raw:?}: {e}")))
}

fn parse_id<T: FromStr<Err = uuid::Error>>(raw: &str) -> Result<T, RepoError> {
    raw.parse()
        .map_err(|e| RepoError::Serialization(format!("Invalid id {raw:?}: {e}")))
}

fn row_to_glasses(row: &SqliteRow) -> Result<Glasses, RepoError> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(Glasses {
        id: parse_id(&id)?,
        sku: row.try_get("sku")?,
        name: row.try_get("name")?,
        brand: row.try_get("brand")?,
        style: row.try_get("style")?,
        shape: row.try_get("shape")?,
        glasses_shape: row.try_get("glasses_shape")?,
        color: row.try_get("color")?,
        audience: row
            .try_get::<Option<String>, _>("audience")?
            .and_then(|s| Audience::parse(&s)),
        frame_width_mm: row.try_get("frame_width_mm")?,
        lens_height_mm: row.try_get("lens_height_mm")?,
        price_cents: row.try_get("price_cents")?,
        tags: decode_tags(row.try_get("tags")?),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        // Only the list query selects a cover url.
        cover_cdn_url: row
            .try_get::<Option<String>, _>("cover_cdn_url")
            .unwrap_or(None),
    })
}

fn row_to_asset(row: &SqliteRow) -> Result<MediaAsset, RepoError> {
    let id: String = row.try_get("id")?;
    let glasses_id: String = row.try_get("glasses_id")?;
    let kind: String = row.try_get("kind")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(MediaAsset {
        id: parse_id(&id)?,
        glasses_id: parse_id(&glasses_id)?,
        kind: AssetKind::parse(&kind)
            .ok_or_else(|| RepoError::Serialization(format!("Unknown asset kind {kind:?}")))?,
        storage_key: row.try_get("storage_key")?,
        cdn_url: row.try_get("cdn_url")?,
        mime: row.try_get("mime")?,
        width: row.try_get("width")?,
        height: row.try_get("height")?,
        duration_ms: row.try_get("duration_ms")?,
        checksum: row.try_get("checksum")?,
        alt_text: row.try_get("alt_text")?,
        sort_order: row.try_get("sort_order")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait]
impl CatalogRepo for SqliteCatalogRepo {
    async fn list_glasses(&self, params: ListParams) -> Result<GlassesPage, RepoError> {
        let total = if params.skip_count {
            None
        } else {
            let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM glasses g");
            push_filters(&mut count, &params);
            let n: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;
            Some(n.max(0) as u64)
        };

        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT g.*, (
                SELECT ma.cdn_url FROM media_assets ma
                WHERE ma.glasses_id = g.id AND ma.kind = 'reference'
                ORDER BY ma.sort_order, ma.created_at LIMIT 1
            ) AS cover_cdn_url
            FROM glasses g
            "#,
        );
        push_filters(&mut qb, &params);
        let offset = i64::from(params.page.saturating_sub(1)) * i64::from(params.limit);
        qb.push(" ORDER BY g.created_at DESC LIMIT ")
            .push_bind(i64::from(params.limit))
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let items = rows
            .iter()
            .map(row_to_glasses)
            .collect::<Result<Vec<_>, _>>()?;
        let total = total.unwrap_or(items.len() as u64);
        Ok(GlassesPage { items, total })
    }

    async fn get_glasses(&self, id: GlassesId) -> Result<Option<GlassesDetail>, RepoError> {
        let row = sqlx::query("SELECT * FROM glasses WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let glasses = row_to_glasses(&row)?;

        let asset_rows = sqlx::query(
            "SELECT * FROM media_assets WHERE glasses_id = ? ORDER BY sort_order, created_at",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;
        let assets = asset_rows
            .iter()
            .map(row_to_asset)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(GlassesDetail { glasses, assets }))
    }

    async fn get_reference_asset(
        &self,
        glasses_id: GlassesId,
    ) -> Result<Option<ReferenceAsset>, RepoError> {
        let row = sqlx::query(
            r#"
            SELECT mime, cdn_url FROM media_assets
            WHERE glasses_id = ? AND kind = 'reference'
            ORDER BY sort_order, created_at LIMIT 1
            "#,
        )
        .bind(glasses_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mime: Option<String> = row.try_get("mime")?;
        let mime = mime.unwrap_or_else(|| "image/png".to_string());
        let Some(cdn_url) = row.try_get::<Option<String>, _>("cdn_url")? else {
            // An asset row with no retrieval locator is unusable.
            return Ok(None);
        };

        // Locally stored assets are served straight from disk.
        if let Some(rel) = cdn_url.strip_prefix('/').filter(|_| cdn_url.starts_with("/assets/")) {
            let path = self.assets_dir.join(rel);
            if let Ok(bytes) = tokio::fs::read(&path).await {
                return Ok(Some(ReferenceAsset {
                    mime,
                    source: ReferenceSource::Inline(bytes),
                }));
            }
        }

        Ok(Some(ReferenceAsset {
            mime,
            source: ReferenceSource::Remote(cdn_url),
        }))
    }

    async fn create_lead(&self, lead: NewLead) -> Result<LeadId, RepoError> {
        let id = LeadId::new();
        sqlx::query(
            "INSERT INTO leads (id, email, glasses_id, note, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&lead.email)
        .bind(lead.glasses_id.to_string())
        .bind(&lead.note)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_try_on(&self, try_on: NewTryOn) -> Result<TryOnId, RepoError> {
        // Low-volume best-effort log: recreate the backing table if an
        // operator dropped it, rather than failing the write.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS try_ons (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                image_data_url TEXT NOT NULL,
                glasses_id TEXT,
                brand TEXT,
                name TEXT,
                shape TEXT,
                style TEXT,
                color TEXT,
                price_cents INTEGER,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let id = TryOnId::new();
        let snap = &try_on.snapshot;
        sqlx::query(
            r#"
            INSERT INTO try_ons (
                id, source, image_data_url, glasses_id, brand, name, shape, style, color,
                price_cents, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(try_on.source.as_str())
        .bind(&try_on.image_data_url)
        .bind(snap.glasses_id.map(|g| g.to_string()))
        .bind(&snap.brand)
        .bind(&snap.name)
        .bind(&snap.shape)
        .bind(&snap.style)
        .bind(&snap.color)
        .bind(snap.price_cents)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }
}

#[async_trait]
impl CatalogSeed for SqliteCatalogRepo {
    async fn insert_glasses(&self, glasses: &Glasses) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO glasses (
                id, sku, name, brand, style, shape, glasses_shape, color, audience,
                frame_width_mm, lens_height_mm, price_cents, tags, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(glasses.id.to_string())
        .bind(&glasses.sku)
        .bind(&glasses.name)
        .bind(&glasses.brand)
        .bind(&glasses.style)
        .bind(&glasses.shape)
        .bind(&glasses.glasses_shape)
        .bind(&glasses.color)
        .bind(glasses.audience.map(|a| a.as_str()))
        .bind(glasses.frame_width_mm)
        .bind(glasses.lens_height_mm)
        .bind(glasses.price_cents)
        .bind(encode_tags(glasses.tags.as_ref())?)
        .bind(glasses.created_at.to_rfc3339())
        .bind(glasses.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_asset(&self, asset: &MediaAsset) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO media_assets (
                id, glasses_id, kind, storage_key, cdn_url, mime, width, height,
                duration_ms, checksum, alt_text, sort_order, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(asset.id.to_string())
        .bind(asset.glasses_id.to_string())
        .bind(asset.kind.as_str())
        .bind(&asset.storage_key)
        .bind(&asset.cdn_url)
        .bind(&asset.mime)
        .bind(asset.width)
        .bind(asset.height)
        .bind(asset.duration_ms)
        .bind(&asset.checksum)
        .bind(&asset.alt_text)
        .bind(asset.sort_order)
        .bind(asset.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
