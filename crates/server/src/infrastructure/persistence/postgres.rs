//! Networked Postgres catalog adapter.
//!
//! Same contract as the embedded adapter. Reference assets always resolve
//! to a URL here: production media lives behind a CDN, never on the
//! serving host's disk.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use framefit_domain::{AssetKind, Audience, Glasses, GlassesId, LeadId, MediaAsset, TryOnId};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use super::{decode_tags, encode_tags, CatalogSeed};
use crate::infrastructure::ports::{
    CatalogRepo, GlassesDetail, GlassesPage, ListParams, NewLead, NewTryOn, ReferenceAsset,
    ReferenceSource, RepoError,
};

pub struct PgCatalogRepo {
    pool: PgPool,
}

impl PgCatalogRepo {
    pub async fn connect(url: &str) -> Result<Self, RepoError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| RepoError::Unavailable(e.to_string()))?;
        Self::new(pool).await
    }

    pub async fn new(pool: PgPool) -> Result<Self, RepoError> {
        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Apply the startup schema. Safe to call repeatedly.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), RepoError> {
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
            frame_width_mm BIGINT,
            lens_height_mm BIGINT,
            price_cents BIGINT,
            tags TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS media_assets (
            id TEXT PRIMARY KEY,
            glasses_id TEXT NOT NULL REFERENCES glasses(id),
            kind TEXT NOT NULL,
            storage_key TEXT,
            cdn_url TEXT,
            mime TEXT,
            width BIGINT,
            height BIGINT,
            duration_ms BIGINT,
            checksum TEXT,
            alt_text TEXT,
            sort_order BIGINT NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_media_assets_glasses_id ON media_assets(glasses_id)",
        r#"
        CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            glasses_id TEXT NOT NULL,
            note TEXT,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
        // Column added after initial deployment.
        "ALTER TABLE glasses ADD COLUMN IF NOT EXISTS audience TEXT",
    ];
    for stmt in statements {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}

const TRY_ONS_DDL: &str = r#"
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
        price_cents BIGINT,
        created_at TIMESTAMPTZ NOT NULL
    )
"#;

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, params: &ListParams) {
    let mut sep = " WHERE ";
    if let Some(query) = params.query.as_deref().filter(|q| !q.is_empty()) {
        let pattern = format!("%{query}%");
        qb.push(sep)
            .push("(g.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR g.brand ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR g.sku ILIKE ")
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

fn parse_id<T: std::str::FromStr<Err = uuid::Error>>(raw: &str) -> Result<T, RepoError> {
    raw.parse()
        .map_err(|e| RepoError::Serialization(format!("Invalid id {raw:?}: {e}")))
}

fn row_to_glasses(row: &PgRow) -> Result<Glasses, RepoError> {
    let id: String = row.try_get("id")?;
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
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        cover_cdn_url: row
            .try_get::<Option<String>, _>("cover_cdn_url")
            .unwrap_or(None),
    })
}

fn row_to_asset(row: &PgRow) -> Result<MediaAsset, RepoError> {
    let id: String = row.try_get("id")?;
    let glasses_id: String = row.try_get("glasses_id")?;
    let kind: String = row.try_get("kind")?;
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
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl CatalogRepo for PgCatalogRepo {
    async fn list_glasses(&self, params: ListParams) -> Result<GlassesPage, RepoError> {
        let total = if params.skip_count {
            None
        } else {
            let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM glasses g");
            push_filters(&mut count, &params);
            let n: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;
            Some(n.max(0) as u64)
        };

        let mut qb = QueryBuilder::<Postgres>::new(
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
        let row = sqlx::query("SELECT * FROM glasses WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let glasses = row_to_glasses(&row)?;

        let asset_rows = sqlx::query(
            "SELECT * FROM media_assets WHERE glasses_id = $1 ORDER BY sort_order, created_at",
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
            WHERE glasses_id = $1 AND kind = 'reference'
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
        let Some(cdn_url) = row.try_get::<Option<String>, _>("cdn_url")? else {
            return Ok(None);
        };
        Ok(Some(ReferenceAsset {
            mime: mime.unwrap_or_else(|| "image/png".to_string()),
            source: ReferenceSource::Remote(cdn_url),
        }))
    }

    async fn create_lead(&self, lead: NewLead) -> Result<LeadId, RepoError> {
        let id = LeadId::new();
        sqlx::query(
            "INSERT INTO leads (id, email, glasses_id, note, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id.to_string())
        .bind(&lead.email)
        .bind(lead.glasses_id.to_string())
        .bind(&lead.note)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_try_on(&self, try_on: NewTryOn) -> Result<TryOnId, RepoError> {
        // Auto-create on first use; the try-on log sits outside the core
        // catalog schema so deployments without it keep working.
        sqlx::query(TRY_ONS_DDL).execute(&self.pool).await?;

        let id = TryOnId::new();
        let snap = &try_on.snapshot;
        sqlx::query(
            r#"
            INSERT INTO try_ons (
                id, source, image_data_url, glasses_id, brand, name, shape, style, color,
                price_cents, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
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
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }
}

#[async_trait]
impl CatalogSeed for PgCatalogRepo {
    async fn insert_glasses(&self, glasses: &Glasses) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO glasses (
                id, sku, name, brand, style, shape, glasses_shape, color, audience,
                frame_width_mm, lens_height_mm, price_cents, tags, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
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
        .bind(glasses.created_at)
        .bind(glasses.updated_at)
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
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
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
        .bind(asset.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
