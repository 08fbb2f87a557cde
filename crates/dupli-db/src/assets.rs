//! Asset repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use dupli_core::{new_v7, Asset, AssetKind, AssetStore, Error, NewAsset, Result};

/// PostgreSQL implementation of [`AssetStore`].
pub struct PgAssetRepository {
    pool: PgPool,
}

impl PgAssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_asset_row(row: PgRow) -> Asset {
        Asset {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            file_id: row.get("file_id"),
            kind: AssetKind::from_db_str(&row.get::<String, _>("kind")),
            page_index: row.get("page_index"),
            width: row.get("width"),
            height: row.get("height"),
            thumb_key: row.get("thumb_key"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl AssetStore for PgAssetRepository {
    async fn create(&self, req: NewAsset) -> Result<Asset> {
        let id = new_v7();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO assets (id, owner_id, file_id, kind, page_index, width, height, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(req.owner_id)
        .bind(req.file_id)
        .bind(req.kind.as_str())
        .bind(req.page_index)
        .bind(req.width)
        .bind(req.height)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Asset {
            id,
            owner_id: req.owner_id,
            file_id: req.file_id,
            kind: req.kind,
            page_index: req.page_index,
            width: req.width,
            height: req.height,
            thumb_key: None,
            created_at: now,
        })
    }

    async fn fetch(&self, id: Uuid) -> Result<Asset> {
        sqlx::query(
            "SELECT id, owner_id, file_id, kind, page_index, width, height, thumb_key, created_at
             FROM assets WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .map(Self::parse_asset_row)
        .ok_or(Error::AssetNotFound(id))
    }

    async fn attach_thumbnail(&self, id: Uuid, thumb_key: &str) -> Result<()> {
        let result = sqlx::query("UPDATE assets SET thumb_key = $2 WHERE id = $1")
            .bind(id)
            .bind(thumb_key)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::AssetNotFound(id));
        }
        Ok(())
    }
}
