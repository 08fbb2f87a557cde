//! Duplicate cluster repository with the transactional merge operation.
//!
//! The merge is the engine's only multi-statement write path. Cluster
//! choice, member upserts, and keeper re-election all happen inside one
//! transaction opened with a per-owner advisory lock, so two workers
//! clustering near-duplicate assets for the same owner serialize instead of
//! producing divergent clusters or two keepers. Member upserts ride the
//! `(cluster_id, asset_id)` primary key, so a redelivered job converges on
//! the same state.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::info;
use uuid::Uuid;

use dupli_core::{new_v7, select_keeper, ClusterStore, Error, MemberAsset, Result};

/// PostgreSQL implementation of [`ClusterStore`].
pub struct PgClusterRepository {
    pool: PgPool,
}

impl PgClusterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Advisory lock key derived from the owner UUID (first 8 bytes).
///
/// Collisions between owners only widen the lock scope; they never narrow it.
fn owner_lock_key(owner_id: Uuid) -> i64 {
    let bytes = owner_id.as_bytes();
    i64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

/// Map commit/serialization failures onto the retryable conflict variant.
fn map_tx_error(e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(ref db) = e {
        if matches!(db.code().as_deref(), Some("40001") | Some("40P01")) {
            return Error::TransactionConflict(db.message().to_string());
        }
    }
    Error::Database(e)
}

// ─── Transaction-scoped helpers ────────────────────────────────────────────

async fn upsert_member_tx(
    tx: &mut Transaction<'_, Postgres>,
    cluster_id: Uuid,
    asset_id: Uuid,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO cluster_members (cluster_id, asset_id, is_keeper)
         VALUES ($1, $2, false)
         ON CONFLICT (cluster_id, asset_id) DO NOTHING",
    )
    .bind(cluster_id)
    .bind(asset_id)
    .execute(&mut **tx)
    .await
    .map_err(map_tx_error)?;
    Ok(())
}

async fn members_with_assets_tx(
    tx: &mut Transaction<'_, Postgres>,
    cluster_id: Uuid,
) -> Result<Vec<MemberAsset>> {
    let rows = sqlx::query(
        "SELECT cm.asset_id, a.width, a.height, cm.is_keeper
         FROM cluster_members cm
         JOIN assets a ON a.id = cm.asset_id
         WHERE cm.cluster_id = $1
         ORDER BY cm.seq",
    )
    .bind(cluster_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(map_tx_error)?;

    Ok(rows
        .into_iter()
        .map(|row| MemberAsset {
            asset_id: row.get("asset_id"),
            width: row.get("width"),
            height: row.get("height"),
            is_keeper: row.get("is_keeper"),
        })
        .collect())
}

async fn elect_keeper_tx(
    tx: &mut Transaction<'_, Postgres>,
    cluster_id: Uuid,
) -> Result<usize> {
    // Recompute over the full membership in first-seen order, then clear and
    // set in two statements so exactly one keeper survives the transaction.
    let members = members_with_assets_tx(tx, cluster_id).await?;
    let keeper = select_keeper(&members)
        .ok_or_else(|| Error::Internal("cluster membership empty after merge".to_string()))?;

    sqlx::query("UPDATE cluster_members SET is_keeper = false WHERE cluster_id = $1")
        .bind(cluster_id)
        .execute(&mut **tx)
        .await
        .map_err(map_tx_error)?;

    sqlx::query(
        "UPDATE cluster_members SET is_keeper = true WHERE cluster_id = $1 AND asset_id = $2",
    )
    .bind(cluster_id)
    .bind(keeper)
    .execute(&mut **tx)
    .await
    .map_err(map_tx_error)?;

    Ok(members.len())
}

#[async_trait]
impl ClusterStore for PgClusterRepository {
    async fn merge_into_cluster(
        &self,
        owner_id: Uuid,
        asset_id: Uuid,
        neighbors: &[Uuid],
    ) -> Result<Uuid> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(map_tx_error)?;

        // Serialize merges per owner. Released automatically at commit or
        // rollback; an explicit lock also serializes cluster *choice*, which
        // row-level conflicts alone would not.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(owner_lock_key(owner_id))
            .execute(&mut *tx)
            .await
            .map_err(map_tx_error)?;

        // Reuse the first cluster any neighbor already belongs to.
        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT cluster_id FROM cluster_members
             WHERE asset_id = ANY($1)
             ORDER BY seq
             LIMIT 1",
        )
        .bind(neighbors)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_tx_error)?;

        let (cluster_id, created) = match existing {
            Some(id) => (id, false),
            None => {
                let id = new_v7();
                sqlx::query(
                    "INSERT INTO duplicate_clusters (id, owner_id, created_at)
                     VALUES ($1, $2, $3)",
                )
                .bind(id)
                .bind(owner_id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await
                .map_err(map_tx_error)?;
                (id, true)
            }
        };

        upsert_member_tx(&mut tx, cluster_id, asset_id).await?;
        for &neighbor in neighbors {
            upsert_member_tx(&mut tx, cluster_id, neighbor).await?;
        }

        let member_count = elect_keeper_tx(&mut tx, cluster_id).await?;

        tx.commit().await.map_err(map_tx_error)?;

        info!(
            subsystem = "database",
            component = "clusters",
            op = "merge",
            %owner_id,
            %asset_id,
            %cluster_id,
            created,
            member_count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Merged asset into duplicate cluster"
        );
        Ok(cluster_id)
    }

    async fn members_with_assets(&self, cluster_id: Uuid) -> Result<Vec<MemberAsset>> {
        let rows = sqlx::query(
            "SELECT cm.asset_id, a.width, a.height, cm.is_keeper
             FROM cluster_members cm
             JOIN assets a ON a.id = cm.asset_id
             WHERE cm.cluster_id = $1
             ORDER BY cm.seq",
        )
        .bind(cluster_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| MemberAsset {
                asset_id: row.get("asset_id"),
                width: row.get("width"),
                height: row.get("height"),
                is_keeper: row.get("is_keeper"),
            })
            .collect())
    }
}
