//! Fingerprint index implementation: persisted perceptual hashes with
//! bucketed approximate-neighbor retrieval.
//!
//! Candidate retrieval scans only the 3-bucket window around the query
//! hash's top 16 bits. That keeps lookup near-constant-time against the
//! `(kind, bucket16)` index at the cost of missing neighbors whose top bits
//! drifted by two or more buckets — an accepted trade documented in
//! `dupli_core::phash::bucket_window`.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use dupli_core::phash;
use dupli_core::{Error, Fingerprint, FingerprintIndex, HashKind, Result};

/// PostgreSQL implementation of [`FingerprintIndex`].
pub struct PgFingerprintRepository {
    pool: PgPool,
}

impl PgFingerprintRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FingerprintIndex for PgFingerprintRepository {
    async fn insert(&self, fingerprint: &Fingerprint) -> Result<()> {
        sqlx::query(
            "INSERT INTO fingerprints (asset_id, kind, hex64, bucket16)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(fingerprint.asset_id)
        .bind(fingerprint.kind.as_str())
        .bind(&fingerprint.hex64)
        .bind(fingerprint.bucket16)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn find_candidates(
        &self,
        owner_id: Uuid,
        bucket: u16,
        radius: u16,
    ) -> Result<Vec<Fingerprint>> {
        let start = Instant::now();
        let (lo, hi) = phash::bucket_window(bucket, radius);

        let rows = sqlx::query(
            "SELECT f.asset_id, f.kind, f.hex64, f.bucket16
             FROM fingerprints f
             JOIN assets a ON a.id = f.asset_id
             WHERE a.owner_id = $1
               AND f.kind = $2
               AND f.bucket16 BETWEEN $3 AND $4",
        )
        .bind(owner_id)
        .bind(HashKind::Phash.as_str())
        .bind(lo as i32)
        .bind(hi as i32)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let candidates: Vec<Fingerprint> = rows
            .into_iter()
            .map(|row| Fingerprint {
                asset_id: row.get("asset_id"),
                kind: HashKind::from_db_str(&row.get::<String, _>("kind")),
                hex64: row.get("hex64"),
                bucket16: row.get("bucket16"),
            })
            .collect();

        debug!(
            subsystem = "database",
            component = "fingerprints",
            op = "find_candidates",
            %owner_id,
            bucket,
            bucket_lo = lo,
            bucket_hi = hi,
            candidate_count = candidates.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Fetched bucket-window candidates"
        );
        Ok(candidates)
    }
}
