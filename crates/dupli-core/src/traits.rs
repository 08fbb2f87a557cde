//! Store interfaces consumed by the ingest pipeline and clusterer.
//!
//! These traits are the seams between the engine and the relational store.
//! Each worker instance receives its own scoped implementations instead of
//! reaching for a process-wide client handle, which keeps tests isolated and
//! lets the clustering critical section live behind one atomic operation.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Asset, Fingerprint, MemberAsset, NewAsset};

/// Repository for asset rows.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Insert a new asset and return the persisted row.
    async fn create(&self, req: NewAsset) -> Result<Asset>;

    /// Fetch an asset by id.
    async fn fetch(&self, id: Uuid) -> Result<Asset>;

    /// Attach the stored thumbnail reference. The only mutation an asset
    /// ever receives.
    async fn attach_thumbnail(&self, id: Uuid, thumb_key: &str) -> Result<()>;
}

/// Persisted fingerprint records with bucketed approximate-neighbor
/// retrieval.
#[async_trait]
pub trait FingerprintIndex: Send + Sync {
    /// Persist a fingerprint, keyed by its asset.
    async fn insert(&self, fingerprint: &Fingerprint) -> Result<()>;

    /// All fingerprints of `owner_id` whose bucket lies within `radius` of
    /// `bucket`, clamped to `[0, 0xffff]` with no wraparound.
    async fn find_candidates(
        &self,
        owner_id: Uuid,
        bucket: u16,
        radius: u16,
    ) -> Result<Vec<Fingerprint>>;
}

/// Persistent duplicate clusters and their membership edges.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Atomically place `asset_id` and every id in `neighbors` into one
    /// cluster and re-elect the keeper over the full membership.
    ///
    /// Reuses the first cluster any neighbor already belongs to, creating a
    /// new cluster owned by `owner_id` otherwise. Member upserts are
    /// idempotent on `(cluster_id, asset_id)`, so redelivered jobs converge
    /// on the same state. Implementations must run the whole operation
    /// inside a single transaction (or equivalent per-owner mutual
    /// exclusion); concurrent merges for one owner must serialize.
    async fn merge_into_cluster(
        &self,
        owner_id: Uuid,
        asset_id: Uuid,
        neighbors: &[Uuid],
    ) -> Result<Uuid>;

    /// List a cluster's members joined with asset metadata, in first-seen
    /// (insertion) order.
    async fn members_with_assets(&self, cluster_id: Uuid) -> Result<Vec<MemberAsset>>;
}
