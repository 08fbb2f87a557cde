//! Near-duplicate clustering: candidate lookup, Hamming filter, merge.
//!
//! The clusterer is the only place the similarity threshold is applied. It
//! works entirely through the [`FingerprintIndex`] and [`ClusterStore`]
//! traits, so the same logic runs against PostgreSQL in production and
//! against in-memory doubles in tests.

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use dupli_core::defaults::{BUCKET_RADIUS, HAMMING_THRESHOLD};
use dupli_core::{phash, ClusterStore, FingerprintIndex, Result};
use tracing::{debug, info};

/// Groups a freshly fingerprinted asset with its near-duplicates.
pub struct DuplicateClusterer {
    index: Arc<dyn FingerprintIndex>,
    clusters: Arc<dyn ClusterStore>,
    threshold: u32,
    bucket_radius: u16,
}

impl DuplicateClusterer {
    pub fn new(index: Arc<dyn FingerprintIndex>, clusters: Arc<dyn ClusterStore>) -> Self {
        Self {
            index,
            clusters,
            threshold: HAMMING_THRESHOLD,
            bucket_radius: BUCKET_RADIUS,
        }
    }

    /// Use a different Hamming distance cutoff.
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Find the asset's near-duplicates among the owner's fingerprints and
    /// merge them into a shared cluster. Returns the cluster id, or `None`
    /// when the asset has no neighbor within the threshold and stays
    /// unclustered.
    ///
    /// Candidates come from the hash's bucket and its two adjacent buckets.
    /// A pair whose hashes land more than one bucket apart is not compared
    /// at all; that false-negative window is the accepted cost of the
    /// bucketed index.
    pub async fn cluster_asset(
        &self,
        owner_id: Uuid,
        asset_id: Uuid,
        hex64: &str,
    ) -> Result<Option<Uuid>> {
        let start = Instant::now();
        let bucket = phash::bucket16(hex64)?;
        let candidates = self
            .index
            .find_candidates(owner_id, bucket, self.bucket_radius)
            .await?;

        let mut neighbors = Vec::new();
        for candidate in &candidates {
            if candidate.asset_id == asset_id {
                continue;
            }
            if phash::hamming_hex64(hex64, &candidate.hex64)? <= self.threshold {
                neighbors.push(candidate.asset_id);
            }
        }

        if neighbors.is_empty() {
            debug!(
                subsystem = "jobs",
                component = "clusterer",
                op = "cluster_asset",
                %owner_id,
                %asset_id,
                candidate_count = candidates.len(),
                "No near-duplicate neighbors; asset stays unclustered"
            );
            return Ok(None);
        }

        let cluster_id = self
            .clusters
            .merge_into_cluster(owner_id, asset_id, &neighbors)
            .await?;

        info!(
            subsystem = "jobs",
            component = "clusterer",
            op = "cluster_asset",
            %owner_id,
            %asset_id,
            %cluster_id,
            candidate_count = candidates.len(),
            neighbor_count = neighbors.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Clustered asset with its near-duplicates"
        );

        Ok(Some(cluster_id))
    }
}
