//! In-memory store doubles for pipeline and clustering tests.
//!
//! [`MemStore`] implements the three store traits with the same observable
//! semantics as the PostgreSQL repositories: idempotent member upserts,
//! first-seen cluster reuse, and keeper re-election on every merge.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use dupli_core::{
    select_keeper, uuid_utils, Asset, AssetStore, ClusterStore, Error, Fingerprint,
    FingerprintIndex, MemberAsset, NewAsset, Result,
};
use dupli_db::StorageBackend;
use dupli_jobs::PageRasterizer;

#[derive(Default)]
struct MemState {
    assets: Vec<Asset>,
    fingerprints: Vec<Fingerprint>,
    /// (cluster_id, owner_id), in creation order.
    clusters: Vec<(Uuid, Uuid)>,
    /// (cluster_id, asset_id, is_keeper), in insertion order.
    members: Vec<(Uuid, Uuid, bool)>,
}

/// All three store traits over one in-memory state.
#[derive(Default)]
pub struct MemStore {
    state: Mutex<MemState>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asset_count(&self) -> usize {
        self.state.lock().unwrap().assets.len()
    }

    pub fn fingerprint_count(&self) -> usize {
        self.state.lock().unwrap().fingerprints.len()
    }

    pub fn cluster_count(&self) -> usize {
        self.state.lock().unwrap().clusters.len()
    }

    pub fn fingerprint_of(&self, asset_id: Uuid) -> Option<Fingerprint> {
        self.state
            .lock()
            .unwrap()
            .fingerprints
            .iter()
            .find(|f| f.asset_id == asset_id)
            .cloned()
    }
}

#[async_trait]
impl AssetStore for MemStore {
    async fn create(&self, req: NewAsset) -> Result<Asset> {
        let asset = Asset {
            id: uuid_utils::new_v7(),
            owner_id: req.owner_id,
            file_id: req.file_id,
            kind: req.kind,
            page_index: req.page_index,
            width: req.width,
            height: req.height,
            thumb_key: None,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().assets.push(asset.clone());
        Ok(asset)
    }

    async fn fetch(&self, id: Uuid) -> Result<Asset> {
        self.state
            .lock()
            .unwrap()
            .assets
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(Error::AssetNotFound(id))
    }

    async fn attach_thumbnail(&self, id: Uuid, thumb_key: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let asset = state
            .assets
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(Error::AssetNotFound(id))?;
        asset.thumb_key = Some(thumb_key.to_string());
        Ok(())
    }
}

#[async_trait]
impl FingerprintIndex for MemStore {
    async fn insert(&self, fingerprint: &Fingerprint) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .fingerprints
            .push(fingerprint.clone());
        Ok(())
    }

    async fn find_candidates(
        &self,
        owner_id: Uuid,
        bucket: u16,
        radius: u16,
    ) -> Result<Vec<Fingerprint>> {
        let (lo, hi) = dupli_core::phash::bucket_window(bucket, radius);
        let state = self.state.lock().unwrap();
        let owned: HashMap<Uuid, Uuid> = state
            .assets
            .iter()
            .map(|a| (a.id, a.owner_id))
            .collect();
        Ok(state
            .fingerprints
            .iter()
            .filter(|f| {
                owned.get(&f.asset_id) == Some(&owner_id)
                    && (lo..=hi).contains(&f.bucket())
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ClusterStore for MemStore {
    async fn merge_into_cluster(
        &self,
        owner_id: Uuid,
        asset_id: Uuid,
        neighbors: &[Uuid],
    ) -> Result<Uuid> {
        let mut state = self.state.lock().unwrap();

        // First cluster any neighbor already belongs to, by insertion order.
        let cluster_id = state
            .members
            .iter()
            .find(|(_, member, _)| neighbors.contains(member))
            .map(|(cluster, _, _)| *cluster)
            .unwrap_or_else(|| {
                let id = uuid_utils::new_v7();
                state.clusters.push((id, owner_id));
                id
            });

        for id in std::iter::once(&asset_id).chain(neighbors) {
            let present = state
                .members
                .iter()
                .any(|(c, a, _)| *c == cluster_id && a == id);
            if !present {
                state.members.push((cluster_id, *id, false));
            }
        }

        // Re-elect the keeper over the full membership.
        let members: Vec<MemberAsset> = state
            .members
            .iter()
            .filter(|(c, _, _)| *c == cluster_id)
            .map(|(_, a, k)| {
                let asset = state.assets.iter().find(|x| x.id == *a);
                MemberAsset {
                    asset_id: *a,
                    width: asset.and_then(|x| x.width),
                    height: asset.and_then(|x| x.height),
                    is_keeper: *k,
                }
            })
            .collect();
        let keeper = select_keeper(&members);
        for (c, a, k) in state.members.iter_mut() {
            if *c == cluster_id {
                *k = Some(*a) == keeper;
            }
        }

        Ok(cluster_id)
    }

    async fn members_with_assets(&self, cluster_id: Uuid) -> Result<Vec<MemberAsset>> {
        let state = self.state.lock().unwrap();
        if !state.clusters.iter().any(|(c, _)| *c == cluster_id) {
            return Err(Error::ClusterNotFound(cluster_id));
        }
        Ok(state
            .members
            .iter()
            .filter(|(c, _, _)| *c == cluster_id)
            .map(|(_, a, k)| {
                let asset = state.assets.iter().find(|x| x.id == *a);
                MemberAsset {
                    asset_id: *a,
                    width: asset.and_then(|x| x.width),
                    height: asset.and_then(|x| x.height),
                    is_keeper: *k,
                }
            })
            .collect())
    }
}

/// HashMap-backed object storage.
#[derive(Default)]
pub struct MemObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &str, data: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), data);
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl StorageBackend for MemObjectStore {
    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("no object at {}", key)))
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

/// Rasterizer double returning canned page bytes.
pub struct StubRasterizer {
    pages: Vec<Vec<u8>>,
}

impl StubRasterizer {
    pub fn new(pages: Vec<Vec<u8>>) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl PageRasterizer for StubRasterizer {
    async fn rasterize(&self, _data: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(self.pages.clone())
    }
}
