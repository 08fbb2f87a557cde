//! Data model for assets, fingerprints, and duplicate clusters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::phash;

/// What a fingerprintable unit is: a whole image or one page of a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetKind {
    Image,
    PdfPage,
}

impl AssetKind {
    /// Convert to the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::PdfPage => "pdf_page",
        }
    }

    /// Convert the database string back to the enum.
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "image" => AssetKind::Image,
            "pdf_page" => AssetKind::PdfPage,
            _ => AssetKind::Image, // fallback
        }
    }
}

/// Fingerprint algorithm kind. Only the DCT perceptual hash ships today;
/// the enum keeps the wire format open for additional hash families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HashKind {
    Phash,
}

impl HashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashKind::Phash => "phash",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "phash" => HashKind::Phash,
            _ => HashKind::Phash, // fallback
        }
    }
}

/// A fingerprintable unit owned by a user.
///
/// Created once per ingested unit; mutated only to attach the thumbnail
/// reference. Never deleted by this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// The originating file (external entity) this asset was cut from.
    pub file_id: Uuid,
    pub kind: AssetKind,
    /// Zero-based page number, present only for `AssetKind::PdfPage`.
    pub page_index: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    /// Object-store key of the thumbnail, once stored.
    pub thumb_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// Pixel area used for keeper election; unknown dimensions count as zero.
    pub fn pixel_area(&self) -> i64 {
        self.width.unwrap_or(0) as i64 * self.height.unwrap_or(0) as i64
    }
}

/// Request for creating a new asset.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub owner_id: Uuid,
    pub file_id: Uuid,
    pub kind: AssetKind,
    pub page_index: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// An immutable perceptual fingerprint, 1:1 with its asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub asset_id: Uuid,
    pub kind: HashKind,
    /// 64 bits as exactly 16 lowercase hex characters, zero-padded.
    pub hex64: String,
    /// Integer value of the first 4 hex characters of `hex64`.
    pub bucket16: i32,
}

impl Fingerprint {
    /// Build a pHash fingerprint, validating the hex encoding and deriving
    /// the bucket from the top 16 bits.
    pub fn phash(asset_id: Uuid, hex64: impl Into<String>) -> Result<Self> {
        let hex64 = hex64.into();
        let bucket = phash::bucket16(&hex64)?;
        Ok(Self {
            asset_id,
            kind: HashKind::Phash,
            hex64,
            bucket16: bucket as i32,
        })
    }

    /// The bucket as the u16 it really is.
    pub fn bucket(&self) -> u16 {
        self.bucket16 as u16
    }
}

/// An owner-scoped group of mutually near-duplicate assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateCluster {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Membership edge between a cluster and an asset, unique on
/// `(cluster_id, asset_id)`. Exactly one member per cluster carries
/// `is_keeper = true` after any successful clustering operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterMember {
    pub cluster_id: Uuid,
    pub asset_id: Uuid,
    pub is_keeper: bool,
}

/// A cluster member joined with the asset metadata keeper election needs.
/// Lists of these are always in first-seen (insertion) order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberAsset {
    pub asset_id: Uuid,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub is_keeper: bool,
}

impl MemberAsset {
    /// Pixel area used for keeper election; unknown dimensions count as zero.
    pub fn pixel_area(&self) -> i64 {
        self.width.unwrap_or(0) as i64 * self.height.unwrap_or(0) as i64
    }
}

/// One ingest job as delivered by the external at-least-once queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJob {
    pub owner_id: Uuid,
    pub file_id: Uuid,
    pub storage_key: String,
    pub mime_type: String,
}

/// A page that could not be ingested, reported without failing its siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageFailure {
    pub page_index: i32,
    pub reason: String,
}

/// Outcome summary for one processed ingest job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    /// Assets created by this job, in ingest order.
    pub assets: Vec<Uuid>,
    /// Clusters the new assets were merged into (deduplicated).
    pub clusters: Vec<Uuid>,
    /// Pages that failed while their siblings continued.
    pub failed_pages: Vec<PageFailure>,
}

impl IngestReport {
    /// Record a cluster id, keeping the list deduplicated.
    pub fn record_cluster(&mut self, cluster_id: Uuid) {
        if !self.clusters.contains(&cluster_id) {
            self.clusters.push(cluster_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_kind_roundtrip() {
        assert_eq!(AssetKind::from_db_str(AssetKind::Image.as_str()), AssetKind::Image);
        assert_eq!(
            AssetKind::from_db_str(AssetKind::PdfPage.as_str()),
            AssetKind::PdfPage
        );
    }

    #[test]
    fn test_fingerprint_phash_derives_bucket() {
        let fp = Fingerprint::phash(Uuid::nil(), "1234567890abcdef").unwrap();
        assert_eq!(fp.bucket16, 0x1234);
        assert_eq!(fp.bucket(), 0x1234);
        assert_eq!(fp.kind, HashKind::Phash);
    }

    #[test]
    fn test_fingerprint_phash_rejects_bad_hex() {
        assert!(Fingerprint::phash(Uuid::nil(), "zzzz").is_err());
        assert!(Fingerprint::phash(Uuid::nil(), "0123").is_err());
    }

    #[test]
    fn test_pixel_area_null_dimensions() {
        let m = MemberAsset {
            asset_id: Uuid::nil(),
            width: None,
            height: Some(100),
            is_keeper: false,
        };
        assert_eq!(m.pixel_area(), 0);
    }

    #[test]
    fn test_report_records_clusters_once() {
        let mut report = IngestReport::default();
        let id = Uuid::new_v4();
        report.record_cluster(id);
        report.record_cluster(id);
        assert_eq!(report.clusters.len(), 1);
    }
}
