//! The ingest pipeline: storage bytes in, assets + fingerprints + clusters
//! out.
//!
//! One [`IngestJob`] covers one uploaded file. Images yield a single asset;
//! PDFs are rasterized and yield one asset per page, processed sequentially
//! so `page_index` matches page order. Every other MIME type is a recorded
//! no-op. Per-asset work is independent: a page that fails is reported in
//! the [`IngestReport`] while its siblings proceed, and nothing undoes
//! already-persisted pages.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use dupli_core::defaults::{HAMMING_THRESHOLD, THUMB_MAX_WIDTH};
use dupli_core::{
    AssetKind, AssetStore, ClusterStore, Error, Fingerprint, FingerprintIndex, IngestJob,
    IngestReport, NewAsset, PageFailure, Result,
};
use dupli_db::StorageBackend;

use crate::extractor::FingerprintExtractor;
use crate::rasterizer::PageRasterizer;

/// Pipeline tuning knobs. Rasterization resolution lives on
/// [`PdftoppmRasterizer`](crate::rasterizer::PdftoppmRasterizer), where it
/// is applied.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum Hamming distance for two assets to count as near-duplicates.
    pub hamming_threshold: u32,
    /// Thumbnail width bound.
    pub thumb_max_width: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            hamming_threshold: HAMMING_THRESHOLD,
            thumb_max_width: THUMB_MAX_WIDTH,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults:
    ///
    /// - `DUPLI_HAMMING_THRESHOLD` — near-duplicate distance cutoff
    /// - `DUPLI_THUMB_MAX_WIDTH` — thumbnail width bound
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = env_u32("DUPLI_HAMMING_THRESHOLD")? {
            config.hamming_threshold = v;
        }
        if let Some(v) = env_u32("DUPLI_THUMB_MAX_WIDTH")? {
            config.thumb_max_width = v;
        }
        Ok(config)
    }
}

pub(crate) fn env_u32(name: &str) -> Result<Option<u32>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u32>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} must be an integer, got {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}

/// Terminal outcome of one job attempt, for the queue runner to act on.
#[derive(Debug)]
pub enum JobOutcome {
    /// The job ran to completion (possibly with per-page failures recorded
    /// in the report).
    Success(IngestReport),
    /// A transient error; the job should be redelivered.
    Retry(String),
    /// A deterministic error; redelivery would fail the same way.
    Failed(String),
}

/// Orchestrates fingerprinting, thumbnailing, and clustering for one job.
pub struct IngestPipeline {
    assets: Arc<dyn AssetStore>,
    index: Arc<dyn FingerprintIndex>,
    clusterer: crate::clusterer::DuplicateClusterer,
    storage: Arc<dyn StorageBackend>,
    rasterizer: Arc<dyn PageRasterizer>,
    extractor: FingerprintExtractor,
}

impl IngestPipeline {
    pub fn new(
        assets: Arc<dyn AssetStore>,
        index: Arc<dyn FingerprintIndex>,
        clusters: Arc<dyn ClusterStore>,
        storage: Arc<dyn StorageBackend>,
        rasterizer: Arc<dyn PageRasterizer>,
    ) -> Self {
        Self::with_config(
            assets,
            index,
            clusters,
            storage,
            rasterizer,
            PipelineConfig::default(),
        )
    }

    pub fn with_config(
        assets: Arc<dyn AssetStore>,
        index: Arc<dyn FingerprintIndex>,
        clusters: Arc<dyn ClusterStore>,
        storage: Arc<dyn StorageBackend>,
        rasterizer: Arc<dyn PageRasterizer>,
        config: PipelineConfig,
    ) -> Self {
        let clusterer = crate::clusterer::DuplicateClusterer::new(index.clone(), clusters)
            .with_threshold(config.hamming_threshold);
        let extractor = FingerprintExtractor::new().with_thumb_max_width(config.thumb_max_width);
        Self {
            assets,
            index,
            clusterer,
            storage,
            rasterizer,
            extractor,
        }
    }

    /// Process one ingest job end to end.
    pub async fn process(&self, job: &IngestJob) -> Result<IngestReport> {
        if job.mime_type == "application/pdf" {
            self.process_pdf(job).await
        } else if job.mime_type.starts_with("image/") {
            self.process_image(job).await
        } else {
            debug!(
                subsystem = "jobs",
                component = "pipeline",
                op = "process",
                owner_id = %job.owner_id,
                file_id = %job.file_id,
                mime_type = %job.mime_type,
                "Unsupported MIME type; nothing to ingest"
            );
            Ok(IngestReport::default())
        }
    }

    /// [`process`](Self::process) wrapped in retry classification for the
    /// job queue: transient failures ask for redelivery, deterministic ones
    /// do not.
    pub async fn process_ingest_job(&self, job: &IngestJob) -> JobOutcome {
        match self.process(job).await {
            Ok(report) => {
                info!(
                    subsystem = "jobs",
                    component = "pipeline",
                    op = "process",
                    owner_id = %job.owner_id,
                    file_id = %job.file_id,
                    asset_count = report.assets.len(),
                    cluster_count = report.clusters.len(),
                    failed_page_count = report.failed_pages.len(),
                    "Ingest job complete"
                );
                JobOutcome::Success(report)
            }
            Err(e) if e.is_retryable() => {
                warn!(
                    subsystem = "jobs",
                    component = "pipeline",
                    owner_id = %job.owner_id,
                    file_id = %job.file_id,
                    error = %e,
                    "Ingest job hit a transient error; requesting retry"
                );
                JobOutcome::Retry(e.to_string())
            }
            Err(e) => {
                error!(
                    subsystem = "jobs",
                    component = "pipeline",
                    owner_id = %job.owner_id,
                    file_id = %job.file_id,
                    error = %e,
                    "Ingest job failed permanently"
                );
                JobOutcome::Failed(e.to_string())
            }
        }
    }

    async fn process_image(&self, job: &IngestJob) -> Result<IngestReport> {
        let bytes = self.storage.read(&job.storage_key).await?;
        let mut report = IngestReport::default();
        self.ingest_unit(job, &bytes, AssetKind::Image, None, &mut report)
            .await?;
        Ok(report)
    }

    async fn process_pdf(&self, job: &IngestJob) -> Result<IngestReport> {
        let bytes = self.storage.read(&job.storage_key).await?;
        let pages = self.rasterizer.rasterize(&bytes).await?;
        info!(
            subsystem = "jobs",
            component = "pipeline",
            op = "process_pdf",
            owner_id = %job.owner_id,
            file_id = %job.file_id,
            page_count = pages.len(),
            "Rasterized PDF for ingest"
        );

        let mut report = IngestReport::default();
        for (page_index, page) in pages.iter().enumerate() {
            let result = self
                .ingest_unit(
                    job,
                    page,
                    AssetKind::PdfPage,
                    Some(page_index as i32),
                    &mut report,
                )
                .await;
            if let Err(e) = result {
                warn!(
                    subsystem = "jobs",
                    component = "pipeline",
                    owner_id = %job.owner_id,
                    file_id = %job.file_id,
                    page_index,
                    error = %e,
                    "Page ingest failed; continuing with remaining pages"
                );
                report.failed_pages.push(PageFailure {
                    page_index: page_index as i32,
                    reason: e.to_string(),
                });
            }
        }
        Ok(report)
    }

    /// Ingest a single image unit: fingerprint, persist the asset and its
    /// hash, store and attach the thumbnail, then cluster.
    async fn ingest_unit(
        &self,
        job: &IngestJob,
        bytes: &[u8],
        kind: AssetKind,
        page_index: Option<i32>,
        report: &mut IngestReport,
    ) -> Result<Uuid> {
        let extracted = self.extractor.extract(bytes)?;

        let asset = self
            .assets
            .create(NewAsset {
                owner_id: job.owner_id,
                file_id: job.file_id,
                kind,
                page_index,
                width: Some(extracted.width as i32),
                height: Some(extracted.height as i32),
            })
            .await?;

        let fingerprint = Fingerprint::phash(asset.id, extracted.hex64)?;
        self.index.insert(&fingerprint).await?;

        let thumb_key = format!("thumbs/{}.jpg", asset.id);
        self.storage.write(&thumb_key, &extracted.thumbnail_jpeg).await?;
        self.assets.attach_thumbnail(asset.id, &thumb_key).await?;

        if let Some(cluster_id) = self
            .clusterer
            .cluster_asset(job.owner_id, asset.id, &fingerprint.hex64)
            .await?
        {
            report.record_cluster(cluster_id);
        }

        report.assets.push(asset.id);
        Ok(asset.id)
    }
}
