//! # dupli-jobs
//!
//! Background ingest work for the dupli engine: fingerprint extraction,
//! PDF rasterization, near-duplicate clustering, and the pipeline that ties
//! them to the stores.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dupli_db::{Database, FilesystemBackend};
//! use dupli_jobs::{IngestPipeline, PdftoppmRasterizer, PipelineConfig};
//!
//! let db = Database::connect(&url).await?;
//! let pipeline = IngestPipeline::with_config(
//!     Arc::new(db.assets),
//!     Arc::new(db.fingerprints),
//!     Arc::new(db.clusters),
//!     Arc::new(FilesystemBackend::new("/var/lib/dupli")),
//!     Arc::new(PdftoppmRasterizer::from_env()?),
//!     PipelineConfig::from_env()?,
//! );
//! let outcome = pipeline.process_ingest_job(&job).await;
//! ```

pub mod clusterer;
pub mod extractor;
pub mod pipeline;
pub mod rasterizer;

// Re-export core types
pub use dupli_core::*;

pub use clusterer::DuplicateClusterer;
pub use extractor::{ExtractedFingerprint, FingerprintExtractor};
pub use pipeline::{IngestPipeline, JobOutcome, PipelineConfig};
pub use rasterizer::{PageRasterizer, PdftoppmRasterizer};
