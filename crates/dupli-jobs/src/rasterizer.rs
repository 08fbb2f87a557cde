//! PDF page rasterization via the `pdftoppm` command-line tool.
//!
//! Each page becomes a standalone JPEG so the rest of the pipeline can treat
//! it exactly like an uploaded image. The adapter is trait-shaped so tests
//! can substitute canned page bytes without a Poppler install.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use dupli_core::defaults::{PDF_RASTER_DPI, RASTER_CMD_TIMEOUT_SECS};
use dupli_core::{Error, Result};

/// Renders a PDF into one encoded image per page, in page order.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Rasterize every page of `data`. The returned vector is ordered by
    /// page number; an unreadable individual page is skipped, not fatal.
    async fn rasterize(&self, data: &[u8]) -> Result<Vec<Vec<u8>>>;
}

/// [`PageRasterizer`] backed by the `pdftoppm` binary from Poppler.
#[derive(Debug)]
pub struct PdftoppmRasterizer {
    dpi: u32,
    timeout: Duration,
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self {
            dpi: PDF_RASTER_DPI,
            timeout: Duration::from_secs(RASTER_CMD_TIMEOUT_SECS),
        }
    }
}

impl PdftoppmRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Build from the environment: `DUPLI_RASTER_DPI` overrides the default
    /// rendering resolution.
    pub fn from_env() -> Result<Self> {
        let mut rasterizer = Self::default();
        if let Some(dpi) = crate::pipeline::env_u32("DUPLI_RASTER_DPI")? {
            rasterizer.dpi = dpi;
        }
        Ok(rasterizer)
    }

    /// Resolution pages are rendered at, in DPI.
    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    /// Verify `pdftoppm` is installed and runnable. Call once at worker
    /// startup so a missing Poppler install fails loudly, not per job.
    pub async fn health_check(&self) -> Result<()> {
        let output = Command::new("pdftoppm")
            .arg("-v")
            .output()
            .await
            .map_err(|e| Error::Rasterization(format!("pdftoppm not available: {}", e)))?;
        // pdftoppm -v prints version info and historically exits 0 or 99.
        let code = output.status.code().unwrap_or(-1);
        if output.status.success() || code == 99 {
            Ok(())
        } else {
            Err(Error::Rasterization(format!(
                "pdftoppm -v exited with status {}",
                code
            )))
        }
    }

    async fn run_pdftoppm(&self, pdf_path: &Path, out_prefix: &Path) -> Result<()> {
        let run = Command::new("pdftoppm")
            .arg("-jpeg")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(pdf_path)
            .arg(out_prefix)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                Error::Rasterization(format!(
                    "pdftoppm timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::Rasterization(format!("failed to run pdftoppm: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Rasterization(format!(
                "pdftoppm exited with status {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
        if data.is_empty() {
            return Err(Error::InvalidInput("cannot rasterize empty PDF data".into()));
        }
        if !data.starts_with(b"%PDF") {
            return Err(Error::InvalidInput(
                "data does not start with a PDF header".into(),
            ));
        }

        let scratch = TempDir::new()?;
        let pdf_path = scratch.path().join("input.pdf");
        let out_prefix = scratch.path().join("page");

        let mut pdf_file = tokio::fs::File::create(&pdf_path).await?;
        pdf_file.write_all(data).await?;
        pdf_file.sync_all().await?;

        self.run_pdftoppm(&pdf_path, &out_prefix).await?;

        // pdftoppm writes page-1.jpg, page-2.jpg, ... zero-padding the page
        // number to a uniform width, so lexicographic order is page order.
        let mut page_paths = Vec::new();
        let mut entries = tokio::fs::read_dir(scratch.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_page = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("page-") && n.ends_with(".jpg"));
            if is_page {
                page_paths.push(path);
            }
        }
        page_paths.sort();

        let mut pages = Vec::with_capacity(page_paths.len());
        for path in &page_paths {
            match tokio::fs::read(path).await {
                Ok(bytes) => pages.push(bytes),
                Err(e) => {
                    warn!(
                        subsystem = "jobs",
                        component = "rasterizer",
                        page_file = %path.display(),
                        error = %e,
                        "Skipping unreadable rasterized page"
                    );
                }
            }
        }

        debug!(
            subsystem = "jobs",
            component = "rasterizer",
            op = "rasterize",
            dpi = self.dpi,
            page_count = pages.len(),
            "Rasterized PDF"
        );

        Ok(pages)
    }
}
