//! Fingerprint extraction: image bytes in, perceptual hash + thumbnail out.
//!
//! Pure computation over bytes; the extractor performs no I/O. The hash path
//! normalizes EXIF orientation, box-samples the image down to the 32×32
//! grayscale matrix (area averaging), and hands the matrix to
//! [`dupli_core::phash`]. The thumbnail is a width-bounded JPEG of the
//! orientation-normalized image.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView};
use tracing::trace;

use dupli_core::defaults::{PHASH_GRID, THUMB_JPEG_QUALITY, THUMB_MAX_WIDTH};
use dupli_core::{phash, Error, Result};

/// Result of fingerprinting one decodable image.
#[derive(Debug, Clone)]
pub struct ExtractedFingerprint {
    /// 64-bit perceptual hash as 16 lowercase hex characters.
    pub hex64: String,
    /// Width after orientation normalization.
    pub width: u32,
    /// Height after orientation normalization.
    pub height: u32,
    /// Width-bounded JPEG thumbnail.
    pub thumbnail_jpeg: Vec<u8>,
}

/// Pure transform from image bytes to fingerprint, thumbnail, and dimensions.
#[derive(Debug, Clone)]
pub struct FingerprintExtractor {
    thumb_max_width: u32,
    jpeg_quality: u8,
}

impl Default for FingerprintExtractor {
    fn default() -> Self {
        Self {
            thumb_max_width: THUMB_MAX_WIDTH,
            jpeg_quality: THUMB_JPEG_QUALITY,
        }
    }
}

impl FingerprintExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound thumbnails to a different maximum width.
    pub fn with_thumb_max_width(mut self, width: u32) -> Self {
        self.thumb_max_width = width.max(1);
        self
    }

    /// Fingerprint one image. Deterministic: identical bytes always produce
    /// the identical hash, thumbnail, and dimensions.
    pub fn extract(&self, data: &[u8]) -> Result<ExtractedFingerprint> {
        let decoded =
            image::load_from_memory(data).map_err(|e| Error::Decode(e.to_string()))?;

        let orientation = exif_orientation(data);
        let img = normalize_orientation(decoded, orientation);
        let (width, height) = img.dimensions();

        // Box sampling averages every source pixel that falls into a cell,
        // which is the area-averaging resample the hash is defined over.
        let gray = img.grayscale().thumbnail_exact(PHASH_GRID as u32, PHASH_GRID as u32);
        let hex64 = phash::phash64_from_gray(gray.to_luma8().as_raw())?;

        let thumbnail_jpeg = self.encode_thumbnail(&img, width, height)?;

        trace!(
            subsystem = "jobs",
            component = "extractor",
            op = "extract",
            width,
            height,
            orientation,
            hex64 = %hex64,
            "Extracted fingerprint"
        );

        Ok(ExtractedFingerprint {
            hex64,
            width,
            height,
            thumbnail_jpeg,
        })
    }

    fn encode_thumbnail(&self, img: &DynamicImage, width: u32, height: u32) -> Result<Vec<u8>> {
        let rgb = if width > self.thumb_max_width {
            let target_height =
                ((self.thumb_max_width as u64 * height as u64) / width as u64).max(1) as u32;
            img.thumbnail_exact(self.thumb_max_width, target_height).to_rgb8()
        } else {
            img.to_rgb8()
        };

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut Cursor::new(&mut buf), self.jpeg_quality)
            .encode_image(&rgb)
            .map_err(|e| Error::Internal(format!("thumbnail encode: {}", e)))?;
        Ok(buf)
    }
}

/// EXIF orientation tag value, defaulting to 1 (upright) when absent or
/// unreadable. PNGs and stripped JPEGs have no EXIF block; that is expected.
fn exif_orientation(data: &[u8]) -> u32 {
    let mut cursor = Cursor::new(data);
    match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(meta) => meta
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .unwrap_or(1),
        Err(_) => 1,
    }
}

/// Undo the EXIF orientation so the hash sees the image as displayed.
fn normalize_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
