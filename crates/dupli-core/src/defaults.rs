//! Centralized default constants for the dupli engine.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// FINGERPRINTING
// =============================================================================

/// Side length of the grayscale intensity matrix the pHash is computed over.
pub const PHASH_GRID: usize = 32;

/// Side length of the low-frequency DCT block kept for the hash (8×8 = 64 bits).
pub const PHASH_BLOCK: usize = 8;

/// Length of an encoded fingerprint: 64 bits as lowercase hex.
pub const HEX64_LEN: usize = 16;

// =============================================================================
// NEIGHBOR SEARCH
// =============================================================================

/// Maximum Hamming distance at which two fingerprints count as near-duplicates.
pub const HAMMING_THRESHOLD: u32 = 5;

/// Bucket window radius for candidate retrieval (`{bucket-1, bucket, bucket+1}`).
pub const BUCKET_RADIUS: u16 = 1;

/// Highest bucket value (top 16 bits of the hash).
pub const BUCKET_MAX: u16 = 0xffff;

// =============================================================================
// THUMBNAILS
// =============================================================================

/// Maximum thumbnail width in pixels; height follows the aspect ratio.
pub const THUMB_MAX_WIDTH: u32 = 480;

/// JPEG quality for encoded thumbnails.
pub const THUMB_JPEG_QUALITY: u8 = 80;

// =============================================================================
// PDF RASTERIZATION
// =============================================================================

/// Resolution passed to the external rasterizer, in DPI.
pub const PDF_RASTER_DPI: u32 = 150;

/// Timeout for one external rasterizer invocation, in seconds.
pub const RASTER_CMD_TIMEOUT_SECS: u64 = 120;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_geometry_is_64_bits() {
        assert_eq!(PHASH_BLOCK * PHASH_BLOCK, HEX64_LEN * 4);
    }

    #[test]
    fn test_grid_holds_block() {
        assert!(PHASH_BLOCK <= PHASH_GRID);
    }
}
