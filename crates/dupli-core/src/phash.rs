//! DCT-based perceptual hashing over grayscale intensity matrices.
//!
//! The hash is the low-frequency structure of an image: a 32×32 grayscale
//! matrix is run through a 2D DCT, the top-left 8×8 block of coefficients is
//! thresholded against its own median, and the resulting 64 bits are packed
//! into 16 lowercase hex characters. Visually similar images land within a
//! small Hamming distance of each other.
//!
//! Only the 8×8 low-frequency output is ever computed, separably (columns
//! first, then rows), so the transform is O(N²·B) instead of the O(N⁴) full
//! matrix. Results are bit-identical to a full 2D DCT over the same basis.

use once_cell::sync::Lazy;

use crate::defaults::{BUCKET_MAX, HEX64_LEN, PHASH_BLOCK, PHASH_GRID};
use crate::error::{Error, Result};

/// Cosine basis restricted to the low block:
/// `COS_BASIS[x][u] = cos(π·u·(2x+1) / (2·PHASH_GRID))`.
static COS_BASIS: Lazy<[[f64; PHASH_BLOCK]; PHASH_GRID]> = Lazy::new(|| {
    let n = PHASH_GRID as f64;
    let mut table = [[0.0; PHASH_BLOCK]; PHASH_GRID];
    for (x, row) in table.iter_mut().enumerate() {
        for (u, cell) in row.iter_mut().enumerate() {
            *cell =
                (std::f64::consts::PI * u as f64 * (2.0 * x as f64 + 1.0) / (2.0 * n)).cos();
        }
    }
    table
});

/// Orthonormal DCT scale factor for index `u`.
fn alpha(u: usize) -> f64 {
    let n = PHASH_GRID as f64;
    if u == 0 {
        (1.0 / n).sqrt()
    } else {
        (2.0 / n).sqrt()
    }
}

/// Top-left 8×8 block of the 2D DCT of a row-major 32×32 matrix.
fn dct_low_block(pixels: &[u8]) -> [f64; PHASH_BLOCK * PHASH_BLOCK] {
    // partial[x][v] = Σ_y pixels[x][y]·cos_v(y)
    let mut partial = [[0f64; PHASH_BLOCK]; PHASH_GRID];
    for x in 0..PHASH_GRID {
        let row = &pixels[x * PHASH_GRID..(x + 1) * PHASH_GRID];
        for v in 0..PHASH_BLOCK {
            let mut sum = 0.0;
            for (y, &p) in row.iter().enumerate() {
                sum += p as f64 * COS_BASIS[y][v];
            }
            partial[x][v] = sum;
        }
    }

    let mut block = [0f64; PHASH_BLOCK * PHASH_BLOCK];
    for u in 0..PHASH_BLOCK {
        for v in 0..PHASH_BLOCK {
            let mut sum = 0.0;
            for x in 0..PHASH_GRID {
                sum += partial[x][v] * COS_BASIS[x][u];
            }
            block[u * PHASH_BLOCK + v] = alpha(u) * alpha(v) * sum;
        }
    }
    block
}

/// Compute the 64-bit perceptual hash of a row-major 32×32 grayscale matrix.
///
/// Bit *i* is set when low-frequency coefficient *i* exceeds the block
/// median. Deterministic: bit-identical input always yields the identical
/// 16-lowercase-hex-character result.
pub fn phash64_from_gray(pixels: &[u8]) -> Result<String> {
    let expected = PHASH_GRID * PHASH_GRID;
    if pixels.len() != expected {
        return Err(Error::InvalidInput(format!(
            "grayscale matrix must contain {} values, got {}",
            expected,
            pixels.len()
        )));
    }

    let block = dct_low_block(pixels);

    let mut sorted = block;
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = sorted[block.len() / 2];

    let mut hash = 0u64;
    for (i, &coeff) in block.iter().enumerate() {
        if coeff > median {
            hash |= 1u64 << i;
        }
    }
    Ok(format!("{:016x}", hash))
}

fn parse_hex64(hex: &str) -> Result<u64> {
    if hex.len() != HEX64_LEN {
        return Err(Error::InvalidInput(format!(
            "fingerprint must be exactly {} hex characters, got {}",
            HEX64_LEN,
            hex.len()
        )));
    }
    u64::from_str_radix(hex, 16)
        .map_err(|_| Error::InvalidInput(format!("invalid hex fingerprint: {}", hex)))
}

/// Exact Hamming distance between two 16-hex-character fingerprints.
pub fn hamming_hex64(a: &str, b: &str) -> Result<u32> {
    Ok((parse_hex64(a)? ^ parse_hex64(b)?).count_ones())
}

/// Coarse index key: the integer value of the first 4 hex characters
/// (top 16 bits) of the fingerprint.
pub fn bucket16(hex: &str) -> Result<u16> {
    if hex.len() != HEX64_LEN {
        return Err(Error::InvalidInput(format!(
            "fingerprint must be exactly {} hex characters, got {}",
            HEX64_LEN,
            hex.len()
        )));
    }
    u16::from_str_radix(&hex[..4], 16)
        .map_err(|_| Error::InvalidInput(format!("invalid hex fingerprint: {}", hex)))
}

/// Inclusive candidate bucket window around `bucket`, clamped to
/// `[0, BUCKET_MAX]` with no wraparound.
///
/// Near-duplicate hashes usually share (or nearly share) their top 16 bits;
/// two hashes within the Hamming threshold whose buckets differ by more than
/// the radius will not be found. That false negative is accepted policy.
pub fn bucket_window(bucket: u16, radius: u16) -> (u16, u16) {
    let lo = bucket.saturating_sub(radius);
    let hi = bucket.saturating_add(radius).min(BUCKET_MAX);
    (lo, hi)
}
