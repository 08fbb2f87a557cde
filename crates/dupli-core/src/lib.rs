//! # dupli-core
//!
//! Core types, traits, and algorithms for the dupli near-duplicate
//! detection engine.
//!
//! This crate provides the perceptual hash transform, Hamming/bucket
//! arithmetic, keeper election, the shared data model, and the store trait
//! seams the other dupli crates implement and consume.

pub mod defaults;
pub mod error;
pub mod keeper;
pub mod models;
pub mod phash;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use keeper::select_keeper;
pub use models::*;
pub use phash::{bucket16, bucket_window, hamming_hex64, phash64_from_gray};
pub use traits::{AssetStore, ClusterStore, FingerprintIndex};
pub use uuid_utils::{is_v7, new_v7};
