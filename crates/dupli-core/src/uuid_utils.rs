//! UUID helpers.
//!
//! All persisted identifiers are UUIDv7 so that primary-key order follows
//! creation time, which keeps index pages hot and makes `ORDER BY id`
//! meaningful for diagnostics.

use uuid::Uuid;

/// Generate a new time-ordered UUIDv7.
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Check whether a UUID is version 7.
pub fn is_v7(id: &Uuid) -> bool {
    id.get_version_num() == 7
}
