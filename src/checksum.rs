//! Content hashing for geometry deduplication.
//!
//! Identical canonical geometry text must always yield the same hash across
//! the whole process lifetime — the hash is the dedup key for the store, not
//! a random identifier.

#[cfg(test)]
#[path = "checksum_test.rs"]
mod checksum_test;

use sha2::{Digest, Sha256};

use crate::consts::HASH_DISPLAY_LEN;

/// SHA-256 of the canonical geometry text as lowercase hex.
///
/// Empty input is returned unchanged rather than hashed; callers holding a
/// not-yet-canonicalized geometry get their empty string back.
#[must_use]
pub fn checksum(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let bytes = hasher.finalize();
    bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()
}

/// Truncated hash for list-view display.
#[must_use]
pub fn short(hash: &str) -> &str {
    &hash[..hash.len().min(HASH_DISPLAY_LEN)]
}
