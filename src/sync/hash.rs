//! Content hashing for change files.
//!
//! SHA256 over raw bytes. Used for the change-log body checksum and to skip
//! rewriting a change file whose content has not changed.

use sha2::{Digest, Sha256};

/// Compute the SHA256 hex digest of a byte slice.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Check if content has changed relative to a stored hash.
///
/// Returns `true` if there is no stored hash or the hashes differ.
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}

/// Low 16 bits of the site id digest, used to keep row ids replica-distinct.
#[must_use]
pub fn site_bits(site_id: &str) -> i64 {
    let digest = Sha256::digest(site_id.as_bytes());
    i64::from(u16::from_be_bytes([digest[0], digest[1]]))
}
