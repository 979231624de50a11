//! Cache entry key generation.

use sha2::{Digest, Sha256};

/// Compute the key an entry is stored under within a generation.
///
/// The method is uppercased so `get` and `GET` share a key.
pub fn compute_entry_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
