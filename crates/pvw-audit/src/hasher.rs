// hasher.rs — SHA-256 hashing for the audit chain.
//
// All hashes are SHA-256, hex-encoded as 64 lowercase characters. The chain
// hashes the raw JSON line as written, not a re-serialization, so the chain
// survives any future field reordering in the serializer.

use sha2::{Digest, Sha256};

/// Hash arbitrary bytes, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hash a UTF-8 string, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}
