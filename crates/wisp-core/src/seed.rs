//! Deterministic seed and identifier derivation.
//!
//! Every folder's children are a pure function of the folder's child seed,
//! which is itself derived from the master seed and the folder's id. Node
//! ids are UUIDs carved out of a SHA-256 digest, so two runs over the same
//! master seed agree on every identifier in the tree.

use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Derives a folder's child seed from the master seed and the folder's id.
///
/// The seed is the first 8 bytes, little-endian, of
/// `SHA-256(LE(master_seed) || utf8(node_id))`.
pub fn derive_child_seed(master_seed: i64, node_id: &str) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(master_seed.to_le_bytes());
    hasher.update(node_id.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_le_bytes(bytes)
}

/// Derives a child's node id from its parent's child seed and its own name.
///
/// The id is the first 16 bytes of `SHA-256(LE(child_seed) || utf8(name))`
/// interpreted as a UUID, in hyphenated string form.
pub fn derive_node_id(child_seed: i64, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(child_seed.to_le_bytes());
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

/// Derives the root node's id from the master seed.
///
/// The root id chains into every descendant id through the child-seed
/// derivation, so it must be reproducible under a fixed master seed. It is
/// still unguessable without the seed.
pub fn derive_root_id(master_seed: i64) -> String {
    derive_node_id(master_seed, "root")
}

/// Resolves the effective master seed.
///
/// A nonzero configured seed is used as-is; zero asks for a fresh tree and
/// falls back to the nanosecond clock.
pub fn resolve_master_seed(configured: i64) -> i64 {
    if configured != 0 {
        return configured;
    }
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before Unix epoch")
        .as_nanos() as i64
}
